use crate::{
    authentication::permissions::ActionType,
    constants::{MAX_RECIPE_INGREDIENTS, MAX_RECIPE_TAGS},
    database::actions::{ingredients::ingredients_for_recipes, tags::tags_for_recipes},
    error::{invalid_request, not_found, QueryError},
    jwt::SessionData,
    pagination::PageRequest,
    schema::{
        Id, IngredientAmount, NewRecipe, Recipe, RecipeChanges, RecipeDetail, RecipeRow,
        ShortRecipe,
    },
};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

/// Filters accepted by the recipe listing. The favorite and cart flags only
/// apply when there is a viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

fn select_recipe_rows(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.name, r.image, r.text, r.cooking_time,
            u.id AS author_id, u.email AS author_email, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = u.id AND s.user_id = ",
    );
    query_builder
        .push_bind(viewer)
        .push(") AS author_is_subscribed, EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
        .push_bind(viewer)
        .push(") AS is_favorited, EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
        .push_bind(viewer)
        .push(
            ") AS is_in_shopping_cart, COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE",
        );

    query_builder
}

async fn attach_details(
    rows: Vec<RecipeRow>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, potion::Error> {
    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = tags_for_recipes(&recipe_ids, pool).await?;
    let mut ingredients = ingredients_for_recipes(&recipe_ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            RecipeDetail::from_row(
                row,
                tags.remove(&id).unwrap_or_default(),
                ingredients.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

fn push_filters(query_builder: &mut QueryBuilder<'static, Postgres>, filter: &RecipeFilter, viewer: Option<Id>) {
    if !filter.tags.is_empty() {
        query_builder
            .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }
}

async fn count_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_filters(&mut query_builder, filter, viewer);

    let (count,): (i64,) = query_builder
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count)
}

/// Lists recipes newest first, as seen by `viewer`, with the total count.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    page: &PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<RecipeDetail>, i64), potion::Error> {
    let mut query_builder = select_recipe_rows(viewer);
    push_filters(&mut query_builder, filter, viewer);

    query_builder
        .push(" ORDER BY r.created DESC, r.id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    // Past the last page the window count has no row to ride on
    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset() > 0 => count_recipes(filter, viewer, pool).await?,
        None => 0,
    };
    let recipes = attach_details(rows, pool).await?;

    Ok((recipes, total_count))
}

pub async fn get_recipe_detail(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeDetail>, potion::Error> {
    let mut query_builder = select_recipe_rows(viewer);
    query_builder.push(" AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = query_builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(attach_details(vec![row], pool).await?.pop()),
        None => Ok(None),
    }
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as(
        "SELECT id, author_id, name, image, text, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Fetches a recipe the session is allowed to modify.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match get_recipe(id, pool).await? {
        Some(recipe) => {
            session.authenticate_owner(recipe.author_id, ActionType::ManageOwnRecipes)?;
            Ok(recipe)
        }
        None => Err(not_found("No recipe exists with specified id.")),
    }
}

pub async fn get_short_recipe(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<ShortRecipe>, potion::Error> {
    let row: Option<ShortRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

async fn insert_recipe_links(
    recipe_id: Id,
    tags: &[Id],
    ingredients: &[IngredientAmount],
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), potion::Error> {
    // Each row binds up to three of the 65535 parameters Postgres allows
    if tags.len() > MAX_RECIPE_TAGS || ingredients.len() > MAX_RECIPE_INGREDIENTS {
        return Err(invalid_request("Too many tags or ingredients."));
    }

    if !tags.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        query_builder.push_values(tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        query_builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(QueryError::from)?;
    }

    if !ingredients.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
        );
        query_builder.push_values(ingredients.iter(), |mut b, part| {
            b.push_bind(recipe_id)
                .push_bind(part.id)
                .push_bind(part.amount);
        });
        query_builder
            .build()
            .execute(&mut **tx)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}

/// Inserts the recipe together with its tags and ingredient amounts.
/// `new_recipe.image` is the stored media path.
pub async fn create_recipe(
    author_id: Id,
    new_recipe: &NewRecipe,
    pool: &Pool<Postgres>,
) -> Result<Id, potion::Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5) RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&new_recipe.name)
    .bind(&new_recipe.image)
    .bind(&new_recipe.text)
    .bind(new_recipe.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_links(id.0, &new_recipe.tags, &new_recipe.ingredients, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Recipe {} created by user {author_id}", id.0);
    Ok(id.0)
}

/// Replaces the given scalar fields and the full tag and ingredient sets.
pub async fn update_recipe(
    id: Id,
    changes: &RecipeChanges,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($2, name),
            image = COALESCE($3, image),
            text = COALESCE($4, text),
            cooking_time = COALESCE($5, cooking_time)
        WHERE id = $1
    ",
    )
    .bind(id)
    .bind(&changes.name)
    .bind(&changes.image)
    .bind(&changes.text)
    .bind(changes.cooking_time)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    insert_recipe_links(id, &changes.tags, &changes.ingredients, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;

    Ok(())
}

/// Returns whether the recipe existed.
pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<bool, potion::Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

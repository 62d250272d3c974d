use std::collections::HashMap;

use crate::{
    error::{invalid_request, QueryError},
    pagination::PageRequest,
    schema::{AuthorRecipeRow, AuthorRow, AuthorWithRecipes, Id, ShortRecipe},
};

use sqlx::{Pool, Postgres};

const AUTHOR_ROW_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed,
    (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
";

pub async fn subscribe(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    if user_id == author_id {
        return Err(invalid_request("You cannot subscribe to yourself."));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(invalid_request("You are already subscribed to this author."));
    }

    Ok(())
}

pub async fn unsubscribe(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(invalid_request("You are not subscribed to this author."));
    }

    Ok(())
}

pub async fn get_author(
    author_id: Id,
    viewer: Id,
    recipes_limit: Option<usize>,
    pool: &Pool<Postgres>,
) -> Result<Option<AuthorWithRecipes>, potion::Error> {
    let row: Option<AuthorRow> = sqlx::query_as(&format!(
        "SELECT {AUTHOR_ROW_COLUMNS} FROM users u WHERE u.id = $2"
    ))
    .bind(viewer)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(attach_recipes(vec![row], recipes_limit, pool).await?.pop()),
        None => Ok(None),
    }
}

/// Authors `user_id` follows, each with their newest recipes.
pub async fn fetch_subscriptions(
    user_id: Id,
    recipes_limit: Option<usize>,
    page: &PageRequest,
    pool: &Pool<Postgres>,
) -> Result<(Vec<AuthorWithRecipes>, i64), potion::Error> {
    let rows: Vec<AuthorRow> = sqlx::query_as(&format!(
        "
        SELECT {AUTHOR_ROW_COLUMNS}, COUNT(*) OVER() AS count
        FROM subscriptions f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY f.id
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset() > 0 => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .map_err(QueryError::from)?
        }
        None => 0,
    };
    let authors = attach_recipes(rows, recipes_limit, pool).await?;

    Ok((authors, total_count))
}

async fn attach_recipes(
    authors: Vec<AuthorRow>,
    recipes_limit: Option<usize>,
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthorWithRecipes>, potion::Error> {
    let author_ids: Vec<Id> = authors.iter().map(|author| author.id).collect();

    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT r.author_id, r.id, r.name, r.image, r.cooking_time
        FROM recipes r
        WHERE r.author_id = ANY($1)
        ORDER BY r.created DESC, r.id
    ",
    )
    .bind(&author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<ShortRecipe>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        let recipes = hashmap.entry(row.author_id).or_default();
        if recipes_limit.map_or(true, |limit| recipes.len() < limit) {
            recipes.push(row.into());
        }
    });

    Ok(authors
        .into_iter()
        .map(|author| AuthorWithRecipes {
            recipes: hashmap.remove(&author.id).unwrap_or_default(),
            author,
        })
        .collect())
}

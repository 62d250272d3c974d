use std::collections::HashMap;

use crate::{
    database::actions::escape_like,
    error::{invalid_request, QueryError},
    schema::{Id, Ingredient, IngredientChanges, NewIngredient, RecipeIngredient, RecipeIngredientRow},
};

use sqlx::{Pool, Postgres};

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, potion::Error> {
    let list: Vec<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(list)
}

/// Case-insensitive prefix search on the ingredient name.
pub async fn search_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let pattern = format!("{}%", escape_like(prefix));

    let list: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT id, name, measurement_unit FROM ingredients
        WHERE name ILIKE $1
        ORDER BY id
    ",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, potion::Error> {
    let ingredient: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(ingredient)
}

pub async fn create_ingredient(
    new_ingredient: &NewIngredient,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, potion::Error> {
    let ingredient: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING id, name, measurement_unit
    ",
    )
    .bind(&new_ingredient.name)
    .bind(&new_ingredient.measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    ingredient.ok_or_else(|| {
        invalid_request("An ingredient with this name and measurement unit already exists.")
    })
}

pub async fn update_ingredient(
    id: Id,
    changes: &IngredientChanges,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, potion::Error> {
    let ingredient: Option<Ingredient> = sqlx::query_as(
        "
        UPDATE ingredients SET
            name = COALESCE($2, name),
            measurement_unit = COALESCE($3, measurement_unit)
        WHERE id = $1
        RETURNING id, name, measurement_unit
    ",
    )
    .bind(id)
    .bind(&changes.name)
    .bind(&changes.measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(ingredient)
}

/// Returns whether the ingredient existed.
pub async fn delete_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<bool, potion::Error> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(result.rows_affected() > 0)
}

/// Returns the ids in `ids` that match no ingredient.
pub async fn missing_ingredients(
    ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<Id>, potion::Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .filter(|id| !found.iter().any(|(found,)| found == *id))
        .copied()
        .collect())
}

/// Bulk loads ingredients, skipping ones that already exist.
/// Returns how many were inserted.
pub async fn import_ingredients(
    ingredients: &[NewIngredient],
    pool: &Pool<Postgres>,
) -> Result<u64, potion::Error> {
    let names: Vec<&str> = ingredients.iter().map(|i| i.name.as_str()).collect();
    let units: Vec<&str> = ingredients
        .iter()
        .map(|i| i.measurement_unit.as_str())
        .collect();

    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let result = sqlx::query(
        "
        INSERT INTO ingredients (name, measurement_unit)
        SELECT * FROM UNNEST($1::text[], $2::text[])
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(&names)
    .bind(&units)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    tx.commit().await.map_err(QueryError::from)?;

    Ok(result.rows_affected())
}

/// Ingredients with amounts of every recipe in `recipe_ids`, keyed by recipe.
pub async fn ingredients_for_recipes(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeIngredient>>, potion::Error> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<RecipeIngredient>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

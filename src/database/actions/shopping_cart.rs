use crate::{
    error::QueryError,
    schema::{Id, ShoppingListItem},
};

use sqlx::{Pool, Postgres};

/// Sums the ingredient amounts of every recipe in the user's cart.
pub async fn shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, potion::Error> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name, SUM(ri.amount)::BIGINT AS total_amount, i.measurement_unit
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.id, i.name, i.measurement_unit
        ORDER BY i.name, i.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

use crate::{
    database::actions::recipes::get_short_recipe,
    error::{invalid_request, not_found, QueryError},
    schema::{Id, ShortRecipe},
};

use sqlx::{Pool, Postgres};

/// Per-user recipe sets that behave the same way: favorites and the
/// shopping cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCollection {
    Favorites,
    ShoppingCart,
}

impl RecipeCollection {
    fn table(&self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "favorites",
            RecipeCollection::ShoppingCart => "shopping_cart",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "favorites",
            RecipeCollection::ShoppingCart => "the shopping cart",
        }
    }

    /// Adds a recipe. Unknown recipes and repeated adds are request errors.
    pub async fn add(
        &self,
        user_id: Id,
        recipe_id: Id,
        pool: &Pool<Postgres>,
    ) -> Result<ShortRecipe, potion::Error> {
        let recipe = match get_short_recipe(recipe_id, pool).await? {
            Some(recipe) => recipe,
            None => return Err(invalid_request("No recipe exists with specified id.")),
        };

        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(invalid_request(&format!(
                "Recipe is already in {}.",
                self.name()
            )));
        }

        Ok(recipe)
    }

    /// Removes a recipe. Unknown recipes are 404, absent entries 400.
    pub async fn remove(
        &self,
        user_id: Id,
        recipe_id: Id,
        pool: &Pool<Postgres>,
    ) -> Result<(), potion::Error> {
        if get_short_recipe(recipe_id, pool).await?.is_none() {
            return Err(not_found("No recipe exists with specified id."));
        }

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

        if result.rows_affected() == 0 {
            return Err(invalid_request(&format!(
                "Recipe is not in {}.",
                self.name()
            )));
        }

        Ok(())
    }
}

use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

/// Public view of a user, relative to whoever is asking.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct UserRow {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,

    #[serde(skip)]
    #[sqlx(default)]
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct AuthorRow {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes_count: i64,

    #[serde(skip)]
    #[sqlx(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorWithRecipes {
    #[serde(flatten)]
    pub author: AuthorRow,
    pub recipes: Vec<ShortRecipe>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
    pub slug: String,
}

#[derive(Debug, Clone, Default)]
pub struct TagChanges {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngredientChanges {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

/// Plain recipe row, used for ownership checks.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Recipe joined with its author and the viewer's favorite/cart flags.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,

    pub author_id: Id,
    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,

    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,

    #[sqlx(default)]
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub color: Option<String>,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeIngredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientRow> for RecipeIngredient {
    fn from(row: RecipeIngredientRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        }
    }
}

/// Nested representation of a recipe as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserRow,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeDetail {
    pub fn from_row(row: RecipeRow, tags: Vec<Tag>, ingredients: Vec<RecipeIngredient>) -> Self {
        Self {
            id: row.id,
            tags,
            author: UserRow {
                email: row.author_email,
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
                is_subscribed: row.author_is_subscribed,
                count: 0,
            },
            ingredients,
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            name: row.name,
            image: row.image,
            text: row.text,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct ShortRecipe {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipeRow {
    pub author_id: Id,
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<AuthorRecipeRow> for ShortRecipe {
    fn from(row: AuthorRecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i32,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Clone)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

/// One line of the aggregated shopping list.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq)]
pub struct ShoppingListItem {
    pub name: String,
    pub total_amount: i64,
    pub measurement_unit: String,
}

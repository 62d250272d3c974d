pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_PERSON_NAME_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 200;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;
pub const MAX_RECIPE_INGREDIENTS: usize = 1000;
pub const MAX_RECIPE_TAGS: usize = 1000;

pub const USERNAME_PATTERN: &str = r"^[\w.@+-]+$";
pub const EMAIL_PATTERN: &str = r"^[\w.+-]+@[\w-]+\.[\w.-]+$";
pub const SLUG_PATTERN: &str = r"^[-a-zA-Z0-9_]+$";
pub const COLOR_PATTERN: &str = r"^#[0-9a-fA-F]{6}$";

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
pub const RECIPE_IMAGE_DIR: &str = "recipes/images";

pub const SHOPPING_LIST_TITLE: &str = "Shopping list";
pub const SHOPPING_LIST_EMPTY: &str = "Your shopping cart is empty.";
pub const SHOPPING_LIST_LINES_PER_PAGE: usize = 40;
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

pub const TAG_CACHE_BIND: &str = "tag-cache-key";
pub const INGREDIENT_CACHE_BIND: &str = "ingredient-cache-key";

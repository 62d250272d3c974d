use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::response::ValidationError;
use crate::{
    constants::{
        COLOR_PATTERN, EMAIL_PATTERN, MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MAX_PERSON_NAME_LENGTH,
        MAX_RECIPE_INGREDIENTS, MAX_RECIPE_TAGS, MAX_USERNAME_LENGTH, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, MIN_PASSWORD_LENGTH,
        SLUG_PATTERN, USERNAME_PATTERN,
    },
    media::Base64Image,
    schema::{Id, IngredientAmount, IngredientChanges, NewIngredient, TagChanges},
};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(USERNAME_PATTERN).expect("valid username regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("valid email regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(SLUG_PATTERN).expect("valid slug regex"));
static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(COLOR_PATTERN).expect("valid color regex"));

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// Create checks required fields, update only validates what is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Trims a text field and records blank or overlong values.
fn text_field(
    errors: &mut ValidationError,
    field: &str,
    value: Option<String>,
    max_length: usize,
    required: bool,
) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(v) if v.is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(v) if v.chars().count() > max_length => {
            errors.add(
                field,
                &format!("Ensure this field has no more than {max_length} characters."),
            );
            None
        }
        Some(v) => Some(v),
    }
}

fn password_errors(errors: &mut ValidationError, field: &str, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            field,
            &format!("This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "This password is entirely numeric.");
    }
}

// Users

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RegisterPayload {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterPayload {
    pub fn validate(self) -> Result<Registration, ValidationError> {
        let mut errors = ValidationError::new();

        let email = text_field(&mut errors, "email", self.email, MAX_EMAIL_LENGTH, true);
        if let Some(email) = &email {
            if !EMAIL_RE.is_match(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }

        let username = text_field(
            &mut errors,
            "username",
            self.username,
            MAX_USERNAME_LENGTH,
            true,
        );
        if let Some(username) = &username {
            if !USERNAME_RE.is_match(username) {
                errors.add(
                    "username",
                    "Enter a valid username. Use letters, digits and @/./+/-/_ only.",
                );
            }
            if username == "me" {
                errors.add("username", "This username is reserved.");
            }
        }

        let first_name = text_field(
            &mut errors,
            "first_name",
            self.first_name,
            MAX_PERSON_NAME_LENGTH,
            true,
        );
        let last_name = text_field(
            &mut errors,
            "last_name",
            self.last_name,
            MAX_PERSON_NAME_LENGTH,
            true,
        );

        match &self.password {
            Some(password) => password_errors(&mut errors, "password", password),
            None => errors.add("password", REQUIRED),
        }

        match (email, username, first_name, last_name, self.password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password))
                if errors.is_empty() =>
            {
                Ok(Registration {
                    email,
                    username,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginPayload {
    pub fn validate(self) -> Result<(String, String), ValidationError> {
        let mut errors = ValidationError::new();
        let email = text_field(&mut errors, "email", self.email, MAX_EMAIL_LENGTH, true);
        if self.password.is_none() {
            errors.add("password", REQUIRED);
        }

        match (email, self.password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok((email, password)),
            _ => Err(errors),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SetPasswordPayload {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

impl SetPasswordPayload {
    /// Returns `(new_password, current_password)`.
    pub fn validate(self) -> Result<(String, String), ValidationError> {
        let mut errors = ValidationError::new();

        match &self.new_password {
            Some(password) => password_errors(&mut errors, "new_password", password),
            None => errors.add("new_password", REQUIRED),
        }
        if self.current_password.is_none() {
            errors.add("current_password", REQUIRED);
        }

        match (self.new_password, self.current_password) {
            (Some(new), Some(current)) if errors.is_empty() => Ok((new, current)),
            _ => Err(errors),
        }
    }
}

// Tags & ingredients

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct TagPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

impl TagPayload {
    pub fn validate(self, mode: WriteMode) -> Result<TagChanges, ValidationError> {
        let mut errors = ValidationError::new();
        let required = mode == WriteMode::Create;

        let name = text_field(&mut errors, "name", self.name, MAX_NAME_LENGTH, required);
        let slug = text_field(&mut errors, "slug", self.slug, MAX_NAME_LENGTH, required);
        if let Some(slug) = &slug {
            if !SLUG_RE.is_match(slug) {
                errors.add(
                    "slug",
                    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
                );
            }
        }

        let color = self.color.map(|c| c.trim().to_string());
        if let Some(color) = &color {
            if !COLOR_RE.is_match(color) {
                errors.add("color", "Enter a color as # followed by six hex digits.");
            }
        }

        errors.into_result(TagChanges { name, color, slug })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

impl IngredientPayload {
    pub fn validate(self, mode: WriteMode) -> Result<IngredientChanges, ValidationError> {
        let mut errors = ValidationError::new();
        let required = mode == WriteMode::Create;

        let name = text_field(&mut errors, "name", self.name, MAX_NAME_LENGTH, required);
        let measurement_unit = text_field(
            &mut errors,
            "measurement_unit",
            self.measurement_unit,
            MAX_NAME_LENGTH,
            required,
        );

        errors.into_result(IngredientChanges {
            name,
            measurement_unit,
        })
    }
}

impl TryFrom<IngredientChanges> for NewIngredient {
    type Error = ValidationError;

    fn try_from(value: IngredientChanges) -> Result<Self, Self::Error> {
        match (value.name, value.measurement_unit) {
            (Some(name), Some(measurement_unit)) => Ok(NewIngredient {
                name,
                measurement_unit,
            }),
            (name, _) => Err(ValidationError::single(
                if name.is_none() { "name" } else { "measurement_unit" },
                REQUIRED,
            )),
        }
    }
}

// Recipes

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct IngredientAmountPayload {
    pub id: Id,
    pub amount: i32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct RecipeWritePayload {
    pub ingredients: Option<Vec<IngredientAmountPayload>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// A recipe write that passed every check not needing the database.
/// The tag and ingredient sets are always present and always replace the
/// stored ones.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeWrite {
    pub name: Option<String>,
    pub image: Option<Base64Image>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

impl RecipeWritePayload {
    pub fn validate(self, mode: WriteMode) -> Result<RecipeWrite, ValidationError> {
        let mut errors = ValidationError::new();
        let required = mode == WriteMode::Create;

        let ingredients = self.ingredients.unwrap_or_else(|| {
            errors.add("ingredients", REQUIRED);
            Vec::new()
        });
        if ingredients.is_empty() && errors.field("ingredients").is_none() {
            errors.add("ingredients", "At least one ingredient is required.");
        }
        if ingredients.len() > MAX_RECIPE_INGREDIENTS {
            errors.add(
                "ingredients",
                &format!("At most {MAX_RECIPE_INGREDIENTS} ingredients are allowed."),
            );
        }
        let mut seen = HashSet::new();
        if !ingredients.iter().all(|part| seen.insert(part.id)) {
            errors.add("ingredients", "Ingredients must not repeat.");
        }
        if ingredients
            .iter()
            .any(|part| part.amount < MIN_INGREDIENT_AMOUNT)
        {
            errors.add(
                "ingredients",
                &format!("Amount must be at least {MIN_INGREDIENT_AMOUNT}."),
            );
        }

        let tags = self.tags.unwrap_or_else(|| {
            errors.add("tags", REQUIRED);
            Vec::new()
        });
        if tags.is_empty() && errors.field("tags").is_none() {
            errors.add("tags", "At least one tag is required.");
        }
        if tags.len() > MAX_RECIPE_TAGS {
            errors.add("tags", &format!("At most {MAX_RECIPE_TAGS} tags are allowed."));
        }
        let mut seen = HashSet::new();
        if !tags.iter().all(|id| seen.insert(*id)) {
            errors.add("tags", "Tags must not repeat.");
        }

        let name = text_field(&mut errors, "name", self.name, MAX_NAME_LENGTH, required);
        let text = text_field(&mut errors, "text", self.text, usize::MAX, required);

        let image = match self.image.as_deref() {
            Some(image) => match Base64Image::try_from(image) {
                Ok(image) => Some(image),
                Err(e) => {
                    errors.add("image", e.info());
                    None
                }
            },
            None => {
                if required {
                    errors.add("image", REQUIRED);
                }
                None
            }
        };

        match self.cooking_time {
            Some(time) if time < MIN_COOKING_TIME => errors.add(
                "cooking_time",
                &format!("Cooking time must be at least {MIN_COOKING_TIME} minute."),
            ),
            None if required => errors.add("cooking_time", REQUIRED),
            _ => {}
        }

        errors.into_result(RecipeWrite {
            name,
            image,
            text,
            cooking_time: self.cooking_time,
            tags,
            ingredients: ingredients
                .into_iter()
                .map(|part| IngredientAmount {
                    id: part.id,
                    amount: part.amount,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn recipe(value: serde_json::Value) -> RecipeWritePayload {
        serde_json::from_value(value).unwrap()
    }

    fn valid_recipe() -> serde_json::Value {
        json!({
            "ingredients": [{ "id": 1, "amount": 10 }, { "id": 2, "amount": 5 }],
            "tags": [1, 2],
            "image": PIXEL,
            "name": "Pancakes",
            "text": "Mix and fry.",
            "cooking_time": 15
        })
    }

    #[test]
    fn accepts_a_complete_recipe() {
        let write = recipe(valid_recipe()).validate(WriteMode::Create).unwrap();

        assert_eq!(write.name.as_deref(), Some("Pancakes"));
        assert_eq!(write.tags, vec![1, 2]);
        assert_eq!(
            write.ingredients,
            vec![
                IngredientAmount { id: 1, amount: 10 },
                IngredientAmount { id: 2, amount: 5 }
            ]
        );
        assert_eq!(write.image.unwrap().extension, "png");
    }

    #[test]
    fn rejects_duplicate_ingredients() {
        let mut value = valid_recipe();
        value["ingredients"] = json!([{ "id": 1, "amount": 10 }, { "id": 1, "amount": 3 }]);

        let errors = recipe(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(
            errors.field("ingredients"),
            Some(&vec![String::from("Ingredients must not repeat.")])
        );
    }

    #[test]
    fn rejects_oversized_sets() {
        let mut value = valid_recipe();
        let parts: Vec<_> = (1..=MAX_RECIPE_INGREDIENTS as i32 + 1)
            .map(|id| json!({ "id": id, "amount": 1 }))
            .collect();
        value["ingredients"] = json!(parts);
        value["tags"] = json!((1..=MAX_RECIPE_TAGS as i32 + 1).collect::<Vec<_>>());

        let errors = recipe(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(
            errors.field("ingredients"),
            Some(&vec![format!("At most {MAX_RECIPE_INGREDIENTS} ingredients are allowed.")])
        );
        assert_eq!(
            errors.field("tags"),
            Some(&vec![format!("At most {MAX_RECIPE_TAGS} tags are allowed.")])
        );

        let mut value = valid_recipe();
        let parts: Vec<_> = (1..=MAX_RECIPE_INGREDIENTS as i32)
            .map(|id| json!({ "id": id, "amount": 1 }))
            .collect();
        value["ingredients"] = json!(parts);
        assert!(recipe(value).validate(WriteMode::Create).is_ok());
    }

    #[test]
    fn rejects_empty_and_duplicate_tags() {
        let mut value = valid_recipe();
        value["tags"] = json!([]);
        let errors = recipe(value).validate(WriteMode::Create).unwrap_err();
        assert!(errors.field("tags").is_some());

        let mut value = valid_recipe();
        value["tags"] = json!([3, 3]);
        let errors = recipe(value).validate(WriteMode::Create).unwrap_err();
        assert_eq!(
            errors.field("tags"),
            Some(&vec![String::from("Tags must not repeat.")])
        );
    }

    #[test]
    fn rejects_low_amounts_and_cooking_time() {
        let mut value = valid_recipe();
        value["ingredients"] = json!([{ "id": 1, "amount": 0 }]);
        value["cooking_time"] = json!(0);

        let errors = recipe(value).validate(WriteMode::Create).unwrap_err();
        assert!(errors.field("ingredients").is_some());
        assert!(errors.field("cooking_time").is_some());
    }

    #[test]
    fn create_requires_scalar_fields() {
        let errors = recipe(json!({
            "ingredients": [{ "id": 1, "amount": 1 }],
            "tags": [1]
        }))
        .validate(WriteMode::Create)
        .unwrap_err();

        for field in ["name", "text", "image", "cooking_time"] {
            assert!(errors.field(field).is_some(), "{field} should be required");
        }
    }

    #[test]
    fn update_keeps_absent_scalars() {
        let write = recipe(json!({
            "ingredients": [{ "id": 1, "amount": 1 }],
            "tags": [1],
            "cooking_time": 20
        }))
        .validate(WriteMode::Update)
        .unwrap();

        assert_eq!(write.name, None);
        assert_eq!(write.image, None);
        assert_eq!(write.cooking_time, Some(20));
    }

    #[test]
    fn update_still_requires_links() {
        let errors = recipe(json!({ "name": "Soup" }))
            .validate(WriteMode::Update)
            .unwrap_err();

        assert!(errors.field("ingredients").is_some());
        assert!(errors.field("tags").is_some());
    }

    #[test]
    fn rejects_bad_images() {
        let mut value = valid_recipe();
        value["image"] = json!("not an image");

        let errors = recipe(value).validate(WriteMode::Create).unwrap_err();
        assert!(errors.field("image").is_some());
    }

    #[test]
    fn registration_checks_every_field() {
        let payload: RegisterPayload = serde_json::from_value(json!({
            "email": "not-an-email",
            "username": "bad name!",
            "first_name": "",
            "password": "12345678"
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        for field in ["email", "username", "first_name", "last_name", "password"] {
            assert!(errors.field(field).is_some(), "{field} should fail");
        }
    }

    #[test]
    fn registration_accepts_valid_users() {
        let payload: RegisterPayload = serde_json::from_value(json!({
            "email": "cook@example.com",
            "username": "cook.42",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "password": "correct-horse"
        }))
        .unwrap();

        let registration = payload.validate().unwrap();
        assert_eq!(registration.username, "cook.42");
    }

    #[test]
    fn tag_colors_and_slugs_are_checked() {
        let payload = TagPayload {
            name: Some(String::from("Breakfast")),
            color: Some(String::from("red")),
            slug: Some(String::from("break fast")),
        };

        let errors = payload.validate(WriteMode::Create).unwrap_err();
        assert!(errors.field("color").is_some());
        assert!(errors.field("slug").is_some());

        let payload = TagPayload {
            name: None,
            color: Some(String::from("#E26C2D")),
            slug: None,
        };
        assert!(payload.validate(WriteMode::Update).is_ok());
    }

    #[test]
    fn new_ingredients_need_both_fields() {
        let changes = IngredientPayload {
            name: Some(String::from("Salt")),
            measurement_unit: None,
        }
        .validate(WriteMode::Update)
        .unwrap();

        assert!(NewIngredient::try_from(changes).is_err());
    }
}

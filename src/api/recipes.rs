use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::{
    filters::{json_body, with_form, with_state},
    payload::{RecipeWrite, RecipeWritePayload, WriteMode},
    response::{attachment, json_response, no_content, ApiError, OrReject, ValidationError},
};
use crate::{
    authentication::{
        middleware::{with_possible_session, with_session},
        permissions::ActionType,
    },
    constants::{SHOPPING_LIST_FILENAME, SHOPPING_LIST_LINES_PER_PAGE},
    database::actions::{
        favorites::RecipeCollection,
        ingredients::missing_ingredients,
        recipes::{self, RecipeFilter},
        shopping_cart::shopping_list,
        tags::missing_tags,
    },
    error::{not_found, TypeError},
    form::Form,
    jwt::SessionData,
    pagination::{Page, PageRequest},
    schema::{Id, NewRecipe, RecipeChanges, RecipeDetail},
    shopping_list::render_shopping_list,
    state::AppState,
};

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, TypeError> {
        Ok(Self {
            tags: form.get_all("tags"),
            author: form.get_number::<Id>("author")?,
            is_favorited: form.get_flag("is_favorited"),
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
        })
    }
}

fn with_image_url(state: &AppState, mut recipe: RecipeDetail) -> RecipeDetail {
    recipe.image = state.media.url(&recipe.image);
    recipe
}

/// Rejects tag and ingredient ids that do not exist.
async fn check_references(write: &RecipeWrite, state: &AppState) -> Result<(), Rejection> {
    let mut errors = ValidationError::new();

    let tags = missing_tags(&write.tags, &state.pool).await.or_reject()?;
    if !tags.is_empty() {
        errors.add("tags", &format!("Unknown tag ids: {tags:?}"));
    }

    let ingredient_ids: Vec<Id> = write.ingredients.iter().map(|part| part.id).collect();
    let ingredients = missing_ingredients(&ingredient_ids, &state.pool)
        .await
        .or_reject()?;
    if !ingredients.is_empty() {
        errors.add("ingredients", &format!("Unknown ingredient ids: {ingredients:?}"));
    }

    errors.into_result(()).or_reject()
}

async fn recipe_response(
    id: Id,
    viewer: Id,
    status: StatusCode,
    state: &AppState,
) -> Result<Response, Rejection> {
    let recipe = recipes::get_recipe_detail(id, Some(viewer), &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No recipe exists with specified id."))
        .or_reject()?;

    Ok(json_response(&with_image_url(state, recipe), status))
}

async fn list_recipes(
    session: Option<SessionData>,
    form: Form,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let page = PageRequest::from_form(&form).or_reject()?;
    let filter = RecipeFilter::from_form(&form).or_reject()?;
    let viewer = session.map(|session| session.user_id);

    let (rows, total) = recipes::fetch_recipes(&filter, viewer, &page, &state.pool)
        .await
        .or_reject()?;

    let page = Page::from_rows(rows, total, &page, "/api/recipes/")
        .map(|recipe| with_image_url(&state, recipe));

    Ok(json_response(&page, StatusCode::OK))
}

async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let viewer = session.map(|session| session.user_id);

    let recipe = recipes::get_recipe_detail(id, viewer, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No recipe exists with specified id."))
        .or_reject()?;

    Ok(json_response(&with_image_url(&state, recipe), StatusCode::OK))
}

async fn create_recipe(
    session: SessionData,
    payload: RecipeWritePayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes).or_reject()?;
    let write = payload.validate(WriteMode::Create).or_reject()?;
    check_references(&write, &state).await?;

    let (image, name, text, cooking_time) =
        match (&write.image, write.name, write.text, write.cooking_time) {
            (Some(image), Some(name), Some(text), Some(cooking_time)) => {
                (image, name, text, cooking_time)
            }
            _ => {
                let errors = ValidationError::single("non_field_errors", "Incomplete recipe.");
                return Err(ApiError::from(errors).into());
            }
        };

    let image = state.media.save_image(image).await.or_reject()?;
    let new_recipe = NewRecipe {
        name,
        image,
        text,
        cooking_time,
        tags: write.tags,
        ingredients: write.ingredients,
    };

    let id = match recipes::create_recipe(session.user_id, &new_recipe, &state.pool).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&new_recipe.image).await;
            return Err(ApiError::from(e).into());
        }
    };

    recipe_response(id, session.user_id, StatusCode::CREATED, &state).await
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    payload: RecipeWritePayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let recipe = recipes::get_recipe_mut(id, &session, &state.pool)
        .await
        .or_reject()?;
    let write = payload.validate(WriteMode::Update).or_reject()?;
    check_references(&write, &state).await?;

    let image = match &write.image {
        Some(image) => Some(state.media.save_image(image).await.or_reject()?),
        None => None,
    };
    let changes = RecipeChanges {
        name: write.name,
        image,
        text: write.text,
        cooking_time: write.cooking_time,
        tags: write.tags,
        ingredients: write.ingredients,
    };

    match recipes::update_recipe(id, &changes, &state.pool).await {
        Ok(()) => {
            if changes.image.is_some() {
                state.media.remove(&recipe.image).await;
            }
        }
        Err(e) => {
            if let Some(image) = &changes.image {
                state.media.remove(image).await;
            }
            return Err(ApiError::from(e).into());
        }
    }

    recipe_response(id, session.user_id, StatusCode::OK, &state).await
}

async fn delete_recipe(
    id: Id,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let recipe = recipes::get_recipe_mut(id, &session, &state.pool)
        .await
        .or_reject()?;

    if !recipes::delete_recipe(id, &state.pool).await.or_reject()? {
        return Err(ApiError::from(not_found("No recipe exists with specified id.")).into());
    }
    state.media.remove(&recipe.image).await;

    log::info!("Recipe {id} deleted by user {}", session.user_id);
    Ok(no_content())
}

fn collection_action(collection: RecipeCollection) -> ActionType {
    match collection {
        RecipeCollection::Favorites => ActionType::ManageOwnFavorites,
        RecipeCollection::ShoppingCart => ActionType::ManageOwnShoppingCart,
    }
}

async fn add_to_collection(
    id: Id,
    collection: RecipeCollection,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(collection_action(collection))
        .or_reject()?;

    let mut recipe = collection
        .add(session.user_id, id, &state.pool)
        .await
        .or_reject()?;
    recipe.image = state.media.url(&recipe.image);

    Ok(json_response(&recipe, StatusCode::CREATED))
}

async fn remove_from_collection(
    id: Id,
    collection: RecipeCollection,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(collection_action(collection))
        .or_reject()?;

    collection
        .remove(session.user_id, id, &state.pool)
        .await
        .or_reject()?;

    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageOwnShoppingCart)
        .or_reject()?;

    let items = shopping_list(session.user_id, &state.pool)
        .await
        .or_reject()?;
    let document = render_shopping_list(&items, SHOPPING_LIST_LINES_PER_PAGE);

    Ok(attachment(document, SHOPPING_LIST_FILENAME))
}

fn with_collection(
    collection: RecipeCollection,
) -> impl Filter<Extract = (RecipeCollection,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || collection)
}

pub fn routes(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<RecipeWritePayload>())
        .and(with_state(state.clone()))
        .and_then(create_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_recipe);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body::<RecipeWritePayload>())
        .and(with_state(state.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    let favorite = warp::path!("api" / "recipes" / Id / "favorite")
        .and(warp::post())
        .and(with_collection(RecipeCollection::Favorites))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(add_to_collection);

    let unfavorite = warp::path!("api" / "recipes" / Id / "favorite")
        .and(warp::delete())
        .and(with_collection(RecipeCollection::Favorites))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(remove_from_collection);

    let add_to_cart = warp::path!("api" / "recipes" / Id / "shopping_cart")
        .and(warp::post())
        .and(with_collection(RecipeCollection::ShoppingCart))
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(add_to_collection);

    let remove_from_cart = warp::path!("api" / "recipes" / Id / "shopping_cart")
        .and(warp::delete())
        .and(with_collection(RecipeCollection::ShoppingCart))
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(remove_from_collection);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(favorite)
        .unify()
        .or(unfavorite)
        .unify()
        .or(add_to_cart)
        .unify()
        .or(remove_from_cart)
        .unify()
        .boxed()
}

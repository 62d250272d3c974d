use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::{
    filters::{json_body, with_form, with_state},
    payload::{IngredientPayload, WriteMode},
    response::{json_response, no_content, ApiError, OrReject},
};
use crate::{
    authentication::{middleware::with_session, permissions::ActionType},
    cache::cache::{cached_list, invalidate_cache, CacheKeyType, CacheLifetime},
    database::actions::ingredients,
    error::not_found,
    form::Form,
    jwt::SessionData,
    schema::{Id, NewIngredient},
    state::AppState,
};

/// The full list goes through the cache, name searches hit the database.
async fn list_ingredients(form: Form, state: Arc<AppState>) -> Result<Response, Rejection> {
    let list = match form.get_str("name") {
        Some(prefix) => ingredients::search_ingredients(prefix, &state.pool)
            .await
            .or_reject()?,
        None => {
            let pool = state.pool.clone();
            cached_list(CacheKeyType::Ingredients.new("all"), state.cache(), move || {
                let pool = pool.clone();
                async move { ingredients::list_ingredients(&pool).await }
            })
            .await
            .or_reject()?
        }
    };

    Ok(json_response(&list, StatusCode::OK))
}

async fn get_ingredient(id: Id, state: Arc<AppState>) -> Result<Response, Rejection> {
    let ingredient = ingredients::get_ingredient(id, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No ingredient exists with specified id."))
        .or_reject()?;

    Ok(json_response(&ingredient, StatusCode::OK))
}

async fn create_ingredient(
    session: SessionData,
    payload: IngredientPayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageIngredients)
        .or_reject()?;
    let changes = payload.validate(WriteMode::Create).or_reject()?;
    let new_ingredient = NewIngredient::try_from(changes).or_reject()?;

    let ingredient = ingredients::create_ingredient(&new_ingredient, &state.pool)
        .await
        .or_reject()?;
    invalidate_cache(CacheLifetime::BindIngredientCache, state.cache()).await;

    Ok(json_response(&ingredient, StatusCode::CREATED))
}

async fn update_ingredient(
    id: Id,
    session: SessionData,
    payload: IngredientPayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageIngredients)
        .or_reject()?;
    let changes = payload.validate(WriteMode::Update).or_reject()?;

    let ingredient = ingredients::update_ingredient(id, &changes, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No ingredient exists with specified id."))
        .or_reject()?;
    invalidate_cache(CacheLifetime::BindIngredientCache, state.cache()).await;

    Ok(json_response(&ingredient, StatusCode::OK))
}

async fn delete_ingredient(
    id: Id,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageIngredients)
        .or_reject()?;

    if !ingredients::delete_ingredient(id, &state.pool)
        .await
        .or_reject()?
    {
        return Err(ApiError::from(not_found("No ingredient exists with specified id.")).into());
    }
    invalidate_cache(CacheLifetime::BindIngredientCache, state.cache()).await;

    Ok(no_content())
}

pub fn routes(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(list_ingredients);

    let create = warp::path!("api" / "ingredients")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<IngredientPayload>())
        .and(with_state(state.clone()))
        .and_then(create_ingredient);

    let detail = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_ingredient);

    let update = warp::path!("api" / "ingredients" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body::<IngredientPayload>())
        .and(with_state(state.clone()))
        .and_then(update_ingredient);

    let delete = warp::path!("api" / "ingredients" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(delete_ingredient);

    list.or(create)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

use std::sync::Arc;

use warp::{filters::BoxedFilter, http::StatusCode, reject::Rejection, reply::Response, Filter};

use super::{
    filters::{json_body, with_state},
    payload::{TagPayload, WriteMode},
    response::{json_response, no_content, ApiError, OrReject},
};
use crate::{
    authentication::{middleware::with_session, permissions::ActionType},
    cache::cache::{cached_list, invalidate_cache, CacheKeyType, CacheLifetime},
    database::actions::tags,
    error::{invalid_request, not_found},
    jwt::SessionData,
    schema::Id,
    state::AppState,
};

async fn list_tags(state: Arc<AppState>) -> Result<Response, Rejection> {
    let pool = state.pool.clone();
    let list = cached_list(CacheKeyType::Tags.new("all"), state.cache(), move || {
        let pool = pool.clone();
        async move { tags::list_tags(&pool).await }
    })
    .await
    .or_reject()?;

    Ok(json_response(&list, StatusCode::OK))
}

async fn get_tag(id: Id, state: Arc<AppState>) -> Result<Response, Rejection> {
    let tag = tags::get_tag(id, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No tag exists with specified id."))
        .or_reject()?;

    Ok(json_response(&tag, StatusCode::OK))
}

async fn create_tag(
    session: SessionData,
    payload: TagPayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags).or_reject()?;
    let changes = payload.validate(WriteMode::Create).or_reject()?;

    let (name, slug) = match (&changes.name, &changes.slug) {
        (Some(name), Some(slug)) => (name, slug),
        _ => return Err(ApiError::from(invalid_request("Name and slug are required.")).into()),
    };

    let tag = tags::create_tag(name, changes.color.as_deref(), slug, &state.pool)
        .await
        .or_reject()?;
    invalidate_cache(CacheLifetime::BindTagCache, state.cache()).await;

    Ok(json_response(&tag, StatusCode::CREATED))
}

async fn update_tag(
    id: Id,
    session: SessionData,
    payload: TagPayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags).or_reject()?;
    let changes = payload.validate(WriteMode::Update).or_reject()?;

    let tag = tags::update_tag(id, &changes, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No tag exists with specified id."))
        .or_reject()?;
    invalidate_cache(CacheLifetime::BindTagCache, state.cache()).await;

    Ok(json_response(&tag, StatusCode::OK))
}

async fn delete_tag(
    id: Id,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags).or_reject()?;

    if !tags::delete_tag(id, &state.pool).await.or_reject()? {
        return Err(ApiError::from(not_found("No tag exists with specified id.")).into());
    }
    invalidate_cache(CacheLifetime::BindTagCache, state.cache()).await;

    Ok(no_content())
}

pub fn routes(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags);

    let create = warp::path!("api" / "tags")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<TagPayload>())
        .and(with_state(state.clone()))
        .and_then(create_tag);

    let detail = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag);

    let update = warp::path!("api" / "tags" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body::<TagPayload>())
        .and(with_state(state.clone()))
        .and_then(update_tag);

    let delete = warp::path!("api" / "tags" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(delete_tag);

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

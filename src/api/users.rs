use std::sync::Arc;

use serde_json::json;
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::Response,
    Filter,
};

use super::{
    filters::{json_body, with_form, with_state},
    payload::{LoginPayload, RegisterPayload, SetPasswordPayload},
    response::{json_response, no_content, ApiError, OrReject, ValidationError},
};
use crate::{
    authentication::{
        cryptography::{hash_password, password_matches},
        middleware::{with_possible_session, with_session},
        permissions::ActionType,
    },
    database::actions::{subscriptions, users},
    error::{invalid_request, not_found},
    form::Form,
    jwt::SessionData,
    pagination::{Page, PageRequest},
    schema::{AuthorWithRecipes, Id, NewUser},
    state::AppState,
};

fn with_image_urls(state: &AppState, mut author: AuthorWithRecipes) -> AuthorWithRecipes {
    author
        .recipes
        .iter_mut()
        .for_each(|recipe| recipe.image = state.media.url(&recipe.image));
    author
}

async fn register(payload: RegisterPayload, state: Arc<AppState>) -> Result<Response, Rejection> {
    let registration = payload.validate().or_reject()?;

    let mut errors = ValidationError::new();
    if users::get_user_by_email(&state.pool, &registration.email)
        .await
        .or_reject()?
        .is_some()
    {
        errors.add("email", "A user with that email already exists.");
    }
    if users::get_user_by_username(&state.pool, &registration.username)
        .await
        .or_reject()?
        .is_some()
    {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result(()).or_reject()?;

    let new_user = NewUser {
        password_hash: hash_password(&registration.password).or_reject()?,
        email: registration.email,
        username: registration.username,
        first_name: registration.first_name,
        last_name: registration.last_name,
    };

    let user = users::register_user(&new_user, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| invalid_request("A user with that email or username already exists."))
        .or_reject()?;

    Ok(json_response(
        &json!({
            "email": user.email,
            "id": user.id,
            "username": user.username,
            "first_name": user.first_name,
            "last_name": user.last_name,
        }),
        StatusCode::CREATED,
    ))
}

async fn login(payload: LoginPayload, state: Arc<AppState>) -> Result<Response, Rejection> {
    let (email, password) = payload.validate().or_reject()?;

    let token = users::login_user(
        &email,
        &password,
        &state.config.jwt_secret,
        state.config.token_lifetime(),
        &state.pool,
    )
    .await
    .or_reject()?;

    Ok(json_response(&json!({ "auth_token": token }), StatusCode::OK))
}

async fn list_users(
    session: Option<SessionData>,
    form: Form,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let page = PageRequest::from_form(&form).or_reject()?;
    let viewer = session.map(|session| session.user_id);

    let (rows, total) = users::fetch_users(viewer, &page, &state.pool)
        .await
        .or_reject()?;

    Ok(json_response(
        &Page::from_rows(rows, total, &page, "/api/users/"),
        StatusCode::OK,
    ))
}

async fn get_user(
    id: Id,
    session: Option<SessionData>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let viewer = session.map(|session| session.user_id);

    let user = users::get_profile(id, viewer, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No user exists with specified id."))
        .or_reject()?;

    Ok(json_response(&user, StatusCode::OK))
}

async fn me(session: SessionData, state: Arc<AppState>) -> Result<Response, Rejection> {
    get_user(session.user_id, Some(session), state).await
}

async fn set_password(
    session: SessionData,
    payload: SetPasswordPayload,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let (new_password, current_password) = payload.validate().or_reject()?;

    let user = users::get_user_by_id(&state.pool, session.user_id)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No user exists with specified id."))
        .or_reject()?;

    if !password_matches(&current_password, &user.password) {
        let errors = ValidationError::single("current_password", "Wrong password.");
        return Err(ApiError::from(errors).into());
    }

    users::set_password(user.id, &hash_password(&new_password).or_reject()?, &state.pool)
        .await
        .or_reject()?;

    Ok(no_content())
}

async fn list_subscriptions(
    session: SessionData,
    form: Form,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .or_reject()?;
    let page = PageRequest::from_form(&form).or_reject()?;
    let recipes_limit = form.get_number::<usize>("recipes_limit").or_reject()?;

    let (authors, total) =
        subscriptions::fetch_subscriptions(session.user_id, recipes_limit, &page, &state.pool)
            .await
            .or_reject()?;

    let page = Page::from_rows(authors, total, &page, "/api/users/subscriptions/")
        .map(|author| with_image_urls(&state, author));

    Ok(json_response(&page, StatusCode::OK))
}

async fn subscribe(
    id: Id,
    session: SessionData,
    form: Form,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .or_reject()?;
    let recipes_limit = form.get_number::<usize>("recipes_limit").or_reject()?;
    if id == session.user_id {
        return Err(ApiError::from(invalid_request("You cannot subscribe to yourself.")).into());
    }

    if users::get_user_by_id(&state.pool, id)
        .await
        .or_reject()?
        .is_none()
    {
        return Err(ApiError::from(not_found("No user exists with specified id.")).into());
    }

    subscriptions::subscribe(session.user_id, id, &state.pool)
        .await
        .or_reject()?;

    let author = subscriptions::get_author(id, session.user_id, recipes_limit, &state.pool)
        .await
        .or_reject()?
        .ok_or_else(|| not_found("No user exists with specified id."))
        .or_reject()?;

    Ok(json_response(
        &with_image_urls(&state, author),
        StatusCode::CREATED,
    ))
}

async fn unsubscribe(
    id: Id,
    session: SessionData,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .or_reject()?;

    if users::get_user_by_id(&state.pool, id)
        .await
        .or_reject()?
        .is_none()
    {
        return Err(ApiError::from(not_found("No user exists with specified id.")).into());
    }

    subscriptions::unsubscribe(session.user_id, id, &state.pool)
        .await
        .or_reject()?;

    Ok(no_content())
}

pub fn routes(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginPayload>())
        .and(with_state(state.clone()))
        .and_then(login);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body::<RegisterPayload>())
        .and(with_state(state.clone()))
        .and_then(register);

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(list_users);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(me);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<SetPasswordPayload>())
        .and(with_state(state.clone()))
        .and_then(set_password);

    let following = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_user);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(unsubscribe);

    login
        .or(register)
        .unify()
        .or(list)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(following)
        .unify()
        .or(detail)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

use std::sync::Arc;

use warp::{
    filters::BoxedFilter,
    reply::{Reply, Response},
    Filter,
};

use super::{ingredients, recipes, response::handle_rejection, tags, users};
use crate::state::AppState;

fn media_files(state: &AppState) -> BoxedFilter<(Response,)> {
    let prefix = state
        .media
        .url_segments()
        .into_iter()
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment)).boxed()
        });

    prefix
        .and(warp::get())
        .and(warp::fs::dir(state.media.root().to_path_buf()))
        .map(|file: warp::fs::File| file.into_response())
        .boxed()
}

pub fn api(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    users::routes(state.clone())
        .or(tags::routes(state.clone()))
        .unify()
        .or(ingredients::routes(state.clone()))
        .unify()
        .or(recipes::routes(state))
        .unify()
        .boxed()
}

/// Every route plus media files, error rendering and request logging.
pub fn app(state: Arc<AppState>) -> BoxedFilter<(Response,)> {
    let log = warp::log::custom(|info| {
        log::info!(
            "{} {} {} {:?}",
            info.method(),
            info.path(),
            info.status().as_u16(),
            info.elapsed()
        )
    });

    api(state.clone())
        .or(media_files(&state))
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(log)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{json, Value};
    use sqlx::postgres::PgPoolOptions;
    use warp::http::StatusCode;

    use crate::{
        config::Config,
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    const SECRET: &str = "test-secret";

    // The pool never connects: every request below is answered before any
    // query runs.
    fn test_app() -> BoxedFilter<(Response,)> {
        let config = Config {
            database_url: String::from("postgres://localhost:1/foodgram"),
            database_max_connections: 1,
            redis_url: None,
            jwt_secret: String::from(SECRET),
            token_lifetime_hours: 1,
            bind_address: "127.0.0.1:0".parse().unwrap(),
            media_root: std::env::temp_dir(),
            media_url: String::from("/media/"),
        };
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        app(AppState::new(pool, None, config))
    }

    fn token(id: i32, role: UserRole) -> String {
        let user = User {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: String::from("Test"),
            last_name: String::from("User"),
            password: String::new(),
            role,
        };
        let token = generate_jwt_session(&user, SECRET, chrono::Duration::hours(1)).unwrap();
        format!("Token {token}")
    }

    fn body(response: &Response) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn me_requires_authentication() {
        let response = warp::test::request()
            .method("GET")
            .path("/api/users/me/")
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body(&response)["detail"].is_string());
    }

    #[tokio::test]
    async fn anonymous_writes_are_unauthorized() {
        let app = test_app();

        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .json(&json!({ "name": "Soup" }))
            .reply(&app)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = warp::test::request()
            .method("DELETE")
            .path("/api/recipes/1/favorite/")
            .reply(&app)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forged_tokens_are_rejected() {
        let response = warp::test::request()
            .method("GET")
            .path("/api/recipes/1/")
            .header("authorization", "Token not.a.jwt")
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = warp::test::request()
            .method("GET")
            .path("/api/unknown/")
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response), json!({ "detail": "Not found." }));
    }

    #[tokio::test]
    async fn duplicate_ingredients_fail_validation() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .header("authorization", token(1, UserRole::User))
            .json(&json!({
                "ingredients": [{ "id": 1, "amount": 10 }, { "id": 1, "amount": 20 }],
                "tags": [1],
                "image": "data:image/png;base64,iVBORw0KGgo=",
                "name": "Soup",
                "text": "Boil.",
                "cooking_time": 30
            }))
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(&response)["ingredients"],
            json!(["Ingredients must not repeat."])
        );
    }

    #[tokio::test]
    async fn self_subscription_is_rejected() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/users/7/subscribe/")
            .header("authorization", token(7, UserRole::User))
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tag_writes_need_an_admin() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/tags/")
            .header("authorization", token(3, UserRole::User))
            .json(&json!({ "name": "Dinner", "slug": "dinner", "color": "#112233" }))
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/token/login/")
            .header("content-type", "application/json")
            .body("{ not json")
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_page_numbers_are_rejected() {
        let response = warp::test::request()
            .method("GET")
            .path("/api/recipes/?page=abc")
            .reply(&test_app())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

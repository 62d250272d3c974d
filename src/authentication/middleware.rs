use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{
    api::response::ApiError, database::error::unauthorized, state::AppState,
};

/// Pulls the token out of an `Authorization: Token <jwt>` or
/// `Authorization: Bearer <jwt>` header.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    match scheme {
        "Token" | "Bearer" if !token.is_empty() => Some(token),
        _ => None,
    }
}

fn verify_header(header: &str, secret: &str) -> Result<SessionData, Rejection> {
    let token = parse_authorization(header)
        .ok_or_else(|| ApiError::from(unauthorized("Invalid token header.")))?;

    verify_jwt_session(token, secret)
        .map(SessionData::from)
        .map_err(|e| warp::reject::custom(ApiError::from(e)))
}

/// Requires a valid session, rejecting with 401 otherwise.
pub fn with_session(
    state: Arc<AppState>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            match header {
                Some(header) => verify_header(&header, &state.config.jwt_secret),
                None => Err(warp::reject::custom(ApiError::from(unauthorized(
                    "Authentication credentials were not provided.",
                )))),
            }
        }
    })
}

/// Anonymous callers pass through as `None`. A header carrying a bad token
/// is still rejected.
pub fn with_possible_session(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let state = state.clone();
        async move {
            match header {
                Some(header) => verify_header(&header, &state.config.jwt_secret).map(Some),
                None => Ok(None),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::parse_authorization;

    #[test]
    fn accepts_token_and_bearer_schemes() {
        assert_eq!(parse_authorization("Token abc.def"), Some("abc.def"));
        assert_eq!(parse_authorization("Bearer abc.def"), Some("abc.def"));
    }

    #[test]
    fn rejects_other_headers() {
        assert_eq!(parse_authorization("Basic dXNlcg=="), None);
        assert_eq!(parse_authorization("Token"), None);
        assert_eq!(parse_authorization(""), None);
    }
}

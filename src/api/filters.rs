use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use warp::{reject::Rejection, Filter};

use super::response::OrReject;
use crate::{constants::MAX_BODY_BYTES, database::form::Form, state::AppState};

pub fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// The raw query string as a [`Form`]. A missing query is an empty form.
pub fn with_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
        .and_then(|query: String| async move { Form::from_query(&query).or_reject() })
}

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

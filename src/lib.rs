mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod api {
    pub mod filters;
    pub mod ingredients;
    pub mod payload;
    pub mod recipes;
    pub mod response;
    pub mod routes;
    pub mod tags;
    pub mod users;
}
mod cache {
    pub mod cache;
}
mod config;
mod constants;
mod logging;
mod media;
mod shopping_list;
mod state;

pub use api::*;
pub use authentication::*;
pub use cache::cache::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use logging::*;
pub use media::*;
pub use shopping_list::*;
pub use state::*;

//! HTTP surface: router, health endpoint and session token helpers.

pub mod middleware;
pub mod routes;

pub use routes::build_router;

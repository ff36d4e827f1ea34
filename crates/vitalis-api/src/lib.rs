pub mod config;
pub mod error;
pub mod state;
pub mod rate_limit;
pub mod auth;
pub mod handlers;
pub mod routes;
pub mod middleware;
pub mod router;

pub use router::build_router;
pub use state::AppState;

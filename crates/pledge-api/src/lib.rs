//! Core of the pledge service: credentials and sessions, the authorization
//! policy, the user directory, the promise lifecycle engine, and the axum
//! surface that exposes them.

pub mod auth;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod middleware;
pub mod policy;
pub mod promises;
pub mod routes;
pub mod tokens;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ErrorKind};
pub use routes::router;

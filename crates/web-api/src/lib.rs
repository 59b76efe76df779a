//! Web API 层：HTTP 路由与 WebSocket 实时网关

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

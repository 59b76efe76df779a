//! 基础设施层
//!
//! PostgreSQL 仓储实现、JWT 身份解析、以及面向实时网关的连接路由与
//! 事件扇出。

pub mod auth;
pub mod realtime;
pub mod repository;

pub use auth::*;
pub use realtime::*;
pub use repository::*;

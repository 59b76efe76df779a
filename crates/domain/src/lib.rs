//! 聊天子系统核心领域模型
//!
//! 包含房间、成员、邀请、消息等核心实体，以及相关的业务规则。

pub mod errors;
pub mod invitation;
pub mod message;
pub mod room;
pub mod room_member;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use invitation::*;
pub use message::*;
pub use room::*;
pub use room_member::*;
pub use user::*;
pub use value_objects::*;

//! 聊天逻辑层核心领域模型
//!
//! 包含用户、好友关系、群组、房间、聊天消息等核心实体，以及存储接口的抽象。

pub mod entities;
pub mod errors;
pub mod repositories;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use repositories::*;
pub use value_objects::*;

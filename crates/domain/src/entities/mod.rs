//! 领域实体定义
//!
//! 包含系统的核心实体：用户、好友、群组、房间、消息。

pub mod friend;
pub mod group;
pub mod message;
pub mod room;
pub mod user;

pub use friend::{Friend, FriendData};
pub use group::{Group, GroupData, GroupMember};
pub use message::{ChatMessage, MessageContent, PushChatRequest, MAX_TEXT_CHARS};
pub use room::Room;
pub use user::{PasswordHash, User};

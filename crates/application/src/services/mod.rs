mod chat_service;
mod history_service;
mod social_service;
mod user_service;

pub use chat_service::{ChatRequest, ChatService, ChatServiceDependencies};
pub use history_service::{HistoryService, HistoryServiceDependencies, PullMessagesRequest};
pub use social_service::{SocialService, SocialServiceDependencies};
pub use user_service::{UpdateUserRequest, UserService, UserServiceDependencies};

use std::sync::Arc;

use application::{ChatService, HistoryService, LoadService, SocialService, UserService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub user_service: Arc<UserService>,
    pub social_service: Arc<SocialService>,
    pub history_service: Arc<HistoryService>,
    pub load_service: Arc<LoadService>,
    pub jwt_service: Arc<JwtService>,
}

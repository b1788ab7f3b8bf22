use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use validator::Validate;

use application::{ChatRequest, PullMessagesRequest, SessionBootstrap, UpdateUserRequest};
use domain::{
    ChatMessage, Friend, FriendData, Group, GroupData, GroupId, MessageContent, RoomId, User,
    UserId,
};

use crate::{
    error::{ApiError, ApiResponse},
    extract::Json,
    state::AppState,
};

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

fn default_current() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Debug, Deserialize, Validate)]
struct ChatPayload {
    from: UserId,
    to: RoomId,
    #[serde(default)]
    content: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 32))]
    message_type: String,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    filename: String,
}

impl ChatPayload {
    fn into_request(self) -> ChatRequest {
        let content = match self.message_type.as_str() {
            "text" => MessageContent::Text { text: self.content },
            "image" => MessageContent::Image {
                height: self.height,
                width: self.width,
                size: self.size,
                filename: self.filename,
            },
            _ => MessageContent::Other {
                payload: serde_json::Value::String(self.content),
            },
        };
        ChatRequest {
            from: self.from,
            to: self.to,
            content,
            message_type: self.message_type,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct AuthPayload {
    #[validate(length(min = 1))]
    token: String,
}

#[derive(Debug, Deserialize)]
struct UidPayload {
    uid: UserId,
}

#[derive(Debug, Deserialize)]
struct FriendPayload {
    friend_a: UserId,
    friend_b: UserId,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateGroupPayload {
    #[validate(length(min = 1, max = 64))]
    group_name: String,
    admin: UserId,
}

#[derive(Debug, Deserialize)]
struct MembershipPayload {
    group_id: GroupId,
    uid: UserId,
}

#[derive(Debug, Deserialize, Validate)]
struct FindUserPayload {
    #[validate(length(min = 1, max = 50))]
    account: String,
}

#[derive(Debug, Deserialize, Validate)]
struct FindGroupPayload {
    #[validate(length(min = 1, max = 64))]
    group_name: String,
}

#[derive(Debug, Deserialize, Validate)]
struct InvitePayload {
    group_id: GroupId,
    #[validate(length(min = 1, max = 100))]
    friends: Vec<UserId>,
}

#[derive(Debug, Deserialize, Validate)]
struct PullMessagePayload {
    uid: UserId,
    friend_id: Option<UserId>,
    group_id: Option<GroupId>,
    #[serde(default = "default_current")]
    #[validate(range(min = 1))]
    current: u32,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100))]
    page_size: u32,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateUserPayload {
    uid: UserId,
    #[validate(length(max = 50))]
    account: Option<String>,
    #[validate(length(max = 128))]
    password: Option<String>,
    #[validate(length(max = 512))]
    avatar: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/auth", post(auth))
        .route("/load", post(load))
        .route("/getUserInfo", post(get_user_info))
        .route("/addFriend", post(add_friend))
        .route("/deleteFriend", post(delete_friend))
        .route("/createGroup", post(create_group))
        .route("/joinGroup", post(join_group))
        .route("/leaveGroup", post(leave_group))
        .route("/findUser", post(find_user))
        .route("/findGroup", post(find_group))
        .route("/inviteFriend", post(invite_friend))
        .route("/pullMessage", post(pull_message))
        .route("/updateUser", post(update_user))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 请求合法即返回成功，持久化与投递在后台完成
async fn chat(State(state): State<AppState>, Json(payload): Json<ChatPayload>) -> ApiResult<()> {
    payload.validate()?;
    let message = state.chat_service.chat(payload.into_request()).await?;
    tracing::debug!(message_id = %message.id, room_id = %message.to, "聊天消息已受理");
    Ok(ApiResponse(()))
}

async fn auth(State(state): State<AppState>, Json(payload): Json<AuthPayload>) -> ApiResult<User> {
    payload.validate()?;
    let claims = state.jwt_service.verify_token(&payload.token)?;
    let user = state.user_service.authenticate(claims.user_id).await?;
    Ok(ApiResponse(user))
}

async fn load(
    State(state): State<AppState>,
    Json(payload): Json<UidPayload>,
) -> ApiResult<SessionBootstrap> {
    let bootstrap = state.load_service.load(payload.uid).await?;
    Ok(ApiResponse(bootstrap))
}

async fn get_user_info(
    State(state): State<AppState>,
    Json(payload): Json<UidPayload>,
) -> ApiResult<User> {
    let user = state.user_service.get_user_info(payload.uid).await?;
    Ok(ApiResponse(user))
}

async fn add_friend(
    State(state): State<AppState>,
    Json(payload): Json<FriendPayload>,
) -> ApiResult<FriendData> {
    let friend = state
        .social_service
        .add_friend(payload.friend_a, payload.friend_b)
        .await?;
    Ok(ApiResponse(friend))
}

async fn delete_friend(
    State(state): State<AppState>,
    Json(payload): Json<FriendPayload>,
) -> ApiResult<Friend> {
    let friend = state
        .social_service
        .delete_friend(payload.friend_a, payload.friend_b)
        .await?;
    Ok(ApiResponse(friend))
}

async fn create_group(
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupPayload>,
) -> ApiResult<GroupData> {
    payload.validate()?;
    let group = state
        .social_service
        .create_group(&payload.group_name, payload.admin)
        .await?;
    Ok(ApiResponse(group))
}

async fn join_group(
    State(state): State<AppState>,
    Json(payload): Json<MembershipPayload>,
) -> ApiResult<GroupData> {
    let group = state
        .social_service
        .join_group(payload.group_id, payload.uid)
        .await?;
    Ok(ApiResponse(group))
}

async fn leave_group(
    State(state): State<AppState>,
    Json(payload): Json<MembershipPayload>,
) -> ApiResult<GroupData> {
    let group = state
        .social_service
        .leave_group(payload.group_id, payload.uid)
        .await?;
    Ok(ApiResponse(group))
}

async fn find_user(
    State(state): State<AppState>,
    Json(payload): Json<FindUserPayload>,
) -> ApiResult<Vec<User>> {
    payload.validate()?;
    let users = state.social_service.find_user(&payload.account).await?;
    Ok(ApiResponse(users))
}

async fn find_group(
    State(state): State<AppState>,
    Json(payload): Json<FindGroupPayload>,
) -> ApiResult<Vec<Group>> {
    payload.validate()?;
    let groups = state.social_service.find_group(&payload.group_name).await?;
    Ok(ApiResponse(groups))
}

async fn invite_friend(
    State(state): State<AppState>,
    Json(payload): Json<InvitePayload>,
) -> ApiResult<()> {
    payload.validate()?;
    state
        .social_service
        .invite_friends(payload.group_id, &payload.friends)
        .await?;
    Ok(ApiResponse(()))
}

async fn pull_message(
    State(state): State<AppState>,
    Json(payload): Json<PullMessagePayload>,
) -> ApiResult<Vec<ChatMessage>> {
    payload.validate()?;
    let messages = state
        .history_service
        .pull_messages(PullMessagesRequest {
            uid: payload.uid,
            friend_id: payload.friend_id,
            group_id: payload.group_id,
            current: payload.current,
            page_size: payload.page_size,
        })
        .await?;
    Ok(ApiResponse(messages))
}

async fn update_user(
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserPayload>,
) -> ApiResult<User> {
    payload.validate()?;
    let user = state
        .user_service
        .update_user(UpdateUserRequest {
            uid: payload.uid,
            account: payload.account,
            password: payload.password,
            avatar: payload.avatar,
        })
        .await?;
    Ok(ApiResponse(user))
}

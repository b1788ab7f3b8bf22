use std::sync::{Arc, Mutex};
use std::time::Duration;

use application::memory::{InMemoryQueue, InMemoryStore, MemoryDeadLetterSink};
use application::{
    ChatService, ChatServiceDependencies, ConsumerLoop, DeliveryDispatcher, DispatchSettings,
    GatewayAddr, GatewayClient, GatewayError, HistoryService, HistoryServiceDependencies,
    LoadService, PasswordHasher, RecipientResolver, SocialService, SocialServiceDependencies,
    StaticGatewayLocator, SystemClock, UserService, UserServiceDependencies,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use domain::{PushChatRequest, User, UserId, UserRepository};
use infrastructure::HmacPasswordHasher;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use web_api::{router, AppState, JwtConfig, JwtService};

/// 记录每一次网关推送
#[derive(Default)]
pub struct RecordingGateway {
    pushes: Mutex<Vec<PushChatRequest>>,
}

impl RecordingGateway {
    pub fn pushes(&self) -> Vec<PushChatRequest> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GatewayClient for RecordingGateway {
    async fn push(&self, _url: &str, request: &PushChatRequest) -> Result<(), GatewayError> {
        self.pushes.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<RecordingGateway>,
    pub jwt: Arc<JwtService>,
    pub hasher: Arc<HmacPasswordHasher>,
    shutdown: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl TestApp {
    /// 内存存储 + 内存队列，消费循环在后台运行
    pub fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let dead_letters = Arc::new(MemoryDeadLetterSink::default());
        let gateway = Arc::new(RecordingGateway::default());
        let hasher = Arc::new(HmacPasswordHasher::new("test-app-key"));
        let clock = Arc::new(SystemClock);
        let jwt = Arc::new(JwtService::new(JwtConfig {
            secret: "test-secret-key".to_string(),
            expiration_hours: 24,
        }));

        let dispatcher = Arc::new(DeliveryDispatcher::new(
            RecipientResolver::new(store.clone(), store.clone()),
            Arc::new(StaticGatewayLocator::new(GatewayAddr::new("127.0.0.1", 9000))),
            gateway.clone(),
            dead_letters.clone(),
            DispatchSettings::default(),
        ));
        let consumer = ConsumerLoop::new(queue.clone(), dispatcher, dead_letters.clone());
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move { consumer.run(token).await });

        let state = AppState {
            chat_service: Arc::new(ChatService::new(ChatServiceDependencies {
                message_repository: store.clone(),
                producer: queue,
                dead_letters,
                clock: clock.clone(),
            })),
            user_service: Arc::new(UserService::new(UserServiceDependencies {
                user_repository: store.clone(),
                password_hasher: hasher.clone(),
            })),
            social_service: Arc::new(SocialService::new(SocialServiceDependencies {
                user_repository: store.clone(),
                friend_repository: store.clone(),
                group_repository: store.clone(),
                room_repository: store.clone(),
                clock,
            })),
            history_service: Arc::new(HistoryService::new(HistoryServiceDependencies {
                friend_repository: store.clone(),
                group_repository: store.clone(),
                message_repository: store.clone(),
            })),
            load_service: Arc::new(LoadService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                Duration::from_secs(1),
            )),
            jwt_service: jwt.clone(),
        };

        Self {
            router: router(state),
            store,
            gateway,
            jwt,
            hasher,
            shutdown,
        }
    }

    pub async fn seed_user(&self, account: &str) -> User {
        let user = User::new(
            UserId::generate(),
            account,
            self.hasher.hash("secret").unwrap(),
            format!("https://cdn.example.com/{account}.png"),
        )
        .unwrap();
        self.store.create(user).await.unwrap()
    }

    /// POST JSON，返回响应信封
    pub async fn post(&self, uri: &str, body: Value) -> Value {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> Value {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// 轮询直到条件满足，后台任务完成的时间不确定
    pub async fn eventually<F>(&self, mut check: F)
    where
        F: FnMut() -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }
}

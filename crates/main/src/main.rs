//! 主应用程序入口
//!
//! 组装存储、队列与网关适配器，启动消费循环和 Axum Web API 服务。

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use application::memory::{InMemoryQueue, InMemoryStore};
use application::{
    ChatService, ChatServiceDependencies, ConsumerLoop, DeadLetterSink, DeliveryDispatcher,
    DispatchSettings, HistoryService, HistoryServiceDependencies, LoadService,
    LoggingDeadLetterSink, MessageProducer, MessageSource, PasswordHasher, RecipientResolver,
    SocialService, SocialServiceDependencies, StaticGatewayLocator, SystemClock, UserService,
    UserServiceDependencies,
};
use config::AppConfig;
use domain::{FriendRepository, GroupRepository, MessageRepository, RoomRepository, UserRepository};
use infrastructure::{
    create_pg_pool, HmacPasswordHasher, HttpGatewayClient, KafkaMessageConsumer,
    KafkaMessageProducer, PgStorage, MIGRATOR,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

/// 网关连接超时
const GATEWAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

struct Stores {
    users: Arc<dyn UserRepository>,
    friends: Arc<dyn FriendRepository>,
    groups: Arc<dyn GroupRepository>,
    rooms: Arc<dyn RoomRepository>,
    messages: Arc<dyn MessageRepository>,
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    if config.database.url.is_empty() {
        tracing::warn!("未配置数据库，使用内存存储");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Stores {
            users: store.clone(),
            friends: store.clone(),
            groups: store.clone(),
            rooms: store.clone(),
            messages: store,
        });
    }

    let pool = create_pg_pool(&config.database.url, config.database.max_connections)
        .await
        .context("连接数据库失败")?;
    MIGRATOR.run(&pool).await.context("数据库迁移失败")?;
    tracing::info!(max_connections = config.database.max_connections, "数据库已连接");

    let storage = PgStorage::new(pool);
    Ok(Stores {
        users: storage.user_repository,
        friends: storage.friend_repository,
        groups: storage.group_repository,
        rooms: storage.room_repository,
        messages: storage.message_repository,
    })
}

fn build_queue(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn MessageProducer>, Arc<dyn MessageSource>)> {
    if !config.kafka.enabled {
        tracing::warn!("Kafka 未启用，使用进程内队列");
        let queue = Arc::new(InMemoryQueue::new());
        return Ok((queue.clone(), queue));
    }

    let producer = KafkaMessageProducer::new(&config.kafka).context("创建 Kafka 生产者失败")?;
    let consumer = KafkaMessageConsumer::new(&config.kafka).context("创建 Kafka 消费者失败")?;
    tracing::info!(topic = %config.kafka.topic, group_id = %config.kafka.group_id, "Kafka 已连接");
    Ok((Arc::new(producer), Arc::new(consumer)))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "监听退出信号失败");
    }
    tracing::info!("收到退出信号，开始关闭");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("加载配置失败")?;
    tracing::info!(config = ?config.sanitized(), "配置已加载");

    let stores = build_stores(&config).await?;
    let (producer, source) = build_queue(&config)?;

    let clock = Arc::new(SystemClock);
    let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(LoggingDeadLetterSink);
    let password_hasher: Arc<dyn PasswordHasher> = Arc::new(HmacPasswordHasher::new(&config.app_key));
    let gateway_client =
        HttpGatewayClient::new(GATEWAY_CONNECT_TIMEOUT).context("创建网关客户端失败")?;

    let dispatcher = Arc::new(DeliveryDispatcher::new(
        RecipientResolver::new(stores.rooms.clone(), stores.groups.clone()),
        Arc::new(StaticGatewayLocator::from_config(&config.gate)),
        Arc::new(gateway_client),
        dead_letters.clone(),
        DispatchSettings::from(&config.dispatch),
    ));

    // 消费循环
    let shutdown = CancellationToken::new();
    let consumer = ConsumerLoop::new(source, dispatcher, dead_letters.clone());
    let consumer_shutdown = shutdown.clone();
    let consumer_task = tokio::spawn(async move { consumer.run(consumer_shutdown).await });

    let state = AppState {
        chat_service: Arc::new(ChatService::new(ChatServiceDependencies {
            message_repository: stores.messages.clone(),
            producer,
            dead_letters,
            clock: clock.clone(),
        })),
        user_service: Arc::new(UserService::new(UserServiceDependencies {
            user_repository: stores.users.clone(),
            password_hasher,
        })),
        social_service: Arc::new(SocialService::new(SocialServiceDependencies {
            user_repository: stores.users.clone(),
            friend_repository: stores.friends.clone(),
            group_repository: stores.groups.clone(),
            room_repository: stores.rooms.clone(),
            clock,
        })),
        history_service: Arc::new(HistoryService::new(HistoryServiceDependencies {
            friend_repository: stores.friends.clone(),
            group_repository: stores.groups.clone(),
            message_repository: stores.messages.clone(),
        })),
        load_service: Arc::new(LoadService::new(
            stores.users.clone(),
            stores.friends.clone(),
            stores.groups.clone(),
            config.load.timeout(),
        )),
        jwt_service: Arc::new(JwtService::new(config.jwt.clone())),
    };

    // 启动 Web 服务器
    let app = router(state);
    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("绑定地址失败: {bind_addr}"))?;

    tracing::info!(addr = %bind_addr, "逻辑层服务已启动");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(err) = consumer_task.await {
        tracing::error!(error = %err, "消费循环异常退出");
    }
    tracing::info!("服务已停止");
    Ok(())
}

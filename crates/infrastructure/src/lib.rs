//! 基础设施层实现。
//!
//! 提供 PostgreSQL 仓储、Kafka 生产者/消费者、网关 HTTP 客户端与密码摘要等适配器，
//! 实现应用/领域层定义的接口。

pub mod gateway_client;
pub mod kafka;
pub mod migrations;
pub mod password;
pub mod repository;

pub use gateway_client::HttpGatewayClient;
pub use kafka::{KafkaError, KafkaMessageConsumer, KafkaMessageProducer, KafkaResult};
pub use migrations::MIGRATOR;
pub use password::HmacPasswordHasher;
pub use repository::{
    create_pg_pool, PgFriendRepository, PgGroupRepository, PgMessageRepository, PgRoomRepository,
    PgStorage, PgUserRepository,
};

//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务：消息接收、持久队列与扇出、
//! 会话初始化数据的并发加载，以及好友/群组/资料的维护。
//! 外部依赖（存储、broker、网关、密码哈希）都以 trait 的形式出现，
//! 具体实现在 infrastructure crate 中。

pub mod aggregator;
pub mod clock;
pub mod dead_letter;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod password;
pub mod queue;
pub mod recipient;
pub mod services;
pub mod views;

pub use aggregator::{LoadError, LoadService, SessionBootstrap};
pub use clock::{Clock, SystemClock};
pub use dead_letter::{DeadLetter, DeadLetterSink, LoggingDeadLetterSink};
pub use dispatcher::{DeliveryDispatcher, Dispatch, DispatchReport, DispatchSettings};
pub use error::ApplicationError;
pub use gateway::{GatewayAddr, GatewayClient, GatewayError, GatewayLocator, StaticGatewayLocator};
pub use password::{PasswordHasher, PasswordHasherError};
pub use queue::{
    decode_message, encode_message, ConsumerLoop, Delivered, MessageProducer, MessageSource,
    QueueError, QueueEvent,
};
pub use recipient::{RecipientResolver, ResolveError};
pub use services::{
    ChatRequest, ChatService, ChatServiceDependencies, HistoryService, HistoryServiceDependencies,
    PullMessagesRequest, SocialService, SocialServiceDependencies, UpdateUserRequest, UserService,
    UserServiceDependencies,
};

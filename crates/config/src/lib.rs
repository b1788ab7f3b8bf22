//! 统一配置中心
//!
//! 加载顺序：内置默认值 -> 可选配置文件（`CHAT_CONFIG_FILE`）-> 环境变量（`CHAT__*`）。
//! 嵌套字段用双下划线分隔，例如 `CHAT__GATE__PORT=9000`。

use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 配置文件路径环境变量
pub const CONFIG_FILE_ENV: &str = "CHAT_CONFIG_FILE";
/// 环境变量前缀
pub const ENV_PREFIX: &str = "CHAT__";

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 网关配置
    pub gate: GateConfig,
    /// Kafka 配置
    pub kafka: KafkaConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 会话初始化加载配置
    pub load: LoadConfig,
    /// 消息扇出配置
    pub dispatch: DispatchConfig,
    /// JWT认证配置
    pub jwt: JwtConfig,
    /// 服务端密码摘要密钥
    pub app_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 网关节点配置。目前只有单网关，集群化后由定位服务替代
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateConfig {
    pub host: String,
    pub port: u16,
    /// 推送方式，目前只支持 `http`
    pub mode: String,
}

/// Kafka 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KafkaConfig {
    /// 关闭时使用进程内队列
    pub enabled: bool,
    /// Kafka 服务器地址列表
    pub brokers: Vec<String>,
    /// 聊天消息主题
    pub topic: String,
    /// 消费者组ID
    pub group_id: String,
    /// 消息发送超时时间（毫秒）
    pub send_timeout_ms: u64,
    /// 确认模式（all, 1, 0）
    pub acks: String,
}

/// 数据库配置，`url` 为空时使用内存存储
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadConfig {
    /// 整体截止时间（毫秒）
    pub timeout_ms: u64,
}

impl LoadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// 同时处于发出阶段的推送数量上限
    pub max_in_flight: usize,
    /// 单次推送超时（毫秒）
    pub send_timeout_ms: u64,
}

impl DispatchConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

impl Default for AppConfig {
    /// 开发环境默认值，生产环境必须覆盖 `app_key` 和 `jwt.secret`
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8081,
            },
            gate: GateConfig {
                host: "127.0.0.1".into(),
                port: 8080,
                mode: "http".into(),
            },
            kafka: KafkaConfig {
                enabled: false,
                brokers: vec!["localhost:9092".into()],
                topic: "chat-messages".into(),
                group_id: "logic".into(),
                send_timeout_ms: 5000,
                acks: "all".into(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
            },
            load: LoadConfig { timeout_ms: 1000 },
            dispatch: DispatchConfig {
                max_in_flight: 1,
                send_timeout_ms: 3000,
            },
            jwt: JwtConfig {
                secret: "dev-secret-key-not-for-production-use-minimum-32-chars".into(),
                expiration_hours: 24,
            },
            app_key: "dev-app-key".into(),
        }
    }
}

impl AppConfig {
    /// 从默认值、配置文件和环境变量加载配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 构造配置来源，测试中可以在此基础上继续 merge
    pub fn figment() -> Figment {
        let mut fig = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment
            .extract()
            .map_err(|err| ConfigError::Load(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerConfig(
                "server port must be greater than 0".into(),
            ));
        }
        if self.gate.host.is_empty() || self.gate.port == 0 {
            return Err(ConfigError::InvalidGateConfig(
                "gate host and port are required".into(),
            ));
        }
        if self.gate.mode != "http" {
            return Err(ConfigError::InvalidGateConfig(format!(
                "unsupported gate mode: {}",
                self.gate.mode
            )));
        }
        if self.kafka.enabled {
            if self.kafka.brokers.is_empty() {
                return Err(ConfigError::InvalidKafkaConfig(
                    "at least one broker is required".into(),
                ));
            }
            if self.kafka.topic.is_empty() || self.kafka.group_id.is_empty() {
                return Err(ConfigError::InvalidKafkaConfig(
                    "topic and group_id are required".into(),
                ));
            }
        }
        if !self.database.url.is_empty() && self.database.max_connections == 0 {
            return Err(ConfigError::InvalidDatabaseConfig(
                "max connections must be greater than 0".into(),
            ));
        }
        if self.load.timeout_ms == 0 {
            return Err(ConfigError::InvalidLoadConfig(
                "timeout must be greater than 0".into(),
            ));
        }
        if self.dispatch.max_in_flight == 0 || self.dispatch.send_timeout_ms == 0 {
            return Err(ConfigError::InvalidDispatchConfig(
                "max_in_flight and send_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT secret must be at least 32 characters long".into(),
            ));
        }
        if self.app_key.is_empty() {
            return Err(ConfigError::InvalidServerConfig("app_key cannot be empty".into()));
        }
        Ok(())
    }

    /// 用于日志输出，隐藏密钥
    pub fn sanitized(&self) -> AppConfig {
        let mut copy = self.clone();
        copy.jwt.secret = "***".into();
        copy.app_key = "***".into();
        if let Some(at) = copy.database.url.find('@') {
            copy.database.url = format!("***{}", &copy.database.url[at..]);
        }
        copy
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid gate configuration: {0}")]
    InvalidGateConfig(String),
    #[error("Invalid kafka configuration: {0}")]
    InvalidKafkaConfig(String),
    #[error("Invalid database configuration: {0}")]
    InvalidDatabaseConfig(String),
    #[error("Invalid load configuration: {0}")]
    InvalidLoadConfig(String),
    #[error("Invalid dispatch configuration: {0}")]
    InvalidDispatchConfig(String),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
}

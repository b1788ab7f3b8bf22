//! 用户实体定义

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::UserId;
use serde::{Deserialize, Serialize};

/// 服务端用密钥计算出的密码摘要，永远不是明文。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::invalid_argument("password", "hash cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 用户实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: UserId,
    pub account: String,
    /// 密码摘要（敏感信息，不下发给客户端）
    #[serde(skip_serializing, default)]
    pub password: PasswordHash,
    pub avatar: String,
}

impl User {
    pub fn new(
        uid: UserId,
        account: impl Into<String>,
        password: PasswordHash,
        avatar: impl Into<String>,
    ) -> DomainResult<Self> {
        let account = account.into();
        Self::validate_account(&account)?;
        Ok(Self {
            uid,
            account,
            password,
            avatar: avatar.into(),
        })
    }

    /// 账号规则：非空、不超过 50 个字符
    pub fn validate_account(account: &str) -> DomainResult<()> {
        let trimmed = account.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("account", "cannot be empty"));
        }
        if trimmed.chars().count() > 50 {
            return Err(DomainError::invalid_argument("account", "too long"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User::new(
            UserId::generate(),
            "alice",
            PasswordHash::new("deadbeef").unwrap(),
            "https://cdn/a.png",
        )
        .unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["account"], "alice");
    }

    #[test]
    fn empty_account_is_rejected() {
        let result = User::new(UserId::generate(), "  ", PasswordHash::default(), "");
        assert!(matches!(result, Err(DomainError::InvalidArgument { .. })));
    }
}

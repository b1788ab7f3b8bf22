use std::sync::Arc;

use domain::{DomainError, RepositoryError, User, UserId, UserRepository};

use crate::{error::ApplicationError, password::PasswordHasher};

/// 资料修改；空字符串视为未提供
#[derive(Debug, Clone)]
pub struct UpdateUserRequest {
    pub uid: UserId,
    pub account: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn get_user_info(&self, uid: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(uid)
            .await?
            .ok_or(ApplicationError::Domain(DomainError::UserNotFound))
    }

    /// 令牌已由调用方验证，这里确认令牌里的用户仍然存在
    pub async fn authenticate(&self, uid: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(uid)
            .await?
            .ok_or(ApplicationError::Authentication)
    }

    pub async fn update_user(&self, request: UpdateUserRequest) -> Result<User, ApplicationError> {
        let account = provided(request.account);
        let password = provided(request.password);
        let avatar = provided(request.avatar);
        if account.is_none() && password.is_none() && avatar.is_none() {
            return Err(DomainError::invalid_argument("user", "nothing to update").into());
        }

        let mut user = self.get_user_info(request.uid).await?;
        if let Some(account) = account {
            User::validate_account(&account)?;
            user.account = account.trim().to_owned();
        }
        if let Some(password) = password {
            user.password = self.deps.password_hasher.hash(&password)?;
        }
        if let Some(avatar) = avatar {
            user.avatar = avatar;
        }

        match self.deps.user_repository.update(user).await {
            Ok(_) => {}
            Err(RepositoryError::Conflict) => {
                return Err(DomainError::invalid_argument("account", "already taken").into())
            }
            Err(RepositoryError::NotFound) => return Err(DomainError::UserNotFound.into()),
            Err(err) => return Err(err.into()),
        }

        tracing::info!(uid = %request.uid, "用户资料已更新");
        // 返回存储中的最新数据
        self.get_user_info(request.uid).await
    }
}

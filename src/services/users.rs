use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::models::users::{AppRole, AuthUser, UserOverview};
use crate::repositories::users::UserRepository;
use crate::settings::Gamification;

pub enum UserRequest {
    ProvisionUser {
        user: AuthUser,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GetOverview {
        user_id: Uuid,
        response: oneshot::Sender<Result<UserOverview, ServiceError>>,
    },
    HasRole {
        user_id: Uuid,
        role: AppRole,
        response: oneshot::Sender<Result<bool, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: Arc<dyn UserRepository>,
    base_allocation: i64,
    admin_users: Arc<Vec<Uuid>>,
}

impl UserRequestHandler {
    pub fn new(repository: Arc<dyn UserRepository>, gamification: Gamification) -> Self {
        UserRequestHandler {
            repository,
            base_allocation: gamification.base_allocation,
            admin_users: Arc::new(gamification.admin_users),
        }
    }

    async fn provision_user(&self, user: &AuthUser) -> Result<(), ServiceError> {
        let admin = self.admin_users.contains(&user.id);

        self.repository
            .provision_user(user, self.base_allocation, admin, Utc::now())
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))
    }

    async fn get_overview(&self, user_id: Uuid) -> Result<UserOverview, ServiceError> {
        let profile = self
            .repository
            .get_profile(user_id)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?
            .ok_or_else(|| ServiceError::NotFound("Profile".to_string()))?;

        let roles = self
            .repository
            .get_roles(user_id)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))?;

        Ok(UserOverview { profile, roles })
    }

    async fn has_role(&self, user_id: Uuid, role: AppRole) -> Result<bool, ServiceError> {
        self.repository
            .has_role(user_id, role)
            .await
            .map_err(|e| ServiceError::from_repository("UserService", e))
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::ProvisionUser { user, response } => {
                let result = self.provision_user(&user).await;
                if result.is_ok() {
                    log::debug!("Provisioned user {}.", user.id);
                }
                let _ = response.send(result);
            }
            UserRequest::GetOverview { user_id, response } => {
                let overview = self.get_overview(user_id).await;
                let _ = response.send(overview);
            }
            UserRequest::HasRole {
                user_id,
                role,
                response,
            } => {
                let result = self.has_role(user_id, role).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

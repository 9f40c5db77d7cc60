use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::models::access_codes::{
    generate_code, AccessCode, AccessCodeRedemption, AccessCodeSummary, GenerateAccessCode,
};
use crate::models::Rejection;
use crate::repositories::access_codes::AccessCodeRepository;
use crate::repositories::RepositoryError;

type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum AccessCodeRequest {
    Generate {
        admin_id: Uuid,
        request: GenerateAccessCode,
        response: Reply<AccessCode>,
    },
    List {
        response: Reply<Vec<AccessCodeSummary>>,
    },
    SetActive {
        code_id: Uuid,
        active: bool,
        response: Reply<AccessCode>,
    },
    Redeem {
        user_id: Uuid,
        code: String,
        response: Reply<AccessCodeRedemption>,
    },
}

#[derive(Clone)]
pub struct AccessCodeRequestHandler {
    repository: Arc<dyn AccessCodeRepository>,
}

fn repository_error(e: RepositoryError) -> ServiceError {
    ServiceError::from_repository("AccessCodeService", e)
}

impl AccessCodeRequestHandler {
    pub fn new(repository: Arc<dyn AccessCodeRepository>) -> Self {
        AccessCodeRequestHandler { repository }
    }

    async fn generate(
        &self,
        admin_id: Uuid,
        request: GenerateAccessCode,
    ) -> Result<AccessCode, ServiceError> {
        let now = Utc::now();
        let grant = request.validate(now)?;

        let access_code = AccessCode::issue(grant, generate_code(), admin_id, now);
        let access_code = self
            .repository
            .insert_code(&access_code)
            .await
            .map_err(repository_error)?;

        log::info!(
            "Admin {} generated a {} access code with {} uses.",
            admin_id,
            access_code.tier,
            access_code.max_uses
        );
        Ok(access_code)
    }

    async fn redeem(&self, user_id: Uuid, code: String) -> Result<AccessCodeRedemption, ServiceError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Rejection::invalid("Access code is required").into());
        }

        let redemption = self
            .repository
            .redeem_code(code, user_id, Utc::now())
            .await
            .map_err(repository_error)?;

        log::info!(
            "User {} redeemed a {} access code.",
            user_id,
            redemption.tier
        );
        Ok(redemption)
    }
}

#[async_trait]
impl RequestHandler<AccessCodeRequest> for AccessCodeRequestHandler {
    async fn handle_request(&self, request: AccessCodeRequest) {
        match request {
            AccessCodeRequest::Generate {
                admin_id,
                request,
                response,
            } => {
                let _ = response.send(self.generate(admin_id, request).await);
            }
            AccessCodeRequest::List { response } => {
                let codes = self.repository.list_codes().await.map_err(repository_error);
                let _ = response.send(codes);
            }
            AccessCodeRequest::SetActive {
                code_id,
                active,
                response,
            } => {
                let code = self
                    .repository
                    .set_active(code_id, active, Utc::now())
                    .await
                    .map_err(repository_error);
                let _ = response.send(code);
            }
            AccessCodeRequest::Redeem {
                user_id,
                code,
                response,
            } => {
                let _ = response.send(self.redeem(user_id, code).await);
            }
        }
    }
}

pub struct AccessCodeService;

impl AccessCodeService {
    pub fn new() -> Self {
        AccessCodeService {}
    }
}

#[async_trait]
impl Service<AccessCodeRequest, AccessCodeRequestHandler> for AccessCodeService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::AppRole;
    use crate::repositories::memory::MemoryStore;
    use crate::repositories::users::UserRepository;

    fn request(tier: &str, max_uses: Option<i64>) -> GenerateAccessCode {
        GenerateAccessCode {
            tier: tier.to_string(),
            max_uses,
            expires_in_days: Some(30),
        }
    }

    #[tokio::test]
    async fn generated_code_can_be_redeemed_with_padding() {
        let store = MemoryStore::new();
        let handler = AccessCodeRequestHandler::new(Arc::new(store.clone()));
        let user_id = Uuid::new_v4();

        let code = handler
            .generate(Uuid::new_v4(), request("growth", Some(2)))
            .await
            .unwrap();
        assert_eq!(code.code.len(), 19);
        assert_eq!(code.tier, "growth");

        let redemption = handler
            .redeem(user_id, format!("  {}\n", code.code))
            .await
            .unwrap();
        assert_eq!(redemption.tier, "growth");
        assert!(store.has_role(user_id, AppRole::Business).await.unwrap());

        let summaries = handler.repository.list_codes().await.unwrap();
        assert_eq!(summaries[0].redemptions, 1);
        assert_eq!(summaries[0].access_code.current_uses, 1);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let handler = AccessCodeRequestHandler::new(Arc::new(MemoryStore::new()));

        let unknown_tier = handler.generate(Uuid::new_v4(), request("gold", None)).await;
        assert!(matches!(
            unknown_tier,
            Err(ServiceError::Rejected(Rejection::InvalidInput(_)))
        ));

        let blank = handler.redeem(Uuid::new_v4(), "   ".to_string()).await;
        assert!(matches!(
            blank,
            Err(ServiceError::Rejected(Rejection::InvalidInput(_)))
        ));

        let unknown = handler
            .redeem(Uuid::new_v4(), "AAAA-BBBB-CCCC-DDDD".to_string())
            .await;
        assert!(matches!(
            unknown,
            Err(ServiceError::Rejected(Rejection::UnknownAccessCode))
        ));
    }

    #[tokio::test]
    async fn deactivated_code_is_refused() {
        let handler = AccessCodeRequestHandler::new(Arc::new(MemoryStore::new()));
        let code = handler
            .generate(Uuid::new_v4(), request("starter", None))
            .await
            .unwrap();

        handler
            .repository
            .set_active(code.id, false, Utc::now())
            .await
            .unwrap();

        let result = handler.redeem(Uuid::new_v4(), code.code).await;
        assert!(matches!(
            result,
            Err(ServiceError::Rejected(Rejection::AccessCodeInactive))
        ));
    }
}

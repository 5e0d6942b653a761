pub mod category;
pub mod health;
pub mod permission;
pub mod user;
pub mod ynab;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

pub mod error {
    use ledger_common::error::LedgerError;

    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use serde::Serialize;
    use std::fmt;

    #[derive(Debug, Serialize)]
    pub struct ServerErrorResponse {
        pub err_type: &'static str,
        pub err_message: String,
    }

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 400
        IncorrectlyFormed(String),

        // 401
        MissingIdentity(String),
        IncorrectCredential(String),

        // 403
        UserDisallowed(String),

        // 404
        DoesNotExist(String),

        // 500
        InternalError(String),
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let server_error: ServerErrorResponse = self.into();
            write!(f, "{:?}", server_error)
        }
    }

    impl From<&HttpErrorResponse> for ServerErrorResponse {
        fn from(resp: &HttpErrorResponse) -> Self {
            match resp {
                HttpErrorResponse::IncorrectlyFormed(msg) => ServerErrorResponse {
                    err_type: "IncorrectlyFormed",
                    err_message: format!("Incorrectly formed request: {msg}"),
                },
                HttpErrorResponse::MissingIdentity(msg) => ServerErrorResponse {
                    err_type: "MissingIdentity",
                    err_message: format!("Missing identity: {msg}"),
                },
                HttpErrorResponse::IncorrectCredential(msg) => ServerErrorResponse {
                    err_type: "IncorrectCredential",
                    err_message: format!("Incorrect credential: {msg}"),
                },
                HttpErrorResponse::UserDisallowed(msg) => ServerErrorResponse {
                    err_type: "UserDisallowed",
                    err_message: format!("User disallowed: {msg}"),
                },
                HttpErrorResponse::DoesNotExist(msg) => ServerErrorResponse {
                    err_type: "DoesNotExist",
                    err_message: format!("Does not exist: {msg}"),
                },
                HttpErrorResponse::InternalError(msg) => ServerErrorResponse {
                    err_type: "InternalError",
                    err_message: format!("Internal error: {msg}"),
                },
            }
        }
    }

    impl From<LedgerError> for HttpErrorResponse {
        fn from(e: LedgerError) -> Self {
            match e {
                LedgerError::Validation(msg) => HttpErrorResponse::IncorrectlyFormed(msg),
                LedgerError::Unauthorized(msg) => HttpErrorResponse::IncorrectCredential(msg),
                LedgerError::Forbidden(msg) => HttpErrorResponse::UserDisallowed(msg),
                LedgerError::NotFound(msg) => HttpErrorResponse::DoesNotExist(msg),
                e => {
                    log::error!("{e}");
                    HttpErrorResponse::InternalError(e.to_string())
                }
            }
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(ServerErrorResponse::from(self))
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::IncorrectlyFormed(_) => StatusCode::BAD_REQUEST,
                HttpErrorResponse::MissingIdentity(_)
                | HttpErrorResponse::IncorrectCredential(_) => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::UserDisallowed(_) => StatusCode::FORBIDDEN,
                HttpErrorResponse::DoesNotExist(_) => StatusCode::NOT_FOUND,
                HttpErrorResponse::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

}

#[cfg(test)]
pub mod test_utils {
    use ledger_common::permissions::{AuthorizationGateway, PermissionEngine};
    use ledger_common::secrets::{DbSecretStore, SecretCipher, SECRET_KEY_SIZE};
    use ledger_common::sync::{RetryPolicy, SyncEngine};
    use ledger_common::test_stores::{MemoryStore, ScriptedFetcher};
    use ledger_common::ynab::ON_DEMAND_TIMEOUT;

    use actix_web::web::ServiceConfig;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::middleware::auth::IdentityHeader;
    use crate::services::AppServices;

    pub const IDENTITY_HEADER: &str = "X-Verified-User-Id";

    pub struct TestContext {
        pub store: Arc<MemoryStore>,
        pub fetcher: Arc<ScriptedFetcher>,
        pub services: AppServices,
    }

    impl TestContext {
        pub fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let fetcher = Arc::new(ScriptedFetcher::new());
            let cipher = SecretCipher::new(&[3u8; SECRET_KEY_SIZE]).unwrap();
            let secrets = Arc::new(DbSecretStore::new(cipher.clone(), store.clone()));

            let sync_engine = SyncEngine::with_retry_policy(
                secrets.clone(),
                cipher,
                store.clone(),
                fetcher.clone(),
                ON_DEMAND_TIMEOUT,
                RetryPolicy {
                    max_attempts: 3,
                    backoff_step: Duration::from_millis(1),
                },
            );

            let services = AppServices {
                gateway: AuthorizationGateway::new(PermissionEngine::new(store.clone())),
                sync_engine,
                secrets,
                users: store.clone(),
                categories: store.clone(),
                identity_header: IdentityHeader::default(),
            };

            Self {
                store,
                fetcher,
                services,
            }
        }

        pub fn register(&self, cfg: &mut ServiceConfig) {
            self.services.register(cfg);
            crate::services::api::configure(cfg);
        }
    }
}

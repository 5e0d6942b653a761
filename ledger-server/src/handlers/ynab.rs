use ledger_common::error::LedgerError;
use ledger_common::permissions::{AuthorizationGateway, PermissionType, ResourceType};
use ledger_common::secrets::{SecretKind, SecretStore};
use ledger_common::sync::{SyncEngine, SyncOutcome, SyncStatus};

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::handlers::category::OwnerQuery;
use crate::handlers::error::HttpErrorResponse;
use crate::handlers::unix_secs;
use crate::middleware::auth::VerifiedUser;

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryGroupView {
    pub id: String,
    pub name: String,
    pub categories: Vec<CategoryView>,
}

#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialsBody {
    pub api_token: String,
    pub budget_id: Option<String>,
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub budget_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncOutcomeView {
    pub group_count: usize,
    pub category_count: usize,
    pub local_category_count: usize,
    pub synced_at: u64,
}

impl From<SyncOutcome> for SyncOutcomeView {
    fn from(outcome: SyncOutcome) -> Self {
        Self {
            group_count: outcome.group_count,
            category_count: outcome.category_count,
            local_category_count: outcome.local_category_count,
            synced_at: unix_secs(outcome.synced_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncStatusView {
    pub has_credentials: bool,
    pub sync_enabled: bool,
    pub last_sync_time: Option<u64>,
    pub sync_frequency_mins: Option<i32>,
}

impl From<SyncStatus> for SyncStatusView {
    fn from(status: SyncStatus) -> Self {
        Self {
            has_credentials: status.has_credentials,
            sync_enabled: status.sync_enabled,
            last_sync_time: status.last_sync_time.map(unix_secs),
            sync_frequency_mins: status.sync_frequency_mins,
        }
    }
}

pub async fn category_groups(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    sync_engine: web::Data<SyncEngine>,
    query: web::Query<OwnerQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let owner_user_id = query.owner_user_id.as_deref().unwrap_or(&user.user_id);

    gateway
        .authorize(
            &user.user_id,
            owner_user_id,
            ResourceType::Categories,
            PermissionType::Read,
        )
        .await?;

    let groups: Vec<CategoryGroupView> = sync_engine
        .mirror(owner_user_id)
        .await?
        .into_iter()
        .map(|(group, categories)| CategoryGroupView {
            id: group.id,
            name: group.name,
            categories: categories
                .into_iter()
                .map(|c| CategoryView {
                    id: c.id,
                    name: c.name,
                })
                .collect(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(groups))
}

pub async fn put_credentials(
    user: VerifiedUser,
    secrets: web::Data<dyn SecretStore>,
    body: web::Json<CredentialsBody>,
) -> Result<HttpResponse, HttpErrorResponse> {
    if body.api_token.trim().is_empty() {
        return Err(HttpErrorResponse::IncorrectlyFormed(String::from(
            "API token must not be empty",
        )));
    }

    let optional_values = [
        (SecretKind::BudgetId, body.budget_id.as_deref()),
        (SecretKind::AccountId, body.account_id.as_deref()),
    ];

    secrets
        .put(&user.user_id, SecretKind::ApiToken, body.api_token.trim())
        .await
        .map_err(LedgerError::from)?;

    for (kind, value) in optional_values {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };

        secrets
            .put(&user.user_id, kind, value)
            .await
            .map_err(LedgerError::from)?;
    }

    log::info!("Stored YNAB credentials for user {}", user.user_id);

    Ok(HttpResponse::Ok().finish())
}

pub async fn sync(
    user: VerifiedUser,
    sync_engine: web::Data<SyncEngine>,
    query: web::Query<SyncQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let outcome = match query.budget_id.as_deref() {
        Some(budget_id) => {
            sync_engine
                .sync_user_with_budget(&user.user_id, budget_id)
                .await?
        }
        None => sync_engine.sync_user(&user.user_id).await?,
    };

    Ok(HttpResponse::Ok().json(SyncOutcomeView::from(outcome)))
}

pub async fn status(
    user: VerifiedUser,
    sync_engine: web::Data<SyncEngine>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let status = sync_engine.status(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(SyncStatusView::from(status)))
}

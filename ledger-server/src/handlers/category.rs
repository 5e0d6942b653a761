use ledger_common::db::category::CategoryDirectory;
use ledger_common::error::LedgerError;
use ledger_common::models::category::Category;
use ledger_common::permissions::{AuthorizationGateway, PermissionType, ResourceType};

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::auth::VerifiedUser;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_user_id: Option<String>,
}

pub async fn list(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    categories: web::Data<dyn CategoryDirectory>,
    query: web::Query<OwnerQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let owner_ids = gateway
        .owner_filter(
            &user.user_id,
            ResourceType::Categories,
            PermissionType::Read,
            query.owner_user_id.as_deref(),
        )
        .await?;

    let visible: Vec<Category> = categories
        .get_categories_for_owners(&owner_ids)
        .await
        .map_err(LedgerError::from)?;

    Ok(HttpResponse::Ok().json(visible))
}

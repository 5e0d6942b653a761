use ledger_common::db::user::UserDirectory;
use ledger_common::error::LedgerError;
use ledger_common::models::user::User;
use ledger_common::permissions::{AuthorizationGateway, PermissionType, ResourceType, Role};

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::auth::VerifiedUser;

#[derive(Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
    pub status: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            role: Role::from_stored(user.role.as_deref()).to_string(),
            id: user.id,
            username: user.username,
            name: user.name,
            status: user.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub role: String,
}

pub async fn list(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    users: web::Data<dyn UserDirectory>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let owner_ids = gateway
        .owner_filter(&user.user_id, ResourceType::Users, PermissionType::Read, None)
        .await?;

    let visible: Vec<UserView> = users
        .get_users_by_ids(&owner_ids)
        .await
        .map_err(LedgerError::from)?
        .into_iter()
        .map(UserView::from)
        .collect();

    Ok(HttpResponse::Ok().json(visible))
}

pub async fn set_role(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    target_user_id: web::Path<String>,
    body: web::Json<RoleBody>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let new_role: Role = body.role.parse()?;

    gateway
        .engine()
        .set_role(&user.user_id, &target_user_id, new_role)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

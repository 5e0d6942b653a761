use ledger_common::models::permission::Permission;
use ledger_common::permissions::{
    AuthorizationGateway, GrantKey, GrantRequest, PermissionType, ResourceType,
};

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::handlers::error::HttpErrorResponse;
use crate::handlers::unix_secs;
use crate::middleware::auth::VerifiedUser;

// 9999-12-31T23:59:59Z, the last second a Postgres timestamp column round-trips cleanly
const MAX_EXPIRES_AT_SECS: u64 = 253_402_300_799;

#[derive(Debug, Serialize, Deserialize)]
pub struct GrantView {
    pub id: i32,
    pub granted_user_id: String,
    pub owner_user_id: String,
    pub resource_type: String,
    pub permission_type: String,
    pub created_at: u64,
    pub expires_at: Option<u64>,
}

impl From<Permission> for GrantView {
    fn from(p: Permission) -> Self {
        Self {
            id: p.id,
            granted_user_id: p.granted_user_id,
            owner_user_id: p.owner_user_id,
            resource_type: p.resource_type,
            permission_type: p.permission_type,
            created_at: unix_secs(p.created_at),
            expires_at: p.expires_at.map(unix_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListGrantsQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantBody {
    pub granted_user_id: String,
    /// Defaults to the caller.
    pub owner_user_id: Option<String>,
    pub resource_type: ResourceType,
    pub permission_type: PermissionType,
    /// Seconds since the Unix epoch.
    pub expires_at: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct GrantKeyQuery {
    pub granted_user_id: String,
    pub owner_user_id: Option<String>,
    pub resource_type: ResourceType,
    pub permission_type: PermissionType,
}

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub owner_user_id: String,
    pub resource_type: ResourceType,
    pub permission_type: PermissionType,
}

pub async fn list(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    query: web::Query<ListGrantsQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let target = query.user_id.as_deref().unwrap_or(&user.user_id);

    let grants: Vec<GrantView> = gateway
        .engine()
        .list_grants(&user.user_id, target)
        .await?
        .into_iter()
        .map(GrantView::from)
        .collect();

    Ok(HttpResponse::Ok().json(grants))
}

pub async fn grant(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    body: web::Json<GrantBody>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let body = body.into_inner();
    let expires_at = body.expires_at.map(expiry_from_unix_secs).transpose()?;

    let request = GrantRequest {
        owner_user_id: body.owner_user_id.unwrap_or_else(|| user.user_id.clone()),
        granter_user_id: user.user_id,
        granted_user_id: body.granted_user_id,
        resource_type: body.resource_type,
        permission_type: body.permission_type,
        expires_at,
    };

    gateway.engine().grant(&request).await?;

    Ok(HttpResponse::Ok().finish())
}

fn expiry_from_unix_secs(secs: u64) -> Result<SystemTime, HttpErrorResponse> {
    if secs > MAX_EXPIRES_AT_SECS {
        return Err(HttpErrorResponse::IncorrectlyFormed(format!(
            "Expiration {secs} is past the latest supported time"
        )));
    }

    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .ok_or_else(|| {
            HttpErrorResponse::IncorrectlyFormed(format!("Expiration {secs} is out of range"))
        })
}

pub async fn revoke(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    query: web::Query<GrantKeyQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let key = GrantKey {
        granted_user_id: &query.granted_user_id,
        owner_user_id: query.owner_user_id.as_deref().unwrap_or(&user.user_id),
        resource_type: query.resource_type,
        permission_type: query.permission_type,
    };

    gateway.engine().revoke(&user.user_id, &key).await?;

    Ok(HttpResponse::Ok().finish())
}

pub async fn check(
    user: VerifiedUser,
    gateway: web::Data<AuthorizationGateway>,
    query: web::Query<CheckQuery>,
) -> Result<HttpResponse, HttpErrorResponse> {
    let allowed = gateway
        .engine()
        .check(
            &user.user_id,
            &query.owner_user_id,
            query.resource_type,
            query.permission_type,
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "allowed": allowed })))
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::App;

    use crate::handlers::test_utils::{TestContext, IDENTITY_HEADER};

    fn context() -> TestContext {
        let ctx = TestContext::new();
        ctx.store.add_user("owner", None, "approved");
        ctx.store.add_user("friend", None, "approved");
        ctx.store.add_user("stranger", None, "approved");
        ctx.store.add_user("admin", Some("admin"), "approved");
        ctx.store.add_user("pending", None, "pending");
        ctx
    }

    async fn check_allowed(
        app: &impl actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
        caller: &str,
        owner: &str,
        resource: &str,
        permission: &str,
    ) -> bool {
        let req = TestRequest::get()
            .uri(&format!(
                "/api/permission/check?owner_user_id={owner}&resource_type={resource}\
                 &permission_type={permission}"
            ))
            .insert_header((IDENTITY_HEADER, caller))
            .to_request();
        let resp = test::call_service(app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        body["allowed"].as_bool().unwrap()
    }

    #[actix_web::test]
    async fn test_grant_then_check() {
        let ctx = context();
        let app = test::init_service(App::new().configure(|cfg| ctx.register(cfg))).await;

        assert!(check_allowed(&app, "owner", "owner", "transactions", "write").await);
        assert!(!check_allowed(&app, "friend", "owner", "transactions", "read").await);

        let req = TestRequest::post()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "owner"))
            .set_json(serde_json::json!({
                "granted_user_id": "friend",
                "resource_type": "transactions",
                "permission_type": "write",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // Write implies read
        assert!(check_allowed(&app, "friend", "owner", "transactions", "read").await);
        assert!(check_allowed(&app, "friend", "owner", "transactions", "write").await);
        assert!(!check_allowed(&app, "friend", "owner", "reports", "read").await);

        let req = TestRequest::get()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "friend"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let grants: Vec<GrantView> = test::read_body_json(resp).await;
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].owner_user_id, "owner");
        assert_eq!(grants[0].permission_type, "write");
        assert!(grants[0].expires_at.is_none());
    }

    #[actix_web::test]
    async fn test_grant_rejections() {
        let ctx = context();
        let app = test::init_service(App::new().configure(|cfg| ctx.register(cfg))).await;

        // Only the owner or an admin may grant
        let req = TestRequest::post()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "stranger"))
            .set_json(serde_json::json!({
                "granted_user_id": "friend",
                "owner_user_id": "owner",
                "resource_type": "categories",
                "permission_type": "read",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::post()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "owner"))
            .set_json(serde_json::json!({
                "granted_user_id": "friend",
                "resource_type": "categories",
                "permission_type": "all",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = TestRequest::post()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "owner"))
            .set_json(serde_json::json!({
                "granted_user_id": "nobody",
                "resource_type": "categories",
                "permission_type": "read",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = TestRequest::post()
            .uri("/api/permission")
            .set_json(serde_json::json!({
                "granted_user_id": "friend",
                "resource_type": "categories",
                "permission_type": "read",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(ctx.store.grant_count(), 0);
    }

    #[actix_web::test]
    async fn test_grant_expiry_bounds() {
        let ctx = context();
        let app = test::init_service(App::new().configure(|cfg| ctx.register(cfg))).await;

        let grant_expiring_at = |expires_at: u64| {
            TestRequest::post()
                .uri("/api/permission")
                .insert_header((IDENTITY_HEADER, "owner"))
                .set_json(serde_json::json!({
                    "granted_user_id": "friend",
                    "resource_type": "reports",
                    "permission_type": "read",
                    "expires_at": expires_at,
                }))
                .to_request()
        };

        for expires_at in [u64::MAX, MAX_EXPIRES_AT_SECS + 1] {
            let resp = test::call_service(&app, grant_expiring_at(expires_at)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(ctx.store.grant_count(), 0);

        let resp = test::call_service(&app, grant_expiring_at(MAX_EXPIRES_AT_SECS)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(check_allowed(&app, "friend", "owner", "reports", "read").await);

        let req = TestRequest::get()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "friend"))
            .to_request();
        let grants: Vec<GrantView> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(grants[0].expires_at, Some(MAX_EXPIRES_AT_SECS));
    }

    #[test]
    fn test_expiry_from_unix_secs() {
        assert_eq!(
            expiry_from_unix_secs(60).unwrap(),
            UNIX_EPOCH + Duration::from_secs(60)
        );
        assert!(matches!(
            expiry_from_unix_secs(u64::MAX),
            Err(HttpErrorResponse::IncorrectlyFormed(_))
        ));
    }

    #[actix_web::test]
    async fn test_admin_grant_and_revoke() {
        let ctx = context();
        let app = test::init_service(App::new().configure(|cfg| ctx.register(cfg))).await;

        let req = TestRequest::post()
            .uri("/api/permission")
            .insert_header((IDENTITY_HEADER, "admin"))
            .set_json(serde_json::json!({
                "granted_user_id": "friend",
                "owner_user_id": "owner",
                "resource_type": "all",
                "permission_type": "read",
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(check_allowed(&app, "friend", "owner", "reports", "read").await);

        let revoke_uri = "/api/permission?granted_user_id=friend&owner_user_id=owner\
                          &resource_type=all&permission_type=read";

        let req = TestRequest::delete()
            .uri(revoke_uri)
            .insert_header((IDENTITY_HEADER, "stranger"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::delete()
            .uri(revoke_uri)
            .insert_header((IDENTITY_HEADER, "owner"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!check_allowed(&app, "friend", "owner", "reports", "read").await);

        // Revoking again is a no-op
        let req = TestRequest::delete()
            .uri(revoke_uri)
            .insert_header((IDENTITY_HEADER, "owner"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_expired_and_pending_grants_do_not_authorize() {
        let ctx = context();
        ctx.store.insert_grant(
            "friend",
            "owner",
            "transactions",
            "read",
            Some(SystemTime::now() - Duration::from_secs(60)),
        );
        ctx.store
            .insert_grant("pending", "owner", "transactions", "read", None);

        let app = test::init_service(App::new().configure(|cfg| ctx.register(cfg))).await;

        assert!(!check_allowed(&app, "friend", "owner", "transactions", "read").await);
        assert!(!check_allowed(&app, "pending", "owner", "transactions", "read").await);
        assert!(check_allowed(&app, "pending", "pending", "transactions", "write").await);
        assert!(check_allowed(&app, "admin", "owner", "users", "write").await);
    }

    #[actix_web::test]
    async fn test_list_grants_of_other_user() {
        let ctx = context();
        ctx.store
            .insert_grant("friend", "owner", "categories", "read", None);

        let app = test::init_service(App::new().configure(|cfg| ctx.register(cfg))).await;

        let req = TestRequest::get()
            .uri("/api/permission?user_id=friend")
            .insert_header((IDENTITY_HEADER, "stranger"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::get()
            .uri("/api/permission?user_id=owner")
            .insert_header((IDENTITY_HEADER, "admin"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let grants: Vec<GrantView> = test::read_body_json(resp).await;
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].granted_user_id, "friend");
    }
}

use actix_web::dev::Payload;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use futures::future;

use crate::handlers::error::HttpErrorResponse;

pub const DEFAULT_IDENTITY_HEADER: &str = "X-Verified-User-Id";

/// Name of the header carrying the user id that the upstream identity layer has already verified.
#[derive(Clone, Debug)]
pub struct IdentityHeader(pub String);

impl Default for IdentityHeader {
    fn default() -> Self {
        Self(String::from(DEFAULT_IDENTITY_HEADER))
    }
}

#[derive(Debug)]
pub struct VerifiedUser {
    pub user_id: String,
}

impl FromRequest for VerifiedUser {
    type Error = HttpErrorResponse;
    type Future = future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let header_name = req
            .app_data::<Data<IdentityHeader>>()
            .map(|h| h.0.as_str())
            .unwrap_or(DEFAULT_IDENTITY_HEADER);

        let user_id = req
            .headers()
            .get(header_name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user_id {
            Some(id) => future::ok(VerifiedUser {
                user_id: String::from(id),
            }),
            None => future::err(HttpErrorResponse::MissingIdentity(format!(
                "Request is missing the {header_name} header"
            ))),
        }
    }
}

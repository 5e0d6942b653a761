use ledger_common::db::category::CategoryDirectory;
use ledger_common::db::user::UserDirectory;
use ledger_common::permissions::AuthorizationGateway;
use ledger_common::secrets::SecretStore;
use ledger_common::sync::SyncEngine;

use actix_web::web::{Data, ServiceConfig};
use std::sync::Arc;

use crate::middleware::auth::IdentityHeader;

pub mod api;

/// Everything the handlers pull out of app data.
#[derive(Clone)]
pub struct AppServices {
    pub gateway: AuthorizationGateway,
    pub sync_engine: SyncEngine,
    pub secrets: Arc<dyn SecretStore>,
    pub users: Arc<dyn UserDirectory>,
    pub categories: Arc<dyn CategoryDirectory>,
    pub identity_header: IdentityHeader,
}

impl AppServices {
    pub fn register(&self, cfg: &mut ServiceConfig) {
        cfg.app_data(Data::new(self.gateway.clone()))
            .app_data(Data::new(self.sync_engine.clone()))
            .app_data(Data::from(Arc::clone(&self.secrets)))
            .app_data(Data::from(Arc::clone(&self.users)))
            .app_data(Data::from(Arc::clone(&self.categories)))
            .app_data(Data::new(self.identity_header.clone()));
    }
}

use actix_web::web::*;

use crate::handlers::ynab;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/ynab")
            .service(resource("/category_group").route(get().to(ynab::category_groups)))
            .service(resource("/credentials").route(put().to(ynab::put_credentials)))
            .service(resource("/sync").route(post().to(ynab::sync)))
            .service(resource("/status").route(get().to(ynab::status))),
    );
}

use actix_web::web::*;

use crate::handlers::permission;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/permission")
            .service(
                resource("")
                    .route(get().to(permission::list))
                    .route(post().to(permission::grant))
                    .route(delete().to(permission::revoke)),
            )
            .service(resource("/check").route(get().to(permission::check))),
    );
}

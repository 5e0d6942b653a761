use actix_web::web::*;

use crate::handlers::user;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/user")
            .service(resource("").route(get().to(user::list)))
            .service(resource("/{user_id}/role").route(put().to(user::set_role))),
    );
}

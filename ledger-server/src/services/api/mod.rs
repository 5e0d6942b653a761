use actix_web::web::*;

mod category;
mod health;
mod permission;
mod user;
mod ynab;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/api")
            .configure(category::configure)
            .configure(health::configure)
            .configure(permission::configure)
            .configure(user::configure)
            .configure(ynab::configure),
    );
}

use ledger_common::db::{self, create_db_async_pool};
use ledger_common::env::ProcessEnv;
use ledger_common::permissions::{AuthorizationGateway, PermissionEngine};
use ledger_common::secrets::select_secret_store;
use ledger_common::sync::SyncEngine;
use ledger_common::ynab::{YnabClient, ON_DEMAND_TIMEOUT};

use actix_web::{App, HttpServer};
use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode};
use std::sync::Arc;

mod env;
mod handlers;
mod middleware;
mod services;

use middleware::auth::IdentityHeader;
use services::AppServices;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let conf = env::Config::from_env(&ProcessEnv).unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    });

    let _logger = Logger::try_with_str(&conf.common.log_level)
        .expect(
            "Invalid log level. Options: ERROR, WARN, INFO, DEBUG, TRACE. \
             Example: `info, my::critical::module=trace`",
        )
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
        .expect("Failed to start logger");

    log::info!("Starting server ({})", conf.common.environment);
    log::info!("Connecting to database...");

    let db_async_pool =
        match create_db_async_pool(&conf.common.database_url, &conf.common.db_pool_bounds).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("ERROR: Failed to connect to database: {e}");
                std::process::exit(1);
            }
        };

    log::info!("Successfully connected to database");

    let ynab_dao = Arc::new(db::ynab::Dao::new(&db_async_pool));
    let secrets = select_secret_store(
        conf.common.secrets_in_env,
        conf.common.secret_cipher.clone(),
        ynab_dao.clone(),
    );

    let sync_engine = SyncEngine::new(
        Arc::clone(&secrets),
        conf.common.secret_cipher.clone(),
        ynab_dao,
        Arc::new(YnabClient::new(&conf.common.ynab_base_url)),
        ON_DEMAND_TIMEOUT,
    );

    let permission_engine =
        PermissionEngine::new(Arc::new(db::permission::Dao::new(&db_async_pool)));

    let app_services = AppServices {
        gateway: AuthorizationGateway::new(permission_engine),
        sync_engine,
        secrets,
        users: Arc::new(db::user::Dao::new(&db_async_pool)),
        categories: Arc::new(db::category::Dao::new(&db_async_pool)),
        identity_header: IdentityHeader(conf.identity_header.clone()),
    };

    let base_addr = format!("{}:{}", conf.bind_addr, conf.port);
    log::info!("Listening on {base_addr}");

    HttpServer::new(move || {
        App::new()
            .configure(|cfg| app_services.register(cfg))
            .configure(services::api::configure)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(conf.actix_worker_count)
    .bind(base_addr)?
    .run()
    .await?;

    Ok(())
}

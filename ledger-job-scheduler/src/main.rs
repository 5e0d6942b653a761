use ledger_common::db::create_db_async_pool;
use ledger_common::db::ynab::Dao as YnabDao;
use ledger_common::env::ProcessEnv;
use ledger_common::secrets::select_secret_store;
use ledger_common::sync::SyncEngine;
use ledger_common::ynab::{YnabClient, SCHEDULED_TIMEOUT};

use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod env;
mod jobs;
mod runner;

use jobs::SyncYnabCategoriesJob;
use runner::{JobRunner, SystemClock};

fn main() {
    let conf = env::Config::from_env(&ProcessEnv).unwrap_or_else(|e| {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    });

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(conf.worker_threads)
        .max_blocking_threads(conf.max_blocking_threads)
        .enable_all()
        .build()
        .expect("Failed to launch asynchronous runtime")
        .block_on(async move {
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
                .write_mode(WriteMode::BufferAndFlush)
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

            log::info!("Starting job scheduler ({})", conf.common.environment);

            let db_async_pool =
                create_db_async_pool(&conf.common.database_url, &conf.common.db_pool_bounds)
                    .await
                    .expect("Failed to create database connection pool");

            let ynab_dao = Arc::new(YnabDao::new(&db_async_pool));
            let secret_store = select_secret_store(
                conf.common.secrets_in_env,
                conf.common.secret_cipher.clone(),
                ynab_dao.clone(),
            );

            let sync_engine = SyncEngine::new(
                secret_store,
                conf.common.secret_cipher.clone(),
                ynab_dao,
                Arc::new(YnabClient::new(&conf.common.ynab_base_url)),
                SCHEDULED_TIMEOUT,
            );

            let cancellation_token = CancellationToken::new();
            let mut job_runner = JobRunner::new(
                Arc::new(SystemClock),
                conf.max_job_jitter,
                cancellation_token.clone(),
            );

            job_runner.register(Box::new(SyncYnabCategoriesJob::new(sync_engine)));

            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for shutdown signal: {}", e);
                    return;
                }

                log::info!("Shutdown signal received");
                cancellation_token.cancel();
            });

            job_runner.start().await;
        });
}

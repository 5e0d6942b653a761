use ledger_common::env::{env_var_or, CommonConfig, ConfigError, EnvSource};

use crate::middleware::auth::DEFAULT_IDENTITY_HEADER;

const BIND_ADDR_VAR: &str = "LEDGER_BIND_ADDR";
const PORT_VAR: &str = "LEDGER_PORT";
const ACTIX_WORKER_COUNT_VAR: &str = "LEDGER_ACTIX_WORKER_COUNT";
const USER_ID_HEADER_VAR: &str = "LEDGER_USER_ID_HEADER";

pub struct Config {
    pub common: CommonConfig,
    pub bind_addr: String,
    pub port: u16,
    pub actix_worker_count: usize,
    pub identity_header: String,
}

impl Config {
    pub fn from_env(env: &impl EnvSource) -> Result<Config, ConfigError> {
        let mut common = CommonConfig::from_env(env)?;
        let actix_worker_count = env_var_or(env, ACTIX_WORKER_COUNT_VAR, num_cpus::get()).max(1);

        // Every actix worker may hold a connection, so a smaller pool would starve them
        let worker_count_u32 = u32::try_from(actix_worker_count).unwrap_or(u32::MAX);
        if common.db_pool_bounds.max_connections < worker_count_u32 {
            common.db_pool_bounds.max_connections = worker_count_u32;
        }

        Ok(Config {
            common,
            bind_addr: env_var_or(env, BIND_ADDR_VAR, String::from("127.0.0.1")),
            port: env_var_or(env, PORT_VAR, 9000),
            actix_worker_count,
            identity_header: env_var_or(
                env,
                USER_ID_HEADER_VAR,
                String::from(DEFAULT_IDENTITY_HEADER),
            ),
        })
    }
}

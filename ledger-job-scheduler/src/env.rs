use ledger_common::env::{env_var_or, CommonConfig, ConfigError, EnvSource};

use std::time::Duration;

const WORKER_THREADS_VAR: &str = "LEDGER_WORKER_THREADS";
const MAX_BLOCKING_THREADS_VAR: &str = "LEDGER_MAX_BLOCKING_THREADS";
const JOB_JITTER_SECS_VAR: &str = "LEDGER_JOB_JITTER_SECS";

pub struct Config {
    pub common: CommonConfig,
    pub worker_threads: usize,
    pub max_blocking_threads: usize,
    pub max_job_jitter: Duration,
}

impl Config {
    pub fn from_env(env: &impl EnvSource) -> Result<Config, ConfigError> {
        Ok(Config {
            common: CommonConfig::from_env(env)?,
            worker_threads: env_var_or(env, WORKER_THREADS_VAR, num_cpus::get()),
            max_blocking_threads: env_var_or(env, MAX_BLOCKING_THREADS_VAR, 40),
            max_job_jitter: Duration::from_secs(env_var_or(env, JOB_JITTER_SECS_VAR, 60)),
        })
    }
}

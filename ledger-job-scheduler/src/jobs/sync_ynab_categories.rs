use ledger_common::sync::SyncEngine;

use async_trait::async_trait;

use crate::jobs::{Job, JobError};

pub struct SyncYnabCategoriesJob {
    sync_engine: SyncEngine,
    is_running: bool,
}

impl SyncYnabCategoriesJob {
    pub fn new(sync_engine: SyncEngine) -> Self {
        Self {
            sync_engine,
            is_running: false,
        }
    }
}

#[async_trait]
impl Job for SyncYnabCategoriesJob {
    fn name(&self) -> &'static str {
        "Sync YNAB Categories"
    }

    fn is_ready(&self) -> bool {
        !self.is_running
    }

    async fn execute(&mut self) -> Result<(), JobError> {
        if self.is_running {
            return Err(JobError::NotReady);
        }

        self.is_running = true;
        let result = self.sync_engine.sync_all().await;
        self.is_running = false;

        let report = result?;

        log::info!(
            "YNAB category sync finished: {} succeeded, {} failed",
            report.succeeded,
            report.failed
        );

        Ok(())
    }
}

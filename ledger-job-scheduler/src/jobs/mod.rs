mod sync_ynab_categories;

pub use sync_ynab_categories::SyncYnabCategoriesJob;

use ledger_common::error::LedgerError;

use async_trait::async_trait;
use std::fmt;

#[derive(Debug)]
pub enum JobError {
    SyncFailure(LedgerError),
    NotReady,
}

impl std::error::Error for JobError {}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::SyncFailure(e) => write!(f, "JobError: SyncFailure: {e}"),
            JobError::NotReady => {
                write!(f, "JobError: Attempted execution before job was ready")
            }
        }
    }
}

impl From<LedgerError> for JobError {
    fn from(e: LedgerError) -> Self {
        JobError::SyncFailure(e)
    }
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_ready(&self) -> bool;
    async fn execute(&mut self) -> Result<(), JobError>;
}

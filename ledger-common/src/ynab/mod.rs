//! Client for the category endpoints of the YNAB budgeting API.
//!
//! Only category groups and their categories are read. Filtering of hidden, deleted and
//! internal entries is left to the sync engine.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::error::LedgerError;

pub const DEFAULT_BASE_URL: &str = "https://api.ynab.com/v1";
pub const SCHEDULED_TIMEOUT: Duration = Duration::from_secs(10);
pub const ON_DEMAND_TIMEOUT: Duration = Duration::from_secs(30);

const BODY_SNIPPET_CHARS: usize = 256;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RemoteCategoryGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub categories: Vec<RemoteCategory>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RemoteCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Deserialize)]
struct CategoryGroupList {
    category_groups: Vec<RemoteCategoryGroup>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoriesBody {
    Envelope { data: CategoryGroupList },
    Bare(CategoryGroupList),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchError {
    Unauthorized,
    Status { status: u16, body_snippet: String },
    Transport(String),
    Decode(String),
    InvalidRequest(String),
}

impl std::error::Error for FetchError {}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Unauthorized => write!(f, "FetchError: YNAB rejected the API token"),
            FetchError::Status {
                status,
                body_snippet,
            } => write!(f, "FetchError: YNAB responded {status}: {body_snippet}"),
            FetchError::Transport(msg) => write!(f, "FetchError: Request failed: {msg}"),
            FetchError::Decode(msg) => write!(f, "FetchError: Undecodable body: {msg}"),
            FetchError::InvalidRequest(msg) => write!(f, "FetchError: Invalid request: {msg}"),
        }
    }
}

impl From<FetchError> for LedgerError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Unauthorized => {
                LedgerError::Unauthorized(String::from("YNAB rejected the API token"))
            }
            FetchError::Status {
                status,
                body_snippet,
            } => LedgerError::Upstream {
                status: Some(status),
                message: body_snippet,
            },
            FetchError::Transport(msg) => LedgerError::Upstream {
                status: None,
                message: msg,
            },
            FetchError::Decode(msg) => LedgerError::Protocol(msg),
            FetchError::InvalidRequest(msg) => LedgerError::Validation(msg),
        }
    }
}

#[async_trait]
pub trait CategoryFetcher: Send + Sync {
    async fn fetch_category_groups(
        &self,
        token: &str,
        budget_id: &str,
        timeout: Duration,
    ) -> Result<Vec<RemoteCategoryGroup>, FetchError>;
}

pub struct YnabClient {
    client: reqwest::Client,
    base_url: String,
}

impl YnabClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: String::from(base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl CategoryFetcher for YnabClient {
    async fn fetch_category_groups(
        &self,
        token: &str,
        budget_id: &str,
        timeout: Duration,
    ) -> Result<Vec<RemoteCategoryGroup>, FetchError> {
        let url = categories_url(&self.base_url, budget_id)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        classify_response(status, &body)
    }
}

/// Builds `{base}/budgets/{budget_id}/categories` with the budget id encoded as one path segment.
pub fn categories_url(base_url: &str, budget_id: &str) -> Result<reqwest::Url, FetchError> {
    // Dot segments would be collapsed by URL normalization and address another resource
    if budget_id.is_empty() || budget_id == "." || budget_id == ".." {
        return Err(FetchError::InvalidRequest(format!(
            "Budget ID '{budget_id}' is not a usable path segment"
        )));
    }

    let mut url = reqwest::Url::parse(base_url)
        .map_err(|e| FetchError::InvalidRequest(format!("Bad YNAB base URL: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| FetchError::InvalidRequest(String::from("YNAB base URL cannot be a base")))?
        .pop_if_empty()
        .extend(["budgets", budget_id, "categories"]);

    Ok(url)
}

/// Turns a YNAB status and body into category groups or the matching failure.
pub fn classify_response(status: u16, body: &str) -> Result<Vec<RemoteCategoryGroup>, FetchError> {
    if status == 401 {
        return Err(FetchError::Unauthorized);
    }

    if !(200..300).contains(&status) {
        return Err(FetchError::Status {
            status,
            body_snippet: body.chars().take(BODY_SNIPPET_CHARS).collect(),
        });
    }

    match serde_json::from_str::<CategoriesBody>(body) {
        Ok(CategoriesBody::Envelope { data }) => Ok(data.category_groups),
        Ok(CategoriesBody::Bare(list)) => Ok(list.category_groups),
        Err(e) => Err(FetchError::Decode(e.to_string())),
    }
}

use std::time::Duration;

use quarry_common::error::{QuarryError, QuarryResult};
use quarry_config::{get_var_or, parse_bool_var_or, parse_var_or};
use reqwest::{Client, StatusCode};

use super::models::SearchPage;
use super::retry::Failure;

const USER_AGENT: &str = concat!("quarry-ingest/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Clone)]
pub struct JiraClientConfig {
    pub base_url: String,
    pub search_path: String,
    pub email: Option<String>,
    pub api_token: Option<String>,
    /// Value of the `fields` query parameter.
    pub fields: String,
    pub timeout_secs: u64,
    pub verify_tls: bool,
}

impl Default for JiraClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://issues.apache.org/jira".to_string(),
            search_path: "/rest/api/latest/search".to_string(),
            email: None,
            api_token: None,
            fields: "*all".to_string(),
            timeout_secs: 15,
            verify_tls: false,
        }
    }
}

impl JiraClientConfig {
    /// Load Jira connection settings from environment.
    ///
    /// Credentials are optional (public instances allow anonymous search),
    /// but setting only one of `JIRA_EMAIL` / `JIRA_API_TOKEN` is an error.
    pub fn from_env() -> QuarryResult<Self> {
        let defaults = Self::default();
        let email = non_blank_var("JIRA_EMAIL");
        let api_token = non_blank_var("JIRA_API_TOKEN");
        if email.is_some() != api_token.is_some() {
            return Err(QuarryError::Config(
                "JIRA_EMAIL and JIRA_API_TOKEN must be set together".to_string(),
            ));
        }

        Ok(Self {
            base_url: get_var_or("JIRA_BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            search_path: get_var_or("JIRA_SEARCH_PATH", &defaults.search_path),
            email,
            api_token,
            fields: get_var_or("JIRA_FIELDS", &defaults.fields),
            timeout_secs: parse_var_or("JIRA_TIMEOUT_SECS", defaults.timeout_secs)?,
            verify_tls: parse_bool_var_or("JIRA_VERIFY_TLS", defaults.verify_tls)?,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url, self.search_path)
    }
}

fn non_blank_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SearchError {
    pub fn failure(&self) -> Failure {
        match self {
            SearchError::Status { status, .. } => Failure::Status(status.as_u16()),
            SearchError::Transport(e) if e.is_timeout() => Failure::Timeout,
            SearchError::Transport(_) => Failure::Transport,
        }
    }
}

#[derive(Clone)]
pub struct JiraClient {
    client: Client,
    config: JiraClientConfig,
}

impl JiraClient {
    pub fn new(config: JiraClientConfig) -> Result<Self, reqwest::Error> {
        if !config.verify_tls {
            tracing::warn!(
                base_url = %config.base_url,
                "TLS certificate verification is disabled"
            );
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        Ok(Self { client, config })
    }

    /// For testing: create a client pointing at a specific base URL (e.g., wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn config(&self) -> &JiraClientConfig {
        &self.config
    }

    /// Fetch one page of `jql` starting at `start_at`. Single attempt: retries
    /// belong to the caller.
    pub async fn search(
        &self,
        jql: &str,
        start_at: u64,
        max_results: u32,
    ) -> Result<SearchPage, SearchError> {
        let mut request = self
            .client
            .get(self.config.search_url())
            .query(&[("jql", jql), ("fields", self.config.fields.as_str())])
            .query(&[
                ("startAt", start_at),
                ("maxResults", u64::from(max_results)),
            ]);
        if let (Some(email), Some(token)) = (&self.config.email, &self.config.api_token) {
            request = request.basic_auth(email, Some(token));
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status,
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        Ok(response.json::<SearchPage>().await?)
    }
}

fn truncate(mut body: String, max_chars: usize) -> String {
    if let Some((idx, _)) = body.char_indices().nth(max_chars) {
        body.truncate(idx);
    }
    body
}

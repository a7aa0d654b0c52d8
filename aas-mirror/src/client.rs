//! HTTP source client: fetches a twin repository's submodels over its REST
//! API and hands the core a deserialized [`Environment`].
//!
//! Authentication is a bearer token read from `AAS_API_TOKEN` (optional for
//! open repositories). Connection-level problems and non-auth HTTP errors map
//! to [`FetchError::Connect`]; 401/403 map to [`FetchError::Unauthorized`].

use aas_mirror_core::contract::{FetchError, SourceClient};
use aas_mirror_core::model::{Environment, Submodel};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{error, info};

pub struct HttpSourceClient {
    http: reqwest::Client,
    api_token: Option<String>,
}

impl HttpSourceClient {
    pub fn new(api_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_token,
        }
    }

    pub fn new_from_env() -> Self {
        let api_token = std::env::var("AAS_API_TOKEN").ok();
        info!(
            token_set = api_token.is_some(),
            "Initialized HttpSourceClient from environment"
        );
        Self::new(api_token)
    }
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn fetch_environment(&self, base_url: &str) -> Result<Environment, FetchError> {
        let url = format!("{}/submodels", base_url.trim_end_matches('/'));
        info!(url = %url, "Fetching twin environment");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to reach twin repository");
            FetchError::Connect(format!("{url}: {e}"))
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!(status = %status, url = %url, "Twin repository rejected credentials");
            return Err(FetchError::Unauthorized(format!("{url} returned {status}")));
        }
        if !status.is_success() {
            error!(status = %status, url = %url, "Twin repository returned error status");
            return Err(FetchError::Connect(format!("{url} returned {status}")));
        }

        let submodels: Vec<Submodel> = response.json().await.map_err(|e| {
            error!(error = ?e, url = %url, "Failed to parse environment payload");
            FetchError::Connect(format!("invalid environment payload from {url}: {e}"))
        })?;

        Ok(Environment { submodels })
    }
}

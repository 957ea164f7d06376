use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::debug;

use crate::api::{Attachment, ConfluenceApi, Page, PageContent, Space};
use crate::config::{Credentials, ResolvedSettings};
use crate::error::ApiError;
use crate::paginate::{JsonSource, fetch_all};

const API_SUFFIX: &str = "/api/v2";

#[derive(Debug, Clone)]
pub struct ConfluenceClientConfig {
    /// Site root, e.g. `https://acme.atlassian.net/wiki`. Attachment downloads resolve here.
    pub site_url: String,
    pub user_agent: String,
    /// `None` disables the request timeout.
    pub timeout_ms: Option<u64>,
}

impl ConfluenceClientConfig {
    pub fn from_settings(settings: &ResolvedSettings) -> Self {
        Self {
            site_url: settings.site_url.clone(),
            user_agent: settings.user_agent.clone(),
            timeout_ms: settings.timeout_ms,
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}{API_SUFFIX}", self.site_url.trim_end_matches('/'))
    }
}

pub struct ConfluenceClient {
    client: Client,
    config: ConfluenceClientConfig,
    credentials: Credentials,
    api_prefix: String,
    request_count: usize,
}

impl ConfluenceClient {
    pub fn new(config: ConfluenceClientConfig, credentials: Credentials) -> Result<Self> {
        let api_url = config.api_url();
        let api_base =
            Url::parse(&api_url).with_context(|| format!("invalid Confluence API URL: {api_url}"))?;
        let api_prefix = api_base.path().trim_end_matches('/').to_string();

        // reqwest's blocking client otherwise applies its own 30s default.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout_ms.map(Duration::from_millis))
            .build()
            .context("failed to build Confluence HTTP client")?;

        Ok(Self {
            client,
            config,
            credentials,
            api_prefix,
            request_count: 0,
        })
    }

    pub fn config(&self) -> &ConfluenceClientConfig {
        &self.config
    }

    fn build_api_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        join_url(&self.config.api_url(), endpoint)
    }

    fn build_download_url(&self, download_link: &str) -> Result<Url, ApiError> {
        join_url(self.config.site_url.trim_end_matches('/'), download_link)
    }

    fn send(&mut self, url: Url, params: &[(&str, String)], accept: &str) -> Result<Response, ApiError> {
        self.request_count += 1;
        debug!(url = %url, request = self.request_count, "GET");

        let mut request = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.user_email, Some(&self.credentials.api_token))
            .header(ACCEPT, accept);
        if !params.is_empty() {
            request = request.query(params);
        }

        let response = request.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .ok()
                .and_then(|text| serde_json::from_str::<Value>(&text).ok());
            return Err(ApiError::Http {
                url: url.to_string(),
                status,
                body,
            });
        }
        Ok(response)
    }
}

impl JsonSource for ConfluenceClient {
    fn get_json(&mut self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = self.build_api_url(endpoint)?;
        let response = self.send(url.clone(), params, "application/json")?;
        response.json::<Value>().map_err(|error| ApiError::Decode {
            url: url.to_string(),
            message: error.to_string(),
        })
    }

    fn api_prefix(&self) -> &str {
        &self.api_prefix
    }
}

impl ConfluenceApi for ConfluenceClient {
    fn list_spaces(&mut self) -> Result<Vec<Space>, ApiError> {
        fetch_all(self, "/spaces", &[])
    }

    fn list_pages(&mut self, space_id: &str) -> Result<Vec<Page>, ApiError> {
        fetch_all(self, &format!("/spaces/{space_id}/pages"), &[])
    }

    fn get_page_body(&mut self, page_id: &str) -> Result<Option<String>, ApiError> {
        let endpoint = format!("/pages/{page_id}");
        let payload = self.get_json(
            &endpoint,
            &[
                ("body-format", "storage".to_string()),
                ("status", "current".to_string()),
            ],
        )?;
        let content: PageContent =
            serde_json::from_value(payload).map_err(|error| ApiError::Decode {
                url: endpoint,
                message: error.to_string(),
            })?;
        Ok(content.into_storage_html())
    }

    fn list_attachments(&mut self, page_id: &str) -> Result<Vec<Attachment>, ApiError> {
        fetch_all(self, &format!("/pages/{page_id}/attachments"), &[])
    }

    fn download_attachment(&mut self, download_link: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.build_download_url(download_link)?;
        let response = self.send(url.clone(), &[], "*/*")?;
        let bytes = response.bytes().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Append a root-relative path (with optional query) to a base URL that may carry its own path.
fn join_url(base: &str, relative: &str) -> Result<Url, ApiError> {
    let joined = if relative.starts_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    };
    Url::parse(&joined).map_err(|error| ApiError::InvalidUrl {
        url: joined.clone(),
        message: error.to_string(),
    })
}

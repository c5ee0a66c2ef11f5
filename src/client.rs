//! HTTP client for the platform API.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::{Config, Credentials};
use crate::error::CliError;

/// An installed addon, as reported by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addon {
    pub name: String,
    pub description: String,
}

/// An app collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub email: String,
}

/// One row of the apps list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    pub name: String,
    pub owner: String,
}

/// Full attribute bag for one app.
///
/// The server may send keys this struct does not model; they are collected
/// in `extra` so raw-mode info can still emit every key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppAttributes {
    pub name: String,
    pub owner: String,
    pub stack: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_tables: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynos: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_finished_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_next_run: Option<String>,

    #[serde(default)]
    pub addons: Vec<Addon>,

    #[serde(default)]
    pub collaborators: Vec<Collaborator>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dyno_hours: Option<BTreeMap<String, f64>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Response from app creation. Creation is asynchronous: `create_status`
/// is `"creating"` until the server finishes provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedApp {
    pub name: String,
    pub stack: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
}

impl CreatedApp {
    /// Whether the server is still provisioning this app.
    pub fn is_creating(&self) -> bool {
        self.create_status.as_deref() == Some("creating")
    }
}

/// Create app request.
#[derive(Debug, Serialize)]
struct CreateAppRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a str>,
}

/// Mutable app attributes for `update`.
#[derive(Debug, Default, Serialize)]
pub struct AppUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

/// The remote client facade the orchestrators call into.
///
/// Commands are written against this trait so they can be exercised with an
/// in-memory fake; `ApiClient` is the HTTP implementation.
#[async_trait]
pub trait Platform {
    async fn list(&self) -> Result<Vec<AppSummary>, CliError>;
    async fn info(&self, name: &str) -> Result<AppAttributes, CliError>;
    async fn create(
        &self,
        name: Option<&str>,
        stack: Option<&str>,
    ) -> Result<CreatedApp, CliError>;
    async fn create_complete(&self, name: &str) -> Result<bool, CliError>;
    async fn update(&self, name: &str, attrs: &AppUpdate<'_>) -> Result<(), CliError>;
    async fn install_addon(&self, name: &str, addon: &str) -> Result<(), CliError>;
    async fn add_config_vars(
        &self,
        name: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<(), CliError>;
    async fn destroy(&self, name: &str) -> Result<(), CliError>;
}

/// API client for communicating with the platform.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client from config and credentials.
    pub fn new(config: &Config, credentials: Option<&Credentials>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(creds) = credentials {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", creds.api_key))
                    .context("Invalid API key format")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url().trim_end_matches('/').to_string(),
        })
    }

    /// Build a URL for an endpoint.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        let response = self.client.get(self.url(path)).send().await?;

        self.handle_response(response).await
    }

    /// Make a POST request.
    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CliError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        self.handle_response(response).await
    }

    /// Make a PUT request, discarding the response body.
    async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), CliError> {
        let response = self.client.put(self.url(path)).json(body).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            self.handle_error(response).await
        }
    }

    /// Make a POST request, discarding the response body.
    async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), CliError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            self.handle_error(response).await
        }
    }

    /// Make a DELETE request.
    async fn delete(&self, path: &str) -> Result<(), CliError> {
        let response = self.client.delete(self.url(path)).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            self.handle_error(response).await
        }
    }

    /// Handle a successful or error response.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CliError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to parse response: {}", e)))
        } else {
            self.handle_error(response).await
        }
    }

    /// Handle an error response.
    async fn handle_error<T>(&self, response: reqwest::Response) -> Result<T, CliError> {
        let status = response.status().as_u16();

        // Try to parse error response
        let error_body: ApiErrorResponse =
            response.json().await.unwrap_or_else(|_| ApiErrorResponse {
                code: "unknown".to_string(),
                message: "Unknown error".to_string(),
                request_id: None,
            });

        if status == 401 {
            return Err(CliError::NotAuthenticated);
        }

        Err(CliError::api(
            status,
            error_body.code,
            error_body.message,
            error_body.request_id,
        ))
    }
}

#[async_trait]
impl Platform for ApiClient {
    async fn list(&self) -> Result<Vec<AppSummary>, CliError> {
        self.get("/apps").await
    }

    async fn info(&self, name: &str) -> Result<AppAttributes, CliError> {
        self.get(&format!("/apps/{}", name)).await.map_err(|e| match e {
            CliError::Api { status: 404, .. } => CliError::NotFound(name.to_string()),
            other => other,
        })
    }

    async fn create(
        &self,
        name: Option<&str>,
        stack: Option<&str>,
    ) -> Result<CreatedApp, CliError> {
        self.post("/apps", &CreateAppRequest { name, stack }).await
    }

    async fn create_complete(&self, name: &str) -> Result<bool, CliError> {
        let response = self
            .client
            .get(self.url(&format!("/apps/{}/status", name)))
            .send()
            .await?;

        // 200 = provisioned, 202 = still creating
        match response.status().as_u16() {
            200 => Ok(true),
            202 => Ok(false),
            _ => self.handle_error(response).await,
        }
    }

    async fn update(&self, name: &str, attrs: &AppUpdate<'_>) -> Result<(), CliError> {
        self.put_unit(&format!("/apps/{}", name), attrs).await
    }

    async fn install_addon(&self, name: &str, addon: &str) -> Result<(), CliError> {
        self.post_unit(&format!("/apps/{}/addons/{}", name, addon), &serde_json::json!({}))
            .await
    }

    async fn add_config_vars(
        &self,
        name: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<(), CliError> {
        self.put_unit(&format!("/apps/{}/config-vars", name), vars)
            .await
    }

    async fn destroy(&self, name: &str) -> Result<(), CliError> {
        self.delete(&format!("/apps/{}", name)).await
    }
}

/// API error response structure.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

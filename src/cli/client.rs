// Copyright 2024-2026 VLM-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP client used by the CLI subcommands.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::api::{AvailableModelsResponse, ErrorBody, StatusResponse, SwapResponse};
use crate::health::HealthReport;
use crate::models::SwapRequest;
use crate::poller::{StatusSource, StatusUnavailable};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum CliError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server returned {status} ({code}): {message}")]
    Server {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Connection(_) => 3,
            CliError::Server { .. } | CliError::InvalidResponse(_) => 1,
        }
    }
}

impl From<reqwest::Error> for CliError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            CliError::Connection(e.to_string())
        } else if e.is_decode() {
            CliError::InvalidResponse(e.to_string())
        } else {
            CliError::Connection(e.to_string())
        }
    }
}

/// Client for a running model service.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, CliError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CliError::Connection(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_status(&self) -> Result<StatusResponse, CliError> {
        self.get_json("/models/status").await
    }

    pub async fn get_available(&self) -> Result<AvailableModelsResponse, CliError> {
        self.get_json("/models/available").await
    }

    /// Full health report. A 503 still carries a report.
    pub async fn get_health(&self) -> Result<HealthReport, CliError> {
        self.get_report("/models/health").await
    }

    /// Readiness report. A 503 still carries a report.
    pub async fn get_ready(&self) -> Result<HealthReport, CliError> {
        self.get_report("/ready").await
    }

    /// True if the liveness endpoint answers 200.
    pub async fn is_alive(&self) -> Result<bool, CliError> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(response.status() == StatusCode::OK)
    }

    pub async fn swap(&self, request: &SwapRequest) -> Result<SwapResponse, CliError> {
        let response = self
            .http
            .post(self.url("/models/swap"))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn get_report(&self, path: &str) -> Result<HealthReport, CliError> {
        let response = self.http.get(self.url(path)).send().await?;
        match response.status() {
            StatusCode::OK | StatusCode::SERVICE_UNAVAILABLE => Ok(response.json().await?),
            _ => Err(Self::server_error(response).await),
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CliError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::server_error(response).await)
        }
    }

    async fn server_error(response: reqwest::Response) -> CliError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => CliError::Server {
                status,
                code: body.error.code,
                message: body.error.message,
            },
            Err(_) => CliError::Server {
                status,
                code: "unknown".to_string(),
                message: text,
            },
        }
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch_status(&self) -> Result<StatusResponse, StatusUnavailable> {
        self.get_status()
            .await
            .map_err(|e| StatusUnavailable(e.to_string()))
    }
}

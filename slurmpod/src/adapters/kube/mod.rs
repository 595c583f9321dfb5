// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Persisted job record kept in a Kubernetes ConfigMap.
//!
//! The pod talks to the API server directly with its service account: the
//! bearer token and CA bundle are mounted under [`SERVICE_ACCOUNT_DIR`] and
//! the API address comes from `KUBERNETES_SERVICE_HOST`/`_PORT`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Certificate, Client, StatusCode, header};
use serde::{Deserialize, Serialize};

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::RecordStorePort;
use crate::app::types::RecordData;

pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const CONFIG_MAP_SUFFIX: &str = "-bridge-cm";
const MERGE_PATCH: &str = "application/merge-patch+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn config_map_name(job_name: &str) -> String {
    format!("{job_name}{CONFIG_MAP_SUFFIX}")
}

fn api_base(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}

#[derive(Debug, Deserialize)]
struct ConfigMapBody {
    #[serde(default)]
    data: Option<RecordData>,
}

#[derive(Debug, Serialize)]
struct DataPatch<'a> {
    data: &'a RecordData,
}

fn store_error(message: impl Into<String>) -> AppError {
    AppError::with_message(AppErrorKind::Store, codes::STORE_ERROR, message)
}

/// ConfigMap-backed [`RecordStorePort`].
#[derive(Debug, Clone)]
pub struct ConfigMapStore {
    client: Client,
    url: String,
    token_path: PathBuf,
}

impl ConfigMapStore {
    /// Build a store for `<job_name>-bridge-cm` in `namespace` from the
    /// pod's in-cluster environment.
    pub fn in_cluster(job_name: &str, namespace: &str) -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .context("KUBERNETES_SERVICE_HOST is not set; not running inside a cluster?")?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
        let sa_dir = Path::new(SERVICE_ACCOUNT_DIR);
        let ca_path = sa_dir.join("ca.crt");
        let ca = std::fs::read(&ca_path)
            .with_context(|| format!("failed to read cluster CA {}", ca_path.display()))?;
        let ca = Certificate::from_pem(&ca).context("cluster CA is not valid PEM")?;
        let client = Client::builder()
            .add_root_certificate(ca)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build API client")?;
        Ok(Self::with_client(
            client,
            &api_base(&host, &port),
            namespace,
            job_name,
            sa_dir.join("token"),
        ))
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        namespace: &str,
        job_name: &str,
        token_path: PathBuf,
    ) -> Self {
        let url = format!(
            "{}/api/v1/namespaces/{}/configmaps/{}",
            base_url.trim_end_matches('/'),
            namespace,
            config_map_name(job_name)
        );
        Self {
            client,
            url,
            token_path,
        }
    }

    // Projected tokens rotate, so read it for every request.
    async fn token(&self) -> AppResult<String> {
        let raw = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|err| {
                store_error(format!(
                    "failed to read service account token {}: {err}",
                    self.token_path.display()
                ))
            })?;
        Ok(raw.trim().to_string())
    }

    async fn check(response: reqwest::Response, op: &str) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let hint = match status {
            StatusCode::NOT_FOUND => " (record does not exist)",
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => " (check the pod's RBAC)",
            _ => "",
        };
        Err(store_error(format!(
            "configmap {op} returned {}{hint}: {}",
            status.as_u16(),
            body.trim()
        )))
    }
}

pub(crate) fn patch_body(fields: &RecordData) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&DataPatch { data: fields })
}

#[async_trait]
impl RecordStorePort for ConfigMapStore {
    #[tracing::instrument(name = "configmap", level = "debug", skip(self), fields(op = "fetch"))]
    async fn fetch(&self) -> AppResult<RecordData> {
        let token = self.token().await?;
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| store_error(format!("configmap fetch failed: {err}")))?;
        let response = Self::check(response, "fetch").await?;
        let body: ConfigMapBody = response
            .json()
            .await
            .map_err(|err| store_error(format!("configmap body is not valid JSON: {err}")))?;
        Ok(body.data.unwrap_or_default())
    }

    #[tracing::instrument(
        name = "configmap",
        level = "debug",
        skip(self, fields),
        fields(op = "merge", keys = fields.len())
    )]
    async fn merge(&self, fields: &RecordData) -> AppResult<()> {
        let body = patch_body(fields)
            .map_err(|err| store_error(format!("failed to encode patch: {err}")))?;
        let token = self.token().await?;
        let response = self
            .client
            .patch(&self.url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, MERGE_PATCH)
            .body(body)
            .send()
            .await
            .map_err(|err| store_error(format!("configmap update failed: {err}")))?;
        Self::check(response, "update").await?;
        Ok(())
    }
}

//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Where the hub lives. `origin` is `http://host:port`.
#[derive(Debug, Clone)]
pub struct Hub {
    pub host: String,
    pub port: u16,
}

impl Hub {
    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn api(&self, path: &str) -> String {
        format!("{}/api{}", self.origin(), path)
    }

    pub fn viewer_url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to tridanced at {} — is it running?", url))?
        .error_for_status()?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
        .post(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to tridanced at {} — is it running?", url))?
        .error_for_status()?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn post_json_body<T, R>(url: &str, body: &T) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let resp = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("failed to connect to tridanced at {} — is it running?", url))?;
    let status = resp.status();
    if !status.is_success() {
        let reason = resp.text().await.unwrap_or_default();
        anyhow::bail!("{} rejected the request ({}): {}", url, status, reason);
    }
    resp.json::<R>().await.context("failed to parse response")
}

pub async fn delete_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
        .delete(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to tridanced at {} — is it running?", url))?
        .error_for_status()?
        .json::<T>()
        .await
        .context("failed to parse response")
}

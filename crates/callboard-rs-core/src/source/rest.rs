//! Supabase-backed record source: PostgREST for reads, Realtime for changes.

use super::{ChangeStream, RecordSource, realtime};
use crate::error::SourceError;
use async_trait::async_trait;
use callboard_rs_config::SourceConfig;
use callboard_rs_protocol::CallRecord;
use log::{debug, info, warn};
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Record source talking to a hosted Supabase project.
#[derive(Clone)]
pub struct SupabaseSource {
    http: reqwest::Client,
    pub(super) base_url: Url,
    pub(super) api_key: String,
    pub(super) schema: String,
    pub(super) table: String,
    order_column: String,
    pub(super) heartbeat: Duration,
    pub(super) subscribe_timeout: Duration,
}

impl fmt::Debug for SupabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseSource")
            .field("base_url", &self.base_url.as_str())
            .field("schema", &self.schema)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SupabaseSource {
    /// Build a source from the `source` config block.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        let raw_url = config
            .url
            .as_deref()
            .ok_or_else(|| SourceError::Config("source.url is not set".to_string()))?;
        let base_url = Url::parse(raw_url)
            .map_err(|err| SourceError::Config(format!("invalid url {raw_url}: {err}")))?;
        let api_key = config
            .resolve_api_key()
            .map_err(|err| SourceError::Config(err.to_string()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        info!(
            "configured supabase source (host={}, table={})",
            base_url.host_str().unwrap_or("?"),
            config.table
        );
        Ok(Self {
            http,
            base_url,
            api_key,
            schema: config.schema.clone(),
            table: config.table.clone(),
            order_column: config.order_column.clone(),
            heartbeat: Duration::from_secs(config.heartbeat_secs),
            subscribe_timeout: Duration::from_secs(config.subscribe_timeout_secs),
        })
    }

    /// PostgREST endpoint for the configured table.
    fn rest_url(&self) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Config(format!("url cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["rest", "v1", self.table.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl RecordSource for SupabaseSource {
    async fn fetch_all(&self) -> Result<Vec<CallRecord>, SourceError> {
        let url = self.rest_url()?;
        let order = format!("{}.desc", self.order_column);
        debug!("fetching records (url={}, order={})", url, order);
        let response = self
            .http
            .get(url)
            .query(&[("select", "*"), ("order", order.as_str())])
            .header("apikey", &self.api_key)
            .header("Accept-Profile", &self.schema)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let rows: Vec<Value> = response.json().await?;
        let records = decode_rows(rows);
        info!(
            "fetched records (table={}, count={})",
            self.table,
            records.len()
        );
        Ok(records)
    }

    async fn subscribe(&self) -> Result<ChangeStream, SourceError> {
        realtime::subscribe(self).await
    }
}

/// Decode backend rows, skipping the malformed ones.
pub fn decode_rows(rows: Vec<Value>) -> Vec<CallRecord> {
    let total = rows.len();
    let records: Vec<CallRecord> = rows
        .iter()
        .filter_map(|row| match CallRecord::from_row(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("skipping malformed row (reason={})", err);
                None
            }
        })
        .collect();
    if records.len() < total {
        warn!(
            "dropped malformed rows (kept={}, total={})",
            records.len(),
            total
        );
    }
    records
}

//! Read-only Pipedrive client.

use crate::config::{HttpConfig, PipedriveCredentials};
use crate::deal::DealContext;
use crate::error::{Result, SyncError};
use crate::http::HttpClient;
use crate::sync::DealSource;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;

const PAGE_LIMIT: u32 = 500;

pub struct PipedriveClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl PipedriveClient {
    pub fn new(creds: &PipedriveCredentials, cfg: &HttpConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new("pipedrive", cfg)?,
            base_url: creds.base_url.trim_end_matches('/').to_string(),
            token: creds.token.clone(),
        })
    }

    /// GET `path` and unwrap the `{success, data}` envelope.
    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{path}", self.base_url);
        let builder = self
            .http
            .request(Method::GET, &url)
            .query(params)
            .query(&[("api_token", self.token.as_str())]);
        let payload = self.http.send_json(builder, path)?;
        if payload.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(SyncError::Api {
                service: "pipedrive",
                status: 200,
                body: payload
                    .get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string()),
            });
        }
        Ok(payload)
    }

    /// Follow `additional_data.pagination` until the collection is
    /// exhausted or `max_items` rows (0 = all) have been read.
    fn get_paged(&self, path: &str, params: &[(&str, String)], max_items: usize) -> Result<Vec<Value>> {
        let mut rows = Vec::new();
        let mut start: u64 = 0;
        loop {
            let mut query = params.to_vec();
            query.push(("start", start.to_string()));
            query.push(("limit", PAGE_LIMIT.to_string()));
            let payload = self.get(path, &query)?;

            if let Some(data) = payload.get("data").and_then(Value::as_array) {
                rows.extend(data.iter().cloned());
            }
            if max_items > 0 && rows.len() >= max_items {
                rows.truncate(max_items);
                break;
            }

            let pagination = &payload["additional_data"]["pagination"];
            if pagination["more_items_in_collection"].as_bool() != Some(true) {
                break;
            }
            match pagination["next_start"].as_u64() {
                Some(next) if next > start => start = next,
                _ => break,
            }
        }
        tracing::debug!(path, rows = rows.len(), "fetched collection");
        Ok(rows)
    }

    pub fn deals(&self, status: &str, max_items: usize) -> Result<Vec<Value>> {
        self.get_paged("/deals", &[("status", status.to_string())], max_items)
    }

    pub fn stage_names(&self) -> Result<HashMap<i64, String>> {
        Ok(id_name_map(&self.get_paged("/stages", &[], 0)?))
    }

    pub fn pipeline_names(&self) -> Result<HashMap<i64, String>> {
        Ok(id_name_map(&self.get_paged("/pipelines", &[], 0)?))
    }

    /// Custom deal field display name → deal object key.
    pub fn deal_field_keys(&self) -> Result<HashMap<String, String>> {
        let rows = self.get_paged("/dealFields", &[], 0)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = row.get("name")?.as_str()?.trim();
                let key = row.get("key")?.as_str()?.trim();
                (!name.is_empty() && !key.is_empty()).then(|| (name.to_string(), key.to_string()))
            })
            .collect())
    }

    /// Contents of the most recent notes attached to `deal_id`.
    pub fn deal_notes(&self, deal_id: i64, limit: u32) -> Result<Vec<String>> {
        let payload = self.get(
            "/notes",
            &[
                ("deal_id", deal_id.to_string()),
                ("start", "0".to_string()),
                ("limit", limit.max(1).to_string()),
            ],
        )?;
        Ok(payload
            .get("data")
            .and_then(Value::as_array)
            .map(|notes| {
                notes
                    .iter()
                    .filter_map(|n| n.get("content").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn id_name_map(rows: &[Value]) -> HashMap<i64, String> {
    rows.iter()
        .filter_map(|row| {
            let id = row.get("id")?.as_i64()?;
            let name = row.get("name").and_then(Value::as_str).unwrap_or("");
            Some((id, name.to_string()))
        })
        .collect()
}

impl DealSource for PipedriveClient {
    fn context(&self) -> Result<DealContext> {
        Ok(DealContext {
            stage_names: self.stage_names()?,
            pipeline_names: self.pipeline_names()?,
            field_keys: self.deal_field_keys()?,
        })
    }

    fn deals(&self, status: &str) -> Result<Vec<Value>> {
        PipedriveClient::deals(self, status, 0)
    }

    fn notes(&self, deal_id: i64, limit: u32) -> Result<Vec<String>> {
        self.deal_notes(deal_id, limit)
    }
}

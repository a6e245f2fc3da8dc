//! Snipe-IT adapter (license inventory).
//!
//! Reads `/licenses` and `/licenses/{id}/seats` from the Snipe-IT REST API,
//! draining offset/limit pagination before returning.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use seatwatch_core::{
    errors::Error,
    inventory::{InventoryPort, LicenseRecord, SeatAssignment},
    Result,
};

#[derive(Clone, Debug)]
pub struct SnipeItClient {
    base_url: String,
    api_token: String,
    http: reqwest::Client,
}

/// One page of a list endpoint.
#[derive(Debug, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

impl Page {
    /// Missing or non-list `rows` is an empty page; Snipe-IT's in-band
    /// `{"status": "error"}` replies are errors.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let Value::Object(mut obj) = payload else {
            return Err(Error::External(
                "snipe-it returned a non-object payload".to_string(),
            ));
        };
        if obj.get("status").and_then(Value::as_str) == Some("error") {
            let messages = obj.get("messages").map(Value::to_string).unwrap_or_default();
            return Err(Error::External(format!("snipe-it error: {messages}")));
        }
        let rows = match obj.remove("rows") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        };
        let total = obj.get("total").and_then(|t| {
            t.as_u64()
                .or_else(|| t.as_str().and_then(|s| s.trim().parse().ok()))
        });
        Ok(Self { rows, total })
    }
}

/// Offset of the next page, or `None` when the listing is drained.
///
/// With a `total`, stop once `offset + page_size` covers it; without one, a
/// short page is the last.
pub fn next_offset(
    offset: usize,
    page_size: usize,
    rows: usize,
    total: Option<u64>,
) -> Option<usize> {
    let next = offset + page_size;
    match total {
        Some(total) if next as u64 >= total => None,
        Some(_) => Some(next),
        None if rows < page_size => None,
        None => Some(next),
    }
}

impl SnipeItClient {
    /// `base_url` is expected to end in `/api/v1` already.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("snipe-it client build error: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            http,
        })
    }

    async fn get(&self, endpoint: &str, limit: usize, offset: usize) -> Result<Value> {
        let url = format!("{}{endpoint}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| Error::External(format!("snipe-it request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "snipe-it {endpoint} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json()
            .await
            .map_err(|e| Error::External(format!("snipe-it json error: {e}")))
    }

    /// Every row of a list endpoint.
    pub async fn get_paginated(&self, endpoint: &str, page_size: usize) -> Result<Vec<Value>> {
        let page_size = page_size.max(1);
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let page = Page::from_payload(self.get(endpoint, page_size, offset).await?)?;
            let rows = page.rows.len();
            debug!("{endpoint}: {rows} rows at offset {offset}");
            out.extend(page.rows);
            match next_offset(offset, page_size, rows, page.total) {
                Some(next) => offset = next,
                None => return Ok(out),
            }
        }
    }
}

#[async_trait]
impl InventoryPort for SnipeItClient {
    async fn list_licenses(&self, page_size: usize) -> Result<Vec<LicenseRecord>> {
        let rows = self.get_paginated("/licenses", page_size).await?;
        Ok(rows.into_iter().map(LicenseRecord::from).collect())
    }

    async fn list_seats(&self, license_id: &str, page_size: usize) -> Result<Vec<SeatAssignment>> {
        let endpoint = format!("/licenses/{}/seats", license_id.trim());
        let rows = self.get_paginated(&endpoint, page_size).await?;
        Ok(rows.into_iter().map(SeatAssignment::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn total_terminates() {
        assert_eq!(next_offset(0, 100, 100, Some(250)), Some(100));
        assert_eq!(next_offset(100, 100, 100, Some(250)), Some(200));
        assert_eq!(next_offset(200, 100, 50, Some(250)), None);
        assert_eq!(next_offset(0, 100, 100, Some(100)), None);
        assert_eq!(next_offset(0, 100, 0, Some(0)), None);
    }

    #[test]
    fn short_page_terminates_without_total() {
        assert_eq!(next_offset(0, 50, 50, None), Some(50));
        assert_eq!(next_offset(50, 50, 49, None), None);
        assert_eq!(next_offset(0, 50, 0, None), None);
    }

    #[test]
    fn page_parsing() {
        let page = Page::from_payload(json!({"total": 2, "rows": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.total, Some(2));

        let page = Page::from_payload(json!({"total": "7", "rows": null})).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, Some(7));

        let page = Page::from_payload(json!({"rows": "nope"})).unwrap();
        assert_eq!(page, Page::default());
    }

    #[test]
    fn in_band_errors() {
        let err = Page::from_payload(json!({"status": "error", "messages": "Unauthorized."}))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Unauthorized"), "{err}");
        assert!(Page::from_payload(json!([1, 2])).is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = SnipeItClient::new("https://h/api/v1/", "t", Duration::from_secs(5)).unwrap();
        assert_eq!(c.base_url, "https://h/api/v1");
    }
}

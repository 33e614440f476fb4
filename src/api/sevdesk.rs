//! Implements the `Remote` trait over the sevDesk REST API using `reqwest`.

use crate::api::payload::{BookingPayload, VoucherPayload};
use crate::api::wire::{
    self, Objects, WireAccountingType, WireContact, WireCostCentre, WireTransaction, WireVoucher,
};
use crate::api::Remote;
use crate::error::Res;
use crate::model::{AccountingType, Contact, CostCentre, Transaction};
use crate::numbering::RecentVoucher;
use crate::Config;
use anyhow::{bail, Context};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

/// Page size for list endpoints.
const PAGE_SIZE: usize = 1000;

/// How many of the most recent vouchers are scanned for reference numbers.
const RECENT_VOUCHERS: usize = 100;

/// A client for the sevDesk API. Requests are spaced at least `interval` apart.
pub(super) struct SevDesk {
    client: reqwest::Client,
    base: Url,
    api_key: String,
    interval: Duration,
    last_request: Option<Instant>,
}

impl SevDesk {
    pub(super) async fn new(config: &Config) -> Res<Self> {
        let api_key = config.api_key().await?;
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Unable to create the HTTP client")?;
        debug!("Using sevDesk API at {}", config.api_url());
        Ok(Self {
            client,
            base: config.api_url().clone(),
            api_key,
            interval: config.request_interval(),
            last_request: None,
        })
    }

    /// Builds the URL for `path` below the API base, e.g. `Voucher/Factory/saveVoucher`.
    fn url(&self, path: &str, query: &[(&str, String)]) -> Res<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
        .with_context(|| format!("Invalid API path '{path}'"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Waits until at least `interval` has passed since the previous request.
    async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn send(&mut self, method: Method, url: Url, body: Option<Value>) -> Res<Value> {
        self.throttle().await;
        trace!("{method} {url}");
        let mut request: RequestBuilder = self
            .client
            .request(method.clone(), url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Request {method} {url} failed"))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Unable to read the response of {method} {url}"))?;
        trace!("{method} {url} returned {status}");
        if !status.is_success() {
            bail!("{method} {url} returned {status}: {text}");
        }
        serde_json::from_str(&text)
            .with_context(|| format!("The response of {method} {url} is not valid JSON"))
    }

    /// Fetches one page of a list endpoint.
    async fn get_page(&mut self, path: &str, query: &[(&str, String)]) -> Res<Vec<Value>> {
        let url = self.url(path, query)?;
        let value = self.send(Method::GET, url, None).await?;
        let objects: Objects<Vec<Value>> = serde_json::from_value(value)
            .with_context(|| format!("Unexpected response shape from {path}"))?;
        Ok(objects.objects)
    }

    /// Fetches every object of a list endpoint, page by page, until a page comes back short.
    async fn get_objects(&mut self, path: &str, extra: &[(&str, String)]) -> Res<Vec<Value>> {
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let mut query = vec![
                ("limit", PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ];
            query.extend(extra.iter().cloned());
            let page = self.get_page(path, &query).await?;
            let len = page.len();
            all.extend(page);
            if len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        debug!("Fetched {} objects from {path}", all.len());
        Ok(all)
    }
}

fn body(payload: &impl Serialize) -> Res<Value> {
    serde_json::to_value(payload).context("Unable to serialize the request body")
}

#[async_trait::async_trait]
impl Remote for SevDesk {
    async fn transactions(&mut self) -> Res<Vec<Transaction>> {
        let values = self.get_objects("CheckAccountTransaction", &[]).await?;
        Ok(wire::convert_all::<WireTransaction>("transaction", values))
    }

    async fn contacts(&mut self) -> Res<Vec<Contact>> {
        // depth=1 includes persons as well as organisations.
        let values = self
            .get_objects("Contact", &[("depth", "1".to_string())])
            .await?;
        Ok(wire::convert_all::<WireContact>("contact", values))
    }

    async fn cost_centres(&mut self) -> Res<Vec<CostCentre>> {
        let values = self.get_objects("CostCentre", &[]).await?;
        Ok(wire::convert_all::<WireCostCentre>("cost centre", values))
    }

    async fn accounting_types(&mut self) -> Res<Vec<AccountingType>> {
        let values = self.get_objects("AccountingType", &[]).await?;
        Ok(wire::convert_all::<WireAccountingType>("accounting type", values))
    }

    async fn recent_voucher_numbers(&mut self) -> Res<Vec<RecentVoucher>> {
        let query = [
            ("limit", RECENT_VOUCHERS.to_string()),
            ("orderBy[0][field]", "voucherDate".to_string()),
            ("orderBy[0][arrangement]", "desc".to_string()),
        ];
        let values = self.get_page("Voucher", &query).await?;
        Ok(wire::convert_all::<WireVoucher>("voucher", values))
    }

    async fn create_voucher(&mut self, payload: &VoucherPayload) -> Res<String> {
        let url = self.url("Voucher/Factory/saveVoucher", &[])?;
        let response = self.send(Method::POST, url, Some(body(payload)?)).await?;
        wire::created_voucher_id(&response)
    }

    async fn book_amount(&mut self, voucher_id: &str, payload: &BookingPayload) -> Res<()> {
        let url = self.url(&format!("Voucher/{voucher_id}/bookAmount"), &[])?;
        let _ = self.send(Method::PUT, url, Some(body(payload)?)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client(base: &str) -> SevDesk {
        SevDesk {
            client: reqwest::Client::new(),
            base: Url::parse(base).unwrap(),
            api_key: "secret".to_string(),
            interval: Duration::from_millis(20),
            last_request: None,
        }
    }

    #[test]
    fn test_url_keeps_the_base_path() {
        let client = make_client("https://my.sevdesk.de/api/v1");
        let url = client.url("Voucher/42/bookAmount", &[]).unwrap();
        assert_eq!(url.as_str(), "https://my.sevdesk.de/api/v1/Voucher/42/bookAmount");

        let client = make_client("https://my.sevdesk.de/api/v1/");
        let url = client
            .url(
                "/CheckAccountTransaction",
                &[("limit", "1000".to_string()), ("offset", "0".to_string())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://my.sevdesk.de/api/v1/CheckAccountTransaction?limit=1000&offset=0"
        );
    }

    #[tokio::test]
    async fn test_throttle_spaces_requests() {
        let mut client = make_client("https://my.sevdesk.de/api/v1");
        let start = Instant::now();
        client.throttle().await;
        client.throttle().await;
        client.throttle().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}

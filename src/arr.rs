//! Arr history client
//!
//! Probes a Sonarr/Radarr/Whisparr instance's v3 history endpoint to answer
//! one question: has this service imported the file at a given local path?
//! A record counts when its event type is `downloadFolderImported` and its
//! `droppedPath` equals the path exactly.
//!
//! Each client carries a circuit breaker so a down service stops being
//! queried (and stops producing warning noise) until a cooldown elapses.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::ArrServiceConfig;
use crate::error::ArrError;
use crate::retry::CircuitBreaker;

/// History records fetched per page
const HISTORY_PAGE_SIZE: u32 = 1000;

/// Event type recorded by Arr services when a download folder is imported
const IMPORTED_EVENT: &str = "downloadFolderImported";

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(rename = "totalRecords", default)]
    total_records: u64,
    #[serde(default)]
    records: Vec<HistoryRecord>,
}

#[derive(Debug, Deserialize)]
struct HistoryRecord {
    #[serde(rename = "eventType", default)]
    event_type: String,
    #[serde(default)]
    data: HistoryData,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryData {
    #[serde(rename = "droppedPath", default)]
    dropped_path: Option<String>,
}

/// HTTP client for one configured Arr service
pub struct ArrClient {
    name: String,
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: CircuitBreaker,
}

impl ArrClient {
    /// Build a client for one configured service.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be constructed.
    pub fn new(name: String, config: &ArrServiceConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            name,
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            breaker: CircuitBreaker::default(),
        })
    }

    /// The service's display name, for log attribution.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this service's history records an import of `path`.
    ///
    /// Pages through the history (page size 1000) until every record has been
    /// inspected or a match is found.
    ///
    /// # Errors
    ///
    /// [`ArrError::CircuitOpen`] when the breaker is open (no request made);
    /// otherwise HTTP and status errors from the history endpoint.
    pub async fn is_imported(&self, path: &Path) -> Result<bool, ArrError> {
        if self.breaker.is_open() {
            return Err(ArrError::CircuitOpen {
                service: self.name.clone(),
            });
        }

        let result = self.walk_history(path).await;
        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }

    async fn walk_history(&self, path: &Path) -> Result<bool, ArrError> {
        let want = path.to_string_lossy();
        let mut page: u32 = 1;
        let mut inspected: u64 = 0;

        loop {
            let body = self.fetch_page(page).await?;
            if body.records.is_empty() {
                return Ok(false);
            }
            inspected += body.records.len() as u64;

            let found = body.records.iter().any(|record| {
                record.event_type == IMPORTED_EVENT
                    && record.data.dropped_path.as_deref() == Some(want.as_ref())
            });
            if found {
                return Ok(true);
            }
            if inspected >= body.total_records {
                return Ok(false);
            }
            page += 1;
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<HistoryPage, ArrError> {
        let url = format!(
            "{}/api/v3/history?includeSeries=false&includeEpisode=false&page={}&pageSize={}",
            self.base_url, page, HISTORY_PAGE_SIZE
        );
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|source| ArrError::Http {
                service: self.name.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArrError::Status {
                service: self.name.clone(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|source| ArrError::Http {
            service: self.name.clone(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wiremock::matchers::{header, method, path as url_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ArrClient {
        ArrClient::new(
            "radarr".to_string(),
            &ArrServiceConfig {
                name: None,
                url: server.uri(),
                api_key: "secret".to_string(),
            },
        )
        .unwrap()
    }

    fn history_body(total: u64, records: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "totalRecords": total, "records": records })
    }

    #[tokio::test]
    async fn finds_import_on_first_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/api/v3/history"))
            .and(header("X-Api-Key", "secret"))
            .and(query_param("pageSize", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(history_body(
                2,
                serde_json::json!([
                    { "eventType": "grabbed", "data": {} },
                    { "eventType": "downloadFolderImported",
                      "data": { "droppedPath": "/dl/ep.mkv" } }
                ]),
            )))
            .mount(&server)
            .await;

        let imported = client_for(&server)
            .is_imported(&PathBuf::from("/dl/ep.mkv"))
            .await
            .unwrap();
        assert!(imported);
    }

    #[tokio::test]
    async fn paginates_until_total_records_reached() {
        let server = MockServer::start().await;
        let page1_records: Vec<serde_json::Value> = (0..1000)
            .map(|i| serde_json::json!({ "eventType": "grabbed", "data": { "droppedPath": format!("/dl/other-{i}.mkv") } }))
            .collect();

        Mock::given(method("GET"))
            .and(url_path("/api/v3/history"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(history_body(1001, serde_json::json!(page1_records))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/api/v3/history"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(history_body(
                1001,
                serde_json::json!([
                    { "eventType": "downloadFolderImported",
                      "data": { "droppedPath": "/dl/ep.mkv" } }
                ]),
            )))
            .mount(&server)
            .await;

        let imported = client_for(&server)
            .is_imported(&PathBuf::from("/dl/ep.mkv"))
            .await
            .unwrap();
        assert!(imported);
    }

    #[tokio::test]
    async fn absent_path_reports_not_imported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/api/v3/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(history_body(
                1,
                serde_json::json!([
                    { "eventType": "downloadFolderImported",
                      "data": { "droppedPath": "/dl/unrelated.mkv" } }
                ]),
            )))
            .mount(&server)
            .await;

        let imported = client_for(&server)
            .is_imported(&PathBuf::from("/dl/ep.mkv"))
            .await
            .unwrap();
        assert!(!imported);
    }

    #[tokio::test]
    async fn error_status_is_reported_with_service_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/api/v3/history"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .is_imported(&PathBuf::from("/dl/ep.mkv"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("radarr"));
        assert!(!err.is_circuit_open());
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/api/v3/history"))
            .respond_with(ResponseTemplate::new(500))
            .expect(5)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..5 {
            let err = client.is_imported(&PathBuf::from("/dl/ep.mkv")).await.unwrap_err();
            assert!(!err.is_circuit_open());
        }

        // Sixth call is rejected locally; the mock's expect(5) verifies no
        // further request reached the server.
        let err = client.is_imported(&PathBuf::from("/dl/ep.mkv")).await.unwrap_err();
        assert!(err.is_circuit_open());
    }
}

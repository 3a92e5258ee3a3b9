use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::error::{Error, FetchError, Result};
use crate::models::LeadRecord;
use crate::normalize::normalize_all;
use crate::table::SortDirection;

const SHEET_DATA_PATH: &str = "/api/sheet-data";
const SAVE_DATA_PATH: &str = "/api/save-data";
const USER_AGENT: &str = concat!("lead-insights/", env!("CARGO_PKG_VERSION"));

/// Optional paging and ordering understood by the sheet endpoint.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortDirection>,
}

impl FetchOptions {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sort_by", sort_by.clone()));
        }
        if let Some(order) = self.sort_order {
            let order = match order {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            params.push(("sort_order", order.to_string()));
        }
        params
    }
}

/// HTTP client for the lead sheet backend.
#[derive(Debug, Clone)]
pub struct SheetClient {
    http: reqwest::Client,
    base_url: String,
}

impl SheetClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Rows exactly as the sheet sent them. Normalizing is the caller's job
    /// so the same rows can be saved back untouched.
    pub async fn fetch_rows(
        &self,
        options: &FetchOptions,
    ) -> std::result::Result<Vec<Value>, FetchError> {
        let url = format!("{}{}", self.base_url, SHEET_DATA_PATH);
        tracing::debug!(url = %url, "fetching live lead data");

        let response = self
            .http
            .get(&url)
            .query(&options.query())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        let Value::Array(rows) = payload else {
            return Err(FetchError::Malformed(
                "expected a JSON array of records".to_string(),
            ));
        };

        tracing::info!(rows = rows.len(), "live lead data fetched");
        Ok(rows)
    }

    /// Ask the backend to keep `rows` as the new local snapshot.
    pub async fn persist_snapshot(&self, rows: &[Value]) -> std::result::Result<(), FetchError> {
        let url = format!("{}{}", self.base_url, SAVE_DATA_PATH);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "data": rows }))
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Read the local snapshot file. A missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<Vec<LeadRecord>> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "snapshot file not found, starting empty");
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)?;
    let rows: Vec<Value> = serde_json::from_str(&content)
        .map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))?;
    let records = normalize_all(rows);
    tracing::info!(path = %path.display(), records = records.len(), "snapshot loaded");
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Snapshot,
    Live,
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// Live data already loaded this session was shown again.
    Cached,
    /// Fresh live data is active; `persist` is the detached write-back.
    Fetched {
        records: usize,
        persist: JoinHandle<()>,
    },
    /// The fetch failed; see [`DataSource::mode`] for what is shown now.
    Failed(FetchError),
}

/// Chooses between the local snapshot and live sheet data.
///
/// Starts on the snapshot. Only an explicit load moves it to live data, and
/// nothing moves it back once live data has been shown.
#[derive(Debug)]
pub struct DataSource {
    snapshot: Arc<Vec<LeadRecord>>,
    live: Option<Arc<Vec<LeadRecord>>>,
    active: Arc<Vec<LeadRecord>>,
    mode: SourceMode,
    last_error: Option<String>,
    options: FetchOptions,
}

impl DataSource {
    pub fn new(snapshot: Vec<LeadRecord>) -> Self {
        let snapshot = Arc::new(snapshot);
        Self {
            active: Arc::clone(&snapshot),
            snapshot,
            live: None,
            mode: SourceMode::Snapshot,
            last_error: None,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn active(&self) -> Arc<Vec<LeadRecord>> {
        Arc::clone(&self.active)
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Show live data, reusing this session's live set if there is one.
    pub async fn load_live(&mut self, client: &SheetClient) -> LoadOutcome {
        if let Some(live) = &self.live {
            self.active = Arc::clone(live);
            self.mode = SourceMode::Live;
            return LoadOutcome::Cached;
        }
        self.refresh_live(client).await
    }

    /// Fetch live data now. On success the active set is swapped before the
    /// snapshot write-back is spawned; the write-back is never awaited here.
    pub async fn refresh_live(&mut self, client: &SheetClient) -> LoadOutcome {
        match client.fetch_rows(&self.options).await {
            Ok(rows) => {
                let records = Arc::new(normalize_all(rows.clone()));
                self.live = Some(Arc::clone(&records));
                self.active = Arc::clone(&records);
                self.mode = SourceMode::Live;
                self.last_error = None;

                LoadOutcome::Fetched {
                    records: records.len(),
                    persist: spawn_persist(client.clone(), rows),
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch live lead data");
                self.last_error = Some(err.to_string());
                if self.live.is_none() {
                    self.active = Arc::clone(&self.snapshot);
                    self.mode = SourceMode::Snapshot;
                }
                LoadOutcome::Failed(err)
            }
        }
    }
}

fn spawn_persist(client: SheetClient, rows: Vec<Value>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match client.persist_snapshot(&rows).await {
            Ok(()) => tracing::info!(rows = rows.len(), "live data saved as snapshot"),
            Err(err) => tracing::warn!(error = %err, "failed to save live data as snapshot"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use std::io::Write;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot() -> Vec<LeadRecord> {
        vec![normalize(json!({ "name": "Snapshot Lead", "utmSource": "google" }))]
    }

    fn live_rows() -> Value {
        json!([
            { "name": "Live One", "utmSource": "naver", "submitAt": "2025-05-18 12:00:00" },
            { "name": "Live Two", "phoneNo": " 01098765432 ", "utmTerm": "" },
        ])
    }

    fn client_for(uri: &str) -> SheetClient {
        SheetClient::new(uri, Duration::from_secs(5)).unwrap()
    }

    async fn mount_save(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path(SAVE_DATA_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn starts_on_snapshot() {
        let source = DataSource::new(snapshot());
        assert_eq!(source.mode(), SourceMode::Snapshot);
        assert_eq!(*source.active(), snapshot());
        assert!(source.last_error().is_none());
    }

    #[tokio::test]
    async fn successful_fetch_goes_live_and_persists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(live_rows()))
            .expect(1)
            .mount(&server)
            .await;
        mount_save(&server, 200).await;

        let client = client_for(&server.uri());
        let mut source = DataSource::new(snapshot());
        let outcome = source.load_live(&client).await;

        assert_eq!(source.mode(), SourceMode::Live);
        assert_eq!(source.active().len(), 2);
        assert_eq!(source.active()[1].phone.as_deref(), Some("01098765432"));

        let LoadOutcome::Fetched { records, persist } = outcome else {
            panic!("expected a fetch");
        };
        assert_eq!(records, 2);
        persist.await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let save = requests
            .iter()
            .find(|r| r.url.path() == SAVE_DATA_PATH)
            .expect("snapshot write-back was sent");
        let body: Value = save.body_json().unwrap();
        assert_eq!(body["data"][0]["name"], "Live One");
        assert_eq!(body["data"], live_rows());
        assert_eq!(body["data"][1]["phoneNo"], " 01098765432 ");
        assert_eq!(body["data"][1]["utmTerm"], "");
    }

    #[tokio::test]
    async fn network_failure_on_first_load_falls_back_to_snapshot() {
        let uri = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let client = client_for(&uri);
        let mut source = DataSource::new(snapshot());

        let outcome = source.load_live(&client).await;

        assert!(matches!(outcome, LoadOutcome::Failed(FetchError::Network(_))));
        assert_eq!(source.mode(), SourceMode::Snapshot);
        assert_eq!(*source.active(), snapshot());
        assert!(source.last_error().is_some());
    }

    #[tokio::test]
    async fn failure_after_live_keeps_last_live_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(live_rows()))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_save(&server, 200).await;

        let client = client_for(&server.uri());
        let mut source = DataSource::new(snapshot());
        source.load_live(&client).await;
        let outcome = source.refresh_live(&client).await;

        assert!(matches!(outcome, LoadOutcome::Failed(FetchError::Status(500))));
        assert_eq!(source.mode(), SourceMode::Live);
        assert_eq!(source.active()[0].name.as_deref(), Some("Live One"));
        assert!(source.last_error().unwrap().contains("500"));

        source.dismiss_error();
        assert!(source.last_error().is_none());
    }

    #[tokio::test]
    async fn malformed_payload_counts_as_failed_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
            .mount(&server)
            .await;

        let mut source = DataSource::new(snapshot());
        let outcome = source.load_live(&client_for(&server.uri())).await;

        assert!(matches!(outcome, LoadOutcome::Failed(FetchError::Malformed(_))));
        assert_eq!(source.mode(), SourceMode::Snapshot);
    }

    #[tokio::test]
    async fn persist_failure_does_not_undo_live_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(live_rows()))
            .mount(&server)
            .await;
        mount_save(&server, 503).await;

        let mut source = DataSource::new(snapshot());
        let outcome = source.load_live(&client_for(&server.uri())).await;
        if let LoadOutcome::Fetched { persist, .. } = outcome {
            persist.await.unwrap();
        }

        assert_eq!(source.mode(), SourceMode::Live);
        assert_eq!(source.active().len(), 2);
        assert!(source.last_error().is_none());
    }

    #[tokio::test]
    async fn second_load_reuses_session_data_but_refresh_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(live_rows()))
            .expect(2)
            .mount(&server)
            .await;
        mount_save(&server, 200).await;

        let client = client_for(&server.uri());
        let mut source = DataSource::new(snapshot());
        source.load_live(&client).await;
        assert!(matches!(source.load_live(&client).await, LoadOutcome::Cached));
        assert!(matches!(
            source.refresh_live(&client).await,
            LoadOutcome::Fetched { .. }
        ));
    }

    #[tokio::test]
    async fn fetch_options_become_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SHEET_DATA_PATH))
            .and(query_param("limit", "50"))
            .and(query_param("sort_order", "asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        mount_save(&server, 200).await;

        let mut source = DataSource::new(Vec::new()).with_options(FetchOptions {
            limit: Some(50),
            sort_order: Some(SortDirection::Asc),
            ..FetchOptions::default()
        });
        let outcome = source.refresh_live(&client_for(&server.uri())).await;
        assert!(matches!(outcome, LoadOutcome::Fetched { records: 0, .. }));
    }

    #[test]
    fn snapshot_file_is_normalized() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Avery", "pageVariant": "B", "submitAt": "2025-05-17 15:30:00"}}]"#
        )
        .unwrap();

        let records = load_snapshot(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].submitted_at.is_some());
    }

    #[test]
    fn missing_snapshot_is_empty_and_bad_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("absent.json")).unwrap().is_empty());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load_snapshot(&bad), Err(Error::Snapshot(_))));
    }
}

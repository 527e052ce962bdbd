//! Upstream source contracts + the HoYoLAB wiki adapter.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hsr_core::RawRecord;
use hsr_storage::{decode_json, FetchError, HttpClientConfig, HttpFetcher};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use uuid::Uuid;

mod record;

pub use record::{
    build_row, first_value, get_first_value, FieldShapeError, MissingNameError, DISPLAY_FIELD_KEY,
    ELEMENT_KEY, FILTER_VALUES_KEY, LEVEL_80_KEY, PATH_KEY, RARITY_KEY,
};

pub const CRATE_NAME: &str = "hsr-adapters";

pub const HOYOLAB_ENTRY_LIST_URL: &str =
    "https://sg-wiki-api.hoyolab.com/hoyowiki/hsr/wapi/get_entry_page_list";
pub const HOYOLAB_CHARACTER_MENU_ID: &str = "104";
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// A paginated source of raw character entries.
///
/// `fetch_page` issues exactly one request. An exhausted source and a non-success upstream
/// response both come back as an empty page; transport and decode failures are errors.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    async fn fetch_page(&self, page_number: u32) -> Result<Vec<RawRecord>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct WikiSourceConfig {
    pub endpoint: String,
    pub menu_id: String,
    pub page_size: u32,
    pub language: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for WikiSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: HOYOLAB_ENTRY_LIST_URL.to_string(),
            menu_id: HOYOLAB_CHARACTER_MENU_ID.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            language: "en-us".to_string(),
            user_agent: "hsr-roster/0.1".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Fixed header set the wiki API expects; `User-Agent` is set on the client itself.
pub fn wiki_headers(language: &str) -> Vec<(String, String)> {
    [
        ("Accept", "application/json, text/plain, */*"),
        ("Origin", "https://wiki.hoyolab.com"),
        ("Referer", "https://wiki.hoyolab.com/"),
        ("X-Rpc-Language", language),
        ("X-Rpc-Wiki_app", "hsr"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn page_payload(menu_id: &str, page_number: u32, page_size: u32) -> JsonValue {
    json!({
        "filters": [],
        "menu_id": menu_id,
        "page_num": page_number,
        "page_size": page_size,
        "use_es": true,
    })
}

/// Entries under `data.list`; anything else (absent, null, wrong type) is an empty page.
pub fn page_records(mut body: JsonValue) -> Vec<RawRecord> {
    match body.pointer_mut("/data/list").map(JsonValue::take) {
        Some(JsonValue::Array(list)) => list,
        Some(JsonValue::Null) | None => Vec::new(),
        Some(other) => {
            warn!(kind = json_kind(&other), "data.list is not an array; treating page as empty");
            Vec::new()
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[derive(Debug)]
pub struct HoyolabWikiSource {
    http: HttpFetcher,
    config: WikiSourceConfig,
    run_id: Uuid,
}

impl HoyolabWikiSource {
    pub fn new(config: WikiSourceConfig, run_id: Uuid) -> Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: config.timeout,
            user_agent: Some(config.user_agent.clone()),
            default_headers: wiki_headers(&config.language),
        })
        .context("building wiki http client")?;
        Ok(Self {
            http,
            config,
            run_id,
        })
    }

    pub fn config(&self) -> &WikiSourceConfig {
        &self.config
    }
}

#[async_trait]
impl PageSource for HoyolabWikiSource {
    fn source_id(&self) -> &'static str {
        "hoyolab-wiki"
    }

    async fn fetch_page(&self, page_number: u32) -> Result<Vec<RawRecord>, FetchError> {
        let payload = page_payload(&self.config.menu_id, page_number, self.config.page_size);
        let response = self
            .http
            .post_json(self.run_id, &self.config.endpoint, &payload)
            .await?;

        if !response.is_success() {
            // Indistinguishable from end-of-data without more upstream metadata.
            warn!(
                page = page_number,
                status = response.status.as_u16(),
                url = %response.final_url,
                "non-success response; treating page as empty"
            );
            return Ok(Vec::new());
        }

        let records = page_records(decode_json(&response)?);
        debug!(page = page_number, records = records.len(), "page fetched");
        Ok(records)
    }
}

/// Serves captured API responses from `page_<n>.json` files; a missing file is an empty page.
#[derive(Debug, Clone)]
pub struct FixturePageSource {
    dir: PathBuf,
}

impl FixturePageSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn page_path(&self, page_number: u32) -> PathBuf {
        self.dir.join(format!("page_{page_number}.json"))
    }
}

#[async_trait]
impl PageSource for FixturePageSource {
    fn source_id(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_page(&self, page_number: u32) -> Result<Vec<RawRecord>, FetchError> {
        let path = self.page_path(page_number);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let body = load_page_fixture(&path).map_err(|err| FetchError::Decode {
            url: path.display().to_string(),
            source: err,
        })?;
        Ok(page_records(body))
    }
}

/// Read one captured page. Unreadable files surface as a JSON I/O error.
pub fn load_page_fixture(path: impl AsRef<Path>) -> Result<JsonValue, serde_json::Error> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(serde_json::Error::io)?;
    serde_json::from_str(&text)
}

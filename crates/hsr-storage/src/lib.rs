//! HTTP fetch utilities + SQLite roster persistence for the HSR pipeline.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use hsr_core::{CharacterRow, TaggedRoster, TaggedRow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "hsr-storage";

/// Table the roster is replaced into on every run.
pub const ROSTER_TABLE: &str = "HsrCharacters";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub default_headers: Vec<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            default_headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request(err)
        }
    }
}

/// Single-connection, sequential HTTP client. No retries: every failure is returned as-is.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .default_headers(headers);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    /// POST a JSON body and return the response whatever its status; callers decide what a
    /// non-success status means.
    pub async fn post_json(
        &self,
        run_id: Uuid,
        url: &str,
        body: &JsonValue,
    ) -> Result<FetchedResponse, FetchError> {
        self.post_json_inner(url, body)
            .instrument(info_span!("http_post", %run_id, url))
            .await
    }

    async fn post_json_inner(
        &self,
        url: &str,
        body: &JsonValue,
    ) -> Result<FetchedResponse, FetchError> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;

        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(e, &final_url))?
            .to_vec();
        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        Ok(FetchedResponse {
            status,
            final_url,
            body,
        })
    }
}

/// Parse a response body as JSON, tagging decode failures with the URL.
pub fn decode_json(response: &FetchedResponse) -> Result<JsonValue, FetchError> {
    serde_json::from_slice(&response.body).map_err(|source| FetchError::Decode {
        url: response.final_url.clone(),
        source,
    })
}

/// Relational sink for the tagged roster. Every load replaces the table wholesale.
#[derive(Debug, Clone)]
pub struct RosterStore {
    pool: SqlitePool,
}

impl RosterStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("parsing database url {database_url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("connecting to {database_url}"))?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Drop, recreate and bulk-insert the roster table in one transaction.
    pub async fn replace_roster(&self, roster: &TaggedRoster) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await.context("starting roster transaction")?;

        sqlx::query(&format!("DROP TABLE IF EXISTS \"{ROSTER_TABLE}\""))
            .execute(&mut *tx)
            .await
            .context("dropping roster table")?;
        sqlx::query(&format!(
            "CREATE TABLE \"{ROSTER_TABLE}\" (
                \"Character\" TEXT NOT NULL,
                \"Path\" TEXT NOT NULL,
                \"Element\" TEXT NOT NULL,
                \"Rarity\" TEXT NOT NULL,
                \"ATK Lvl 80\" INTEGER NOT NULL,
                \"DEF Lvl 80\" INTEGER NOT NULL,
                \"HP Lvl 80\" INTEGER NOT NULL,
                \"SPD Lvl 80\" INTEGER NOT NULL,
                \"Version\" REAL NOT NULL
            )"
        ))
        .execute(&mut *tx)
        .await
        .context("creating roster table")?;

        let insert = format!(
            "INSERT INTO \"{ROSTER_TABLE}\" (
                \"Character\", \"Path\", \"Element\", \"Rarity\",
                \"ATK Lvl 80\", \"DEF Lvl 80\", \"HP Lvl 80\", \"SPD Lvl 80\", \"Version\"
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let mut inserted = 0u64;
        for tagged in roster.iter() {
            let row = &tagged.row;
            let result = sqlx::query(&insert)
                .bind(&row.name)
                .bind(&row.path)
                .bind(&row.element)
                .bind(&row.rarity)
                .bind(row.atk80)
                .bind(row.def80)
                .bind(row.hp80)
                .bind(row.spd80)
                .bind(tagged.version)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("inserting character {}", row.name))?;
            inserted += result.rows_affected();
        }

        tx.commit().await.context("committing roster transaction")?;
        info!(table = ROSTER_TABLE, rows = inserted, "roster table replaced");
        Ok(inserted)
    }

    /// Read the roster table back in insertion order.
    pub async fn load_roster(&self) -> anyhow::Result<TaggedRoster> {
        let rows = sqlx::query(&format!(
            "SELECT \"Character\", \"Path\", \"Element\", \"Rarity\",
                    \"ATK Lvl 80\", \"DEF Lvl 80\", \"HP Lvl 80\", \"SPD Lvl 80\", \"Version\"
             FROM \"{ROSTER_TABLE}\" ORDER BY rowid"
        ))
        .fetch_all(&self.pool)
        .await
        .context("selecting roster rows")?;

        rows.into_iter()
            .map(|r| -> Result<TaggedRow, sqlx::Error> {
                let row = CharacterRow {
                    name: r.try_get("Character")?,
                    path: r.try_get("Path")?,
                    element: r.try_get("Element")?,
                    rarity: r.try_get("Rarity")?,
                    atk80: r.try_get("ATK Lvl 80")?,
                    def80: r.try_get("DEF Lvl 80")?,
                    hp80: r.try_get("HP Lvl 80")?,
                    spd80: r.try_get("SPD Lvl 80")?,
                };
                Ok(TaggedRow {
                    row,
                    version: r.try_get("Version")?,
                })
            })
            .collect::<Result<TaggedRoster, sqlx::Error>>()
            .context("decoding roster rows")
    }
}

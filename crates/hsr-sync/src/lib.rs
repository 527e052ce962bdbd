//! Roster pipeline orchestration: scrape, normalize, tag, persist, report.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arrow_array::{Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{DateTime, Utc};
use hsr_adapters::{
    FixturePageSource, HoyolabWikiSource, PageSource, WikiSourceConfig, DEFAULT_PAGE_SIZE,
    HOYOLAB_ENTRY_LIST_URL,
};
use hsr_core::{CohortTable, TaggedRoster, TaggedRow};
use hsr_storage::RosterStore;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

mod charts;
mod normalize;
mod roster;
mod tagging;

pub use charts::{
    cross_counts, cumulative_by_version, distribution, stat_ranking, version_timeline,
    CategoryCount, ChartDatasets, CrossCount, CumulativeCount, StatRankings, StatValue,
    VersionCount,
};
pub use normalize::{normalize_name, normalize_path, normalize_roster};
pub use roster::scrape_all;
pub use tagging::{
    defaulted_characters, load_cohort_table, load_cohort_table_from_workspace_root, tag_version,
    COHORTS_FILE,
};

pub const CRATE_NAME: &str = "hsr-sync";

pub const DEFAULT_FIXTURE_DIR: &str = "fixtures/hoyolab-wiki/sample";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Live,
    Fixture,
}

impl SourceMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixture" | "fixtures" | "offline" => SourceMode::Fixture,
            _ => SourceMode::Live,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub api_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub page_size: u32,
    pub workspace_root: PathBuf,
    pub source_mode: SourceMode,
    pub fixture_dir: PathBuf,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://hsr.db".to_string()),
            api_url: std::env::var("HSR_API_URL")
                .unwrap_or_else(|_| HOYOLAB_ENTRY_LIST_URL.to_string()),
            user_agent: std::env::var("HSR_USER_AGENT")
                .unwrap_or_else(|_| "hsr-roster/0.1".to_string()),
            http_timeout_secs: positive_or(std::env::var("HSR_HTTP_TIMEOUT_SECS").ok(), 20),
            page_size: positive_or(std::env::var("HSR_PAGE_SIZE").ok(), DEFAULT_PAGE_SIZE),
            workspace_root: std::env::var("HSR_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            source_mode: std::env::var("HSR_SOURCE_MODE")
                .map(|v| SourceMode::parse(&v))
                .unwrap_or(SourceMode::Live),
            fixture_dir: std::env::var("HSR_FIXTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FIXTURE_DIR)),
        }
    }

    fn wiki_source_config(&self) -> WikiSourceConfig {
        WikiSourceConfig {
            endpoint: self.api_url.clone(),
            page_size: self.page_size,
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
            ..Default::default()
        }
    }
}

/// Parsed value if it is strictly positive, else `default`.
fn positive_or<T>(raw: Option<String>, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|v| v.trim().parse().ok())
        .filter(|v| *v > T::default())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchRunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: String,
    pub source_id: String,
    pub database_url: String,
    /// Characters missing from the cohort table, tagged with the earliest version.
    pub defaulted_versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_id: String,
    pub characters: usize,
    pub stored_rows: u64,
    pub reports_dir: String,
    pub parquet_manifest: String,
    pub chart_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

pub struct SyncPipeline {
    config: SyncConfig,
    cohorts: CohortTable,
}

impl SyncPipeline {
    /// Build a pipeline with the cohort table from `<workspace_root>/cohorts.yaml`.
    pub fn new(config: SyncConfig) -> Result<Self> {
        let cohorts = load_cohort_table_from_workspace_root(&config.workspace_root)?;
        Ok(Self::with_cohorts(config, cohorts))
    }

    pub fn with_cohorts(config: SyncConfig, cohorts: CohortTable) -> Self {
        Self { config, cohorts }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        let run_id = Uuid::new_v4();
        let source = self.page_source(run_id)?;
        self.run_with_source(run_id, source.as_ref()).await
    }

    pub async fn run_with_source(
        &self,
        run_id: Uuid,
        source: &dyn PageSource,
    ) -> Result<SyncRunSummary> {
        let started_at = Utc::now();
        info!(%run_id, source = source.source_id(), "sync run started");

        let roster = scrape_all(source)
            .await
            .with_context(|| format!("scraping roster from {}", source.source_id()))?;
        let roster = normalize_roster(roster);
        let tagged = tag_version(roster, &self.cohorts);

        let store = RosterStore::connect(&self.config.database_url).await?;
        let stored_rows = store.replace_roster(&tagged).await?;

        let finished_at = Utc::now();
        let fetch_run = FetchRunRecord {
            run_id,
            started_at,
            finished_at,
            status: "completed".to_string(),
            source_id: source.source_id().to_string(),
            database_url: self.config.database_url.clone(),
            defaulted_versions: defaulted_characters(&tagged, &self.cohorts),
        };
        let charts = ChartDatasets::from_roster(&tagged);

        let reports_dir = self.write_reports(&fetch_run, &tagged, &charts).await?;
        let manifest_path = self.export_parquet_snapshots(&reports_dir, &tagged).await?;

        info!(%run_id, characters = tagged.len(), stored_rows, "sync run finished");
        Ok(SyncRunSummary {
            run_id,
            started_at,
            finished_at,
            source_id: fetch_run.source_id,
            characters: tagged.len(),
            stored_rows,
            chart_data: reports_dir.join("chart_data.json").display().to_string(),
            reports_dir: reports_dir.display().to_string(),
            parquet_manifest: manifest_path.display().to_string(),
        })
    }

    fn page_source(&self, run_id: Uuid) -> Result<Box<dyn PageSource>> {
        match self.config.source_mode {
            SourceMode::Live => Ok(Box::new(HoyolabWikiSource::new(
                self.config.wiki_source_config(),
                run_id,
            )?)),
            SourceMode::Fixture => {
                let dir = self.config.workspace_root.join(&self.config.fixture_dir);
                Ok(Box::new(FixturePageSource::new(dir)))
            }
        }
    }

    async fn write_reports(
        &self,
        fetch_run: &FetchRunRecord,
        tagged: &TaggedRoster,
        charts: &ChartDatasets,
    ) -> Result<PathBuf> {
        let reports_dir = self
            .config
            .workspace_root
            .join("reports")
            .join(fetch_run.run_id.to_string());
        fs::create_dir_all(&reports_dir)
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;

        let brief = format!(
            concat!(
                "# HSR Roster Brief\n\n",
                "- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Source: {}\n",
                "- Characters: {}\n- Defaulted versions: {}\n\n",
                "## Release Cohorts\n{}\n\n## Elements\n{}\n"
            ),
            fetch_run.run_id,
            fetch_run.started_at,
            fetch_run.finished_at,
            fetch_run.source_id,
            tagged.len(),
            fetch_run.defaulted_versions.len(),
            charts
                .version_timeline
                .iter()
                .map(|v| format!("- {:.1}: {}", v.version, v.count))
                .collect::<Vec<_>>()
                .join("\n"),
            charts
                .element_distribution
                .iter()
                .map(|c| format!("- {}: {}", c.category, c.count))
                .collect::<Vec<_>>()
                .join("\n")
        );
        fs::write(reports_dir.join("daily_brief.md"), brief)
            .await
            .context("writing daily_brief.md")?;

        let roster_json = serde_json::to_vec_pretty(&serde_json::json!({
            "fetch_run": fetch_run,
            "characters": tagged,
        }))
        .context("serializing roster")?;
        fs::write(reports_dir.join("roster.json"), roster_json)
            .await
            .context("writing roster.json")?;

        let chart_json = serde_json::to_vec_pretty(charts).context("serializing chart datasets")?;
        fs::write(reports_dir.join("chart_data.json"), chart_json)
            .await
            .context("writing chart_data.json")?;

        Ok(reports_dir)
    }

    async fn export_parquet_snapshots(
        &self,
        reports_dir: &Path,
        tagged: &TaggedRoster,
    ) -> Result<PathBuf> {
        let snapshot_dir = reports_dir.join("snapshots");
        fs::create_dir_all(&snapshot_dir)
            .await
            .with_context(|| format!("creating {}", snapshot_dir.display()))?;

        let roster_path = snapshot_dir.join("roster.parquet");
        write_roster_parquet(&roster_path, tagged)?;

        let manifest = ParquetManifest {
            schema_version: 1,
            files: vec![manifest_entry("roster", reports_dir, &roster_path)?],
        };

        let manifest_path = snapshot_dir.join("manifest.json");
        let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
        fs::write(&manifest_path, bytes)
            .await
            .with_context(|| format!("writing {}", manifest_path.display()))?;

        Ok(manifest_path)
    }
}

pub async fn run_sync_once_from_env() -> Result<SyncRunSummary> {
    let pipeline = SyncPipeline::new(SyncConfig::from_env())?;
    pipeline.run_once().await
}

/// Shape of `roster.json` as read back by the run report.
#[derive(Debug, Deserialize)]
struct StoredRun {
    fetch_run: StoredFetchRun,
    characters: TaggedRoster,
}

#[derive(Debug, Deserialize)]
struct StoredFetchRun {
    source_id: String,
    database_url: String,
    #[serde(default)]
    defaulted_versions: Vec<String>,
}

/// Markdown summary of the newest `runs` report directories, newest first.
pub fn report_daily_markdown(runs: usize, workspace_root: Option<PathBuf>) -> Result<String> {
    let root = workspace_root.unwrap_or_else(|| PathBuf::from("."));
    let reports_root = root.join("reports");
    let mut dirs = std::fs::read_dir(&reports_root)
        .with_context(|| format!("reading {}", reports_root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .collect::<Vec<_>>();
    dirs.sort_by_key(|e| std::cmp::Reverse(e.metadata().and_then(|m| m.modified()).ok()));

    let mut lines = vec!["# HSR Roster Runs".to_string(), String::new()];
    for dir in dirs.into_iter().take(runs.max(1)) {
        lines.extend(run_section(&dir.path())?);
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

fn run_section(dir: &Path) -> Result<Vec<String>> {
    let run_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let roster_path = dir.join("roster.json");
    let text = std::fs::read_to_string(&roster_path)
        .with_context(|| format!("reading {}", roster_path.display()))?;
    let stored: StoredRun =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", roster_path.display()))?;

    let cohorts = version_timeline(&stored.characters)
        .iter()
        .map(|v| format!("{:.1} ({})", v.version, v.count))
        .collect::<Vec<_>>();
    let defaulted = &stored.fetch_run.defaulted_versions;

    let mut lines = vec![
        format!("## Run `{run_id}`"),
        format!("- characters: {}", stored.characters.len()),
        format!("- source: {}", stored.fetch_run.source_id),
    ];
    if cohorts.is_empty() {
        lines.push("- cohorts: none".to_string());
    } else {
        lines.push(format!("- cohorts: {}", cohorts.join(", ")));
    }
    if defaulted.is_empty() {
        lines.push("- defaulted versions: 0".to_string());
    } else {
        lines.push(format!(
            "- defaulted versions: {} ({})",
            defaulted.len(),
            defaulted.join(", ")
        ));
    }
    lines.push(format!("- persistence target: `{}`", stored.fetch_run.database_url));
    for (label, path) in [
        ("roster", roster_path.clone()),
        ("chart data", dir.join("chart_data.json")),
        ("parquet manifest", dir.join("snapshots").join("manifest.json")),
        ("daily brief", dir.join("daily_brief.md")),
    ] {
        if path.exists() {
            lines.push(format!("- {label}: `{}`", path.display()));
        }
    }
    Ok(lines)
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing parquet batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn write_roster_parquet(path: &Path, tagged: &TaggedRoster) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("character", DataType::Utf8, false),
        ArrowField::new("path", DataType::Utf8, false),
        ArrowField::new("element", DataType::Utf8, false),
        ArrowField::new("rarity", DataType::Utf8, false),
        ArrowField::new("atk_lvl_80", DataType::Int64, false),
        ArrowField::new("def_lvl_80", DataType::Int64, false),
        ArrowField::new("hp_lvl_80", DataType::Int64, false),
        ArrowField::new("spd_lvl_80", DataType::Int64, false),
        ArrowField::new("version", DataType::Float64, false),
    ]));

    let rows = tagged.rows();
    let text = |f: fn(&TaggedRow) -> &str| {
        StringArray::from(rows.iter().map(f).collect::<Vec<_>>())
    };
    let int = |f: fn(&TaggedRow) -> i64| {
        Int64Array::from(rows.iter().map(f).collect::<Vec<_>>())
    };

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(text(|r| r.row.name.as_str())),
            Arc::new(text(|r| r.row.path.as_str())),
            Arc::new(text(|r| r.row.element.as_str())),
            Arc::new(text(|r| r.row.rarity.as_str())),
            Arc::new(int(|r| r.row.atk80)),
            Arc::new(int(|r| r.row.def80)),
            Arc::new(int(|r| r.row.hp80)),
            Arc::new(int(|r| r.row.spd80)),
            Arc::new(Float64Array::from(
                rows.iter().map(|r| r.version).collect::<Vec<_>>(),
            )),
        ],
    )
    .context("building roster record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
    })
}

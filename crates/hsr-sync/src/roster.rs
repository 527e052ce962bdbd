//! Sequential page walk that accumulates the roster.

use hsr_adapters::{build_row, PageSource};
use hsr_core::Roster;
use hsr_storage::FetchError;
use tracing::{error, info};

/// Fetch pages 1, 2, ... until one comes back empty, building a row from every record.
///
/// Records without a name are logged and skipped; any fetch error aborts the walk.
pub async fn scrape_all<S>(source: &S) -> Result<Roster, FetchError>
where
    S: PageSource + ?Sized,
{
    let mut roster = Roster::new();
    let mut skipped = 0usize;
    let mut page = 1u32;

    loop {
        let records = source.fetch_page(page).await?;
        if records.is_empty() {
            break;
        }
        info!(source = source.source_id(), page, records = records.len(), "processing page");

        for raw in &records {
            match build_row(raw) {
                Ok(row) => roster.push(row),
                Err(err) => {
                    skipped += 1;
                    error!(page, error = %err, "skipping record");
                }
            }
        }
        page += 1;
    }

    info!(
        source = source.source_id(),
        pages = page - 1,
        records = roster.len(),
        skipped,
        "roster scrape finished"
    );
    Ok(roster)
}

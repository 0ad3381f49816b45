//! Directory-walk mode: parse every PDF under a tree, optionally rename
//! the files from their parsed metadata, and write one aggregated JSON
//! array with a timestamped name.

use crate::model::Visit;
use crate::vendors::Vendor;
use chrono::Local;
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Item totals may legitimately drift from the receipt total (skipped
/// discount rows); beyond this we log the mismatch.
const TOTAL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub visits: Vec<Visit>,
    /// Item lines no decomposer could handle, across all files.
    pub unhandled: Vec<String>,
    /// Files that failed to parse (logged and skipped).
    pub failed: usize,
}

/// Walk `dir` and parse every `*.pdf` in deterministic order. One bad file
/// never aborts the batch.
pub fn run(
    dir: &Path,
    vendor: Option<Vendor>,
    rename: bool,
    tz: Tz,
) -> Result<BatchOutcome, Box<dyn std::error::Error>> {
    let mut outcome = BatchOutcome::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file()
            || !entry
                .path()
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        {
            continue;
        }

        let path = entry.path();
        let span = tracing::info_span!("receipt", file = %path.display());
        let _guard = span.enter();

        let parsed = match crate::parse_pdf(path, vendor, tz) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Failed to parse receipt — skipping");
                outcome.failed += 1;
                continue;
            }
        };

        let mut visit = parsed.visit;
        outcome.unhandled.extend(parsed.unhandled);

        let drift = (visit.total - visit.products_total()).abs();
        if drift > TOTAL_TOLERANCE {
            info!(
                total = visit.total,
                items = visit.products_total(),
                "Item totals diverge from receipt total (skipped discount rows?)"
            );
        }

        let final_path = if rename {
            rename_from_metadata(path, &visit)
        } else {
            path.to_path_buf()
        };
        visit.source_pdf = Some(final_path.display().to_string());

        info!(
            store = %visit.store,
            id = %visit.id,
            products = visit.products.len(),
            total = visit.total,
            "Parsed receipt"
        );
        outcome.visits.push(visit);
    }

    info!(
        receipts = outcome.visits.len(),
        failed = outcome.failed,
        unhandled_lines = outcome.unhandled.len(),
        "Batch complete"
    );
    Ok(outcome)
}

/// Write the aggregated visits as a pretty-printed JSON array to a
/// timestamped file under `out_dir`. Returns the path written.
pub fn write_aggregate(
    outcome: &BatchOutcome,
    out_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let filename = format!("{}.json", Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let out_path = out_dir.join(filename);
    fs::write(&out_path, serde_json::to_string_pretty(&outcome.visits)?)?;
    info!(path = %out_path.display(), "Wrote aggregated JSON");
    Ok(out_path)
}

/// `2023-12-07_13-30-10_Coop Konsum Storgatan 12_2421-012.pdf` — sortable
/// by purchase time, unique per receipt. Path separators in store names
/// would escape the directory, so they are flattened first.
fn rename_from_metadata(path: &Path, visit: &Visit) -> PathBuf {
    let new_name = format!(
        "{}_{}_{}.pdf",
        visit.datetime.format("%Y-%m-%d_%H-%M-%S"),
        visit.store.replace(['/', '\\'], "-"),
        visit.id
    );
    let target = path.with_file_name(&new_name);
    if target == path {
        return path.to_path_buf();
    }
    match fs::rename(path, &target) {
        Ok(()) => {
            info!(from = %path.display(), to = %target.display(), "Renamed");
            target
        }
        Err(e) => {
            warn!(error = %e, "Rename failed — keeping original name");
            path.to_path_buf()
        }
    }
}

//! Bulk donor import: parse an uploaded CSV/XLSX into string-keyed rows, then
//! reconcile each row against the existing donor set (create or update).
//!
//! The run is deliberately not one transaction. A bad row is recorded with its
//! 1-based row number (header = row 1) and the batch continues, so the caller
//! always gets per-row diagnostics alongside partial success.

use crate::db::{self, DbPool};
use crate::progress::ProgressTracker;
use calamine::{Data, Reader, Xlsx};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;

pub mod matching;
pub mod normalize;

use matching::{match_key, MatchingIndex};
use normalize::normalize_row;

#[derive(Debug, Clone, Serialize, Default)]
pub struct ImportSummary {
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

/// Flatten an uploaded file into rows keyed by lower-cased headers.
pub fn parse_upload(file_name: &str, data: &[u8]) -> anyhow::Result<Vec<HashMap<String, String>>> {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".csv") {
        parse_csv(data)
    } else if lower.ends_with(".xlsx") {
        parse_xlsx(data)
    } else {
        anyhow::bail!("Unsupported file type: {}", file_name)
    }
}

/// Rows shorter than the header are padded with empty values and rows longer
/// than it drop the extras, so one ragged record never fails the upload; the
/// reconciler reports any resulting identity-less row as a row error.
pub fn parse_csv(data: &[u8]) -> anyhow::Result<Vec<HashMap<String, String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            row.insert(header.clone(), record.get(i).unwrap_or("").to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn parse_xlsx(data: &[u8]) -> anyhow::Result<Vec<HashMap<String, String>>> {
    let mut workbook = Xlsx::new(Cursor::new(data.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow::anyhow!("Workbook has no sheets"))??;

    let mut iter = range.rows();
    let headers: Vec<String> = iter
        .next()
        .ok_or_else(|| anyhow::anyhow!("Sheet has no header row"))?
        .iter()
        .map(|c| cell_to_string(c).trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for raw in iter {
        let mut row = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = raw.get(i).map(cell_to_string).unwrap_or_default();
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Reconcile parsed rows against the donor table, row by row in input order.
///
/// When a tracker/operation pair is supplied, progress is reported as the loop
/// advances and the loop stops early once the operation has been cancelled,
/// returning the counts accumulated so far.
pub async fn run_import(
    pool: &DbPool,
    rows: &[HashMap<String, String>],
    tracker: Option<(&ProgressTracker, &str)>,
) -> anyhow::Result<ImportSummary> {
    let mut index = MatchingIndex::build(
        db::list_donor_match_fields(pool)
            .await?
            .iter()
            .map(|(id, first, last, org)| (id.as_str(), first.as_deref(), last.as_deref(), org.as_deref())),
    );

    let mut summary = ImportSummary::default();
    let total = rows.len().max(1);

    for (i, raw) in rows.iter().enumerate() {
        // Header occupies row 1, so the first data row is row 2.
        let row_number = i + 2;

        if let Some((tracker, op_id)) = tracker {
            if tracker.is_cancelled(op_id) {
                tracing::warn!("Import {} cancelled after {} rows", op_id, i);
                break;
            }
            if i % 25 == 0 {
                let pct = (i * 100 / total) as u8;
                tracker.update_progress(op_id, pct, &format!("Processing row {} of {}", i + 1, rows.len()));
            }
        }

        let donor = normalize_row(raw);
        if !donor.has_identity() {
            summary.skipped += 1;
            summary.errors.push(RowError {
                row: row_number,
                error: "Missing first/last name and organization name".to_string(),
            });
            continue;
        }

        let existing = index
            .lookup(
                donor.first_name.as_deref(),
                donor.last_name.as_deref(),
                donor.organization_name.as_deref(),
            )
            .map(|s| s.to_string());

        let outcome = match existing {
            Some(donor_id) => {
                // The index can point at a donor deleted mid-run; fall back to
                // create rather than failing the row.
                match db::donor_exists(pool, &donor_id).await {
                    Ok(true) => db::update_donor_from_import(pool, &donor_id, &donor)
                        .await
                        .map(|_| Outcome::Updated),
                    Ok(false) => create_and_register(pool, &mut index, &donor).await,
                    Err(e) => Err(e),
                }
            }
            None => create_and_register(pool, &mut index, &donor).await,
        };

        match outcome {
            Ok(Outcome::Imported) => summary.imported += 1,
            Ok(Outcome::Updated) => summary.updated += 1,
            Err(e) => {
                tracing::error!("Import row {} failed: {}", row_number, e);
                summary.skipped += 1;
                summary.errors.push(RowError {
                    row: row_number,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

enum Outcome {
    Imported,
    Updated,
}

async fn create_and_register(
    pool: &DbPool,
    index: &mut MatchingIndex,
    donor: &normalize::NormalizedDonor,
) -> anyhow::Result<Outcome> {
    let donor_id = db::create_donor_from_import(pool, donor).await?;
    if let Some(key) = match_key(
        donor.first_name.as_deref(),
        donor.last_name.as_deref(),
        donor.organization_name.as_deref(),
    ) {
        index.insert(key, donor_id);
    }
    Ok(Outcome::Imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_headers_are_lowercased() {
        let csv = "First_Name,LAST_NAME,Total_Donations\nMei,Lee,100\n";
        let rows = parse_csv(csv.as_bytes()).expect("parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("first_name").map(|s| s.as_str()), Some("Mei"));
        assert_eq!(rows[0].get("last_name").map(|s| s.as_str()), Some("Lee"));
        assert_eq!(rows[0].get("total_donations").map(|s| s.as_str()), Some("100"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        assert!(parse_upload("donors.pdf", b"").is_err());
    }

    #[test]
    fn xlsx_rows_are_flattened_like_csv() {
        let data = include_bytes!("../../tests/fixtures/donors.xlsx");
        let rows = parse_upload("donors.xlsx", data).expect("parse xlsx");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("first_name").map(|s| s.as_str()), Some("Mei"));
        assert_eq!(rows[0].get("last_name").map(|s| s.as_str()), Some("Lee"));
        assert_eq!(rows[0].get("total_donations").map(|s| s.as_str()), Some("150"));
        // second data row has no amount cell
        assert_eq!(rows[1].get("first_name").map(|s| s.as_str()), Some("Ann"));
        assert_eq!(rows[1].get("total_donations").map(|s| s.as_str()), Some(""));
    }

    #[test]
    fn short_rows_pad_missing_fields_instead_of_failing() {
        let csv = "first_name,last_name,email\nMei,Lee\nAnn,Wu,ann@example.org\n";
        let rows = parse_csv(csv.as_bytes()).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("email").map(|s| s.as_str()), Some(""));
        assert_eq!(rows[1].get("email").map(|s| s.as_str()), Some("ann@example.org"));
    }
}

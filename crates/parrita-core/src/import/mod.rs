//! CSV import pipeline for historical discovery calls.
//!
//! One upload = one batch: the orchestrator parses the blob, maps each
//! data row onto a [`DiscoveryCall`](crate::model::DiscoveryCall) and
//! persists it. Rows are processed strictly sequentially with no
//! cross-row transaction; a failed row is counted and skipped, never
//! aborting the rest. Partially-imported batches are expected — the
//! operator can inspect them via [`SqliteStorage::list_import_batches`]
//! and drop them with [`SqliteStorage::delete_import_batch`].

mod client_info;
mod csv;

pub use client_info::{parse_client_info, ClientInfo};
pub use csv::parse_csv;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{ParritaError, Result};
use crate::model::DiscoveryCall;
use crate::storage::SqliteStorage;

/// Columns expected per data row: infos_client + the four phases.
const EXPECTED_COLUMNS: usize = 5;

/// Result of one CSV upload.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub batch_id: Uuid,
    pub imported: usize,
    pub errors: usize,
}

/// Import a CSV blob of discovery calls under a fresh batch id.
///
/// Row 0 is the header and is skipped. A row with fewer than five fields
/// is an error (no partial insert). Returns `InvalidInput` only when the
/// blob parses to nothing at all.
pub async fn import_discovery_calls(
    storage: &SqliteStorage,
    csv_data: &str,
) -> Result<ImportSummary> {
    let rows = parse_csv(csv_data);
    if rows.is_empty() {
        return Err(ParritaError::InvalidInput("no data found in CSV".into()));
    }

    let batch_id = Uuid::now_v7();
    let mut imported = 0;
    let mut errors = 0;

    tracing::info!(
        batch_id = %batch_id,
        data_rows = rows.len() - 1,
        "starting CSV import"
    );

    for (line_number, row) in rows.iter().enumerate().skip(1) {
        if row.len() < EXPECTED_COLUMNS {
            tracing::warn!(
                line_number,
                columns = row.len(),
                "skipping row: insufficient columns"
            );
            errors += 1;
            continue;
        }

        let info = parse_client_info(&row[0]);
        let call = DiscoveryCall::new(
            info.entreprise,
            info.secteur,
            info.besoin,
            info.contexte,
            batch_id,
        )
        .with_phases(
            non_empty(&row[1]),
            non_empty(&row[2]),
            non_empty(&row[3]),
            non_empty(&row[4]),
        )
        .with_raw_data(serde_json::json!({
            "infos_client": row[0],
            "line_number": line_number,
        }));

        match storage.save_discovery_call(&call).await {
            Ok(()) => imported += 1,
            Err(e) => {
                tracing::warn!(line_number, error = %e, "failed to import row");
                errors += 1;
            }
        }
    }

    tracing::info!(batch_id = %batch_id, imported, errors, "import completed");

    Ok(ImportSummary {
        batch_id,
        imported,
        errors,
    })
}

/// Empty phase cells become `None` — an uncaptured stage, not an empty one.
fn non_empty(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

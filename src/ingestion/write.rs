//! Write functions - export precinct records as CSV

use crate::ingestion::error::Result;
use crate::ingestion::types::{ExportStats, PrecinctRecord, PrecinctTable};
use std::io;
use std::path::Path;
use tracing::info;

/// Header row: fixed counts, vote slots, passthrough columns, location, coordinates
pub fn csv_header(table: &PrecinctTable) -> Vec<String> {
    let mut header = vec!["eligible_voters".to_string(), "voters".to_string()];
    header.extend(table.vote_columns.iter().cloned());
    header.extend(table.extra_columns.iter().cloned());
    header.extend(
        ["location_address", "location_id", "latitude", "longitude"]
            .iter()
            .map(|s| s.to_string()),
    );
    header
}

fn csv_row(table: &PrecinctTable, record: &PrecinctRecord) -> Vec<String> {
    let mut row = vec![record.eligible_voters.to_string(), record.voters.to_string()];

    for column in &table.vote_columns {
        row.push(
            record
                .votes_for(column)
                .map(|count| count.to_string())
                .unwrap_or_default(),
        );
    }

    for column in &table.extra_columns {
        let value = record
            .extra
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        row.push(value);
    }

    row.push(record.location_address.clone());
    row.push(record.location_id.clone());
    row.push(record.latitude.map(|v| v.to_string()).unwrap_or_default());
    row.push(record.longitude.map(|v| v.to_string()).unwrap_or_default());

    row
}

/// Write the table to any writer, comma separated, header included, no index column
pub fn write_csv<W: io::Write>(writer: W, table: &PrecinctTable) -> Result<ExportStats> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(csv_header(table))?;

    let mut stats = ExportStats::default();
    for record in &table.records {
        csv_writer.write_record(csv_row(table, record))?;
        stats.rows += 1;
        if record.latitude.is_some() && record.longitude.is_some() {
            stats.geocoded += 1;
        }
    }

    csv_writer.flush()?;
    Ok(stats)
}

/// Export the table to a CSV file
pub fn export_csv(path: &Path, table: &PrecinctTable) -> Result<ExportStats> {
    info!("Writing {} records to {:?}", table.records.len(), path);

    let file = std::fs::File::create(path)?;
    let stats = write_csv(file, table)?;

    info!("Export complete: {}", stats);
    Ok(stats)
}

/// Log the first few records
pub fn log_preview(records: &[PrecinctRecord], limit: usize) {
    for record in records.iter().take(limit) {
        info!(
            "{:>6} | {:<40} | eligible {:>5} | voters {:>5} | lat {:?} lng {:?}",
            record.location_id,
            record.location_address,
            record.eligible_voters,
            record.voters,
            record.latitude,
            record.longitude
        );
    }
}

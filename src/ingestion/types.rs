//! Core data types for the ingestion pipeline
//! Pure data structures with no behavior

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw input before table extraction
#[derive(Debug)]
pub enum RawData {
    /// Local page, read when parsed
    File(PathBuf),
    /// Page body already in memory
    Html(String),
}

/// How a column's cells are decoded, chosen by canonical name after renaming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    EligibleVoters,
    Voters,
    /// Composite "<address> (<id>)" field
    Precinct,
    /// Vote count wrapped one element deep
    Votes,
    /// Unknown header, raw text kept as-is
    Passthrough,
}

/// One known source column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Header text as it appears in the source table
    pub label: String,
    /// Canonical field name
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(label: &str, name: &str, kind: ColumnKind) -> Self {
        ColumnSpec {
            label: label.to_string(),
            name: name.to_string(),
            kind,
        }
    }
}

/// Header translation table plus per-column decode rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Heilbronn constituency, Bundestag election 2017
    pub fn heilbronn_2017() -> Self {
        use ColumnKind::*;

        TableSchema {
            columns: vec![
                ColumnSpec::new("Wahlbe-rechtigte", "eligible_voters", EligibleVoters),
                ColumnSpec::new("Wähler/innen", "voters", Voters),
                ColumnSpec::new("Wahlbezirk", "precinct", Precinct),
                ColumnSpec::new("Throm, Alexander (CDU)", "CDU", Votes),
                ColumnSpec::new("Juratovic, Josip (SPD)", "SPD", Votes),
                ColumnSpec::new("Fick, Thomas (GRÜNE)", "GRUENE", Votes),
                ColumnSpec::new("Link, Michael Georg (FDP)", "FDP", Votes),
                ColumnSpec::new("Kögel, Jürgen (AfD)", "AFD", Votes),
                ColumnSpec::new("Wanner, Konrad (DIE LINKE)", "LINKE", Votes),
                ColumnSpec::new("Sonstige", "SONSTIGE", Votes),
            ],
        }
    }

    /// Translate a header label; unknown labels pass through unchanged
    pub fn rename(&self, label: &str) -> String {
        self.columns
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| label.to_string())
    }

    /// Decode rule for a canonical column name
    pub fn kind_of(&self, name: &str) -> ColumnKind {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.kind)
            .unwrap_or(ColumnKind::Passthrough)
    }
}

impl Default for TableSchema {
    fn default() -> Self {
        TableSchema::heilbronn_2017()
    }
}

/// Latitude/longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// One polling precinct
#[derive(Debug, Clone, PartialEq)]
pub struct PrecinctRecord {
    pub eligible_voters: u64,
    pub voters: u64,

    /// Vote counts per candidate/party slot, in source column order
    pub votes: Vec<(String, u64)>,

    /// Columns the schema does not know, raw text
    pub extra: Vec<(String, String)>,

    pub location_address: String,
    pub location_id: String,

    // Populated by the geocode join
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl PrecinctRecord {
    pub fn votes_for(&self, slot: &str) -> Option<u64> {
        self.votes
            .iter()
            .find(|(name, _)| name == slot)
            .map(|(_, count)| *count)
    }
}

/// Extracted table: column layout plus records in source row order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecinctTable {
    pub vote_columns: Vec<String>,
    pub extra_columns: Vec<String>,
    pub records: Vec<PrecinctRecord>,
}

/// Export operation statistics
#[derive(Debug, Default, Clone)]
pub struct ExportStats {
    pub rows: usize,
    pub geocoded: usize,
}

impl std::fmt::Display for ExportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rows: {}, geocoded: {}", self.rows, self.geocoded)
    }
}

/// Geocode cache population statistics
#[derive(Debug, Default, Clone)]
pub struct PopulateStats {
    pub records: usize,
    pub queries: usize,
}

impl std::fmt::Display for PopulateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "records: {}, distinct queries: {}",
            self.records, self.queries
        )
    }
}

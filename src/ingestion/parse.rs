//! Parse functions - transform an election results table into PrecinctRecord structs

use crate::ingestion::error::{IngestionError, Result};
use crate::ingestion::types::{ColumnKind, PrecinctRecord, PrecinctTable, RawData, TableSchema};
use crate::ingestion::utils::{parse_count, split_precinct};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info};

fn row_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("tr").expect("static selector"))
}

/// Parse an election results page into precinct records
pub async fn parse_precinct_table(raw: RawData, schema: &TableSchema) -> Result<PrecinctTable> {
    let html = match raw {
        RawData::File(path) => tokio::fs::read_to_string(&path).await?,
        RawData::Html(html) => html,
    };

    extract_table(&html, schema)
}

/// Extract the results table from markup
///
/// The first row is the header, the last row is the totals footer and is
/// dropped unconditionally, whatever it contains.
pub fn extract_table(html: &str, schema: &TableSchema) -> Result<PrecinctTable> {
    let document = Html::parse_document(html);
    let rows: Vec<Vec<ElementRef>> = document.select(row_selector()).map(row_cells).collect();

    if rows.len() < 2 {
        return Err(IngestionError::TooFewRows { found: rows.len() });
    }
    info!("Found table with {} rows", rows.len());

    let columns: Vec<(String, ColumnKind)> = rows[0]
        .iter()
        .map(|cell| {
            let name = schema.rename(cell_text(cell).trim());
            let kind = schema.kind_of(&name);
            (name, kind)
        })
        .collect();

    for kind in [
        ColumnKind::EligibleVoters,
        ColumnKind::Voters,
        ColumnKind::Precinct,
    ] {
        require_single(&columns, kind)?;
    }

    let names_of = |wanted: ColumnKind| -> Vec<String> {
        columns
            .iter()
            .filter(|(_, kind)| *kind == wanted)
            .map(|(name, _)| name.clone())
            .collect()
    };
    let vote_columns = names_of(ColumnKind::Votes);
    let extra_columns = names_of(ColumnKind::Passthrough);

    let body = &rows[1..rows.len() - 1];
    let mut records = Vec::with_capacity(body.len());
    let mut seen_ids = HashSet::new();

    for (offset, cells) in body.iter().enumerate() {
        let row = offset + 1;

        if cells.len() < columns.len() {
            return Err(IngestionError::Shape {
                row,
                message: format!(
                    "expected {} cells, found {}",
                    columns.len(),
                    cells.len()
                ),
            });
        }

        let record = decode_row(&columns, cells, row)?;

        if !seen_ids.insert(record.location_id.clone()) {
            return Err(IngestionError::Shape {
                row,
                message: format!("duplicate location id '{}'", record.location_id),
            });
        }

        debug!(
            "Row {}: {} ({})",
            row, record.location_address, record.location_id
        );
        records.push(record);
    }

    info!(
        "Extracted {} precincts with {} vote columns",
        records.len(),
        vote_columns.len()
    );

    Ok(PrecinctTable {
        vote_columns,
        extra_columns,
        records,
    })
}

fn require_single(columns: &[(String, ColumnKind)], kind: ColumnKind) -> Result<()> {
    let found = columns.iter().filter(|(_, k)| *k == kind).count();
    if found == 1 {
        return Ok(());
    }

    Err(IngestionError::Shape {
        row: 0,
        message: format!("expected exactly one {:?} column, found {}", kind, found),
    })
}

/// Decode one data row; the decode rule is picked by canonical column name
fn decode_row(
    columns: &[(String, ColumnKind)],
    cells: &[ElementRef],
    row: usize,
) -> Result<PrecinctRecord> {
    let mut eligible_voters = None;
    let mut voters = None;
    let mut location = None;
    let mut votes = Vec::new();
    let mut extra = Vec::new();

    for ((name, kind), cell) in columns.iter().zip(cells) {
        match kind {
            ColumnKind::EligibleVoters => {
                eligible_voters = Some(decode_count(name, &cell_text(cell), row)?);
            }
            ColumnKind::Voters => {
                voters = Some(decode_count(name, &cell_text(cell), row)?);
            }
            ColumnKind::Precinct => {
                let text = cell_text(cell);
                let parts = split_precinct(&text).ok_or_else(|| IngestionError::Shape {
                    row,
                    message: format!("precinct '{}' is not of the form 'address (id)'", text),
                })?;
                location = Some(parts);
            }
            ColumnKind::Votes => {
                let text = nested_text(cell).ok_or_else(|| IngestionError::Decode {
                    column: name.clone(),
                    row,
                    message: "vote count is not wrapped in a nested element".to_string(),
                })?;
                votes.push((name.clone(), decode_count(name, &text, row)?));
            }
            ColumnKind::Passthrough => {
                extra.push((name.clone(), cell_text(cell)));
            }
        }
    }

    let missing = |what: &str| IngestionError::Shape {
        row,
        message: format!("no {} column", what),
    };
    let (location_address, location_id) = location.ok_or_else(|| missing("precinct"))?;

    Ok(PrecinctRecord {
        eligible_voters: eligible_voters.ok_or_else(|| missing("eligible voters"))?,
        voters: voters.ok_or_else(|| missing("voters"))?,
        votes,
        extra,
        location_address,
        location_id,
        latitude: None,
        longitude: None,
    })
}

fn decode_count(column: &str, text: &str, row: usize) -> Result<u64> {
    parse_count(text).ok_or_else(|| IngestionError::Decode {
        column: column.to_string(),
        row,
        message: format!("'{}' is not a count", text.trim()),
    })
}

/// Direct td/th children of a row
fn row_cells(row: ElementRef) -> Vec<ElementRef> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .collect()
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect()
}

/// Text of the element one level inside the cell, e.g. `<td><a>412</a></td>`
fn nested_text(cell: &ElementRef) -> Option<String> {
    let first = cell.children().find(|node| match node.value() {
        Node::Text(text) => !text.trim().is_empty(),
        _ => true,
    })?;

    ElementRef::wrap(first).map(|inner| inner.text().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 5] = [
        "Wahlbe-rechtigte",
        "Wähler/innen",
        "Wahlbezirk",
        "Throm, Alexander (CDU)",
        "Juratovic, Josip (SPD)",
    ];

    fn page(header: &[&str], rows: &[Vec<&str>]) -> String {
        let mut html = String::from("<html><body><table>\n<tr>");
        for label in header {
            html.push_str(&format!("<td>{}</td>", label));
        }
        html.push_str("</tr>\n");
        for row in rows {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&format!("<td>{}</td>", cell));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table></body></html>");
        html
    }

    fn sample_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["1.021", "743", "Rathaus, Marktplatz 7 (101)", "<a href=\"#\">007</a>", "<a href=\"#\">250</a>"],
            vec!["880", "600", "Grundschule Sontheim (215)", "<span>300</span>", "<span>120</span>"],
            vec!["910", "640", "Grundschule Sontheim (216)", " <a>310</a> ", "<a>115</a>"],
            vec!["Summe", "", "", "<a>617</a>"],
        ]
    }

    #[test]
    fn test_extract_table() {
        let html = page(&HEADER, &sample_rows());
        let table = extract_table(&html, &TableSchema::heilbronn_2017()).unwrap();

        // Header and footer excluded
        assert_eq!(table.records.len(), 3);
        assert_eq!(table.vote_columns, vec!["CDU", "SPD"]);
        assert!(table.extra_columns.is_empty());

        let first = &table.records[0];
        assert_eq!(first.eligible_voters, 1021);
        assert_eq!(first.voters, 743);
        assert_eq!(first.votes_for("CDU"), Some(7));
        assert_eq!(first.votes_for("SPD"), Some(250));
        assert_eq!(first.location_address, "Rathaus, Marktplatz 7");
        assert_eq!(first.location_id, "101");
        assert_eq!(first.latitude, None);

        let ids: Vec<&str> = table.records.iter().map(|r| r.location_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "215", "216"]);
    }

    #[test]
    fn test_header_and_footer_only() {
        let html = page(&HEADER, &[vec!["Summe", "", "", "<a>0</a>", "<a>0</a>"]]);
        let table = extract_table(&html, &TableSchema::heilbronn_2017()).unwrap();
        assert!(table.records.is_empty());
    }

    #[test]
    fn test_unknown_header_passes_through() {
        let mut header = HEADER.to_vec();
        header.push("Briefwahl");
        let rows = vec![
            vec!["100", "80", "Marktplatz 1 (001)", "<a>40</a>", "<a>30</a>", "ja"],
            vec!["Summe", "", "", "", "", ""],
        ];

        let table = extract_table(&page(&header, &rows), &TableSchema::heilbronn_2017()).unwrap();

        assert_eq!(table.vote_columns, vec!["CDU", "SPD"]);
        assert_eq!(table.extra_columns, vec!["Briefwahl"]);
        assert_eq!(
            table.records[0].extra,
            vec![("Briefwahl".to_string(), "ja".to_string())]
        );
    }

    #[test]
    fn test_decoding_follows_names_not_positions() {
        let header = [
            "Throm, Alexander (CDU)",
            "Wahlbezirk",
            "Wähler/innen",
            "Wahlbe-rechtigte",
        ];
        let rows = vec![
            vec!["<a>40</a>", "Marktplatz 1 (001)", "80", "100"],
            vec!["<a>40</a>", "", "80", "100"],
        ];

        let table = extract_table(&page(&header, &rows), &TableSchema::heilbronn_2017()).unwrap();
        let record = &table.records[0];

        assert_eq!(record.eligible_voters, 100);
        assert_eq!(record.voters, 80);
        assert_eq!(record.votes_for("CDU"), Some(40));
        assert_eq!(record.location_id, "001");
    }

    #[test]
    fn test_short_row_is_shape_error() {
        let mut rows = sample_rows();
        rows[1] = vec!["880", "600", "Grundschule Sontheim (215)"];

        let err = extract_table(&page(&HEADER, &rows), &TableSchema::heilbronn_2017()).unwrap_err();
        assert!(matches!(err, IngestionError::Shape { row: 2, .. }));
    }

    #[test]
    fn test_missing_nested_element_is_decode_error() {
        let mut rows = sample_rows();
        rows[0][3] = "12";

        let err = extract_table(&page(&HEADER, &rows), &TableSchema::heilbronn_2017()).unwrap_err();
        match err {
            IngestionError::Decode { column, row, .. } => {
                assert_eq!(column, "CDU");
                assert_eq!(row, 1);
            }
            other => panic!("Expected Decode, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_count_is_decode_error() {
        let mut rows = sample_rows();
        rows[2][4] = "<a>k.A.</a>";

        let err = extract_table(&page(&HEADER, &rows), &TableSchema::heilbronn_2017()).unwrap_err();
        assert!(matches!(err, IngestionError::Decode { row: 3, .. }));
    }

    #[test]
    fn test_malformed_thousands_group_is_decode_error() {
        let mut rows = sample_rows();
        rows[0][3] = "<a>12.34</a>";

        let err = extract_table(&page(&HEADER, &rows), &TableSchema::default()).unwrap_err();
        match err {
            IngestionError::Decode { column, row, .. } => {
                assert_eq!(column, "CDU");
                assert_eq!(row, 1);
            }
            other => panic!("Expected Decode, got {:?}", other),
        }
    }

    #[test]
    fn test_no_table_is_shape_error() {
        let err = extract_table("<html><body><p>Keine Daten</p></body></html>", &TableSchema::default())
            .unwrap_err();
        assert!(matches!(err, IngestionError::TooFewRows { found: 0 }));
    }

    #[test]
    fn test_missing_precinct_column() {
        let header = ["Wahlbe-rechtigte", "Wähler/innen", "Bezirk"];
        let rows = vec![vec!["1", "1", "x"], vec!["1", "1", "x"]];

        let err = extract_table(&page(&header, &rows), &TableSchema::default()).unwrap_err();
        assert!(matches!(err, IngestionError::Shape { row: 0, .. }));
    }

    #[test]
    fn test_malformed_precinct_field() {
        let mut rows = sample_rows();
        rows[0][2] = "Rathaus ohne Nummer";

        let err = extract_table(&page(&HEADER, &rows), &TableSchema::default()).unwrap_err();
        assert!(matches!(err, IngestionError::Shape { row: 1, .. }));
    }

    #[test]
    fn test_duplicate_location_id() {
        let mut rows = sample_rows();
        rows[2][2] = "Grundschule Sontheim (215)";

        let err = extract_table(&page(&HEADER, &rows), &TableSchema::default()).unwrap_err();
        assert!(matches!(err, IngestionError::Shape { row: 3, .. }));
    }

    #[tokio::test]
    async fn test_parse_precinct_table_from_loaded_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wahlen17.html");
        std::fs::write(&path, page(&HEADER, &sample_rows())).unwrap();

        let raw = crate::ingestion::fetch::load_html(&path).await.unwrap();
        let table = parse_precinct_table(raw, &TableSchema::default()).await.unwrap();

        assert_eq!(table.records.len(), 3);
        assert_eq!(table.records[2].location_id, "216");
    }

    #[tokio::test]
    async fn test_parse_precinct_table_from_raw_html() {
        let raw = RawData::Html(page(&HEADER, &sample_rows()));
        let table = parse_precinct_table(raw, &TableSchema::default()).await.unwrap();
        assert_eq!(table.records.len(), 3);
    }
}

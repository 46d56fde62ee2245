//! Fetch functions - load raw election tables and configuration

use crate::ingestion::error::Result;
use crate::ingestion::types::{RawData, TableSchema};
use crate::ingestion::utils::http_get;
use std::path::Path;
use tracing::info;

/// Locate an election results page on disk; the parser reads it
pub async fn load_html(path: &Path) -> Result<RawData> {
    info!("Loading election table from {:?}", path);

    let metadata = tokio::fs::metadata(path).await?;
    info!("Found {} bytes", metadata.len());

    Ok(RawData::File(path.to_path_buf()))
}

/// Fetch an election results page over HTTP
pub async fn fetch_html(url: &str) -> Result<RawData> {
    info!("Fetching election table from {}", url);

    let html = http_get(url).await?;

    Ok(RawData::Html(html))
}

/// Load a header mapping from a JSON file
pub async fn load_schema(path: &Path) -> Result<TableSchema> {
    info!("Loading table schema from {:?}", path);

    let json = tokio::fs::read_to_string(path).await?;
    let schema: TableSchema = serde_json::from_str(&json)?;
    info!("Schema has {} known columns", schema.columns.len());

    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::test_server;
    use crate::ingestion::types::ColumnKind;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_html() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("wahlen.html");
        fs::write(&path, "<table><tr><td>x</td></tr></table>").unwrap();

        match load_html(&path).await.unwrap() {
            RawData::File(found) => assert_eq!(found, path),
            other => panic!("Expected File variant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_html_missing_file() {
        let temp = tempdir().unwrap();
        let result = load_html(&temp.path().join("missing.html")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_schema_roundtrips_default() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("schema.json");
        let schema = TableSchema::heilbronn_2017();
        fs::write(&path, serde_json::to_string(&schema).unwrap()).unwrap();

        let loaded = load_schema(&path).await.unwrap();
        assert_eq!(loaded, schema);
        assert_eq!(loaded.kind_of("SONSTIGE"), ColumnKind::Votes);
    }

    #[tokio::test]
    async fn test_fetch_html_keeps_body_in_memory() {
        let (url, _) =
            test_server::serve(vec![test_server::response(200, "OK", "<table></table>")]).await;

        match fetch_html(&url).await.unwrap() {
            RawData::Html(html) => assert_eq!(html, "<table></table>"),
            other => panic!("Expected Html variant, got {:?}", other),
        }
    }
}

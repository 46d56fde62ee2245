// Library module for testable functions

pub mod ingestion;

/// Build the geocoding query for an address
/// The same string keys the geocode cache, so populate and join must agree on it
pub fn geocode_query(address: &str, suffix: &str) -> String {
    format!("{} {}", address, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_query_appends_suffix() {
        assert_eq!(
            geocode_query("Marktplatz 1", "Heilbronn"),
            "Marktplatz 1 Heilbronn"
        );
    }

    #[test]
    fn test_geocode_query_keeps_address_verbatim() {
        // No trimming or case folding: the cache key must match byte for byte
        assert_eq!(
            geocode_query("Schule am Rosenberg", "Heilbronn"),
            "Schule am Rosenberg Heilbronn"
        );
    }
}

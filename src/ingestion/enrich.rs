//! Enrichment functions - resolve precinct addresses to coordinates

use crate::geocode_query;
use crate::ingestion::error::{IngestionError, Result};
use crate::ingestion::geocode::{GeocodeCache, Geocoder};
use crate::ingestion::types::{PopulateStats, PrecinctRecord};
use std::path::Path;
use tracing::{debug, info};

/// Query the geocoder once per distinct address
/// Aborts on the first address without candidates; nothing is cached in that case
pub async fn build_cache<G: Geocoder>(
    records: &[PrecinctRecord],
    geocoder: &G,
    suffix: &str,
) -> Result<GeocodeCache> {
    let mut cache = GeocodeCache::new();

    for record in records {
        let query = geocode_query(&record.location_address, suffix);
        if cache.contains(&query) {
            debug!("Already resolved '{}' ({})", query, record.location_id);
            continue;
        }

        let candidates = geocoder.geocode(&query).await?;
        if candidates.is_empty() {
            return Err(IngestionError::GeocodeEmptyResult { query });
        }

        debug!("Resolved '{}': {} candidates", query, candidates.len());
        cache.insert(query, candidates);
    }

    Ok(cache)
}

/// Populate the geocode cache for every record and overwrite the cache file
pub async fn resolve_and_cache<G: Geocoder>(
    records: &[PrecinctRecord],
    geocoder: &G,
    suffix: &str,
    cache_path: &Path,
) -> Result<PopulateStats> {
    info!("Geocoding {} precincts", records.len());

    let cache = build_cache(records, geocoder, suffix).await?;
    cache.save(cache_path)?;

    let stats = PopulateStats {
        records: records.len(),
        queries: cache.len(),
    };
    info!("Geocode cache populated: {}", stats);

    Ok(stats)
}

/// Attach cached coordinates to one record
/// Pure function - the cache is never modified
pub fn attach_coordinates(
    record: PrecinctRecord,
    cache: &GeocodeCache,
    suffix: &str,
) -> Result<PrecinctRecord> {
    let query = geocode_query(&record.location_address, suffix);
    let point = cache.lookup(&query)?;

    debug!(
        "Located {} at ({}, {})",
        record.location_id, point.lat, point.lng
    );

    Ok(PrecinctRecord {
        latitude: Some(point.lat),
        longitude: Some(point.lng),
        ..record
    })
}

/// Join every record against the cache file
pub fn join_from_cache(
    records: Vec<PrecinctRecord>,
    cache_path: &Path,
    suffix: &str,
) -> Result<Vec<PrecinctRecord>> {
    let cache = GeocodeCache::load(cache_path)?;
    info!("Joining coordinates onto {} records", records.len());

    let joined = records
        .into_iter()
        .map(|record| attach_coordinates(record, &cache, suffix))
        .collect::<Result<Vec<_>>>()?;

    info!("Join complete: {} records", joined.len());
    Ok(joined)
}

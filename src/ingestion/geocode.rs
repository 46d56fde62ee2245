//! Geocoding collaborator and the persisted address lookup store

use crate::ingestion::error::{IngestionError, Result};
use crate::ingestion::types::Coordinates;
use crate::ingestion::utils::write_atomic;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GOOGLE_GEOCODING_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Address lookup service
///
/// Returns the ranked candidate list verbatim; an empty list means no match.
#[allow(async_fn_in_trait)]
pub trait Geocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<Value>>;
}

#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    pub endpoint: String,
    pub api_key: String,
    /// Region bias, e.g. "de"
    pub region: Option<String>,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl GeocoderSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeocoderSettings {
            endpoint: GOOGLE_GEOCODING_ENDPOINT.to_string(),
            api_key: api_key.into(),
            region: None,
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    client: Client,
    settings: GeocoderSettings,
}

impl GoogleGeocoder {
    pub fn new(settings: GeocoderSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(IngestionError::Config(
                "geocoding API key is empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(GoogleGeocoder { client, settings })
    }

    async fn request_once(&self, query: &str) -> Result<Vec<Value>> {
        let mut params = vec![
            ("address", query),
            ("key", self.settings.api_key.as_str()),
        ];
        if let Some(region) = &self.settings.region {
            params.push(("region", region.as_str()));
        }

        let response = self
            .client
            .get(&self.settings.endpoint)
            .query(&params)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(IngestionError::Collaborator {
                message: format!("HTTP {} for '{}'", status, query),
                retryable: status.is_server_error(),
            });
        }

        let body: GeocodeResponse = response.json().await?;
        interpret_response(body)
    }
}

impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<Value>> {
        let mut attempt = 1;
        loop {
            match self.request_once(query).await {
                Ok(candidates) => return Ok(candidates),
                Err(e) if e.is_retryable() && attempt < self.settings.max_attempts => {
                    let delay = backoff_delay(self.settings.backoff, attempt);
                    warn!(
                        "Geocoding '{}' failed (attempt {}/{}): {}; retrying in {:?}",
                        query, attempt, self.settings.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before retrying after the given failed attempt (1-based): base * 2^(attempt-1), capped
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);

    base.checked_mul(factor)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// Geocoding API response envelope
#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<Value>,
    pub error_message: Option<String>,
}

/// Map the API status field onto candidates or a collaborator error
pub fn interpret_response(response: GeocodeResponse) -> Result<Vec<Value>> {
    let retryable = match response.status.as_str() {
        "OK" => return Ok(response.results),
        "ZERO_RESULTS" => return Ok(Vec::new()),
        "UNKNOWN_ERROR" => true,
        _ => false,
    };

    let message = match response.error_message {
        Some(detail) => format!("{}: {}", response.status, detail),
        None => response.status,
    };

    Err(IngestionError::Collaborator { message, retryable })
}

/// Query string -> raw candidate list, as returned by the geocoder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeocodeCache {
    entries: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query: String, candidates: Vec<Value>) {
        self.entries.insert(query, candidates);
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains_key(query)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point of the first candidate for a query
    pub fn lookup(&self, query: &str) -> Result<Coordinates> {
        let candidates = self
            .entries
            .get(query)
            .ok_or_else(|| IngestionError::CacheMiss {
                query: query.to_string(),
            })?;

        let first = candidates
            .first()
            .ok_or_else(|| IngestionError::MalformedCacheEntry {
                query: query.to_string(),
                reason: "no candidates".to_string(),
            })?;

        let candidate: Candidate = serde_json::from_value(first.clone()).map_err(|e| {
            IngestionError::MalformedCacheEntry {
                query: query.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(candidate.geometry.location)
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading geocode cache from {:?}", path);

        let json = std::fs::read_to_string(path)?;
        let cache: GeocodeCache = serde_json::from_str(&json)?;

        info!("Loaded {} cached addresses", cache.len());
        Ok(cache)
    }

    /// Overwrite the cache file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        write_atomic(path, &json)?;

        debug!("Saved {} cached addresses", self.len());
        info!("Geocode cache written to {:?}", path);
        Ok(())
    }
}

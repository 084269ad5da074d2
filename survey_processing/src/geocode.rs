//! Resolution of organization addresses to coordinates.
//!
//! For each address the pipeline tries, in order, and stops at the first answer:
//! 1. the cache (which also remembers the addresses known to be unresolvable),
//! 2. the override table of curated coordinates,
//! 3. the external lookup with the full address,
//! 4. the external lookup without the zip code, after a pause.
//!
//! When everything fails, the failure itself is cached.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::Display;
use std::time::Duration;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use crate::config::*;

/// Pause between two requests to the external service. The service does not
/// tolerate a faster pace.
pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

static SUITE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:Suite|Ste)\b\.?\s*[A-Za-z0-9#\-]*").unwrap());
// A unit number glued to the previous word, as in "Ave#205". "Ave # 205" is kept.
static UNIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b#\s*[A-Za-z0-9\-]+").unwrap());
static FLOOR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bFloor\s*\d+").unwrap());
static AND_AT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Za-z\s]+ and at ").unwrap());

/// Strips the suite, unit and floor parts of a street address.
///
/// Returns `None` when the street or the zip code is missing: such an
/// address cannot be geocoded.
///
/// ```
/// use survey_processing::geocode::clean_address;
///
/// assert_eq!(
///     clean_address("123 Main St, Suite 400", "90001"),
///     Some("123 Main St".to_string())
/// );
/// assert_eq!(clean_address("123 Main St", ""), None);
/// ```
pub fn clean_address(street: &str, zip_code: &str) -> Option<String> {
    let street = street.trim();
    if street.is_empty() || zip_code.trim().is_empty() {
        return None;
    }
    let s = SUITE_PATTERN.replace_all(street, "");
    let s = UNIT_PATTERN.replace_all(&s, "");
    let s = FLOOR_PATTERN.replace_all(&s, "");
    let s = AND_AT_PATTERN.replace(&s, "");
    let s = s
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .replace(" ,", ",");
    Some(s.trim().trim_matches(',').trim().to_string())
}

/// The result of a cache lookup.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum CacheLookup {
    Found(Coordinates),
    /// The address was already tried and could not be resolved.
    NotFound,
    /// The address was never tried.
    Uncached,
}

/// Address -> coordinates cache, persisted between runs.
///
/// A `None` value is a negative entry: the address is known to be
/// unresolvable and must not be looked up again.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeocodeCache {
    entries: BTreeMap<String, Option<Coordinates>>,
}

impl GeocodeCache {
    pub fn new() -> GeocodeCache {
        GeocodeCache::default()
    }

    pub fn lookup(&self, key: &str) -> CacheLookup {
        match self.entries.get(key) {
            Some(Some(c)) => CacheLookup::Found(*c),
            Some(None) => CacheLookup::NotFound,
            None => CacheLookup::Uncached,
        }
    }

    pub fn insert_found(&mut self, key: &str, coordinates: Coordinates) {
        self.entries.insert(key.to_string(), Some(coordinates));
    }

    pub fn insert_not_found(&mut self, key: &str) {
        self.entries.insert(key.to_string(), None);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A curated address with known coordinates, as stored in the override file.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub address: String,
    pub coordinates: Coordinates,
}

/// Addresses that the external service cannot resolve, with their coordinates.
///
/// Keys are matched exactly against the full and the city-only query strings.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, Coordinates>,
}

impl OverrideTable {
    /// Builds the table. Every address must appear once and every coordinate
    /// must be a valid latitude / longitude.
    pub fn from_entries(entries: &[OverrideEntry]) -> Result<OverrideTable, GeocodeErrors> {
        let mut res: HashMap<String, Coordinates> = HashMap::new();
        for e in entries.iter() {
            let c = e.coordinates;
            if !(-90.0..=90.0).contains(&c.lat) || !(-180.0..=180.0).contains(&c.lon) {
                return Err(GeocodeErrors::InvalidOverride {
                    address: e.address.clone(),
                    coordinates: c,
                });
            }
            if res.insert(e.address.clone(), c).is_some() {
                return Err(GeocodeErrors::DuplicateOverride {
                    address: e.address.clone(),
                });
            }
        }
        debug!("OverrideTable::from_entries: {} entries", res.len());
        Ok(OverrideTable { entries: res })
    }

    pub fn get(&self, address: &str) -> Option<Coordinates> {
        self.entries.get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One candidate returned by the external service.
#[derive(PartialEq, Debug, Clone)]
pub struct LookupMatch {
    pub coordinates: Coordinates,
    /// The administrative state of the match, if the service reports it.
    pub state: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LookupFailure {
    /// The request could not be sent or the answer could not be read.
    Transport(String),
    /// The service answered with a non-success status.
    Status(u16),
    InvalidResponse(String),
}

impl Error for LookupFailure {}

impl Display for LookupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            LookupFailure::Status(code) => write!(f, "HTTP error status: {}", code),
            LookupFailure::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
        }
    }
}

/// A free-text address search service.
pub trait AddressLookup {
    fn search(&mut self, query: &str) -> Result<Vec<LookupMatch>, LookupFailure>;
}

/// Waits between requests.
pub trait Throttle {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Throttle for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// The strings derived from one address.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AddressQueries {
    pub cache_key: String,
    /// Street, city, state and zip code.
    pub full: String,
    /// Street, city and state.
    pub city_only: String,
}

impl AddressQueries {
    pub fn new(cleaned_street: &str, zip_code: &str, settings: &GeocodeSettings) -> AddressQueries {
        let city_only = format!(
            "{}, {}, {}",
            cleaned_street, settings.city, settings.state_code
        );
        let full = format!("{}, {}", city_only, zip_code.trim());
        AddressQueries {
            cache_key: full.to_lowercase(),
            full,
            city_only,
        }
    }
}

/// The cache key of an address, if it can be geocoded at all.
pub fn cache_key(street: &str, zip_code: &str, settings: &GeocodeSettings) -> Option<String> {
    clean_address(street, zip_code).map(|s| AddressQueries::new(&s, zip_code, settings).cache_key)
}

/// How an address was resolved, or why it was not.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum GeocodeOutcome {
    /// No street or no zip code. Nothing is cached.
    MissingAddress,
    Cached(Coordinates),
    /// The cache records a previous failure.
    CachedFailure,
    Override(Coordinates),
    Resolved {
        coordinates: Coordinates,
        /// True if the query without the zip code was needed.
        fallback: bool,
    },
    /// Both lookups failed. The failure is now cached.
    Failed,
}

impl GeocodeOutcome {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            GeocodeOutcome::Cached(c) | GeocodeOutcome::Override(c) => Some(*c),
            GeocodeOutcome::Resolved { coordinates, .. } => Some(*coordinates),
            _ => None,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(
            self,
            GeocodeOutcome::Cached(_) | GeocodeOutcome::CachedFailure
        )
    }
}

/// Counters accumulated by a pipeline over its lifetime.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub cache_hits: u32,
    pub override_hits: u32,
    /// Requests sent to the external service.
    pub queries: u32,
    pub resolved: u32,
    pub failed: u32,
    pub missing_address: u32,
}

/// The geocoding state machine. The cache is not owned by the pipeline: it
/// is passed to every call.
pub struct GeocodePipeline<L: AddressLookup, T: Throttle> {
    settings: GeocodeSettings,
    overrides: OverrideTable,
    lookup: L,
    throttle: T,
    stats: PipelineStats,
}

impl<L: AddressLookup, T: Throttle> GeocodePipeline<L, T> {
    pub fn new(
        settings: &GeocodeSettings,
        overrides: OverrideTable,
        lookup: L,
        throttle: T,
    ) -> GeocodePipeline<L, T> {
        GeocodePipeline {
            settings: settings.clone(),
            overrides,
            lookup,
            throttle,
            stats: PipelineStats::default(),
        }
    }

    pub fn settings(&self) -> &GeocodeSettings {
        &self.settings
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn throttle(&self) -> &T {
        &self.throttle
    }

    /// Waits the rate limit delay between two records.
    pub fn pause_between_records(&mut self) {
        self.throttle.pause(RATE_LIMIT_DELAY);
    }

    pub fn geocode(
        &mut self,
        cache: &mut GeocodeCache,
        street: &str,
        zip_code: &str,
        org_name: &str,
    ) -> GeocodeOutcome {
        let cleaned = match clean_address(street, zip_code) {
            Some(s) => s,
            None => {
                info!("geocode: skipping {}: missing address or zip", org_name);
                self.stats.missing_address += 1;
                return GeocodeOutcome::MissingAddress;
            }
        };
        let q = AddressQueries::new(&cleaned, zip_code, &self.settings);
        debug!("geocode: {}: queries {:?}", org_name, q);

        match cache.lookup(&q.cache_key) {
            CacheLookup::Found(c) => {
                info!("geocode: using cached coordinates for {}", org_name);
                self.stats.cache_hits += 1;
                return GeocodeOutcome::Cached(c);
            }
            CacheLookup::NotFound => {
                info!("geocode: {} is cached as unresolvable", org_name);
                self.stats.cache_hits += 1;
                self.stats.failed += 1;
                return GeocodeOutcome::CachedFailure;
            }
            CacheLookup::Uncached => {}
        }

        let overridden = self
            .overrides
            .get(&q.full)
            .or_else(|| self.overrides.get(&q.city_only));
        if let Some(c) = overridden {
            info!("geocode: using override coordinates for {}", org_name);
            cache.insert_found(&q.cache_key, c);
            self.stats.override_hits += 1;
            return GeocodeOutcome::Override(c);
        }

        if let Some(c) = self.search_in_state(&q.full, org_name) {
            info!("geocode: geocoded {}: {}, {}", org_name, c.lat, c.lon);
            cache.insert_found(&q.cache_key, c);
            self.stats.resolved += 1;
            return GeocodeOutcome::Resolved {
                coordinates: c,
                fallback: false,
            };
        }

        info!("geocode: trying fallback for {}", org_name);
        self.throttle.pause(RATE_LIMIT_DELAY);
        if let Some(c) = self.search_in_state(&q.city_only, org_name) {
            info!("geocode: geocoded {} (fallback): {}, {}", org_name, c.lat, c.lon);
            cache.insert_found(&q.cache_key, c);
            self.stats.resolved += 1;
            return GeocodeOutcome::Resolved {
                coordinates: c,
                fallback: true,
            };
        }

        warn!("geocode: failed to geocode {}: {}", org_name, q.full);
        cache.insert_not_found(&q.cache_key);
        self.stats.failed += 1;
        GeocodeOutcome::Failed
    }

    // The first match located in the accepted state, if any.
    fn search_in_state(&mut self, query: &str, org_name: &str) -> Option<Coordinates> {
        self.stats.queries += 1;
        match self.lookup.search(query) {
            Ok(matches) => {
                debug!("search_in_state: {:?}: {:?}", query, matches);
                matches
                    .iter()
                    .find(|m| m.state.as_deref() == Some(self.settings.accepted_state.as_str()))
                    .map(|m| m.coordinates)
            }
            Err(e) => {
                warn!("search_in_state: error geocoding {}: {}", org_name, e);
                None
            }
        }
    }
}

//! Geocoding of all the surveyed organizations, and the map document.

use log::{debug, info};
use serde::Serialize;

use crate::geocode::{AddressLookup, GeocodeCache, GeocodeOutcome, GeocodePipeline, Throttle};
use crate::normalize::{clean_spa, UNKNOWN};
pub use crate::config::*;

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct Contact {
    pub email: String,
    pub name: String,
}

/// An organization placed on the map.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedOrganization {
    pub id: String,
    pub name: String,
    pub sector: String,
    /// The street as entered, before cleaning.
    pub address: String,
    pub zip_code: String,
    pub coordinates: Coordinates,
    pub primary_district: String,
    pub other_districts: String,
    #[serde(rename = "primarySPA")]
    pub primary_spa: String,
    #[serde(rename = "additionalSPAs")]
    pub additional_spas: String,
    pub mission: String,
    pub primary_activity: String,
    pub website: String,
    pub contact: Contact,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMetadata {
    pub total_organizations: usize,
    pub geocoded_organizations: usize,
    pub failed_geocode: usize,
    /// Percentage with one decimal, "0.0" when there is no organization.
    pub success_rate: String,
    pub last_updated: String,
    /// Distinct primary districts of the geocoded organizations.
    pub districts: Vec<String>,
    /// Distinct sectors of the geocoded organizations.
    pub sectors: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct OutputDocument {
    pub organizations: Vec<GeocodedOrganization>,
    pub metadata: OutputMetadata,
}

/// An organization that could not be placed on the map.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct FailedOrganization {
    pub name: String,
    pub street: String,
    pub zip_code: String,
    /// True when the address or the zip code is missing.
    pub missing_address: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct BatchStats {
    pub processed: usize,
    pub cache_hits: usize,
    pub override_hits: usize,
    pub resolved: usize,
    pub fallback_resolved: usize,
    pub failed: usize,
    pub missing_address: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct BatchReport {
    pub document: OutputDocument,
    pub failures: Vec<FailedOrganization>,
    pub stats: BatchStats,
}

fn or_unknown(s: &str) -> String {
    if s.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        s.to_string()
    }
}

fn push_distinct(v: &mut Vec<String>, s: &str) {
    if !v.iter().any(|x| x == s) {
        v.push(s.to_string());
    }
}

/// Percentage of successes, with one decimal.
pub fn success_rate(geocoded: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", (geocoded as f64) * 100.0 / (total as f64))
}

/// Geocodes every record in order and builds the map document.
///
/// The pipeline waits between two consecutive records, whatever the outcome
/// of the first one. The cache is updated in place: the caller persists it.
pub fn geocode_records<L: AddressLookup, T: Throttle>(
    records: &[SurveyRecord],
    columns: &SurveyColumns,
    pipeline: &mut GeocodePipeline<L, T>,
    cache: &mut GeocodeCache,
    last_updated: &str,
) -> BatchReport {
    let mut organizations: Vec<GeocodedOrganization> = Vec::new();
    let mut failures: Vec<FailedOrganization> = Vec::new();
    let mut stats = BatchStats::default();
    let mut districts: Vec<String> = Vec::new();
    let mut sectors: Vec<String> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let name = or_unknown(record.get(&columns.organization_name));
        let street = record.get(&columns.street);
        let zip_code = record.get(&columns.zip_code);
        info!(
            "geocode_records: processing {}/{}: {}",
            idx + 1,
            records.len(),
            name
        );
        stats.processed += 1;

        let outcome = pipeline.geocode(cache, street, zip_code, &name);
        debug!("geocode_records: {}: {:?}", name, outcome);
        match outcome {
            GeocodeOutcome::Cached(_) | GeocodeOutcome::CachedFailure => stats.cache_hits += 1,
            GeocodeOutcome::Override(_) => stats.override_hits += 1,
            GeocodeOutcome::Resolved { fallback, .. } => {
                stats.resolved += 1;
                if fallback {
                    stats.fallback_resolved += 1;
                }
            }
            GeocodeOutcome::Failed => {}
            GeocodeOutcome::MissingAddress => stats.missing_address += 1,
        }

        match outcome.coordinates() {
            Some(coordinates) => {
                let org = GeocodedOrganization {
                    id: format!("org-{}", idx),
                    name,
                    sector: or_unknown(record.get(&columns.sector)),
                    address: street.to_string(),
                    zip_code: zip_code.to_string(),
                    coordinates,
                    primary_district: or_unknown(record.get(&columns.primary_district)),
                    other_districts: record.get(&columns.served_districts).to_string(),
                    primary_spa: clean_spa(record.get(&columns.primary_spa)),
                    additional_spas: clean_spa(record.get(&columns.additional_spas)),
                    mission: record.get(&columns.mission).to_string(),
                    primary_activity: record.get(&columns.primary_activity).to_string(),
                    website: record.get(&columns.website).to_string(),
                    contact: Contact {
                        email: record.get(&columns.email).to_string(),
                        name: record.get(&columns.contact_name).to_string(),
                    },
                };
                push_distinct(&mut districts, &org.primary_district);
                push_distinct(&mut sectors, &org.sector);
                organizations.push(org);
            }
            None => {
                stats.failed += 1;
                failures.push(FailedOrganization {
                    name,
                    street: street.to_string(),
                    zip_code: zip_code.to_string(),
                    missing_address: outcome == GeocodeOutcome::MissingAddress,
                });
            }
        }

        if idx + 1 < records.len() {
            pipeline.pause_between_records();
        }
    }

    let metadata = OutputMetadata {
        total_organizations: records.len(),
        geocoded_organizations: organizations.len(),
        failed_geocode: failures.len(),
        success_rate: success_rate(organizations.len(), records.len()),
        last_updated: last_updated.to_string(),
        districts,
        sectors,
    };
    info!(
        "geocode_records: {} of {} organizations geocoded ({}%)",
        metadata.geocoded_organizations, metadata.total_organizations, metadata.success_rate
    );
    BatchReport {
        document: OutputDocument {
            organizations,
            metadata,
        },
        failures,
        stats,
    }
}

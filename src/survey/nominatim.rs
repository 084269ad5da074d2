//! Address lookup with the OpenStreetMap Nominatim search service.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use survey_processing::geocode::{AddressLookup, LookupFailure, LookupMatch};

use crate::survey::*;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
/// The service requires an identifying user agent.
pub const DEFAULT_USER_AGENT: &str = "FoodSystemsStakeholderSurvey/1.0 (contact@example.com)";

#[derive(Deserialize, Debug)]
struct SearchResult {
    lat: String,
    lon: String,
    #[serde(default)]
    address: Option<SearchAddress>,
}

#[derive(Deserialize, Debug)]
struct SearchAddress {
    state: Option<String>,
}

pub struct NominatimClient {
    client: Client,
    endpoint: String,
}

impl NominatimClient {
    pub fn new(endpoint: &str, user_agent: &str) -> BSurveyResult<NominatimClient> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(NominatimClient {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

fn to_matches(results: Vec<SearchResult>) -> Result<Vec<LookupMatch>, LookupFailure> {
    let mut res: Vec<LookupMatch> = Vec::new();
    for r in results {
        let lat = r.lat.trim().parse::<f64>();
        let lon = r.lon.trim().parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => res.push(LookupMatch {
                coordinates: Coordinates { lat, lon },
                state: r.address.and_then(|a| a.state),
            }),
            _ => {
                return Err(LookupFailure::InvalidResponse(format!(
                    "coordinates {:?}, {:?}",
                    r.lat, r.lon
                )))
            }
        }
    }
    Ok(res)
}

impl AddressLookup for NominatimClient {
    fn search(&mut self, query: &str) -> Result<Vec<LookupMatch>, LookupFailure> {
        debug!("NominatimClient::search: {:?}", query);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("q", query),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .map_err(|e| LookupFailure::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LookupFailure::Status(status.as_u16()));
        }
        let results: Vec<SearchResult> = resp
            .json()
            .map_err(|e| LookupFailure::InvalidResponse(e.to_string()))?;
        to_matches(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<Vec<LookupMatch>, LookupFailure> {
        to_matches(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn search_results() {
        let body = r#"[{"place_id": 1, "lat": "34.0522", "lon": "-118.2437",
                        "display_name": "Los Angeles",
                        "address": {"city": "Los Angeles", "state": "California"}}]"#;
        let m = parse(body).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(
            m[0].coordinates,
            Coordinates {
                lat: 34.0522,
                lon: -118.2437
            }
        );
        assert_eq!(m[0].state.as_deref(), Some("California"));
    }

    #[test]
    fn results_without_state() {
        let m = parse(r#"[{"lat": "1", "lon": "2"}]"#).unwrap();
        assert_eq!(m[0].state, None);
        assert!(parse("[]").unwrap().is_empty());
    }

    #[test]
    fn bad_coordinates() {
        assert!(matches!(
            parse(r#"[{"lat": "north", "lon": "2"}]"#),
            Err(LookupFailure::InvalidResponse(_))
        ));
    }
}

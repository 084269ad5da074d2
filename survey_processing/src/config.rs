// ********* Input data structures ***********

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One respondent organization, as read from a row of the survey export.
///
/// The keys of `fields` are normalized column identifiers (see
/// [`crate::builder::normalize_header`]). Records are never mutated after parsing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SurveyRecord {
    /// Position of the record in the parsed sequence. Used as the organization id.
    pub index: usize,
    /// Line of the source sheet (1-based, header included).
    pub line: usize,
    pub fields: HashMap<String, String>,
}

impl SurveyRecord {
    /// The value of a column, or the empty string when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(|s| s.as_str()).unwrap_or("")
    }
}

/// The normalized identifiers of the survey columns read by the processor
/// and by the geocoding batch.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyColumns {
    pub organization_name: String,
    pub sector: String,
    pub primary_district: String,
    pub served_districts: String,
    pub goals: String,
    pub objectives: String,
    pub activities: String,
    pub primary_goal: String,
    pub challenges: String,
    pub capacity_needs: String,
    pub website: String,
    pub street: String,
    pub zip_code: String,
    pub mission: String,
    pub primary_activity: String,
    pub primary_spa: String,
    pub additional_spas: String,
    pub email: String,
    pub contact_name: String,
}

impl Default for SurveyColumns {
    /// The columns of the food system stakeholder survey export.
    fn default() -> Self {
        SurveyColumns {
            organization_name: "Organization_Name".to_string(),
            sector: "Sector".to_string(),
            primary_district: "Primary_Supervisorial_District__based_on_headquarters_address_"
                .to_string(),
            served_districts: "Other_Supervisorial_District_s__Served__all_districts_where_programs_and_services_are_provided_".to_string(),
            goals: "Which_of_the_following_LA_County_Roundtable_Action_Plan_GOALS_does_your_organization_help_advance__mark_all_that_apply_".to_string(),
            objectives: "Which_of_the_following_LA_County_Roundtable_Action_Plan_OBJECTIVES_does_your_organization_help_advance__mark_all_that_apply_".to_string(),
            activities: "How_would_you_describe_the_activities_of_your_organization_check_all_that_apply_as_related_to_the_food_system_".to_string(),
            primary_goal: "If_you_had_to_choose_the_goal_MOST_aligned_with_your_organization__which_one_would_it_be_".to_string(),
            challenges: "What_are_the_biggest_challenges_your_organization_faces_in_collaborating_with_others_in_the_food_system__Select_up_to_3_".to_string(),
            capacity_needs: "What_types_of_capacity_building_tools_or_support_would_be_most_helpful__Select_up_to_3_".to_string(),
            website: "Website".to_string(),
            street: "Main_Org_Street_Address__headquarters_".to_string(),
            zip_code: "Main_Org_Zip_Code".to_string(),
            mission: "Organization_Mission_Statement".to_string(),
            primary_activity: "Provide_one_sentence_descriptor_of_your_primary_activity".to_string(),
            primary_spa: "Primary_SPA__service_planning_area__Based_on_headquarters_address_"
                .to_string(),
            additional_spas: "Additional_SPA_s___service_planning_area__Served__all_districts_where_programs_and_services_are_provided____Mark_any_or_all".to_string(),
            email: "Email_Address".to_string(),
            contact_name: "Your_Name__First_Last_".to_string(),
        }
    }
}

// ******** Output data structures *********

/// Counts of tokens, in order of first appearance.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct TokenCounts(pub Vec<(String, u64)>);

impl TokenCounts {
    pub fn get(&self, token: &str) -> Option<u64> {
        self.0.iter().find(|(t, _)| t == token).map(|(_, c)| *c)
    }

    pub fn add(&mut self, token: &str, count: u64) {
        match self.0.iter_mut().find(|(t, _)| t == token) {
            Some((_, c)) => *c += count,
            None => self.0.push((token.to_string(), count)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Serialized as a JSON object, keeping the insertion order.
impl Serialize for TokenCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (token, count) in self.0.iter() {
            map.serialize_entry(token, count)?;
        }
        map.end()
    }
}

/// The derived view of one organization, as used by the network chart.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedOrganization {
    pub id: usize,
    pub name: String,
    pub sector: String,
    pub district: String,
    pub scope: Scope,
    pub goals: Vec<String>,
    pub activities: Vec<String>,
    pub primary_goal: String,
    pub challenges: Vec<String>,
    pub website: String,
    pub size: u32,
}

/// Geographic reach of an organization, from its list of served districts.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize)]
pub enum Scope {
    #[serde(rename = "Single District")]
    SingleDistrict,
    #[serde(rename = "Multi-District")]
    MultiDistrict,
    #[serde(rename = "Countywide")]
    Countywide,
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::SingleDistrict => "Single District",
            Scope::MultiDistrict => "Multi-District",
            Scope::Countywide => "Countywide",
        };
        write!(f, "{}", s)
    }
}

/// Undirected link between two organizations (source < target).
///
/// Invariant: `strength = 2 * shared_goals + shared_activities >= 3`.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityLink {
    pub source: usize,
    pub target: usize,
    pub strength: u32,
    pub shared_goals: u32,
    pub shared_activities: u32,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct NetworkData {
    pub nodes: Vec<NormalizedOrganization>,
    pub links: Vec<SimilarityLink>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub name: String,
    pub value: u64,
    pub full_name: String,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct GoalHierarchy {
    pub name: String,
    pub children: Vec<HierarchyNode>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct MatrixCell {
    pub activity: String,
    pub value: u8,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct MatrixRow {
    pub organization: String,
    pub sector: String,
    pub activities: Vec<MatrixCell>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct ActivityMatrix {
    pub matrix: Vec<MatrixRow>,
    /// All the distinct activities, sorted.
    pub activities: Vec<String>,
}

/// Counts of the tokens of a multi-select field, overall and per sector.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct CategoryBreakdown {
    pub counts: TokenCounts,
    /// Sector -> counts. Every sector seen has an entry, possibly empty.
    pub by_sector: Vec<(String, TokenCounts)>,
}

impl CategoryBreakdown {
    pub fn sector(&self, sector: &str) -> Option<&TokenCounts> {
        self.by_sector
            .iter()
            .find(|(s, _)| s == sector)
            .map(|(_, c)| c)
    }
}

/// Aggregated cross-district service relation.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
pub struct Flow {
    pub source: String,
    pub target: String,
    pub value: u64,
    pub organizations: Vec<String>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_organizations: usize,
    pub sector_breakdown: TokenCounts,
    pub district_breakdown: TokenCounts,
}

/// Non-fatal problems found while reading a sheet. They are reported to the
/// caller, which decides how to surface them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ParseIssue {
    /// The expected sheet was not found and another one was used instead.
    SheetFallback { expected: String, used: String },
    /// No column carries the organization name: no record can be produced.
    MissingNameColumn { column: String },
}

impl Display for ParseIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseIssue::SheetFallback { expected, used } => {
                write!(f, "sheet {:?} not found, used {:?} instead", expected, used)
            }
            ParseIssue::MissingNameColumn { column } => {
                write!(f, "no column {:?} in the header: no record parsed", column)
            }
        }
    }
}

/// Errors that prevent a sheet from being read at all.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SurveyDataErrors {
    /// The workbook does not contain any sheet.
    NoSheet,
    /// Rows were added before a header.
    MissingHeader,
}

impl Error for SurveyDataErrors {}

impl Display for SurveyDataErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyDataErrors::NoSheet => write!(f, "the workbook does not contain any sheet"),
            SurveyDataErrors::MissingHeader => write!(f, "no header row before the data rows"),
        }
    }
}

// ********* Geocoding **********

/// A latitude / longitude pair.
#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl From<[f64; 2]> for Coordinates {
    fn from(p: [f64; 2]) -> Self {
        Coordinates { lat: p[0], lon: p[1] }
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lat, c.lon]
    }
}

/// Settings of the geocoding pipeline that depend on the surveyed region.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GeocodeSettings {
    /// Appended to every street to build the queries.
    pub city: String,
    pub state_code: String,
    /// The only administrative state accepted in a lookup result.
    pub accepted_state: String,
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        GeocodeSettings {
            city: "Los Angeles".to_string(),
            state_code: "CA".to_string(),
            accepted_state: "California".to_string(),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum GeocodeErrors {
    /// The same address appears more than once in the override table.
    DuplicateOverride { address: String },
    /// An override has coordinates outside of the valid ranges.
    InvalidOverride { address: String, coordinates: Coordinates },
}

impl Error for GeocodeErrors {}

impl Display for GeocodeErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeocodeErrors::DuplicateOverride { address } => {
                write!(f, "duplicate override for address {:?}", address)
            }
            GeocodeErrors::InvalidOverride {
                address,
                coordinates,
            } => write!(
                f,
                "invalid coordinates [{}, {}] for override {:?}",
                coordinates.lat, coordinates.lon, address
            ),
        }
    }
}

// The data document of the dashboard charts.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::survey::*;

/// All the data of the dashboard charts.
///
/// Every count map is written in order of first appearance in the survey.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChartsDocument {
    pub network: NetworkData,
    pub goals: GoalHierarchy,
    pub objectives: TokenCounts,
    pub activity_matrix: ActivityMatrix,
    #[serde(serialize_with = "serialize_challenges")]
    pub challenges: CategoryBreakdown,
    #[serde(serialize_with = "serialize_capacity_needs")]
    pub capacity_needs: CategoryBreakdown,
    pub flows: Vec<Flow>,
    pub summary: SummaryStats,
}

struct BySector<'a>(&'a [(String, TokenCounts)]);

impl<'a> Serialize for BySector<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (sector, counts) in self.0.iter() {
            map.serialize_entry(sector, counts)?;
        }
        map.end()
    }
}

fn serialize_breakdown<S: Serializer>(
    b: &CategoryBreakdown,
    counts_key: &'static str,
    by_sector_key: &'static str,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry(counts_key, &b.counts)?;
    map.serialize_entry(by_sector_key, &BySector(&b.by_sector))?;
    map.end()
}

fn serialize_challenges<S: Serializer>(b: &CategoryBreakdown, s: S) -> Result<S::Ok, S::Error> {
    serialize_breakdown(b, "challengeCounts", "challengesBySector", s)
}

fn serialize_capacity_needs<S: Serializer>(
    b: &CategoryBreakdown,
    s: S,
) -> Result<S::Ok, S::Error> {
    serialize_breakdown(b, "needsCounts", "needsBySector", s)
}

pub fn build_charts_document(processor: &SurveyDataProcessor) -> ChartsDocument {
    ChartsDocument {
        network: processor.network_data(),
        goals: processor.goal_alignment_data(),
        objectives: processor.objective_counts(),
        activity_matrix: processor.activity_matrix_data(),
        challenges: processor.challenges_data(),
        capacity_needs: processor.capacity_needs_data(),
        flows: processor.geographic_flow_data(),
        summary: processor.summary_stats(),
    }
}

pub fn read_reference(path: &str) -> SurveyResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

/// Compares the generated document with a reference document and prints the
/// differences.
///
/// The documents are compared as JSON values, so the order of the keys does not matter.
pub fn check_reference(reference_path: &str, document: &ChartsDocument) -> SurveyResult<()> {
    let reference = read_reference(reference_path)?;
    let js = serde_json::to_value(document).context(SerializingJsonSnafu {})?;
    if reference != js {
        warn!("check_reference: found differences with {}", reference_path);
        let pretty_reference =
            serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {})?;
        let pretty_js = serde_json::to_string_pretty(&js).context(SerializingJsonSnafu {})?;
        print_diff(pretty_reference.as_str(), pretty_js.as_str(), "\n");
        whatever!("Difference detected between the chart data and the reference")
    }
    info!("check_reference: output matches {}", reference_path);
    Ok(())
}

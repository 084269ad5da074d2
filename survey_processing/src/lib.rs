mod config;
pub mod batch;
pub mod builder;
pub mod geocode;
pub mod manual;
pub mod normalize;

use log::{debug, info};

use std::collections::BTreeSet;

pub use crate::config::*;
use crate::normalize::*;

/// A served district as read from one record, before aggregation.
#[derive(Eq, PartialEq, Debug, Clone)]
struct RawFlow {
    source: String,
    target: String,
    value: u64,
    organization: String,
}

/// The chart data shapes, derived from the parsed survey records.
///
/// The records are read once and never mutated: every method recomputes its
/// shape from them.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct SurveyDataProcessor {
    columns: SurveyColumns,
    records: Vec<SurveyRecord>,
    issues: Vec<ParseIssue>,
}

impl SurveyDataProcessor {
    pub fn new(
        records: Vec<SurveyRecord>,
        columns: &SurveyColumns,
        issues: Vec<ParseIssue>,
    ) -> SurveyDataProcessor {
        SurveyDataProcessor {
            columns: columns.clone(),
            records,
            issues,
        }
    }

    pub fn records(&self) -> &[SurveyRecord] {
        &self.records
    }

    pub fn columns(&self) -> &SurveyColumns {
        &self.columns
    }

    /// The problems found while reading the sheet.
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    fn multi_select(&self, record: &SurveyRecord, column: &str) -> Vec<String> {
        parse_multi_select(record.get(column))
    }

    fn name(&self, record: &SurveyRecord) -> String {
        let name = record.get(&self.columns.organization_name);
        if name.is_empty() {
            UNKNOWN.to_string()
        } else {
            name.to_string()
        }
    }

    fn sector(&self, record: &SurveyRecord) -> String {
        normalize_sector(record.get(&self.columns.sector))
    }

    fn district(&self, record: &SurveyRecord) -> String {
        extract_primary_district(record.get(&self.columns.primary_district))
    }

    pub fn normalize(&self, record: &SurveyRecord) -> NormalizedOrganization {
        let activities = self.multi_select(record, &self.columns.activities);
        let served = self.multi_select(record, &self.columns.served_districts);
        NormalizedOrganization {
            id: record.index,
            name: self.name(record),
            sector: self.sector(record),
            district: self.district(record),
            scope: calculate_scope(&served),
            goals: self.multi_select(record, &self.columns.goals),
            size: calculate_node_size(activities.len(), served.len()),
            activities,
            primary_goal: record.get(&self.columns.primary_goal).to_string(),
            challenges: self.multi_select(record, &self.columns.challenges),
            website: record.get(&self.columns.website).to_string(),
        }
    }

    /// Nodes and similarity links of the force-directed network.
    pub fn network_data(&self) -> NetworkData {
        let nodes: Vec<NormalizedOrganization> =
            self.records.iter().map(|r| self.normalize(r)).collect();
        let links = generate_links(&nodes);
        info!(
            "network_data: {} nodes, {} links",
            nodes.len(),
            links.len()
        );
        NetworkData { nodes, links }
    }

    /// Number of organizations advancing each goal, as a one-level hierarchy.
    pub fn goal_alignment_data(&self) -> GoalHierarchy {
        let mut goal_counts = TokenCounts::default();
        for r in self.records.iter() {
            for goal in self.multi_select(r, &self.columns.goals) {
                goal_counts.add(&goal, 1);
            }
        }
        build_hierarchy(&goal_counts)
    }

    /// Number of organizations advancing each action plan objective.
    pub fn objective_counts(&self) -> TokenCounts {
        let mut counts = TokenCounts::default();
        for r in self.records.iter() {
            for objective in self.multi_select(r, &self.columns.objectives) {
                counts.add(&objective, 1);
            }
        }
        counts
    }

    /// Organization x activity presence matrix.
    pub fn activity_matrix_data(&self) -> ActivityMatrix {
        let mut all_activities: BTreeSet<String> = BTreeSet::new();
        let mut orgs: Vec<(String, String, Vec<String>)> = Vec::new();
        for r in self.records.iter() {
            let activities = self.multi_select(r, &self.columns.activities);
            all_activities.extend(activities.iter().cloned());
            orgs.push((self.name(r), self.sector(r), activities));
        }
        let activities: Vec<String> = all_activities.into_iter().collect();
        let matrix = orgs
            .into_iter()
            .map(|(organization, sector, org_activities)| MatrixRow {
                organization,
                sector,
                activities: activities
                    .iter()
                    .map(|a| MatrixCell {
                        activity: a.clone(),
                        value: u8::from(org_activities.contains(a)),
                    })
                    .collect(),
            })
            .collect();
        ActivityMatrix { matrix, activities }
    }

    /// Collaboration challenges, overall and per sector.
    pub fn challenges_data(&self) -> CategoryBreakdown {
        self.count_by_sector(&self.columns.challenges)
    }

    /// Capacity building needs, overall and per sector.
    pub fn capacity_needs_data(&self) -> CategoryBreakdown {
        self.count_by_sector(&self.columns.capacity_needs)
    }

    fn count_by_sector(&self, column: &str) -> CategoryBreakdown {
        let mut res = CategoryBreakdown::default();
        for r in self.records.iter() {
            let sector = self.sector(r);
            let idx = match res.by_sector.iter().position(|(s, _)| *s == sector) {
                Some(idx) => idx,
                None => {
                    res.by_sector.push((sector, TokenCounts::default()));
                    res.by_sector.len() - 1
                }
            };
            for token in self.multi_select(r, column) {
                res.counts.add(&token, 1);
                res.by_sector[idx].1.add(&token, 1);
            }
        }
        res
    }

    /// Flows from the primary district of each organization to the other
    /// districts it serves.
    pub fn geographic_flow_data(&self) -> Vec<Flow> {
        let mut flows: Vec<RawFlow> = Vec::new();
        for r in self.records.iter() {
            let primary = self.district(r);
            for served in self.multi_select(r, &self.columns.served_districts) {
                if served == primary || served == COUNTYWIDE {
                    continue;
                }
                flows.push(RawFlow {
                    source: primary.clone(),
                    target: served,
                    value: 1,
                    organization: r.get(&self.columns.organization_name).to_string(),
                });
            }
        }
        debug!("geographic_flow_data: {} raw flows", flows.len());
        aggregate_flows(&flows)
    }

    pub fn summary_stats(&self) -> SummaryStats {
        let mut sector_breakdown = TokenCounts::default();
        let mut district_breakdown = TokenCounts::default();
        for r in self.records.iter() {
            sector_breakdown.add(&self.sector(r), 1);
            district_breakdown.add(&self.district(r), 1);
        }
        SummaryStats {
            total_organizations: self.records.len(),
            sector_breakdown,
            district_breakdown,
        }
    }
}

/// Number of elements of `a` that also appear in `b`.
///
/// Duplicates in `a` are each counted.
fn shared_count(a: &[String], b: &[String]) -> u32 {
    a.iter().filter(|x| b.contains(x)).count() as u32
}

/// Links every pair of organizations whose similarity
/// `2 * shared goals + shared activities` reaches 3.
///
/// This compares all the pairs, which is fine for the few hundred
/// organizations of a survey.
pub fn generate_links(nodes: &[NormalizedOrganization]) -> Vec<SimilarityLink> {
    let mut links: Vec<SimilarityLink> = Vec::new();
    for (i, a) in nodes.iter().enumerate() {
        for b in nodes[i + 1..].iter() {
            let shared_goals = shared_count(&a.goals, &b.goals);
            let shared_activities = shared_count(&a.activities, &b.activities);
            let strength = 2 * shared_goals + shared_activities;
            if strength >= 3 {
                links.push(SimilarityLink {
                    source: a.id,
                    target: b.id,
                    strength,
                    shared_goals,
                    shared_activities,
                });
            }
        }
    }
    links
}

pub fn build_hierarchy(goal_counts: &TokenCounts) -> GoalHierarchy {
    GoalHierarchy {
        name: "Food System Goals".to_string(),
        children: goal_counts
            .0
            .iter()
            .map(|(goal, count)| HierarchyNode {
                name: goal_short_name(goal).to_string(),
                value: *count,
                full_name: goal.clone(),
            })
            .collect(),
    }
}

// Groups the flows by (source, target), in order of first appearance.
fn aggregate_flows(flows: &[RawFlow]) -> Vec<Flow> {
    let mut res: Vec<Flow> = Vec::new();
    for f in flows.iter() {
        match res
            .iter_mut()
            .find(|a| a.source == f.source && a.target == f.target)
        {
            Some(agg) => {
                agg.value += f.value;
                agg.organizations.push(f.organization.clone());
            }
            None => res.push(Flow {
                source: f.source.clone(),
                target: f.target.clone(),
                value: f.value,
                organizations: vec![f.organization.clone()],
            }),
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::builder::parse_rows;
    use super::*;

    const HEADER: [&str; 9] = [
        "Organization Name",
        "Sector",
        "Primary Supervisorial District  (based on headquarters address) ",
        "Other Supervisorial District(s) Served (all districts where programs and services are provided) ",
        "Which of the following LA County Roundtable Action Plan GOALS does your organization help advance (mark all that apply)",
        "How would you describe the activities of your organization/check all that apply/as related to the food system?",
        "What are the biggest challenges your organization faces in collaborating with others in the food system (Select up to 3)",
        "What types of capacity building tools or support would be most helpful (Select up to 3)",
        "Website",
    ];

    fn processor(rows: &[[&str; 9]]) -> SurveyDataProcessor {
        let mut table: Vec<Vec<String>> = vec![HEADER.iter().map(|s| s.to_string()).collect()];
        for r in rows {
            table.push(r.iter().map(|s| s.to_string()).collect());
        }
        parse_rows(&table, &SurveyColumns::default()).unwrap()
    }

    fn node(id: usize, goals: &[&str], activities: &[&str]) -> NormalizedOrganization {
        NormalizedOrganization {
            id,
            name: format!("org{}", id),
            sector: "Nonprofit".to_string(),
            district: "District 1".to_string(),
            scope: Scope::SingleDistrict,
            goals: goals.iter().map(|s| s.to_string()).collect(),
            activities: activities.iter().map(|s| s.to_string()).collect(),
            primary_goal: String::new(),
            challenges: vec![],
            website: String::new(),
            size: 5,
        }
    }

    #[test]
    fn headers_map_to_default_columns() {
        let p = processor(&[[
            "Food Bank",
            "Nonprofit/CBO",
            "2nd District",
            "District 1, District 3",
            "Access, Demand",
            "Distribution",
            "Funding",
            "Grant writing",
            "fb.org",
        ]]);
        let n = p.normalize(&p.records()[0]);
        assert_eq!(n.name, "Food Bank");
        assert_eq!(n.sector, "Nonprofit");
        assert_eq!(n.district, "District 2");
        assert_eq!(n.scope, Scope::MultiDistrict);
        assert_eq!(n.goals, vec!["Access".to_string(), "Demand".to_string()]);
        assert_eq!(n.activities, vec!["Distribution".to_string()]);
        assert_eq!(n.challenges, vec!["Funding".to_string()]);
        assert_eq!(n.website, "fb.org");
        assert_eq!(n.size, 5);
    }

    #[test]
    fn links_follow_the_similarity_threshold() {
        let nodes = vec![
            node(0, &["G1", "G2"], &[]),
            node(1, &["G1", "G2"], &[]),
            node(2, &[], &["A1"]),
            node(3, &[], &["A1"]),
        ];
        let links = generate_links(&nodes);
        assert_eq!(
            links,
            vec![SimilarityLink {
                source: 0,
                target: 1,
                strength: 4,
                shared_goals: 2,
                shared_activities: 0,
            }]
        );
    }

    #[test]
    fn links_count_duplicates_of_the_first_organization() {
        let nodes = vec![node(0, &[], &["A", "A", "B"]), node(1, &[], &["A", "B"])];
        let links = generate_links(&nodes);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].shared_activities, 3);
        // The relation is not symmetric in that case.
        let nodes = vec![node(0, &[], &["A", "B"]), node(1, &[], &["A", "A", "B"])];
        assert!(generate_links(&nodes).is_empty());
    }

    #[test]
    fn links_for_one_goal_and_one_activity() {
        let nodes = vec![node(0, &["G"], &["A"]), node(1, &["G"], &["A", "B"])];
        let links = generate_links(&nodes);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].strength, 3);
    }

    #[test]
    fn flows_skip_self_and_countywide() {
        let p = processor(&[
            [
                "Org A",
                "",
                "1st District",
                "District 2, District 2, Countywide",
                "",
                "",
                "",
                "",
                "",
            ],
            [
                "Org B",
                "",
                "1st District",
                "District 1, District 2, District 4",
                "",
                "",
                "",
                "",
                "",
            ],
        ]);
        let flows = p.geographic_flow_data();
        assert_eq!(
            flows,
            vec![
                Flow {
                    source: "District 1".to_string(),
                    target: "District 2".to_string(),
                    value: 3,
                    organizations: vec![
                        "Org A".to_string(),
                        "Org A".to_string(),
                        "Org B".to_string()
                    ],
                },
                Flow {
                    source: "District 1".to_string(),
                    target: "District 4".to_string(),
                    value: 1,
                    organizations: vec!["Org B".to_string()],
                },
            ]
        );
    }

    #[test]
    fn single_organization_flow() {
        let p = processor(&[[
            "Org A",
            "",
            "1st District",
            "District 2, District 2, Countywide",
            "",
            "",
            "",
            "",
            "",
        ]]);
        let flows = p.geographic_flow_data();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].value, 2);
        assert!(flows.iter().all(|f| f.source != f.target));
    }

    #[test]
    fn challenges_by_sector() {
        let p = processor(&[
            ["A", "Foundation", "", "", "", "", "Funding, Time", "", ""],
            ["B", "Nonprofit/CBO", "", "", "", "", "Funding", "", ""],
            ["C", "Foundation", "", "", "", "", "", "", ""],
            ["D", "", "", "", "", "", "", "", ""],
        ]);
        let c = p.challenges_data();
        assert_eq!(c.counts.get("Funding"), Some(2));
        assert_eq!(c.counts.get("Time"), Some(1));
        assert_eq!(c.sector("Foundation").and_then(|s| s.get("Funding")), Some(1));
        assert_eq!(c.sector("Nonprofit").and_then(|s| s.get("Funding")), Some(1));
        // Sectors without challenges still have a bucket.
        assert_eq!(c.sector("Unknown").map(|s| s.is_empty()), Some(true));
        assert_eq!(c.by_sector.len(), 3);
    }

    #[test]
    fn capacity_needs_counts() {
        let p = processor(&[
            ["A", "Foundation", "", "", "", "", "", "Training, Data", ""],
            ["B", "Foundation", "", "", "", "", "", "Data", ""],
        ]);
        let c = p.capacity_needs_data();
        assert_eq!(
            c.counts,
            TokenCounts(vec![("Training".to_string(), 1), ("Data".to_string(), 2)])
        );
    }

    #[test]
    fn goal_hierarchy_uses_short_names() {
        let p = processor(&[
            [
                "A",
                "",
                "",
                "",
                "Improve affordability of healthy foods, Other goal",
                "",
                "",
                "",
                "",
            ],
            [
                "B",
                "",
                "",
                "",
                "Improve affordability of healthy foods",
                "",
                "",
                "",
                "",
            ],
        ]);
        let h = p.goal_alignment_data();
        assert_eq!(h.name, "Food System Goals");
        assert_eq!(
            h.children,
            vec![
                HierarchyNode {
                    name: "Affordability".to_string(),
                    value: 2,
                    full_name: "Improve affordability of healthy foods".to_string(),
                },
                HierarchyNode {
                    name: "Other goal".to_string(),
                    value: 1,
                    full_name: "Other goal".to_string(),
                },
            ]
        );
    }

    #[test]
    fn activity_matrix_is_sorted() {
        let p = processor(&[
            ["A", "Foundation", "", "", "", "Retail, Growing", "", "", ""],
            ["B", "", "", "", "", "Advocacy", "", "", ""],
        ]);
        let m = p.activity_matrix_data();
        assert_eq!(m.activities, vec!["Advocacy", "Growing", "Retail"]);
        assert_eq!(m.matrix.len(), 2);
        let values: Vec<u8> = m.matrix[0].activities.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![0, 1, 1]);
        assert_eq!(m.matrix[1].sector, "Unknown");
    }

    #[test]
    fn summary() {
        let p = processor(&[
            ["A", "Foundation", "3rd District", "", "", "", "", "", ""],
            ["B", "Foundation", "Countywide", "", "", "", "", "", ""],
            ["C", "Government Agency", "3rd District", "", "", "", "", "", ""],
        ]);
        let s = p.summary_stats();
        assert_eq!(s.total_organizations, 3);
        assert_eq!(s.sector_breakdown.get("Foundation"), Some(2));
        assert_eq!(s.sector_breakdown.get("Government"), Some(1));
        assert_eq!(s.district_breakdown.get("District 3"), Some(2));
        assert_eq!(s.district_breakdown.get("Countywide"), Some(1));
    }

    #[test]
    fn network_ids_follow_records() {
        let p = processor(&[
            ["A", "", "", "", "G1, G2", "", "", "", ""],
            ["", "", "", "", "G1, G2", "", "", "", ""],
            ["C", "", "", "", "G1, G2", "", "", "", ""],
        ]);
        let n = p.network_data();
        assert_eq!(n.nodes.len(), 2);
        assert_eq!(n.nodes[1].id, 1);
        assert_eq!(n.links.len(), 1);
        assert_eq!((n.links[0].source, n.links[0].target), (0, 1));
    }
}

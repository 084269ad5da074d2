pub use crate::config::*;
use crate::SurveyDataProcessor;

use log::{debug, info, warn};

/// The sheet holding the responses in the survey export.
pub const DEFAULT_SHEET_NAME: &str = "Copy of Survey Responses";

/// The identifier given to a column with an empty header.
pub const UNKNOWN_COLUMN: &str = "Unknown_Column";

/// Turns a raw column header into a stable identifier.
///
/// The header is trimmed, runs of whitespace become a single underscore and
/// every other character that is not an ASCII letter, digit or underscore
/// becomes an underscore.
///
/// ```
/// use survey_processing::builder::normalize_header;
///
/// assert_eq!(normalize_header(" Main Org Zip Code"), "Main_Org_Zip_Code");
/// assert_eq!(normalize_header("Your Name (First/Last)"), "Your_Name__First_Last_");
/// ```
pub fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_COLUMN.to_string();
    }
    trimmed
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Picks the sheet to read among the sheets of a workbook.
///
/// If the expected sheet is missing, the first sheet is used and the
/// substitution is returned as an issue.
pub fn select_sheet(
    available: &[String],
    expected: &str,
) -> Result<(String, Option<ParseIssue>), SurveyDataErrors> {
    if available.iter().any(|s| s == expected) {
        return Ok((expected.to_string(), None));
    }
    let first = available.first().ok_or(SurveyDataErrors::NoSheet)?;
    warn!(
        "select_sheet: sheet {:?} not found (available: {:?}), using {:?}",
        expected, available, first
    );
    Ok((
        first.clone(),
        Some(ParseIssue::SheetFallback {
            expected: expected.to_string(),
            used: first.clone(),
        }),
    ))
}

/// A builder that turns raw table rows into survey records.
///
/// The first call must provide the header, the data rows follow in order.
///
/// ```
/// use survey_processing::builder::Builder;
/// use survey_processing::SurveyColumns;
/// # use survey_processing::SurveyDataErrors;
///
/// let mut builder = Builder::new(&SurveyColumns::default())?
///     .header(&["Organization Name".to_string(), "Sector".to_string()])?;
///
/// builder.add_row(&["Food Bank".to_string(), "Nonprofit/CBO".to_string()])?;
/// builder.add_row(&["".to_string(), "Foundation".to_string()])?;
///
/// let processor = builder.build();
/// assert_eq!(processor.records().len(), 1);
/// # Ok::<(), SurveyDataErrors>(())
/// ```
pub struct Builder {
    pub(crate) _columns: SurveyColumns,
    pub(crate) _headers: Option<Vec<String>>,
    pub(crate) _records: Vec<SurveyRecord>,
    pub(crate) _issues: Vec<ParseIssue>,
    // Line of the last row seen, the header being line 1.
    _line: usize,
}

impl Builder {
    pub fn new(columns: &SurveyColumns) -> Result<Builder, SurveyDataErrors> {
        Ok(Builder {
            _columns: columns.clone(),
            _headers: None,
            _records: Vec::new(),
            _issues: Vec::new(),
            _line: 0,
        })
    }

    /// Sets the header row. The raw labels are normalized.
    pub fn header(self, raw_headers: &[String]) -> Result<Builder, SurveyDataErrors> {
        let headers: Vec<String> = raw_headers.iter().map(|h| normalize_header(h)).collect();
        debug!("Builder::header: normalized headers: {:?}", headers);
        let mut issues = self._issues;
        if !headers.contains(&self._columns.organization_name) {
            warn!(
                "Builder::header: missing organization name column {:?}",
                self._columns.organization_name
            );
            issues.push(ParseIssue::MissingNameColumn {
                column: self._columns.organization_name.clone(),
            });
        }
        Ok(Builder {
            _columns: self._columns,
            _headers: Some(headers),
            _records: Vec::new(),
            _issues: issues,
            _line: 1,
        })
    }

    /// Records an issue found by the reader (for example a sheet fallback).
    pub fn add_issue(&mut self, issue: ParseIssue) {
        self._issues.push(issue);
    }

    /// Adds a data row.
    ///
    /// Blank rows and rows without an organization name are skipped. Missing
    /// cells are read as empty strings, cells beyond the header are ignored.
    pub fn add_row(&mut self, cells: &[String]) -> Result<(), SurveyDataErrors> {
        let headers = self
            ._headers
            .as_ref()
            .ok_or(SurveyDataErrors::MissingHeader)?;
        self._line += 1;
        if cells.iter().all(|c| c.is_empty()) {
            debug!("Builder::add_row: line {}: blank row", self._line);
            return Ok(());
        }
        let mut record = SurveyRecord {
            index: self._records.len(),
            line: self._line,
            ..Default::default()
        };
        for (idx, header) in headers.iter().enumerate() {
            let value = cells.get(idx).cloned().unwrap_or_default();
            record.fields.insert(header.clone(), value);
        }
        if record.get(&self._columns.organization_name).trim().is_empty() {
            debug!(
                "Builder::add_row: line {}: no organization name, skipping",
                self._line
            );
            return Ok(());
        }
        self._records.push(record);
        Ok(())
    }

    pub fn build(self) -> SurveyDataProcessor {
        if self._headers.is_none() {
            // An empty sheet has no name column either.
            let mut issues = self._issues;
            issues.push(ParseIssue::MissingNameColumn {
                column: self._columns.organization_name.clone(),
            });
            return SurveyDataProcessor::new(self._records, &self._columns, issues);
        }
        info!(
            "Builder::build: processed {} organizations",
            self._records.len()
        );
        SurveyDataProcessor::new(self._records, &self._columns, self._issues)
    }
}

/// Parses a table whose first row is the header.
pub fn parse_rows(
    rows: &[Vec<String>],
    columns: &SurveyColumns,
) -> Result<SurveyDataProcessor, SurveyDataErrors> {
    parse_rows_with_issues(rows, columns, Vec::new())
}

/// Same as [`parse_rows`], for a table that was read with some issues already
/// (for example from a fallback sheet). They come first in the issues of the result.
pub fn parse_rows_with_issues(
    rows: &[Vec<String>],
    columns: &SurveyColumns,
    issues: Vec<ParseIssue>,
) -> Result<SurveyDataProcessor, SurveyDataErrors> {
    let mut builder = Builder::new(columns)?;
    for issue in issues {
        builder.add_issue(issue);
    }
    let mut iter = rows.iter();
    let mut builder = match iter.next() {
        Some(header) => builder.header(header)?,
        None => return Ok(builder.build()),
    };
    for row in iter {
        builder.add_row(row)?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_header_replaces_spaces_and_symbols() {
        assert_eq!(
            normalize_header("Primary Supervisorial District  (based on headquarters address) "),
            "Primary_Supervisorial_District__based_on_headquarters_address_"
        );
        assert_eq!(normalize_header("Website"), "Website");
        assert_eq!(normalize_header("   "), UNKNOWN_COLUMN);
        assert_eq!(normalize_header("Año fiscal"), "A_o_fiscal");
    }

    #[test]
    fn export_labels_match_default_columns() {
        let c = SurveyColumns::default();
        let expected = [
            ("Organization Name", &c.organization_name),
            ("Sector", &c.sector),
            (
                "Primary Supervisorial District  (based on headquarters address) ",
                &c.primary_district,
            ),
            (
                "Other Supervisorial District(s) Served (all districts where programs and services are provided) ",
                &c.served_districts,
            ),
            (
                "Which of the following LA County Roundtable Action Plan GOALS does your organization help advance (mark all that apply)",
                &c.goals,
            ),
            (
                "Which of the following LA County Roundtable Action Plan OBJECTIVES does your organization help advance (mark all that apply)",
                &c.objectives,
            ),
            (
                "How would you describe the activities of your organization/check all that apply/as related to the food system?",
                &c.activities,
            ),
            (
                "If you had to choose the goal MOST aligned with your organization, which one would it be?",
                &c.primary_goal,
            ),
            (
                "What are the biggest challenges your organization faces in collaborating with others in the food system (Select up to 3)",
                &c.challenges,
            ),
            (
                "What types of capacity building tools or support would be most helpful (Select up to 3)",
                &c.capacity_needs,
            ),
            ("Website", &c.website),
            ("Main Org Street Address (headquarters)", &c.street),
            ("Main Org Zip Code", &c.zip_code),
            ("Organization Mission Statement ", &c.mission),
            (
                "Provide one sentence descriptor of your primary activity",
                &c.primary_activity,
            ),
            (
                "Primary SPA (service planning area)(Based on headquarters address)",
                &c.primary_spa,
            ),
            (
                "Additional SPA(s) (service planning area) Served  (all districts where programs and services are provided) - Mark any or all ",
                &c.additional_spas,
            ),
            ("Email Address", &c.email),
            ("Your Name (First/Last)", &c.contact_name),
        ];
        for (label, column) in expected {
            assert_eq!(&normalize_header(label), column, "label {:?}", label);
        }
    }

    #[test]
    fn reader_issues_come_first() {
        let fallback = ParseIssue::SheetFallback {
            expected: DEFAULT_SHEET_NAME.to_string(),
            used: "Sheet1".to_string(),
        };
        let rows = vec![row(&["Name", "Sector"]), row(&["Food Bank", "Foundation"])];
        let p = parse_rows_with_issues(&rows, &SurveyColumns::default(), vec![fallback.clone()])
            .unwrap();
        assert!(p.records().is_empty());
        assert_eq!(
            p.issues(),
            &[
                fallback,
                ParseIssue::MissingNameColumn {
                    column: "Organization_Name".to_string()
                }
            ]
        );
    }

    #[test]
    fn served_districts_of_the_export_are_read() {
        let rows = vec![
            row(&[
                "Organization Name",
                "Primary Supervisorial District  (based on headquarters address) ",
                "Other Supervisorial District(s) Served (all districts where programs and services are provided) ",
            ]),
            row(&["Org A", "1st District", "District 2, District 2, Countywide"]),
        ];
        let p = parse_rows(&rows, &SurveyColumns::default()).unwrap();
        let flows = p.geographic_flow_data();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].value, 2);
        assert_eq!(
            p.normalize(&p.records()[0]).scope,
            Scope::Countywide
        );
    }

    #[test]
    fn rows_without_name_are_dropped() {
        let rows = vec![
            row(&["Organization Name", "Sector", "Website"]),
            row(&["Food Bank", "Nonprofit/CBO"]),
            row(&["", "", ""]),
            row(&["   ", "Foundation", "x.org"]),
            row(&["City Farm", "Government Agency", "farm.gov"]),
        ];
        let p = parse_rows(&rows, &SurveyColumns::default()).unwrap();
        let records = p.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Organization_Name"), "Food Bank");
        // Missing cell
        assert_eq!(records[0].get("Website"), "");
        assert_eq!(records[0].line, 2);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].line, 5);
        assert_eq!(records[1].get("Website"), "farm.gov");
        assert!(p.issues().is_empty());
    }

    #[test]
    fn missing_name_column_is_reported() {
        let rows = vec![row(&["Name", "Sector"]), row(&["Food Bank", "Foundation"])];
        let p = parse_rows(&rows, &SurveyColumns::default()).unwrap();
        assert!(p.records().is_empty());
        assert_eq!(
            p.issues(),
            &[ParseIssue::MissingNameColumn {
                column: "Organization_Name".to_string()
            }]
        );
    }

    #[test]
    fn empty_table_has_no_record() {
        let p = parse_rows(&[], &SurveyColumns::default()).unwrap();
        assert!(p.records().is_empty());
        assert_eq!(p.issues().len(), 1);
    }

    #[test]
    fn rows_before_header_are_rejected() {
        let mut b = Builder::new(&SurveyColumns::default()).unwrap();
        assert_eq!(
            b.add_row(&row(&["Food Bank"])),
            Err(SurveyDataErrors::MissingHeader)
        );
    }

    #[test]
    fn sheet_selection_falls_back_to_first() {
        let sheets = row(&["Form Responses 1", "Copy of Survey Responses"]);
        let (name, issue) = select_sheet(&sheets, DEFAULT_SHEET_NAME).unwrap();
        assert_eq!(name, DEFAULT_SHEET_NAME);
        assert!(issue.is_none());

        let sheets = row(&["Form Responses 1", "Sheet2"]);
        let (name, issue) = select_sheet(&sheets, DEFAULT_SHEET_NAME).unwrap();
        assert_eq!(name, "Form Responses 1");
        assert_eq!(
            issue,
            Some(ParseIssue::SheetFallback {
                expected: DEFAULT_SHEET_NAME.to_string(),
                used: "Form Responses 1".to_string()
            })
        );

        assert_eq!(
            select_sheet(&[], DEFAULT_SHEET_NAME),
            Err(SurveyDataErrors::NoSheet)
        );
    }
}

use crate::survey::*;

use serde::{Deserialize, Serialize};
use survey_processing::builder::normalize_header;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSettings {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "worksheetName")]
    pub worksheet_name: Option<String>,
    pub delimiter: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocodeConfig {
    #[serde(rename = "cachePath")]
    pub cache_path: Option<String>,
    #[serde(rename = "overridesPath")]
    pub overrides_path: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "stateCode")]
    pub state_code: Option<String>,
    #[serde(rename = "acceptedState")]
    pub accepted_state: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartsConfig {
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    #[serde(rename = "referencePath")]
    pub reference_path: Option<String>,
}

/// Survey question labels, as they appear in the header of the sheet.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLabels {
    pub organization_name: Option<String>,
    pub sector: Option<String>,
    pub primary_district: Option<String>,
    pub served_districts: Option<String>,
    pub goals: Option<String>,
    pub objectives: Option<String>,
    pub activities: Option<String>,
    pub primary_goal: Option<String>,
    pub challenges: Option<String>,
    pub capacity_needs: Option<String>,
    pub website: Option<String>,
    pub street: Option<String>,
    pub zip_code: Option<String>,
    pub mission: Option<String>,
    pub primary_activity: Option<String>,
    pub primary_spa: Option<String>,
    pub additional_spas: Option<String>,
    pub email: Option<String>,
    pub contact_name: Option<String>,
}

fn set_column(column: &mut String, label: &Option<String>) {
    if let Some(l) = label {
        *column = normalize_header(l);
    }
}

impl ColumnLabels {
    /// Replaces the columns that have a label.
    pub fn apply(&self, columns: &SurveyColumns) -> SurveyColumns {
        let mut c = columns.clone();
        set_column(&mut c.organization_name, &self.organization_name);
        set_column(&mut c.sector, &self.sector);
        set_column(&mut c.primary_district, &self.primary_district);
        set_column(&mut c.served_districts, &self.served_districts);
        set_column(&mut c.goals, &self.goals);
        set_column(&mut c.objectives, &self.objectives);
        set_column(&mut c.activities, &self.activities);
        set_column(&mut c.primary_goal, &self.primary_goal);
        set_column(&mut c.challenges, &self.challenges);
        set_column(&mut c.capacity_needs, &self.capacity_needs);
        set_column(&mut c.website, &self.website);
        set_column(&mut c.street, &self.street);
        set_column(&mut c.zip_code, &self.zip_code);
        set_column(&mut c.mission, &self.mission);
        set_column(&mut c.primary_activity, &self.primary_activity);
        set_column(&mut c.primary_spa, &self.primary_spa);
        set_column(&mut c.additional_spas, &self.additional_spas);
        set_column(&mut c.email, &self.email);
        set_column(&mut c.contact_name, &self.contact_name);
        c
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub columns: ColumnLabels,
    #[serde(default)]
    pub geocode: GeocodeConfig,
    #[serde(default)]
    pub charts: ChartsConfig,
}

pub fn read_config(path: &str) -> BSurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config() {
        let c: SurveyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c, SurveyConfig::default());
        assert_eq!(c.columns.apply(&SurveyColumns::default()), SurveyColumns::default());
    }

    #[test]
    fn column_labels_are_normalized() {
        let c: SurveyConfig = serde_json::from_str(
            r#"{"columns": {"organizationName": "Name of the organization ", "zipCode": "ZIP"}}"#,
        )
        .unwrap();
        let cols = c.columns.apply(&SurveyColumns::default());
        assert_eq!(cols.organization_name, "Name_of_the_organization");
        assert_eq!(cols.zip_code, "ZIP");
        assert_eq!(cols.sector, "Sector");
    }

    #[test]
    fn read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json").display().to_string();
        assert!(matches!(
            *read_config(&missing).unwrap_err(),
            SurveyError::OpeningJson { .. }
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{\"input\": [").unwrap();
        assert!(matches!(
            *read_config(&bad.display().to_string()).unwrap_err(),
            SurveyError::ParsingJson { .. }
        ));
    }
}

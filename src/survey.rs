use log::{debug, error, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use survey_processing::batch::geocode_records;
use survey_processing::builder::{parse_rows_with_issues, DEFAULT_SHEET_NAME};
use survey_processing::geocode::{
    AddressLookup, GeocodePipeline, OverrideTable, Throttle, ThreadSleep,
};
use survey_processing::*;

pub mod cache_store;
pub mod charts;
pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
pub mod nominatim;

use crate::args::{Args, Command};
use crate::survey::config_reader::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The worksheet could not be read"))]
    EmptyExcel {},
    #[snafu(display("Error opening file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the output"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error creating the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Error reading the survey table"))]
    SurveyData { source: SurveyDataErrors },
    #[snafu(display("Invalid override file {path}"))]
    InvalidOverrides {
        source: GeocodeErrors,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;
pub type BSurveyResult<T> = Result<T, Box<SurveyError>>;

pub const DEFAULT_CACHE_PATH: &str = "data/geocode-cache.json";
pub const DEFAULT_GEOCODE_OUTPUT_PATH: &str = "data/organizations.json";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Xlsx,
    Csv,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InputSource {
    pub path: String,
    pub input_type: InputType,
    pub worksheet_name: String,
    pub delimiter: u8,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GeocodeRunSettings {
    pub cache_path: String,
    pub overrides_path: Option<String>,
    /// File path or 'stdout'.
    pub output_path: String,
    pub endpoint: String,
    pub user_agent: String,
    pub region: GeocodeSettings,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChartsRunSettings {
    /// File path or 'stdout'.
    pub output_path: Option<String>,
    pub reference_path: Option<String>,
}

/// Everything a command needs, once the configuration file and the command
/// line are merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub input: InputSource,
    pub columns: SurveyColumns,
    pub geocode: GeocodeRunSettings,
    pub charts: ChartsRunSettings,
}

fn infer_input_type(input_type: Option<&str>, path: &str) -> SurveyResult<InputType> {
    match input_type {
        Some("xlsx") => Ok(InputType::Xlsx),
        Some("csv") => Ok(InputType::Csv),
        Some(x) => whatever!("Input type {:?} not supported (xlsx or csv)", x),
        None => {
            let is_csv = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            Ok(if is_csv { InputType::Csv } else { InputType::Xlsx })
        }
    }
}

fn parse_delimiter(delimiter: Option<&str>) -> SurveyResult<u8> {
    match delimiter {
        None => Ok(b','),
        Some("\\t") => Ok(b'\t'),
        Some(d) if d.len() == 1 => Ok(d.as_bytes()[0]),
        Some(d) => whatever!("The delimiter must be a single character, got {:?}", d),
    }
}

// Paths from the configuration file are relative to its directory.
fn resolve_path(root: Option<&Path>, path: &str) -> String {
    match root {
        Some(r) if path != "stdout" && Path::new(path).is_relative() => {
            let p: PathBuf = [r, Path::new(path)].iter().collect();
            p.display().to_string()
        }
        _ => path.to_string(),
    }
}

/// Merges the command line with the configuration file. The command line wins.
pub fn resolve_settings(args: &Args, config: &SurveyConfig, config_dir: Option<&Path>) -> SurveyResult<RunSettings> {
    let from_config = |p: &Option<String>| p.as_ref().map(|s| resolve_path(config_dir, s));

    let input_path = match args.input.clone().or_else(|| from_config(&config.input.file_path)) {
        Some(p) => p,
        None => whatever!("No input file: use --input or the input.filePath setting"),
    };
    let input_type = infer_input_type(
        args.input_type
            .as_deref()
            .or(config.input.input_type.as_deref()),
        &input_path,
    )?;
    let input = InputSource {
        input_type,
        worksheet_name: args
            .worksheet_name
            .clone()
            .or_else(|| config.input.worksheet_name.clone())
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
        delimiter: parse_delimiter(config.input.delimiter.as_deref())?,
        path: input_path,
    };

    let (reference_arg, cache_arg, overrides_arg) = match &args.command {
        Command::Charts { reference } => (reference.clone(), None, None),
        Command::Geocode { cache, overrides } => (None, cache.clone(), overrides.clone()),
    };

    let g = &config.geocode;
    let default_region = GeocodeSettings::default();
    let geocode = GeocodeRunSettings {
        cache_path: cache_arg
            .or_else(|| from_config(&g.cache_path))
            .unwrap_or_else(|| DEFAULT_CACHE_PATH.to_string()),
        overrides_path: overrides_arg.or_else(|| from_config(&g.overrides_path)),
        output_path: args
            .out
            .clone()
            .or_else(|| from_config(&g.output_path))
            .unwrap_or_else(|| DEFAULT_GEOCODE_OUTPUT_PATH.to_string()),
        endpoint: g
            .endpoint
            .clone()
            .unwrap_or_else(|| nominatim::DEFAULT_ENDPOINT.to_string()),
        user_agent: g
            .user_agent
            .clone()
            .unwrap_or_else(|| nominatim::DEFAULT_USER_AGENT.to_string()),
        region: GeocodeSettings {
            city: g.city.clone().unwrap_or(default_region.city),
            state_code: g.state_code.clone().unwrap_or(default_region.state_code),
            accepted_state: g
                .accepted_state
                .clone()
                .unwrap_or(default_region.accepted_state),
        },
    };

    let charts = ChartsRunSettings {
        output_path: args
            .out
            .clone()
            .or_else(|| from_config(&config.charts.output_path)),
        reference_path: reference_arg.or_else(|| from_config(&config.charts.reference_path)),
    };

    Ok(RunSettings {
        input,
        columns: config.columns.apply(&SurveyColumns::default()),
        geocode,
        charts,
    })
}

/// Reads the survey table and turns it into records. Problems with the shape
/// of the table are logged, not returned.
pub fn read_survey(source: &InputSource, columns: &SurveyColumns) -> SurveyResult<SurveyDataProcessor> {
    info!(
        "read_survey: reading {:?} as {:?}",
        source.path, source.input_type
    );
    let (rows, sheet_issue) = match source.input_type {
        InputType::Xlsx => io_excel::read_excel_rows(&source.path, &source.worksheet_name),
        InputType::Csv => io_csv::read_csv_rows(&source.path, source.delimiter).map(|r| (r, None)),
    }
    .map_err(|e| *e)?;
    debug!("read_survey: {} rows", rows.len());

    let issues: Vec<ParseIssue> = sheet_issue.into_iter().collect();
    let processor = parse_rows_with_issues(&rows, columns, issues).context(SurveyDataSnafu {})?;

    for issue in processor.issues() {
        match issue {
            ParseIssue::MissingNameColumn { .. } => error!("read_survey: {}", issue),
            ParseIssue::SheetFallback { .. } => warn!("read_survey: {}", issue),
        }
    }
    info!(
        "read_survey: found {} organizations",
        processor.records().len()
    );
    Ok(processor)
}

/// Writes a document to a file (creating its directory) or to the standard output.
pub fn write_output(path: Option<&str>, content: &str) -> SurveyResult<()> {
    match path {
        None | Some("stdout") => {
            println!("{}", content);
            Ok(())
        }
        Some(p) => {
            if let Some(parent) = Path::new(p).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).context(WritingJsonSnafu { path: p })?;
                }
            }
            fs::write(p, content).context(WritingJsonSnafu { path: p })?;
            info!("write_output: wrote {}", p);
            Ok(())
        }
    }
}

pub fn run_charts(settings: &RunSettings) -> SurveyResult<()> {
    let processor = read_survey(&settings.input, &settings.columns)?;
    let document = charts::build_charts_document(&processor);
    let pretty_js = serde_json::to_string_pretty(&document).context(SerializingJsonSnafu {})?;
    write_output(settings.charts.output_path.as_deref(), &pretty_js)?;

    if let Some(reference_path) = &settings.charts.reference_path {
        charts::check_reference(reference_path, &document)?;
    }
    Ok(())
}

pub fn run_geocode(settings: &RunSettings) -> SurveyResult<()> {
    let g = &settings.geocode;
    let processor = read_survey(&settings.input, &settings.columns)?;

    let overrides = match &g.overrides_path {
        Some(p) => cache_store::load_overrides(p).map_err(|e| *e)?,
        None => OverrideTable::default(),
    };
    let lookup = nominatim::NominatimClient::new(&g.endpoint, &g.user_agent).map_err(|e| *e)?;
    let mut pipeline = GeocodePipeline::new(&g.region, overrides, lookup, ThreadSleep);
    geocode_survey(&processor, g, &mut pipeline)
}

/// Places the organizations of a survey, then writes the cache and the output document.
///
/// A cache that cannot be written is only logged: the output document is still produced.
pub fn geocode_survey<L: AddressLookup, T: Throttle>(
    processor: &SurveyDataProcessor,
    g: &GeocodeRunSettings,
    pipeline: &mut GeocodePipeline<L, T>,
) -> SurveyResult<()> {
    info!("geocode_survey: loading the geocoding cache");
    let mut cache = cache_store::load_cache(&g.cache_path);
    let cache_size_before = cache.len();
    info!("geocode_survey: loaded {} cached entries", cache_size_before);

    let last_updated = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let report = geocode_records(
        processor.records(),
        processor.columns(),
        pipeline,
        &mut cache,
        &last_updated,
    );

    if let Err(e) = cache_store::save_cache(&g.cache_path, &cache) {
        error!(
            "geocode_survey: error saving the cache to {}: {}",
            g.cache_path, e
        );
    }

    for f in report.failures.iter() {
        if f.missing_address {
            warn!("geocode_survey: not placed: {}: missing address or zip", f.name);
        } else {
            warn!(
                "geocode_survey: not placed: {}: {} {}",
                f.name, f.street, f.zip_code
            );
        }
    }

    let stats = pipeline.stats();
    let meta = &report.document.metadata;
    info!(
        "geocode_survey: geocoded {} of {} organizations ({}%), {} failed",
        meta.geocoded_organizations, meta.total_organizations, meta.success_rate, meta.failed_geocode
    );
    info!(
        "geocode_survey: cache hits: {}, overrides: {}, requests: {}, fallbacks: {}",
        report.stats.cache_hits, report.stats.override_hits, stats.queries, report.stats.fallback_resolved
    );
    info!(
        "geocode_survey: cache size: {} -> {} ({} new entries)",
        cache_size_before,
        cache.len(),
        cache.len().saturating_sub(cache_size_before)
    );

    let pretty_js =
        serde_json::to_string_pretty(&report.document).context(SerializingJsonSnafu {})?;
    write_output(Some(g.output_path.as_str()), &pretty_js)
}

pub fn run(args: &Args) -> SurveyResult<()> {
    let (config, config_dir) = match &args.config {
        Some(p) => {
            let config = read_config(p).map_err(|e| *e)?;
            let dir = Path::new(p).parent().map(|d| d.to_path_buf());
            (config, dir)
        }
        None => (SurveyConfig::default(), None),
    };
    let settings = resolve_settings(args, &config, config_dir.as_deref())?;
    debug!("run: settings: {:?}", settings);
    match args.command {
        Command::Charts { .. } => run_charts(&settings),
        Command::Geocode { .. } => run_geocode(&settings),
    }
}

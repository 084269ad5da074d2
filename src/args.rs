use clap::{Parser, Subcommand};

/// This is the processing program of the food system stakeholder survey.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// (file path, optional) A JSON configuration file. Relative paths inside it are read from the
    /// directory of the file. See the manual of survey_processing for the format.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (file path) The survey export. Setting this option overrides the path that may be
    /// specified with the --config option.
    #[clap(short, long, value_parser, global = true)]
    pub input: Option<String>,

    /// (xlsx or csv) The type of the input. By default, it is inferred from the file extension.
    #[clap(long, value_parser, global = true)]
    pub input_type: Option<String>,

    /// (default 'Copy of Survey Responses') When using an Excel file, the name of the worksheet to use.
    /// The first worksheet is used if it does not exist.
    #[clap(long, value_parser, global = true)]
    pub worksheet_name: Option<String>,

    /// (file path or 'stdout') Where the JSON document is written. Setting this option overrides
    /// the path that may be specified with the --config option.
    #[clap(short, long, value_parser, global = true)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Computes the data of the dashboard charts.
    Charts {
        /// (file path) A reference chart data document. If provided, foodsurvey will check that
        /// the output matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Places the organizations on the map, using the cache, the overrides and the Nominatim service.
    Geocode {
        /// (file path, default data/geocode-cache.json) The geocoding cache. It is created if it
        /// does not exist, and updated at the end of the run.
        #[clap(long, value_parser)]
        cache: Option<String>,
        /// (file path, optional) Addresses with known coordinates.
        #[clap(long, value_parser)]
        overrides: Option<String>,
    },
}

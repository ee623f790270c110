use clap::Parser;

/// This is a survey evaluation program: it cleans survey data and tabulates the indicators
/// of a Performance Management Framework.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the data sources, the cleaning steps and the frameworks.
    /// For more information about the file format, read the documentation of the survey_indicators::manual module.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference summary in JSON format. If provided, pmfeval will
    /// check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory path or empty) If specified, the outputs will be written in this directory.
    /// Setting this option overrides the directory that may be specified in the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the survey data is read from this file instead of
    /// the data sources of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (csv or xlsx, default csv) The type of the input given with --input.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (default first worksheet) When using an Excel file with --input, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// If passed as an argument, the data is used as it is: the cleaning steps of the configuration are not run.
    #[clap(long, takes_value = false)]
    pub skip_preprocessing: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

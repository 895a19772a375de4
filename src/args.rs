use clap::Parser;

/// This is a live race call program: it projects the outcome of a race from partial returns.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the race: subdivisions, historical benchmarks and thresholds.
    /// For more information about the file format, read the manual of the race_projection crate.
    #[clap(short, long, value_parser)]
    pub race: String,

    /// (file path, optional) The current counts, one row per subdivision.
    #[clap(short, long, value_parser)]
    pub tallies: Option<String>,

    /// (csv, xlsx or json) The type of the tallies file. By default, guessed from the file extension
    /// and csv otherwise.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. Defaults to the first one.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (directory, optional) If specified, the counts are saved in this directory after every update
    /// and restored at the next run.
    #[clap(long, value_parser)]
    pub cache_dir: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the projection will be written
    /// in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing a summary in JSON format. If provided, racecall will
    /// check that the projection matches the reference.
    #[clap(long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, all the counts are set back to zero (and cleared from the cache)
    /// before reading the tallies.
    #[clap(long, takes_value = false)]
    pub reset: bool,

    /// If passed as an argument, projects the subdivisions that have not reported yet and uses
    /// the projected outcome in the certainty.
    #[clap(long, takes_value = false)]
    pub enhanced: bool,

    /// If passed as an argument, reporting is measured in votes against the expected turnout
    /// instead of in subdivisions.
    #[clap(long, takes_value = false)]
    pub vote_based_reporting: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

use clap::Parser;

/// This program computes the rescoring statistics of human and AI scorers.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the analysis: input source, column layout and rules.
    /// For more information about the file format, read the manual of the rescore_stats crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the summary of an analysis in JSON format. If provided, rescore
    /// will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the analysis will be written in JSON format to the given
    /// location. Setting this option overrides the output directory that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The scoring sheet. Setting this option overrides the source that may be specified with the
    /// --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (excel or csv, guessed from the file extension by default) The type of the input.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file with several worksheets, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (part names, all the parts by default) Restricts the analysis to the given parts.
    #[clap(long, value_parser)]
    pub part: Option<Vec<String>>,

    /// (missing-second-score or all-records) The records accounted for the AI scorer.
    #[clap(long, value_parser)]
    pub ai_scope: Option<String>,

    /// (skip or disagree) How to count a dimension when its final score is missing.
    #[clap(long, value_parser)]
    pub missing_final: Option<String>,

    /// The admin password, required when the admin secret is configured.
    #[clap(long, value_parser)]
    pub password: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

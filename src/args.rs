use clap::{Parser, Subcommand};

/// This is a program to count Single Transferable Vote elections.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Count the votes in an election
    Count(CountArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct CountArgs {
    /// (file path) The ballot file, in the BLT format.
    #[clap(value_parser)]
    pub filename: String,

    /// (default stv) The counting method: 'stv' or 'stv-reducing'.
    #[clap(short, long, value_parser)]
    pub method: Option<String>,

    /// (default text) The output format: 'text' or 'json'.
    #[clap(short, long, value_parser)]
    pub format: Option<String>,

    /// Drop the invalid ballots instead of failing. When set, equal, repeated and skipped
    /// rankings are handled as configured in the options file.
    #[clap(short = 'i', long, takes_value = false)]
    pub allow_invalid: bool,

    /// Allow several candidates at the same ranking.
    #[clap(long, takes_value = false)]
    pub allow_equal: bool,

    /// Allow a candidate to be ranked more than once.
    #[clap(long, takes_value = false)]
    pub allow_repeat: bool,

    /// Allow rankings with gaps.
    #[clap(long, takes_value = false)]
    pub allow_skipped: bool,

    /// (default 100) The number of stages after which the count is abandoned.
    #[clap(long, value_parser)]
    pub max_stages: Option<u32>,

    /// (default 5) The number of decimal places kept for the votes.
    #[clap(long, value_parser)]
    pub precision: Option<u32>,

    /// (file path, optional) A JSON file with the counting options. The options given on
    /// the command line take precedence.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path or 'stdout') Where to write the result. Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the outcome of the election in JSON format.
    /// If provided, stvcount will check that the JSON summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

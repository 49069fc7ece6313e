use clap::Parser;

/// This program runs manager-employee matching sessions.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the session. See the manual of
    /// the manager_matching crate for the format. All the other options override the
    /// values of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference summary in JSON format. If provided, matchrun will
    /// check that the summary of the session matches the reference (timestamps are
    /// ignored).
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the session will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) The manager dataset. Setting this option replaces the sources
    /// of the configuration file.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (csv or xlsx) The type of the manager dataset. By default, it is guessed from
    /// the extension of the file.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// The number of participants of the session. By default, the highest participant
    /// of the responses, or else the number of managers.
    #[clap(short, long, value_parser)]
    pub participants: Option<u32>,

    /// (file path) A CSV file with the answers of the participants, replayed in order.
    #[clap(long, value_parser)]
    pub responses: Option<String>,

    /// (preAllocate or reactive) How managers are handed out.
    #[clap(long, value_parser)]
    pub mode: Option<String>,

    /// The random seed of the session. Without it, every run is different.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

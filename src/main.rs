use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;

mod args;
mod experiment;

use crate::experiment::config_reader::ConfigOverrides;

fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else {
        env_logger::init();
    }
    debug!("args: {:?}", args);

    let overrides = ConfigOverrides {
        input: args.input.clone(),
        input_type: args.input_type.clone(),
        excel_worksheet_name: args.excel_worksheet_name.clone(),
        participants: args.participants,
        responses: args.responses.clone(),
        mode: args.mode.clone(),
        seed: args.seed,
    };

    let res = experiment::run_experiment(
        args.config.clone(),
        args.reference.clone(),
        args.out.clone(),
        &overrides,
    );

    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}

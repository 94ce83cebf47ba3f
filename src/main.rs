mod args;
mod rcv;

use clap::Parser;
use log::{debug, LevelFilter};

use crate::args::{Args, Command};

fn main() {
    let args = Args::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();
    debug!("args: {:?}", args);

    let res = match &args.command {
        Command::Count(count_args) => rcv::run_count_command(count_args),
    };

    if let Err(e) = res {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

//! A thin `clap`-derived front end over `mzbuild-core`: discover a
//! repository, resolve a target set, and drive `acquire`/`ensure`/`check`.
//! No business logic lives here; it belongs to the library crate.

mod cmd;

use crate::cmd::{init_logger, Args};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.log_level);
    match cmd::run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

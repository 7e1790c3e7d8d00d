use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use log::debug;

const USAGE: &str = "usage: lamp <path>";

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [path] = args.as_slice() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    if path.starts_with('-') && path != "-" {
        eprintln!("unknown option '{path}'\n{USAGE}");
        return ExitCode::from(2);
    }

    match run_file(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &str) -> Result<()> {
    let source = read_source(path)?;
    debug!("read {} bytes from {path}", source.len());
    lamp::run(&source, io::stdout())?;
    Ok(())
}

fn read_source(path: &str) -> Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("Reading {path}"))
}

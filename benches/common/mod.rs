#![allow(dead_code)]
use std::fs;
use std::path::Path;

use lamp::{HopTable, Program};
use test_support::load_cases;

/// Fixture programs opted into benchmarking, as `(label, path)` pairs.
pub fn workloads() -> Vec<(String, String)> {
    let cases = load_cases(Path::new("tests/programs"))
        .unwrap_or_else(|err| panic!("load bench cases: {err:#}"));
    cases
        .into_iter()
        .filter(|case| case.bench_enabled())
        .map(|case| (case.name, case.program_path.display().to_string()))
        .collect()
}

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn load_program(path: &str) -> (Program, HopTable) {
    let source = load_source(path);
    lamp::compile(&source).unwrap_or_else(|diagnostics| panic!("compile {path}:\n{diagnostics}"))
}

//! Runs every `fixtures/*.json` declaration document through the sample
//! catalog and compares the result with the sibling `*.expected.json`.
//!
//! An expected file is either the full manifest document or
//! `{"error": "<message>"}` for a batch that must fail.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use serde_json::Value;

use resource_synth::catalog;
use resource_synth::declaration::parse_document;
use resource_synth::SessionConfig;

const EXPECTED_SUFFIX: &str = ".expected.json";

fn main() -> ExitCode {
    let pattern = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/../fixtures/*.json").to_string());

    let fixtures = match collect_fixtures(&pattern) {
        Ok(xs) => xs,
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    let mut failed = 0usize;
    for fixture in &fixtures {
        let label = fixture
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match run_fixture(fixture) {
            Ok(()) => eprintln!("{} {label}", "✅ pass".green()),
            Err(reason) => {
                failed += 1;
                eprintln!("{} {label}\n{reason}", "❌ fail".red());
            }
        }
    }

    eprintln!("—— {} fixtures, {} failed ——", fixtures.len(), failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn collect_fixtures(pattern: &str) -> Result<Vec<PathBuf>, String> {
    let entries = glob::glob(pattern).map_err(|e| format!("bad fixture pattern {pattern}: {e}"))?;
    let mut out = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| e.to_string())?;
        if !path.to_string_lossy().ends_with(EXPECTED_SUFFIX) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn expected_path(fixture: &Path) -> PathBuf {
    let stem = fixture.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    fixture.with_file_name(format!("{stem}{EXPECTED_SUFFIX}"))
}

fn read_json(path: &Path) -> Result<Value, String> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&source).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

fn run_fixture(fixture: &Path) -> Result<(), String> {
    let expected = read_json(&expected_path(fixture))?;
    let declarations = parse_document(read_json(fixture)?).map_err(|e| e.to_string())?;

    // both execution modes must agree with the expectation
    for parallel in [false, true] {
        let session = catalog::session(SessionConfig { parallel, ..SessionConfig::default() });
        let actual = match session.declare_all(&declarations) {
            Ok(_) => session.document(),
            Err(error) => serde_json::json!({ "error": error.to_string() }),
        };
        if actual != expected {
            let pretty = |v: &Value| serde_json::to_string_pretty(v).unwrap_or_default();
            return Err(format!(
                "  mode: {}\n  expected:\n{}\n  actual:\n{}",
                if parallel { "parallel" } else { "sequential" },
                pretty(&expected),
                pretty(&actual),
            ));
        }
    }
    Ok(())
}

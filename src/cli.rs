//! Minimal CLI: declarations → (manifest | kind listing | check report)
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use resource_synth::catalog;
use resource_synth::declaration::{Declaration, parse_document_str, parse_ndjson};
use resource_synth::{Session, SessionConfig};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate resource declarations and synthesize a configuration manifest
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate declarations and print the synthesized manifest
    Synth(SynthOut),
    /// list the registered resource kinds
    Kinds(KindsOut),
    /// validate declarations and report references without emitting anything
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited declarations (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select the declarations inside each document (e.g. /stack/resources)
    #[arg(long)]
    json_pointer: Option<String>,

    /// accept resource names that are not valid block identifiers
    #[arg(long, default_value_t = false)]
    lax_names: bool,

    /// One or more inputs. May be literal paths or quoted glob patterns or '-' for stdin
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct SynthOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// validate on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// single-line JSON output
    #[arg(long)]
    compact: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct KindsOut {
    /// print each kind's attributes too
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every declaration from every input, grouped by source.
    fn load_declarations(&self) -> Result<Vec<(String, Vec<Declaration>)>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut out = Vec::with_capacity(source_paths.len());
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = read_source(&source_path)
                .with_context(|| format!("failed to read {source_path_str}"))?;
            let declarations = self
                .parse_source(&source)
                .with_context(|| format!("invalid declarations in {source_path_str}"))?;
            out.push((source_path_str, declarations));
        }
        Ok(out)
    }

    fn parse_source(&self, source: &str) -> Result<Vec<Declaration>> {
        let pointer = self.json_pointer.as_deref();
        let declarations = if self.ndjson {
            parse_ndjson(source, pointer)?
        } else {
            parse_document_str(source, pointer)?
        };
        Ok(declarations)
    }

    fn session(&self, parallel: bool) -> Session {
        catalog::session(SessionConfig { parallel, validate_names: !self.lax_names })
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Synth(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let session = target.input_settings.session(!target.sequential);
                for (source_path, declarations) in target.input_settings.load_declarations()? {
                    session.declare_all(&declarations).with_context(|| {
                        format!("failed to synthesize resources from {source_path}")
                    })?;
                }

                let document = session.document();
                let document_src = if target.compact {
                    serde_json::to_string(&document)?
                } else {
                    serde_json::to_string_pretty(&document)?
                };
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &document_src)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{document_src}");
                }
            }
            Command::Kinds(target) => {
                let session = catalog::session(SessionConfig::default());
                for module in session.modules() {
                    println!("{}", module.namespace().bold());
                    for kind in module.kinds() {
                        let outputs = kind.outputs().join(", ");
                        println!("  {}  outputs: {outputs}", kind.kind().cyan());
                        if !target.verbose {
                            continue;
                        }
                        for spec in kind.schema().attributes() {
                            let marker = if spec.is_required() { "*" } else { " " };
                            let expected = spec.descriptor().expected();
                            println!("    {marker} {} : {expected}", spec.name());
                        }
                    }
                }
            }
            Command::Check(target) => {
                let session = target.input_settings.session(false);
                let mut failures = 0usize;
                for (source_path, declarations) in target.input_settings.load_declarations()? {
                    for declaration in &declarations {
                        let address = format!("{}.{}", declaration.kind, declaration.name);
                        let checked = session.check(
                            &declaration.kind,
                            &declaration.name,
                            &declaration.attributes,
                        );
                        match checked {
                            Ok(reference) => {
                                let outputs: Vec<&str> =
                                    reference.outputs().values().map(String::as_str).collect();
                                println!("{} {address}  {}", "ok".green(), outputs.join(" "));
                            }
                            Err(error) => {
                                failures += 1;
                                println!("{} {address} ({source_path}): {error}", "FAIL".red());
                            }
                        }
                    }
                }
                if failures > 0 {
                    bail!("{failures} declaration(s) failed validation");
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_source(path: &Path) -> std::io::Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        return Ok(source);
    }
    std::fs::read_to_string(path)
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // an explicit glob that matches nothing is almost always a typo
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ndjson: bool, json_pointer: Option<&str>) -> InputSettings {
        InputSettings {
            ndjson,
            json_pointer: json_pointer.map(str::to_string),
            lax_names: false,
            input: vec!["-".to_string()],
        }
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "-"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("-")]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        assert!(resolve_file_path_patterns(["no/such/dir/*.json"]).is_err());
    }

    #[test]
    fn json_pointer_selects_the_declarations() {
        let src = r#"{"stack": {"resources": [{"kind": "k", "name": "a"}]}}"#;
        let decls = settings(false, Some("/stack")).parse_source(src).unwrap();
        assert_eq!(decls.len(), 1);
        assert!(settings(false, Some("/missing")).parse_source(src).is_err());
    }

    #[test]
    fn ndjson_lines_are_numbered_in_errors() {
        let src = "{\"kind\":\"k\",\"name\":\"a\"}\n{\"kind\":\"k\"}\n";
        let err = settings(true, None).parse_source(src).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}

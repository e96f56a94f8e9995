//! Transarc CLI - translate front-end bundles to the reference-counted model

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};
use walkdir::WalkDir;

use transarc_ast::printer::print_unit;
use transarc_driver::{
    BatchConfig, BatchReport, BatchSession, DriverError, FrontendBundle, ManifestEmitter,
    MemoryEmitter,
};

#[derive(Parser)]
#[command(name = "transarc")]
#[command(about = "Translate garbage-collected object programs to reference counting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate bundles and write the finalized units
    Translate {
        /// Bundle files or directories containing `*.json` bundles
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Batch configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output directory, overriding the config
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the batch report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print the rewritten units of a bundle
    Dump {
        /// Bundle file
        bundle: PathBuf,
        /// Batch configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Translate {
            inputs,
            config,
            output,
            report,
        } => cmd_translate(&inputs, config.as_deref(), output, report.as_deref()),
        Commands::Dump { bundle, config } => cmd_dump(&bundle, config.as_deref()),
    };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("[{}] {}", e.code(), e);
            eprintln!("error[{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<BatchConfig, DriverError> {
    match path {
        Some(path) => Ok(BatchConfig::load(path)?),
        None => Ok(BatchConfig::default()),
    }
}

/// Bundle files named on the command line, with directories walked for
/// `*.json`, in a stable order
fn collect_bundles(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut bundles = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            found.sort();
            bundles.extend(found);
        } else {
            bundles.push(input.clone());
        }
    }
    bundles
}

/// Returns whether every unit of every bundle was translated
fn cmd_translate(
    inputs: &[PathBuf],
    config: Option<&Path>,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
) -> Result<bool, DriverError> {
    let mut config = load_config(config)?;
    if let Some(output) = output {
        config.output_dir = output;
    }
    let emitter = ManifestEmitter::new(config.output_dir.clone());

    let mut reports = Vec::new();
    for path in collect_bundles(inputs) {
        info!("translating bundle {}", path.display());
        let bundle = FrontendBundle::load(&path)?;
        // Binding ids are per bundle, so each bundle is its own batch
        let (session, inputs) = BatchSession::from_bundle(config.clone(), bundle)?;
        let report = session.run(inputs, &emitter)?;
        print_failures(&report);
        println!("{}: {}", path.display(), report.summary());
        reports.push(report);
    }

    if let Some(report_path) = report_path {
        let json = serde_json::to_string_pretty(&reports).map_err(|source| DriverError::Bundle {
            path: report_path.to_path_buf(),
            source,
        })?;
        fs::write(report_path, json).map_err(|source| DriverError::Io {
            path: report_path.to_path_buf(),
            source,
        })?;
    }
    Ok(!reports.iter().any(BatchReport::has_failures))
}

fn cmd_dump(bundle_path: &Path, config: Option<&Path>) -> Result<bool, DriverError> {
    let config = load_config(config)?;
    let bundle = FrontendBundle::load(bundle_path)?;
    let (session, inputs) = BatchSession::from_bundle(config, bundle)?;
    let emitter = MemoryEmitter::new();
    let report = session.run(inputs, &emitter)?;

    for finalized in emitter.into_units() {
        println!("// ==== {} ====", finalized.name);
        for unit in &finalized.units {
            print!("{}", print_unit(unit, session.cache()));
        }
    }
    print_failures(&report);
    Ok(!report.has_failures())
}

fn print_failures(report: &BatchReport) {
    for unit in &report.units {
        for diagnostic in &unit.diagnostics {
            eprintln!("{}", diagnostic);
        }
        if let Some(err) = &unit.error {
            eprintln!("error: {}: {}", unit.path, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_bundles_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("nested/a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let single = dir.path().join("explicit.bundle");

        let found = collect_bundles(&[dir.path().to_path_buf(), single.clone()]);
        assert_eq!(
            found,
            vec![
                dir.path().join("b.json"),
                dir.path().join("nested/a.json"),
                single
            ]
        );
    }

    #[test]
    fn test_translate_empty_bundle_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("empty.json");
        fs::write(&bundle, r#"{ "bindings": [], "inputs": [] }"#).unwrap();
        let report = dir.path().join("report.json");

        let ok = cmd_translate(&[bundle], None, Some(dir.path().join("out")), Some(&report)).unwrap();
        assert!(ok);
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(written.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_cli_parses_translate() {
        let cli = Cli::try_parse_from(["transarc", "translate", "a.json", "-o", "gen"]).unwrap();
        match cli.command {
            Commands::Translate { inputs, output, .. } => {
                assert_eq!(inputs, vec![PathBuf::from("a.json")]);
                assert_eq!(output, Some(PathBuf::from("gen")));
            }
            Commands::Dump { .. } => panic!("expected translate"),
        }
    }
}

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use std::{path::Path, process::ExitCode};
use tsgd_project::{BuildReport, Paths, Project, build, init_project};

use args::{CliArgs, Command};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter())).init();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<ExitCode> {
    let root = match &args.path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };

    match &args.command {
        Command::Init => {
            init_project(&root).with_context(|| format!("cannot initialize {}", root.display()))?;
            println!("Created {}", root.join("tsgd.toml").display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Build => {
            let report = compile(&root, true)?;
            print_diagnostics(&report);
            if report.is_clean() {
                println!("Compiled {} files", report.compiled);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("nothing was written");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Check { json } => {
            let report = compile(&root, false)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report.diagnostics)?);
            } else {
                print_diagnostics(&report);
            }
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn compile(root: &Path, write: bool) -> Result<BuildReport> {
    let paths = Paths::load(root).with_context(|| format!("cannot load tsgd.toml from {}", root.display()))?;
    let mut project = Project::new(paths);
    let found = project.scan().context("cannot scan the project")?;
    log::info!("found {found} project files");
    Ok(build(&mut project, write)?)
}

fn print_diagnostics(report: &BuildReport) {
    for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
    }
    if !report.is_clean() {
        eprintln!("{} problems found", report.diagnostics.len());
    }
}

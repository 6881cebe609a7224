mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stepmake_lib::consts::{APP_NAME, DEFAULT_MARKER};
use stepmake_lib::rules::StepIndex;

use crate::cmd::{RunOptions, cmd_filter, run_targets};
use crate::output::{OutputFormat, print_error};

/// stepmake - build every numbered step of a program family
#[derive(Parser)]
#[command(name = APP_NAME)]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,

  #[command(flatten)]
  build: BuildArgs,
}

#[derive(Args, Debug)]
struct BuildArgs {
  /// Targets: all, regenerate-all (alls), sN, ssN, a step name, clean, dump
  #[arg(default_value = "all")]
  targets: Vec<String>,

  /// Project root
  #[arg(short = 'C', long = "directory", default_value = ".")]
  directory: PathBuf,

  /// Project file, relative to the project root
  #[arg(short, long)]
  file: Option<PathBuf>,

  /// Maximum number of processes running at once
  #[arg(short, long)]
  jobs: Option<usize>,

  /// Time budget for the whole run, e.g. 30s or 2m
  #[arg(long)]
  timeout: Option<humantime::Duration>,

  /// SDK root passed as -isysroot
  #[arg(long)]
  sdk_root: Option<PathBuf>,

  /// Optimization flag, empty to omit
  #[arg(short = 'O', long, allow_hyphen_values = true)]
  opt_level: Option<String>,

  /// Debug flag, empty to omit
  #[arg(short = 'g', long = "debug-flag", allow_hyphen_values = true)]
  debug_flag: Option<String>,

  /// Debug logging and verbose compiler invocations
  #[arg(short, long)]
  verbose: bool,

  /// Report what clean would remove without removing it
  #[arg(long)]
  dry_run: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the lines of a template that belong to one step
  Filter {
    /// Step to emit: a number or a single letter
    #[arg(long)]
    step: StepIndex,

    /// Marker that tags a line with a step index
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,

    /// Template file
    template: PathBuf,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.build.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<ExitCode> {
  if let Some(Commands::Filter { step, marker, template }) = cli.command {
    cmd_filter(step, &marker, &template)?;
    return Ok(ExitCode::SUCCESS);
  }

  let args = cli.build;
  let options = RunOptions {
    directory: args.directory,
    file: args.file,
    jobs: args.jobs,
    timeout: args.timeout.map(Into::into),
    sdk_root: args.sdk_root,
    opt_level: args.opt_level,
    debug: args.debug_flag,
    verbose: args.verbose,
    dry_run: args.dry_run,
    output: args.output,
  };

  let code = run_targets(&options, &args.targets)?;
  Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, ValueEnum};
use pkg_renamer_core::{
    app_paths, load_config, resolve_target, run_batch, AppConfig, BatchSummary, FormatMode,
    OutputFormat, PkgMetadataReader, RenameOptions, Renamer, AVAILABLE_FIELDS,
    READABLE_TEMPLATE,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pkg-renamer", version)]
#[command(
    about = "Renames PS4 pkg files to the Sony format (default), a readable name format or a custom format"
)]
struct Cli {
    /// The pkg file to rename (or directory when used with -d)
    #[arg(required_unless_present = "show_config")]
    pkg_path: Option<PathBuf>,
    /// Only test the formatting without renaming
    #[arg(short = 't')]
    test_run: bool,
    /// Custom file name format, e.g. '%TITLE% (%TITLE_ID%)'
    #[arg(short = 'c', value_name = "FORMAT")]
    custom_format: Option<String>,
    /// Use the readable name format
    #[arg(short = 'n')]
    name_format: bool,
    /// Rename all pkg files in the specified directory
    #[arg(short = 'd')]
    dir: bool,
    /// Include subdirectories (with -d)
    #[arg(short = 'r')]
    recursive: bool,
    /// Report format, defaults to the configured one
    #[arg(short = 'o', long, value_enum)]
    output: Option<OutputArg>,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    /// Print the config file location and effective settings, then exit
    #[arg(long)]
    show_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Table,
    Json,
}

impl From<OutputArg> for OutputFormat {
    fn from(value: OutputArg) -> Self {
        match value {
            OutputArg::Table => OutputFormat::Table,
            OutputArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let matches = Cli::command().after_help(fields_help()).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    init_logging(cli.verbose);

    let config = load_config()?;
    if cli.show_config {
        return cmd_show_config(&config);
    }
    cmd_rename(cli, config)
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn cmd_rename(cli: Cli, config: AppConfig) -> Result<()> {
    let pkg_path = cli.pkg_path.context("no pkg path given")?;
    let target = resolve_target(&pkg_path, cli.dir, cli.recursive || config.recursive)?;

    let options = RenameOptions {
        mode: FormatMode::select(
            cli.custom_format.or(config.custom_format),
            cli.name_format || config.readable_names,
        ),
        dry_run: cli.test_run,
        output: cli.output.map(Into::into).unwrap_or(config.output),
    };
    tracing::debug!(?target, ?options, "starting");

    let provider = PkgMetadataReader::new();
    let renamer = Renamer::new(&provider, &options);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run_batch(&target, &renamer, &mut out)?;
    out.flush()?;

    print_summary(&summary, options.dry_run);
    Ok(())
}

fn cmd_show_config(config: &AppConfig) -> Result<()> {
    let paths = app_paths()?;
    println!("config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn print_summary(summary: &BatchSummary, dry_run: bool) {
    eprintln!(
        "\nsummary: processed={} renamed={} would_rename={} skipped={} conflicts={} errors={}",
        summary.processed,
        summary.renamed,
        summary.would_rename,
        summary.skipped,
        summary.conflicts,
        summary.errors
    );
    if dry_run {
        eprintln!("test run: no files were renamed.");
    }
}

fn fields_help() -> String {
    let mut help = String::from(
        "Values can be inserted into a custom format by surrounding them with %-characters.\n\
         E.g. '%TITLE% (%TITLE_ID%)' results in 'Game name (CUSA01234)'.\n\n\
         Available values for formatting:\n",
    );
    for (name, description) in AVAILABLE_FIELDS {
        help.push_str(&format!("  {name:<12}{description}\n"));
    }
    help.push_str(&format!(
        "\nThe readable name format (-n) uses '{READABLE_TEMPLATE}'."
    ));
    help
}

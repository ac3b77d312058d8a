use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sku_filter::io::excel_write::DEFAULT_MAX_ROWS_PER_SHEET;
use sku_filter::io::source::workbook_kind_from_name;
use sku_filter::pipeline::DEFAULT_IDENTIFIER_COLUMN;
use sku_filter::{FilterOptions, Result, SavedOutcome, SourceInput, ToolError, filter_to_path};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Filter(args) => execute_filter(args),
    }
}

fn execute_filter(args: FilterArgs) -> Result<()> {
    let sources = expand_inputs(&args.input)?;
    if !args.reference.exists() {
        return Err(ToolError::MissingInput(args.reference));
    }
    let reference = SourceInput::from_path(&args.reference);

    let options = FilterOptions {
        identifier_column: args.identifier_column,
        reference_column: args.reference_column,
        max_rows_per_sheet: args.max_rows_per_sheet,
    };

    let outcome = filter_to_path(&sources, &reference, &options, &args.output)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(outcome.report())?);
        return Ok(());
    }

    match outcome {
        SavedOutcome::Written { path, report } => {
            for skipped in &report.skipped {
                println!(
                    "skipped {} in {}: {}",
                    skipped.entry, skipped.archive, skipped.reason
                );
            }
            println!(
                "filtered {} rows into {} sheet(s): {}",
                report.filtered_rows,
                report.sheet_rows.len(),
                path.display()
            );
        }
        SavedOutcome::NoMatches { .. } => {
            println!("no matching rows found for the given SKU list");
        }
    }
    Ok(())
}

/// Turns the `--input` arguments into sources. Directories expand to the
/// workbooks and archives directly inside them, sorted by name.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<SourceInput>> {
    let mut sources = Vec::new();
    for input in inputs {
        if !input.exists() {
            return Err(ToolError::MissingInput(input.clone()));
        }
        if input.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(input)? {
                let path = entry?.path();
                if path.is_file() && is_loadable(&path) {
                    files.push(path);
                }
            }
            files.sort();
            sources.extend(files.into_iter().map(SourceInput::from_path));
        } else {
            sources.push(SourceInput::from_path(input));
        }
    }
    Ok(sources)
}

fn is_loadable(path: &Path) -> bool {
    let name = path.to_string_lossy();
    workbook_kind_from_name(&name).is_some()
        || path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Extract the rows of Excel exports whose SKU code appears in a reference list."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Filter workbooks or zip archives of workbooks against a SKU list.
    Filter(FilterArgs),
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Workbook, zip archive, or directory of them. Repeatable.
    #[arg(long, required = true)]
    input: Vec<PathBuf>,

    /// Workbook holding the SKU list.
    #[arg(long)]
    reference: PathBuf,

    /// Path of the result workbook.
    #[arg(long)]
    output: PathBuf,

    /// Identifier column in the source sheets (case-insensitive).
    #[arg(long, default_value = DEFAULT_IDENTIFIER_COLUMN)]
    identifier_column: String,

    /// Identifier column in the SKU list (case-insensitive).
    #[arg(long, default_value = DEFAULT_IDENTIFIER_COLUMN)]
    reference_column: String,

    /// Maximum data rows per output sheet.
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS_PER_SHEET)]
    max_rows_per_sheet: usize,

    /// Print the run report as JSON instead of a summary line.
    #[arg(long)]
    json: bool,
}

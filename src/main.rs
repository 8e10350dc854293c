use clap::Parser;
use emo_onsets::ExtractionConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::filter::EnvFilter;

/// Writes trigger-relative onset files for both runs of the emotion task
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Name of tab-delimited text file to import
    #[arg(long, short)]
    input: PathBuf,

    /// Output path prefix
    #[arg(long, short)]
    output: String,
}

/// Logs to stderr, `info` unless RUST_LOG says otherwise
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let config = ExtractionConfig::new(args.input, args.output);
    match emo_onsets::run(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, input = %config.input.display(), "Extraction failed");
            ExitCode::FAILURE
        }
    }
}

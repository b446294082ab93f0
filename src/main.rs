use std::path::PathBuf;

use clap::Parser;
use outputs_booklet::logging::init_logging;
use outputs_booklet::render::{DEFAULT_OUTPUT_FILE, DEFAULT_SUBTITLE, DEFAULT_TITLE};
use outputs_booklet::{run, BookletOptions, Config, ModelTable};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Directory holding the generated images and their .txt sidecars
    #[arg(value_name = "DIR", default_value = "outputs")]
    root: PathBuf,

    /// File name of the booklet, written inside DIR
    #[arg(long, value_name = "FILE", default_value = DEFAULT_OUTPUT_FILE)]
    output: String,

    /// JSON model table replacing the built-in one
    #[arg(long, value_name = "FILE")]
    models: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,

    #[arg(long, default_value = DEFAULT_SUBTITLE)]
    subtitle: String,

    /// Show progress to stderr
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    progress: bool,

    /// Log level (error,warn,info,debug,trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let models = match &cli.models {
        Some(path) => ModelTable::from_json_file(path)?,
        None => ModelTable::builtin(),
    };
    let config = Config {
        root: cli.root,
        output_file: cli.output,
        models,
        booklet: BookletOptions {
            title: cli.title,
            subtitle: cli.subtitle,
        },
        progress: cli.progress,
    };
    run(&config)?;
    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};

mod controller;
mod dataset;
mod derived;
mod domain;
mod inputter;
mod logging;
mod model;
mod services;
mod state;
mod table;
mod types;
mod ui;

use controller::Controller;
use dataset::Dataset;
use domain::{TVConfig, TVError};
use logging::LogLevel;
use model::{Model, Status};
use ui::UI;

/// Browse a dataset and the predictions of models on it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dataset file (csv, parquet or arrow)
    dataset: String,
    /// Predictions file with an `id` column. Repeat per model.
    #[arg(short, long, value_name = "FILE")]
    predictions: Vec<String>,
    /// Milliseconds to wait for input before redrawing
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    /// Upper bound for the width of a single column
    #[arg(long, default_value_t = 40)]
    max_column_width: usize,
    /// Log file, defaults to dtv.log in the working directory
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Log level (overrides the RUST_LOG default)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: Args) -> Result<(), TVError> {
    let log_path = logging::init(args.log_file.as_deref(), args.log_level.map(Into::into))?;
    info!("Starting dtv, logging to {}", log_path.display());

    let config = TVConfig::default()
        .event_poll_time(args.poll_ms)
        .max_column_width(args.max_column_width);

    // Load everything before taking over the terminal so errors stay readable.
    let dataset = dataset::load_dataset(&dataset::expand_path(&args.dataset)?)?;
    let predictions = args
        .predictions
        .iter()
        .map(|p| dataset::expand_path(p))
        .collect::<Result<Vec<_>, _>>()?;

    let mut terminal = ratatui::try_init()?;
    let result = run_app(&mut terminal, &config, dataset, &predictions);
    ratatui::restore();
    result
}

fn run_app(
    terminal: &mut DefaultTerminal,
    config: &TVConfig,
    dataset: Dataset,
    predictions: &[PathBuf],
) -> Result<(), TVError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, dataset, size.width as usize, size.height as usize)?;
    for path in predictions {
        model.load_predictions(path)?;
    }
    let ui = UI::new(config);
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Bye");
    Ok(())
}

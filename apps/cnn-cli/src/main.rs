use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use cnn_core::{GrayscaleImage, Template, Tolerances};
use cnn_sim::CnnSimulation;

#[derive(Parser)]
#[command(name = "cnn-cli")]
#[command(about = "Cellular Neural Network simulator", long_about = None)]
struct Cli {
    /// Input image driving the feed-forward term (grayscale PNG)
    #[arg(short, long)]
    input: PathBuf,

    /// Template file (whitespace sections A/B/Z/C)
    #[arg(short, long)]
    template: PathBuf,

    /// Initial-state image; defaults to the input image
    #[arg(long)]
    initial_state: Option<PathBuf>,

    /// Simulated time horizon
    #[arg(short, long, default_value_t = 500.0)]
    duration: f64,

    /// Where to write the final state as a PNG
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Relative error tolerance for the adaptive stepper
    #[arg(long, default_value_t = 1e-3)]
    rel_tol: f64,

    /// Absolute error tolerance for the adaptive stepper
    #[arg(long, default_value_t = 1e-3)]
    abs_tol: f64,

    /// Log progress every N steps (0 disables progress logging)
    #[arg(long, default_value_t = 100)]
    progress_every: u64,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CliResult<()> {
    let input = load_image(&cli.input)?;
    let initial_state = match &cli.initial_state {
        Some(path) => load_image(path)?,
        None => input.clone(),
    };
    let template = Template::load_file(&cli.template)?;

    tracing::info!(
        width = input.width(),
        height = input.height(),
        duration = cli.duration,
        "starting simulation"
    );

    let mut sim = CnnSimulation::from_images(
        &initial_state,
        &input,
        template,
        cli.duration,
        Tolerances {
            abs: cli.abs_tol,
            rel: cli.rel_tol,
        },
    )?;

    let started = Instant::now();
    let mut steps: u64 = 0;
    let progress_every = cli.progress_every;
    let t_final = sim.run_with_handler(|t| {
        steps += 1;
        if progress_every > 0 && steps % progress_every == 0 {
            tracing::info!(step = steps, t, "simulating");
        }
        true
    });
    let elapsed = started.elapsed().as_secs_f64();

    tracing::info!(steps, t_final, elapsed_s = elapsed, "simulation finished");

    if let Some(output) = &cli.output {
        sim.extract_output().save_png(output)?;
        tracing::info!(path = %output.display(), "wrote final state");
    }

    Ok(())
}

/// Decode a PNG, turning the codec's empty-image sentinel into a CLI error.
fn load_image(path: &PathBuf) -> CliResult<GrayscaleImage> {
    let img = GrayscaleImage::load_png(path);
    if img.is_empty() {
        return Err(format!("could not decode image '{}'", path.display()).into());
    }
    Ok(img)
}

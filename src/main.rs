use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use streamprobe::artifacts::{ArtifactWriter, RunParameters};
use streamprobe::config::{MeasureArgs, MeasureSettings};
use streamprobe::engine::run_measurement_until;
use streamprobe::observability::{logging, ResourceMonitor, RunReport};
use streamprobe::source::{available_kinds, SourceRegistry};

#[derive(Debug, Parser)]
#[command(name = "streamprobe", version, about = "Measure timing quality of a real-time sample stream")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull from a stream for a while and report latency, jitter, drift and drops
    Measure(MeasureArgs),

    /// List built-in stream source kinds
    Sources,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Measure(args) => measure(args).await,
        Command::Sources => {
            for kind in available_kinds() {
                println!("{}", kind);
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn measure(args: MeasureArgs) -> Result<()> {
    let settings = MeasureSettings::resolve(&args)?;
    logging::init(&settings.log_level)?;

    let registry = SourceRegistry::from_settings(&settings.sources)?;
    let mut monitor = ResourceMonitor::with_sysinfo(ResourceMonitor::DEFAULT_INTERVAL)?;

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let outcome = run_measurement_until(&settings, &registry, Some(&mut monitor), interrupt).await?;

    let writer = ArtifactWriter::new(&settings.output_directory);
    writer.write_all(
        &outcome.chunks,
        &outcome.summary,
        outcome.resources.as_ref(),
        &RunParameters::from(&settings),
        Some(&outcome.stream),
    )?;

    if settings.print_summary {
        let report = RunReport::new(&outcome.summary, outcome.resources.as_ref());
        if settings.verbose_summary {
            print!("{}", report.verbose());
        } else {
            print!("{}", report.brief());
        }
        println!("Artifacts: {}", writer.directory().display());
    }
    if settings.json_summary {
        println!("{}", RunReport::new(&outcome.summary, outcome.resources.as_ref()).json_line()?);
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubescribe::cli::{BulkArgs, Cli, Commands, OutputFormat};
use tubescribe::output::{self, Render};
use tubescribe::{server, Config, TranscriptPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let config = Config::load().await?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let pipeline = Arc::new(TranscriptPipeline::new(config)?);
            server::serve(pipeline, &bind).await?;
        }
        Commands::Transcript {
            video_id,
            language,
            vtt,
            format,
            output,
        } => {
            let pipeline = TranscriptPipeline::new(config)?;
            let language = pipeline.language_or_default(language.as_deref());

            if vtt {
                let result = pipeline.caption_markup(&video_id, &language).await;
                emit(&result, &format, output).await?;
            } else {
                let result = pipeline.transcript(&video_id, &language).await;
                emit(&result, &format, output).await?;
            }
        }
        Commands::Channel { handle, bulk } => {
            let pipeline = TranscriptPipeline::new(config)?;
            let (language, max) = bulk_params(&pipeline, &bulk);

            let progress = spinner(cli.quiet, format!("Fetching transcripts for {}...", handle));
            let result = pipeline.bulk_channel(Some(&handle), &language, max).await;
            progress.finish_and_clear();

            emit(&result?, &bulk.format, bulk.output).await?;
        }
        Commands::Playlist { list, bulk } => {
            let pipeline = TranscriptPipeline::new(config)?;
            let (language, max) = bulk_params(&pipeline, &bulk);

            let progress = spinner(cli.quiet, format!("Fetching transcripts for playlist {}...", list));
            let result = pipeline.bulk_playlist(Some(&list), &language, max).await;
            progress.finish_and_clear();

            emit(&result?, &bulk.format, bulk.output).await?;
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                let path = config.write_template().await?;
                println!("Configuration written to: {}", path.display());
                println!("Edit it by hand; YOUTUBE_API_KEY, RAPIDAPI_KEY, RAPIDAPI_HOST and TUBESCRIBE_BIND override it.");
            }
        }
        Commands::Strategies => {
            let pipeline = TranscriptPipeline::new(config)?;
            println!("Transcript strategies, in the order they are tried:");
            for (i, name) in pipeline.fetcher().strategy_names().iter().enumerate() {
                println!("  {}. {}", i + 1, name);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "tubescribe=debug" } else { "tubescribe=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn bulk_params(pipeline: &TranscriptPipeline, bulk: &BulkArgs) -> (String, usize) {
    (
        pipeline.language_or_default(bulk.language.as_deref()),
        pipeline.clamp_max(bulk.max),
    )
}

fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        progress.set_style(style);
    }
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

async fn emit<T: Render>(value: &T, format: &OutputFormat, path: Option<PathBuf>) -> Result<()> {
    match path {
        Some(path) => {
            output::save_to_file(value, &path, format).await?;
            println!("Output saved to: {}", path.display());
        }
        None => output::print_to_console(value, format)?,
    }
    Ok(())
}

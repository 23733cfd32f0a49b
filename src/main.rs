//! gigazoom - Deep Zoom pyramids for gigapixel artworks.
//!
//! This binary converts images, lists converted artworks and serves the
//! gallery.

use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gigazoom::{
    config::{Cli, Command, ConvertConfig, ListConfig, ServeConfig},
    discover_artworks,
    pyramid::{progress_channel, CancelFlag, Progress},
    server::{create_router, RouterConfig},
    ConversionError, Converter,
};

/// Width of the progress bar in cells.
const PROGRESS_BAR_WIDTH: usize = 40;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Convert(config) => run_convert(config).await,
        Command::List(config) => run_list(config),
        Command::Serve(config) => run_serve(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "gigazoom=debug,tower_http=debug"
    } else {
        "gigazoom=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Convert Command
// =============================================================================

async fn run_convert(config: ConvertConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let cancel = CancelFlag::new();
    let converter = match Converter::new(config.conversion_options()) {
        Ok(converter) => converter.with_cancel_flag(cancel.clone()),
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (tx, rx) = progress_channel();
    let (converter, bar) = if config.no_progress {
        (converter, None)
    } else {
        (converter.with_progress(tx), Some(tokio::spawn(render_progress(rx))))
    };

    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling conversion");
            signal_flag.cancel();
        }
    });

    info!("Converting {} ...", config.source.display());
    let source = config.source.clone();
    let root = config.output_root.clone();
    let result = tokio::task::spawn_blocking(move || converter.convert(&source, &root)).await;

    // The progress sender is dropped with the converter, which ends the bar task.
    if let Some(bar) = bar {
        let _ = bar.await;
        eprintln!();
    }

    match result {
        Ok(Ok(record)) => {
            info!("DZI created successfully");
            println!("Slug:       {}", record.slug);
            println!("Name:       {}", record.display_name);
            println!(
                "Descriptor: {}",
                config.output_root.join(&record.descriptor_path).display()
            );
            println!();
            println!("Viewer links (gigazoom serve --root {}):", config.output_root.display());
            println!("  Viewer:   /view/{}", record.slug);
            println!("  Gallery:  /api/artworks");
            ExitCode::SUCCESS
        }
        Ok(Err(ConversionError::Cancelled)) => {
            warn!("Conversion cancelled, partial output removed");
            ExitCode::FAILURE
        }
        Ok(Err(e)) => {
            error!("Conversion failed: {}", e);
            if e.is_retryable() {
                error!("This looks like a filesystem problem; retrying may help");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Conversion task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Draw a progress bar until the sender side is dropped.
async fn render_progress(mut rx: watch::Receiver<Progress>) {
    let started = Instant::now();
    while rx.changed().await.is_ok() {
        let progress = *rx.borrow_and_update();
        let line = format_progress(&progress, started.elapsed().as_secs_f64());
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r{}", line);
        let _ = stderr.flush();
    }
}

/// `[████░░░░] 42% | 3.1s elapsed | 4s remaining`
fn format_progress(progress: &Progress, elapsed: f64) -> String {
    let fraction = progress.fraction();
    let filled = (PROGRESS_BAR_WIDTH as f64 * fraction) as usize;
    let bar = format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(PROGRESS_BAR_WIDTH - filled)
    );

    let eta = if fraction > 0.0 {
        format!("{:.0}s", elapsed * (1.0 - fraction) / fraction)
    } else {
        "calculating...".to_string()
    };

    format!(
        "[{}] {:3}% | {:.1}s elapsed | {} remaining",
        bar,
        progress.percent(),
        elapsed,
        eta
    )
}

// =============================================================================
// List Command
// =============================================================================

fn run_list(config: ListConfig) -> ExitCode {
    let records = match discover_artworks(&config.root) {
        Ok(records) => records,
        Err(e) => {
            error!("Cannot read {}: {}", config.root.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if config.json {
        match serde_json::to_string_pretty(&records) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Cannot serialize artworks: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    if records.is_empty() {
        println!("  (no artworks found in {})", config.root.display());
        return ExitCode::SUCCESS;
    }

    let slug_width = records.iter().map(|r| r.slug.len()).max().unwrap_or(0).max(4);
    println!("{:<slug_width$}  NAME", "SLUG", slug_width = slug_width);
    for record in &records {
        println!(
            "{:<slug_width$}  {}",
            record.slug,
            record.display_name,
            slug_width = slug_width
        );
    }
    println!();
    println!("Total: {} artwork(s)", records.len());

    ExitCode::SUCCESS
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    if !config.root.is_dir() {
        warn!(
            "Artwork root {} does not exist yet; the gallery will be empty",
            config.root.display()
        );
    }

    info!("Configuration:");
    info!("  Root: {}", config.root.display());
    info!(
        "  Thumbnails: {} px, {} cached",
        config.thumbnail_size, config.thumbnail_cache
    );
    match &config.cors_origins {
        Some(origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    let router = create_router(build_router_config(&config));
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/api/artworks", addr);
    info!("");
    info!("  View an artwork in your browser:");
    info!("    open http://{}/view/<slug>", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new(&config.root)
        .with_cache_max_age(config.cache_max_age)
        .with_thumbnails(config.thumbnail_size, config.thumbnail_cache)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

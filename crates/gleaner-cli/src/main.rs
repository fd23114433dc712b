use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gleaner_core::config::{CompiledSite, SiteConfig};
use gleaner_core::throttle::{ThrottleConfig, ThrottledRenderer};
use gleaner_core::traits::Renderer;
use gleaner_core::{ListingPipeline, RunState};

#[derive(Parser)]
#[command(name = "gleaner", version, about = "Listing extraction and enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one site and emit the records as JSON
    Run {
        /// Path to the site configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Write records to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Override the configured batch size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Override the configured enrichment concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        /// Minimum delay between navigations to the same domain, in ms
        #[arg(long)]
        throttle_ms: Option<u64>,

        /// Render with headless Chromium instead of plain HTTP
        #[arg(long, default_value_t = false)]
        browser: bool,
    },

    /// Validate a site configuration without navigating anywhere
    Check {
        /// Path to the site configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gleaner_core=info".parse()?)
                .add_directive("gleaner_render=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            out,
            limit,
            concurrency,
            throttle_ms,
            browser,
        } => {
            let mut site = load_site(&config)?;
            if let Some(limit) = limit {
                site.batch.batch_size = limit;
            }
            if let Some(concurrency) = concurrency {
                site.batch.concurrency = concurrency;
            }

            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Ctrl-C received; aborting run");
                    signal_cancel.cancel();
                }
            });

            if browser {
                #[cfg(feature = "browser")]
                {
                    let renderer = gleaner_render::BrowserRenderer::new()
                        .await
                        .map_err(anyhow::Error::from)?;
                    dispatch(renderer, throttle_ms, site, out.as_deref(), cancel).await?;
                }
                #[cfg(not(feature = "browser"))]
                anyhow::bail!(
                    "this binary was built without the 'browser' feature; rebuild with --features browser"
                );
            } else {
                let renderer = gleaner_render::HttpRenderer::new()?;
                dispatch(renderer, throttle_ms, site, out.as_deref(), cancel).await?;
            }
        }
        Commands::Check { config } => {
            let site = load_site(&config)?;
            cmd_check(&site);
        }
    }

    Ok(())
}

fn load_site(path: &Path) -> Result<CompiledSite> {
    let config = SiteConfig::load(path)
        .with_context(|| format!("failed to load site file {}", path.display()))?;
    config
        .compile()
        .with_context(|| format!("site file {} did not validate", path.display()))
}

/// Optionally wrap the renderer in a per-domain throttle, then run.
async fn dispatch<R: Renderer>(
    renderer: R,
    throttle_ms: Option<u64>,
    site: CompiledSite,
    out: Option<&Path>,
    cancel: CancellationToken,
) -> Result<()> {
    match throttle_ms {
        Some(ms) if ms > 0 => {
            let throttled =
                ThrottledRenderer::new(renderer, ThrottleConfig::new(Duration::from_millis(ms)));
            cmd_run(throttled, site, out, cancel).await
        }
        _ => cmd_run(renderer, site, out, cancel).await,
    }
}

async fn cmd_run<R: Renderer>(
    renderer: R,
    site: CompiledSite,
    out: Option<&Path>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!(site = %site.name, url = %site.listing_url, "Starting run");

    let mut pipeline = ListingPipeline::new(renderer, site.listing_url, site.extraction)
        .with_config(site.batch);
    if let Some(enrichment) = site.enrichment {
        pipeline = pipeline.with_enrichment(enrichment);
    }

    let run = tokio::select! {
        run = pipeline.run() => run?,
        () = cancel.cancelled() => anyhow::bail!("run interrupted"),
    };

    debug_assert_eq!(run.state, RunState::Done);
    tracing::info!(
        run_id = %run.run_id,
        raw = run.raw_count,
        unique = run.unique_count,
        kept = run.records.len(),
        elapsed_ms = (run.finished_at - run.started_at).num_milliseconds(),
        "Run finished"
    );

    let json = serde_json::to_string_pretty(&run.records)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(records = run.records.len(), out = %path.display(), "Records written");
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_check(site: &CompiledSite) {
    println!("site:        {}", site.name);
    println!("listing url: {}", site.listing_url);
    println!(
        "containers:  {}",
        site.extraction.containers.exprs().join(" | ")
    );
    println!(
        "enrichment:  {}",
        if site.enrichment.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "batch:       size={} concurrency={} timeout={}s",
        site.batch.batch_size,
        site.batch.concurrency,
        site.batch.nav_timeout.as_secs()
    );
    println!("OK: configuration is valid");
}

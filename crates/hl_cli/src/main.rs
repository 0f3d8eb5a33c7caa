use clap::Parser;
use hl_cli::logging::init_logging;
use hl_cli::telemetry::install_prometheus;
use hl_cli::{Scheduler, Settings};
use hl_core::ArticleStore;
use hl_feed::{FeedParser, HttpFeedSource, HttpImageFetcher, IngestManager};
use hl_inference::SentimentBatcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "headline", author, version, about = "News feed ingestion with sentiment enrichment", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run ingestion cycles on the configured interval until interrupted
    Run,
    /// Run a single ingestion cycle and print its report
    Once,
    /// Serve the article query and feedback API
    Serve,
}

async fn build_manager(settings: &Settings, store: Arc<dyn ArticleStore>) -> hl_core::Result<IngestManager> {
    let timeout = settings.http_timeout.0;

    let source = HttpFeedSource::new(settings.feed_url()?, timeout)?;
    info!("📡 Feed source: {}", source.url());

    let images = HttpImageFetcher::new(timeout)?.with_max_bytes(settings.image_max_bytes);
    let parser = FeedParser::new(Arc::new(images), settings.offset()?).with_concurrency(settings.image_concurrency);

    let model = hl_inference::create_model(Some(settings.inference_config())).await?;
    info!("🧠 Inference model initialized successfully (using {})", model.name());
    let batcher = SentimentBatcher::new(model, settings.batch_size)?.with_concurrency(settings.inference_concurrency);

    Ok(IngestManager::new(Arc::new(source), parser, batcher, store))
}

/// Cancels `token` on SIGINT or SIGTERM.
fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = sigterm.recv() => {},
                    }
                }
                Err(e) => {
                    warn!("Failed to register SIGTERM handler: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        info!("🛑 Shutdown requested");
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = cli.settings;

    init_logging(settings.log_file.as_deref())?;
    settings.validate()?;
    if let Some(addr) = settings.metrics_addr {
        install_prometheus(addr)?;
    }

    let location = settings.storage_location()?;
    let store = hl_storage::create_storage(&settings.storage, location.as_deref()).await?;

    let shutdown = CancellationToken::new();

    match cli.command {
        Commands::Run => {
            let manager = build_manager(&settings, store).await?;
            let scheduler = Scheduler::new(settings.poll_interval.0, settings.misfire_grace.0)?;
            cancel_on_signal(shutdown.clone());
            let stats = scheduler.run(|| manager.run_cycle(), shutdown).await;
            info!("✨ Scheduler finished: {:?}", stats);
        }
        Commands::Once => {
            let manager = build_manager(&settings, store).await?;
            let report = manager.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve => {
            let state = hl_web::AppState::new(store, settings.feedback_path.clone(), settings.offset()?);
            cancel_on_signal(shutdown.clone());
            hl_web::serve(settings.listen_addr, state, shutdown.cancelled_owned()).await?;
        }
    }

    Ok(())
}

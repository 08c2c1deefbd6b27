//! Rental ETL runner - extracts the three collections, transforms them into
//! eight tables and loads them into PostgreSQL

mod logging;

use anyhow::{Context, Result};
use rental_etl::etl::config::Config;
use rental_etl::etl::fetch::{extract_all, ExportSource};
use rental_etl::etl::report::separator;
use rental_etl::etl::transform::{transform_with, TransformContext, TransformOptions};
use rental_etl::etl::write::load_bundle;
use sqlx::PgPool;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging; the guard must outlive the run
    let _guard = logging::init_logging(config.log_dir.as_deref())?;

    separator();
    info!("Starting rental ETL pipeline");
    info!("Configuration loaded: source {:?}", config.source);

    match run(&config).await {
        Ok(()) => {
            info!("Rental ETL pipeline complete");
            separator();
            Ok(())
        }
        Err(e) => {
            error!("✗ Pipeline failed: {:#}", e);
            separator();
            Err(e)
        }
    }
}

async fn run(config: &Config) -> Result<()> {
    // Step 1: Extract raw collections
    info!("Step 1/3: Extracting collections...");
    let source = ExportSource::new(config.source.clone());
    let raw = extract_all(&source, &config.collections)
        .await
        .context("Extraction failed")?;
    info!(
        "✓ Extracted {} listings, {} reviews, {} calendar days",
        raw.listings.len(),
        raw.reviews.len(),
        raw.calendar.len()
    );
    separator();

    // Step 2: Transform into the eight tables
    info!("Step 2/3: Transforming...");
    let options = TransformOptions {
        tie_break: config.tie_break,
    };
    let mut ctx = TransformContext::default();
    let bundle = transform_with(&mut ctx, &raw, &options).context("Transformation failed")?;
    let excluded: usize = ctx.report.entries().iter().map(|f| f.excluded()).sum();
    info!(
        "✓ Transform complete: {} filter steps, {} rows excluded",
        ctx.report.entries().len(),
        excluded
    );
    separator();

    if config.dry_run {
        warn!("DRY_RUN set, skipping load");
        return Ok(());
    }

    // Step 3: Load into the database
    info!("Step 3/3: Loading into database...");
    let db = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected");

    let result = load_bundle(&db, &bundle).await;
    db.close().await;

    let stats = result.context("Load failed")?;
    let inserted: usize = stats.iter().map(|s| s.inserted).sum();
    info!("✓ Load complete: {} rows across {} tables", inserted, stats.len());

    Ok(())
}

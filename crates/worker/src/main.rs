use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agripredict_core::ingest::dataset;
use agripredict_core::ingest::source::{DatasetSource, FileDatasetSource, HttpDatasetSource};
use agripredict_core::resolve::index::FeatureIndex;
use agripredict_core::schema::InputSchema;
use agripredict_core::storage::artifacts;

mod summary;

#[derive(Debug, Parser)]
#[command(name = "agripredict_worker")]
struct Args {
    /// Local dataset snapshot (.csv or .zip). When omitted, the dataset is
    /// downloaded from DATASET_BASE_URL.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Output directory for build artifacts. Defaults to ARTIFACT_DIR.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Do everything except writing artifacts.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = agripredict_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let source: Box<dyn DatasetSource> = match &args.dataset {
        Some(path) => Box::new(FileDatasetSource::new(path.clone())),
        None => Box::new(HttpDatasetSource::from_settings(&settings)?),
    };

    tracing::info!(source = source.source_name(), "fetching dataset");
    let bytes = source.fetch_dataset().await?;
    let records = dataset::parse_dataset(&bytes)?;
    tracing::info!(rows = records.len(), "historical dataset loaded");

    let build_started = std::time::Instant::now();
    let index = match FeatureIndex::build(&records) {
        Ok(index) => index,
        Err(err) => {
            let err = anyhow::Error::new(err).context("feature index build failed");
            sentry_anyhow::capture_anyhow(&err);
            return Err(err);
        }
    };
    let schema = InputSchema::from_records(&records);

    let summary = summary::IndexSummary::new(&index);
    for (level, count) in &summary.counts {
        tracing::info!(level = %level.label(), entries = count, "index level built");
    }
    tracing::info!(
        total_entries = index.len(),
        states = schema.states.len(),
        elapsed_ms = build_started.elapsed().as_millis(),
        "feature index built"
    );

    if args.dry_run {
        tracing::info!(dry_run = true, "skipping artifact writes");
        return Ok(());
    }

    let out_dir = args
        .out_dir
        .unwrap_or_else(|| PathBuf::from(settings.artifact_dir()));

    artifacts::save_feature_index(&out_dir, &index, records.len())
        .context("write feature index artifact failed")?;
    artifacts::save_input_schema(&out_dir, &schema)
        .context("write input schema artifact failed")?;

    tracing::info!(out_dir = %out_dir.display(), "artifacts written");
    Ok(())
}

fn init_sentry(settings: &agripredict_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

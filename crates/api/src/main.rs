use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agripredict_core::domain::request::PredictionRequest;
use agripredict_core::model::linear::LinearModel;
use agripredict_core::model::{ModelMetadata, PriceModel};
use agripredict_core::resolve::index::FeatureIndex;
use agripredict_core::schema::InputSchema;
use agripredict_core::storage::artifacts;

const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://127.0.0.1:5173",
    "http://localhost:3000",
];

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

    // Every artifact must load and validate before the listener binds. A
    // missing or drifted artifact is fatal; there is no degraded mode where
    // requests could see a partially loaded index.
    let artifact_dir = PathBuf::from(settings.artifact_dir());
    let index = artifacts::load_feature_index(&artifact_dir)
        .context("load feature index artifact failed")?;
    let schema = artifacts::load_input_schema(&artifact_dir)
        .context("load input schema artifact failed")?;
    let model = artifacts::load_price_model(&artifact_dir)
        .context("load price model artifact failed")?;
    let metadata = artifacts::load_model_metadata(&artifact_dir)
        .context("load model metadata artifact failed")?;

    tracing::info!(
        index_entries = index.len(),
        states = schema.states.len(),
        model = model.name(),
        model_version = %metadata.model_version,
        "artifacts loaded"
    );

    let state = AppState {
        index: Arc::new(index),
        schema: Arc::new(schema),
        model: Arc::new(model),
        metadata: Arc::new(metadata),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/healthz", get(healthz))
        .route("/metadata", get(get_metadata))
        .route("/states", get(get_states))
        .route("/districts", get(get_districts))
        .route("/markets", get(get_markets))
        .route("/commodities", get(get_commodities))
        .route("/varieties", get(get_varieties))
        .route("/grades", get(get_grades))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&settings)?);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug, Clone)]
struct AppState {
    index: Arc<FeatureIndex>,
    schema: Arc<InputSchema>,
    model: Arc<LinearModel>,
    metadata: Arc<ModelMetadata>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "model_info": &*state.metadata,
    }))
}

async fn get_metadata(State(state): State<AppState>) -> Json<ModelMetadata> {
    Json((*state.metadata).clone())
}

async fn get_states(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.schema.states.clone())
}

#[derive(Debug, Deserialize)]
struct DistrictsQuery {
    state: String,
}

async fn get_districts(
    State(state): State<AppState>,
    Query(q): Query<DistrictsQuery>,
) -> Json<Vec<String>> {
    Json(state.schema.districts_for(&q.state).to_vec())
}

#[derive(Debug, Deserialize)]
struct MarketsQuery {
    state: String,
    district: String,
}

async fn get_markets(
    State(state): State<AppState>,
    Query(q): Query<MarketsQuery>,
) -> Json<Vec<String>> {
    Json(state.schema.markets_for(&q.state, &q.district).to_vec())
}

#[derive(Debug, Deserialize)]
struct CommoditiesQuery {
    state: String,
    district: String,
    market: String,
}

async fn get_commodities(
    State(state): State<AppState>,
    Query(q): Query<CommoditiesQuery>,
) -> Json<Vec<String>> {
    Json(
        state
            .schema
            .commodities_for(&q.state, &q.district, &q.market)
            .to_vec(),
    )
}

#[derive(Debug, Deserialize)]
struct VarietiesQuery {
    commodity: String,
}

async fn get_varieties(
    State(state): State<AppState>,
    Query(q): Query<VarietiesQuery>,
) -> Json<Vec<String>> {
    Json(state.schema.varieties_for(&q.commodity).to_vec())
}

#[derive(Debug, Deserialize)]
struct GradesQuery {
    commodity: String,
    variety: String,
}

async fn get_grades(
    State(state): State<AppState>,
    Query(q): Query<GradesQuery>,
) -> Json<Vec<String>> {
    Json(state.schema.grades_for(&q.commodity, &q.variety).to_vec())
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    prediction: f64,
    fallback_used: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    // Resolution failures are the caller's to correct: a missing field or a
    // commodity the training data never saw.
    let resolution = state.index.resolve(&request).map_err(|err| {
        tracing::debug!(error = %err, "prediction request rejected");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                detail: err.to_string(),
            }),
        )
    })?;

    let row = resolution
        .features
        .model_row(state.model.feature_columns())
        .map_err(internal_error)?;
    let log_price = state
        .model
        .predict_log_price(&row)
        .map_err(internal_error)?;

    // Model output is log-scale; convert back and round to paise.
    let prediction = (log_price.exp() * 100.0).round() / 100.0;
    let fallback_used = resolution.matched_level.label();

    tracing::debug!(prediction, fallback = %fallback_used, "prediction served");

    Ok(Json(PredictResponse {
        prediction,
        fallback_used,
    }))
}

fn internal_error(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "prediction failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            detail: "internal error".to_string(),
        }),
    )
}

fn cors_layer(settings: &agripredict_core::config::Settings) -> anyhow::Result<CorsLayer> {
    let configured: Vec<String> = match settings.cors_allowed_origins.as_deref() {
        Some(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
    };

    let mut origins = Vec::with_capacity(configured.len());
    for origin in &configured {
        origins.push(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin '{origin}'"))?,
        );
    }

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

//! HTTP surface for picking a school and radius.
//!
//! The data store is loaded before the listener binds and shared read-only
//! across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use schoolmail::config::{Config, Overrides};
use schoolmail::error::QueryError;
use schoolmail::export::{MailingRow, MapPreview};
use schoolmail::service::{MailerService, EMPTY_MESSAGE};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "School mailer HTTP server")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Application state shared across handlers
struct AppState {
    service: MailerService,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    config.apply(args.overrides);

    info!("School mailer server");

    // Fail before binding if either dataset is unavailable
    let service = MailerService::open(&config)?;
    let state = Arc::new(AppState { service });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/schools", get(schools_handler))
        .route("/v1/within", get(within_handler))
        .route("/v1/export", get(export_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(e: QueryError) -> (StatusCode, String) {
    let status = match e {
        QueryError::UnknownLabel(_) | QueryError::EmptyResult => StatusCode::NOT_FOUND,
        QueryError::RadiusOutOfRange { .. } => StatusCode::BAD_REQUEST,
        _ => {
            tracing::error!("Query failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    strategy: &'static str,
    crs: String,
    schools: usize,
    addresses: usize,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.service.store();
    Json(HealthResponse {
        status: "ok",
        strategy: state.service.filter().name(),
        crs: store.crs().to_string(),
        schools: store.labels().len(),
        addresses: store.candidates().len(),
    })
}

#[derive(Serialize)]
struct SchoolsResponse {
    schools: Vec<String>,
    radius: RadiusOptions,
}

#[derive(Serialize)]
struct RadiusOptions {
    min: f64,
    max: f64,
    step: f64,
    default: f64,
    steps: Vec<f64>,
}

/// School list and slider bounds
async fn schools_handler(State(state): State<Arc<AppState>>) -> Json<SchoolsResponse> {
    let policy = state.service.policy();
    Json(SchoolsResponse {
        schools: state.service.labels().to_vec(),
        radius: RadiusOptions {
            min: policy.min,
            max: policy.max,
            step: policy.step,
            default: policy.default,
            steps: policy.steps(),
        },
    })
}

#[derive(Deserialize)]
struct SelectionParams {
    /// School label
    school: String,
    /// Radius in miles; defaults to the configured default
    radius: Option<f64>,
}

#[derive(Serialize)]
struct WithinResponse {
    school: String,
    radius_mi: f64,
    count: usize,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    /// Export file name, absent when there is nothing to export
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    map: MapPreview,
    rows: Vec<MailingRow>,
}

/// Map preview and rows for one selection
async fn within_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SelectionParams>,
) -> Result<Json<WithinResponse>, (StatusCode, String)> {
    let radius = params.radius.unwrap_or(state.service.policy().default);
    let selection = state
        .service
        .within(&params.school, radius)
        .map_err(error_response)?;

    let map = selection.map_preview().map_err(error_response)?;
    let empty = selection.is_empty();

    Ok(Json(WithinResponse {
        school: selection.reference.label.clone(),
        radius_mi: selection.radius.value(),
        count: selection.count(),
        summary: selection.summary(),
        message: empty.then_some(EMPTY_MESSAGE),
        filename: (!empty).then(|| selection.filename()),
        map,
        rows: selection.rows(),
    }))
}

/// Mailing list download
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SelectionParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let radius = params.radius.unwrap_or(state.service.policy().default);
    let selection = state
        .service
        .within(&params.school, radius)
        .map_err(error_response)?;

    let csv = selection.to_csv().map_err(error_response)?;
    let disposition = format!("attachment; filename=\"{}\"", selection.filename());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

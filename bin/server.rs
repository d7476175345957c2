// Training Compliance Matrix - Web Server
// Read-only REST API over the compliance table

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use training_matrix::{
    config::DEFAULT_CONFIG_FILE, expired_by_training, logging, projection::flat_rows,
    upcoming_expirations, ComplianceTable, ExportFormat, FlatRow, InputSnapshot, JoinReport,
    Pipeline, RecordFilter, Settings, SnapshotCache, Status, StatusMatrix, StatusSummary,
    TrainingCount,
};

#[derive(Parser)]
#[command(author, version, about = "Training compliance API server")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Loaded inputs plus the table cache
struct Inputs {
    snapshot: InputSnapshot,
    /// Computed once per load so requests do not re-hash the snapshot
    fingerprint: String,
    cache: SnapshotCache,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
    inputs: Arc<Mutex<Inputs>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Error that renders as a JSON envelope
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Table for today, computed once per (inputs, date)
fn current_table(state: &AppState) -> Result<Arc<ComplianceTable>, ApiError> {
    let today: NaiveDate = Local::now().date_naive();
    let mut inputs = state
        .inputs
        .lock()
        .map_err(|_| ApiError::internal("input state lock poisoned"))?;
    let Inputs {
        snapshot,
        fingerprint,
        cache,
    } = &mut *inputs;
    Ok(cache.get_or_compute_with(fingerprint, snapshot, today))
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Deserialize, Default)]
struct RecordsQuery {
    /// Comma separated status labels
    status: Option<String>,
    employee: Option<String>,
    training: Option<String>,
}

impl RecordsQuery {
    fn into_filter(self) -> Result<RecordFilter, ApiError> {
        let statuses = match self.status.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(|label| {
                    Status::from_label(label)
                        .ok_or_else(|| ApiError::bad_request(format!("unknown status '{label}'")))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(RecordFilter {
            statuses,
            employee: self.employee.filter(|e| !e.is_empty()),
            training: self.training.filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct HorizonQuery {
    days: Option<i64>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/records - Classified rows, filtered by status/employee/training
async fn get_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> ApiResult<Vec<FlatRow>> {
    let filter = query.into_filter()?;
    let table = current_table(&state)?;
    Ok(Json(ApiResponse::ok(flat_rows(filter.apply(&table)))))
}

/// GET /api/matrix - Employee × training status matrix
async fn get_matrix(State(state): State<AppState>) -> ApiResult<StatusMatrix> {
    let table = current_table(&state)?;
    Ok(Json(ApiResponse::ok(StatusMatrix::build(&table.rows))))
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: StatusSummary,
    join: JoinReport,
}

/// GET /api/summary - Status counts and join report
async fn get_summary(State(state): State<AppState>) -> ApiResult<SummaryResponse> {
    let table = current_table(&state)?;
    Ok(Json(ApiResponse::ok(SummaryResponse {
        summary: StatusSummary::from_table(&table),
        join: table.join.clone(),
    })))
}

/// GET /api/expired-by-training?limit=N - Trainings with most expired rows
async fn get_expired_by_training(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<TrainingCount>> {
    let limit = query
        .limit
        .unwrap_or(state.settings.classification.expired_top_n);
    let table = current_table(&state)?;
    Ok(Json(ApiResponse::ok(expired_by_training(&table, limit))))
}

/// GET /api/upcoming?days=N - Rows expiring within N days
async fn get_upcoming(
    State(state): State<AppState>,
    Query(query): Query<HorizonQuery>,
) -> ApiResult<Vec<FlatRow>> {
    let days = query
        .days
        .unwrap_or(state.settings.classification.upcoming_horizon_days);
    if days < 0 {
        return Err(ApiError::bad_request("days must not be negative"));
    }
    let table = current_table(&state)?;
    Ok(Json(ApiResponse::ok(flat_rows(upcoming_expirations(&table, days)))))
}

/// GET /api/export/:file - Download an export
async fn get_export(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let format = match file.as_str() {
        "details.csv" => ExportFormat::DetailsCsv,
        "matrix.csv" => ExportFormat::MatrixCsv,
        "rows.json" => ExportFormat::Json,
        "employees.json" => ExportFormat::EmployeesJson,
        other => return Err(ApiError::not_found(format!("unknown export '{other}'"))),
    };

    let table = current_table(&state)?;
    let body = format.render(&table).map_err(|e| {
        error!(error = %e, "export failed");
        ApiError::internal(e.to_string())
    })?;

    let disposition = format!("attachment; filename=\"{}\"", format.file_name(table.as_of));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[derive(Serialize)]
struct ReloadResponse {
    trainings: usize,
    employees: usize,
    fingerprint: String,
}

/// POST /api/reload - Re-read both sources from disk
async fn reload(State(state): State<AppState>) -> ApiResult<ReloadResponse> {
    let snapshot = InputSnapshot::load(&state.settings).map_err(|e| {
        error!(error = %e, "reload failed");
        ApiError::internal(e.to_string())
    })?;

    let response = ReloadResponse {
        trainings: snapshot.trainings.len(),
        employees: snapshot.employees.len(),
        fingerprint: snapshot.fingerprint(),
    };

    let mut inputs = state
        .inputs
        .lock()
        .map_err(|_| ApiError::internal("input state lock poisoned"))?;
    inputs.snapshot = snapshot;
    inputs.fingerprint = response.fingerprint.clone();
    inputs.cache.clear();

    info!(
        trainings = response.trainings,
        employees = response.employees,
        "sources reloaded"
    );

    Ok(Json(ApiResponse::ok(response)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/records", get(get_records))
        .route("/matrix", get(get_matrix))
        .route("/summary", get(get_summary))
        .route("/expired-by-training", get(get_expired_by_training))
        .route("/upcoming", get(get_upcoming))
        .route("/export/:file", get(get_export))
        .route("/reload", post(reload))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose.max(1))?;

    let settings = Settings::load(&cli.config)?;

    let snapshot = match InputSnapshot::load(&settings) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!(
                "   Expected trainings at {} and roster at {}",
                settings.sources.trainings_path.display(),
                settings.sources.roster_path.display()
            );
            std::process::exit(1);
        }
    };

    let bind = settings.server.bind.clone();
    let state = AppState {
        inputs: Arc::new(Mutex::new(Inputs {
            fingerprint: snapshot.fingerprint(),
            snapshot,
            cache: SnapshotCache::new(Pipeline::from_settings(&settings)),
        })),
        settings: Arc::new(settings),
    };

    let listener = tokio::net::TcpListener::bind(&bind).await?;

    println!("\n🚀 Server running on http://{}", bind);
    println!("   API: http://{}/api/records", bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

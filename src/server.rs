//! HTTP JSON surface for the dashboards.
//!
//! Every request loads (or reuses) the dashboard's dataset and recomputes
//! the report from it; the only shared state is the dataset cache and the
//! last uploaded workbook per dashboard. File reads and report builds run on
//! the blocking thread pool.

use actix_web::error::BlockingError;
use actix_web::http::{header, StatusCode};
use actix_web::{middleware, web, App, HttpResponse, HttpServer, ResponseError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{Config, SourceConfig};
use crate::error::EngineError;
use crate::loader::{load_xlsx_bytes, DatasetCache};
use crate::report::{finanzas, load_source, pagos};
use crate::table::Dataset;

const PAGOS: &str = "pagos";
const FINANZAS: &str = "finanzas";
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    config: Config,
    cache: Mutex<DatasetCache>,
    uploads: Mutex<HashMap<String, Arc<[u8]>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            cache: Mutex::new(DatasetCache::new()),
            uploads: Mutex::new(HashMap::new()),
        }
    }

    fn source(&self, dashboard: &str) -> Result<&SourceConfig, ApiError> {
        match dashboard {
            PAGOS => Ok(&self.config.pagos),
            FINANZAS => Ok(&self.config.finanzas),
            other => Err(ApiError::UnknownDashboard(other.to_string())),
        }
    }

    /// Dataset for `dashboard`: the file on disk, else the last upload.
    fn dataset(&self, dashboard: &str) -> Result<Arc<Dataset>, ApiError> {
        let source = self.source(dashboard)?;
        let upload = lock(&self.uploads).get(dashboard).cloned();
        let mut cache = lock(&self.cache);
        Ok(load_source(&mut cache, dashboard, source, upload.as_deref())?)
    }
}

/// A poisoned lock only means another request panicked mid-update; the
/// cache and uploads are still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    UnknownDashboard(String),
    Blocking,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Engine(e) => write!(f, "{}", e),
            ApiError::UnknownDashboard(name) => write!(f, "Unknown dashboard: {}", name),
            ApiError::Blocking => write!(f, "Worker thread failed"),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<BlockingError> for ApiError {
    fn from(_: BlockingError) -> Self {
        ApiError::Blocking
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownDashboard(_) => StatusCode::NOT_FOUND,
            ApiError::Blocking => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Engine(e) => match e {
                EngineError::MissingSource(_) => StatusCode::NOT_FOUND,
                EngineError::MissingColumn(_)
                | EngineError::SheetNotFound(_)
                | EngineError::InvalidFormat(_)
                | EngineError::XlsxRead(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "tablero server is running"
    }))
}

async fn pagos_report(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let report = web::block(move || -> Result<_, ApiError> {
        let dataset = state.dataset(PAGOS)?;
        Ok(pagos::build(&dataset, &state.config))
    })
    .await??;
    Ok(HttpResponse::Ok().json(report))
}

async fn finanzas_report(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let report = web::block(move || -> Result<_, ApiError> {
        let dataset = finanzas::prepare(&state.dataset(FINANZAS)?)?;
        Ok(finanzas::build(&dataset, &state.config))
    })
    .await??;
    Ok(HttpResponse::Ok().json(report))
}

async fn finanzas_export(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let file_name = state.config.export_file_name.clone();
    let bytes = web::block(move || -> Result<_, ApiError> {
        let dataset = finanzas::prepare(&state.dataset(FINANZAS)?)?;
        Ok(finanzas::export_workbook(&dataset, &state.config)?)
    })
    .await??;
    Ok(HttpResponse::Ok()
        .content_type("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ))
        .body(bytes))
}

/// Accept a workbook for a dashboard whose file is not on disk. The body is
/// the raw XLSX; it is parsed once up front so a bad upload is rejected.
async fn upload(
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let dashboard = path.into_inner();
    let sheet = state.source(&dashboard)?.sheet.clone();
    let bytes: Arc<[u8]> = Arc::from(&body[..]);

    let parsed = Arc::clone(&bytes);
    let name = dashboard.clone();
    let dataset = web::block(move || load_xlsx_bytes(&name, &parsed, &sheet)).await??;

    lock(&state.uploads).insert(dashboard.clone(), bytes);
    lock(&state.cache).invalidate(&dashboard);
    log::info!("accepted upload for '{}': {} rows", dashboard, dataset.len());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "dashboard": dashboard,
        "rows": dataset.len(),
        "columns": dataset.column_names(),
    })))
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/api/pagos", web::get().to(pagos_report))
        .route("/api/finanzas", web::get().to(finanzas_report))
        .route("/api/finanzas/export", web::get().to(finanzas_export))
        .route("/api/{dashboard}/upload", web::post().to(upload));
}

/// Start the HTTP server
pub async fn run_server(config: Config) -> std::io::Result<()> {
    let host = config.host.clone();
    let port = config.port;
    let state = web::Data::new(AppState::new(config));

    log::info!("tablero listening on http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(MAX_UPLOAD_BYTES))
            // Enable logger
            .wrap(middleware::Logger::default())
            // CORS for development
            .wrap(
                actix_cors::Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

// rest_api/src/lib.rs

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Request,
    extract::State,
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use lib::services::{
    DashboardService, DriveService, ReportService, StudentService, VaccinationService,
};
use lib::EntityStore;
use models::PortalError;
use security::{AuthError, Authenticator, Claims};

pub mod config;
pub mod handlers;

use handlers::{auth, dashboard, drives, reports, students};

// Define the REST API error enum
#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("{0}")]
    Auth(AuthError),
    #[error("{0}")]
    BadRequest(String),
}

impl From<AuthError> for RestApiError {
    fn from(e: AuthError) -> Self {
        RestApiError::Auth(e)
    }
}

// Convert every error into the structured JSON payload the clients expect.
impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            RestApiError::Portal(e) => (portal_status(e), e.to_string()),
            RestApiError::Auth(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            RestApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}

fn portal_status(error: &PortalError) -> StatusCode {
    match error {
        PortalError::Validation(_) | PortalError::InvalidState(_) => StatusCode::BAD_REQUEST,
        PortalError::NotFound(_) => StatusCode::NOT_FOUND,
        PortalError::Conflict(_) => StatusCode::CONFLICT,
        PortalError::Auth(_) => StatusCode::UNAUTHORIZED,
        PortalError::Storage(_) | PortalError::Serialization(_) | PortalError::Lock(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// The caller identity injected by the auth middleware. Handlers never see
/// credentials, only this externally validated context value.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub username: String,
    pub role: String,
}

impl From<Claims> for AdminContext {
    fn from(claims: Claims) -> Self {
        AdminContext {
            username: claims.sub,
            role: claims.role,
        }
    }
}

// Shared state for the Axum application
#[derive(Clone)]
pub struct AppState {
    pub students: StudentService,
    pub drives: DriveService,
    pub vaccination: VaccinationService,
    pub reports: ReportService,
    pub dashboard: DashboardService,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, auth: Authenticator) -> Self {
        AppState {
            students: StudentService::new(store.clone()),
            drives: DriveService::new(store.clone()),
            vaccination: VaccinationService::new(store.clone()),
            reports: ReportService::new(store.clone()),
            dashboard: DashboardService::new(store),
            auth: Arc::new(auth),
        }
    }
}

// Bearer-token guard for everything except login and health.
async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RestApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(RestApiError::Auth(AuthError::MissingToken))?;

    let claims = state.auth.validate_token(token)?;
    request.extensions_mut().insert(AdminContext::from(claims));
    Ok(next.run(request).await)
}

// Handler for the /api/health endpoint
async fn health_check_handler() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "message": "School Vaccination Portal API is healthy" })),
    )
}

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    let protected = Router::new()
        .route("/api/students", get(students::list_students).post(students::create_student))
        .route("/api/students/import", post(students::import_students))
        .route(
            "/api/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route("/api/students/:id/vaccinate", post(students::vaccinate_student))
        .route("/api/drives", get(drives::list_drives).post(drives::create_drive))
        .route(
            "/api/drives/:id",
            get(drives::get_drive)
                .put(drives::update_drive)
                .delete(drives::delete_drive),
        )
        .route("/api/drives/:id/cancel", post(drives::cancel_drive))
        .route("/api/drives/:id/complete", post(drives::complete_drive))
        .route("/api/drives/:id/students", get(drives::drive_students))
        .route("/api/reports", get(reports::generate_report))
        .route("/api/reports/vaccines", get(reports::available_vaccines))
        .route("/api/reports/vaccine-stats", get(reports::vaccine_stats))
        .route("/api/reports/class-stats", get(reports::class_stats))
        .route("/api/dashboard", get(dashboard::dashboard_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

/// Binds and serves the API until ctrl-c or SIGTERM.
pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    use anyhow::Context;

    let router = app(state);
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to address: {}", addr))?;
    info!("REST API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("REST API server failed")?;

    info!("REST API server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_error_taxonomy_to_status_codes() {
        assert_eq!(
            portal_status(&PortalError::Validation("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            portal_status(&PortalError::InvalidState("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            portal_status(&PortalError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            portal_status(&PortalError::Conflict("x".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            portal_status(&PortalError::Storage("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn should_build_router_with_state() {
        let store: Arc<dyn EntityStore> = Arc::new(lib::MemoryEntityStore::new());
        let auth = Authenticator::new(
            security::AdminCredentials {
                username: "admin".to_string(),
                password: "admin123".to_string(),
            },
            b"test-secret",
        );
        let _router = app(AppState::new(store, auth));
    }
}

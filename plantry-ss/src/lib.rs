//! plantry-ss library interface
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod devices;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use uuid::Uuid;

use plantry_common::events::EventBus;

use crate::devices::DeviceBay;
use crate::workflow::{SessionHandle, WorkflowDeps};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool **[SSA-DB-010]**
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting **[SSA-MS-010]**
    pub event_bus: EventBus,
    /// Live scan sessions **[SSA-WF-020]** — in-memory only by contract;
    /// a session vanishes on close/done and is never persisted
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    /// Workflow collaborators injected into every new session
    pub deps: WorkflowDeps,
    /// Directory stored packet images are served from
    pub image_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, deps: WorkflowDeps, image_dir: PathBuf) -> Self {
        Self {
            db,
            event_bus,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            deps,
            image_dir,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Open a new scan session and register it
    pub async fn create_session(&self) -> SessionHandle {
        let handle = SessionHandle::new(
            self.deps.clone(),
            DeviceBay::bridged(),
            self.event_bus.clone(),
        );
        self.sessions.write().await.insert(handle.id(), handle.clone());
        handle
    }

    /// Look up a live session
    pub async fn session(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop a session from the registry (after close)
    pub async fn remove_session(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let image_dir = state.image_dir.clone();

    Router::new()
        .merge(api::scan_routes())
        .route("/scan/events", get(api::scan_event_stream))
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .nest_service("/packet_images", ServeDir::new(image_dir))
        .with_state(state)
}

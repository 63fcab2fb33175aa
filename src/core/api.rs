//! HTTP API for selfwake
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /identity - Genesis + wake
//! - GET /identity/:id - Live identity status
//! - DELETE /identity/:id - Close: drop the live handle and the snapshot
//! - POST /identity/:id/evolve - Integrate experience
//! - POST /identity/:id/declare - Signed declaration
//! - POST /identity/:id/pivotal - Record a pivotal experience hash
//! - GET /identity/:id/proof - Continuity proof
//! - POST /identity/:id/wake - Re-wake from the stored snapshot
//! - POST /identity/:id/reanchor - Re-wake without the continuity check
//!
//! Mutations run on a copy of the live handle; the copy replaces it only
//! after its snapshot is saved.
//!
//! Errors are JSON `{ "code": "R...", "message": "..." }`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::WakeConfig;
use crate::core::store::{load_identity, save_identity, SnapshotStore};
use crate::core::wake::{ActiveSelf, WakeContext, WakeReconstructor};
use crate::error::{IdentityError, StoreError, WakeError};
use crate::types::{ContinuityProof, Parameters, Relationship, StabilityWarning, StoredIdentity, Vocabulary};

/// App state
pub struct AppState {
    pub identities: RwLock<HashMap<String, ActiveSelf>>,
    pub store: Arc<dyn SnapshotStore>,
    pub reconstructor: WakeReconstructor,
    pub context: WakeContext,
    sequence: AtomicU64,
}

impl AppState {
    pub fn new(store: Arc<dyn SnapshotStore>, context: WakeContext, config: WakeConfig) -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
            store,
            reconstructor: WakeReconstructor::new(config),
            context,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("identity_{:x}_{}", chrono::Utc::now().timestamp_millis(), seq)
    }

    /// Snapshot `active` and save it with optimistic versioning
    fn persist(&self, id: &str, active: &mut ActiveSelf) -> Result<(), ApiError> {
        let snapshot = active.snapshot()?;
        let version = save_identity(self.store.as_ref(), id, &snapshot)?;
        active.mark_saved(version);
        Ok(())
    }

    /// Run `mutate` on a copy of the live identity, persist the copy, then
    /// swap it in. On any error the live handle is left as it was.
    async fn commit<T>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut ActiveSelf) -> Result<T, ApiError>,
    ) -> Result<(T, StatusResponse), ApiError> {
        let mut identities = self.identities.write().await;
        let live = identities.get_mut(id).ok_or_else(|| not_live(id))?;

        let mut next = live.clone();
        let output = mutate(&mut next)?;
        self.persist(id, &mut next)?;

        let status = StatusResponse::of(id, &next);
        *live = next;
        Ok((output, status))
    }
}

/// JSON error with an R-code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        let status = match &e {
            IdentityError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            IdentityError::TooManyPivotalExperiences { .. } => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<WakeError> for ApiError {
    fn from(e: WakeError) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code: e.code(),
            message: e.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::VersionConflict { .. } => StatusCode::CONFLICT,
            StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            StoreError::Serialization(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            code: e.code(),
            message: e.to_string(),
        }
    }
}

fn not_live(id: &str) -> ApiError {
    StoreError::NotFound(id.to_string()).into()
}

/// Genesis request
#[derive(Debug, Deserialize)]
pub struct GenesisRequest {
    pub names: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub params: Option<Parameters>,
    pub initial: Option<Vec<f64>>,
}

/// Evolve request
#[derive(Debug, Deserialize)]
pub struct EvolveRequest {
    pub experience: Vec<f64>,
    pub dt: f64,
    #[serde(default = "one")]
    pub steps: usize,
}

fn one() -> usize {
    1
}

/// Declare request
#[derive(Debug, Deserialize)]
pub struct DeclareRequest {
    pub index: usize,
    pub value: f64,
    #[serde(default)]
    pub content: String,
}

/// Pivotal experience request
#[derive(Debug, Deserialize)]
pub struct PivotalRequest {
    #[serde(with = "hex::serde")]
    pub experience_hash: [u8; 32],
    pub impact: u64,
}

/// Identity status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub version: u64,
    pub dimensions: Vec<String>,
    pub vocabulary_digest: String,
    pub w: Vec<f64>,
    pub m: Vec<f64>,
    pub time: f64,
    pub coherence: f64,
    pub continuity_score: f64,
    pub energy: f64,
    pub declarations: usize,
    pub pivotal: usize,
    pub warnings: Vec<StabilityWarning>,
}

impl StatusResponse {
    pub fn of(id: &str, active: &ActiveSelf) -> Self {
        let state = active.state();
        Self {
            id: id.to_string(),
            version: active.version(),
            dimensions: active.vocabulary().names().to_vec(),
            vocabulary_digest: hex::encode(active.vocabulary().digest()),
            w: state.w.clone(),
            m: state.m.clone(),
            time: state.time,
            coherence: active.coherence(),
            continuity_score: active.continuity_score(),
            energy: active.energy(),
            declarations: active.declarations().len(),
            pivotal: active.pivotal().len(),
            warnings: active.warnings().to_vec(),
        }
    }
}

/// Evolve response
#[derive(Debug, Serialize)]
pub struct EvolveResponse {
    pub status: StatusResponse,
    /// Coordinates clamped across all steps
    pub clamped: usize,
}

/// Declare response
#[derive(Debug, Serialize)]
pub struct DeclareResponse {
    pub position: usize,
    pub hash: String,
    pub status: StatusResponse,
}

/// Pivotal response
#[derive(Debug, Serialize)]
pub struct PivotalResponse {
    pub position: usize,
    pub status: StatusResponse,
}

/// Proof response
#[derive(Debug, Serialize)]
pub struct ProofResponse {
    pub id: String,
    pub proof: ContinuityProof,
    pub proof_hex: String,
    pub proof_bytes: usize,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub identities_active: usize,
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/identity", post(create_identity))
        .route("/identity/:id", get(get_identity).delete(close_identity))
        .route("/identity/:id/evolve", post(evolve))
        .route("/identity/:id/declare", post(declare))
        .route("/identity/:id/pivotal", post(record_pivotal))
        .route("/identity/:id/proof", get(get_proof))
        .route("/identity/:id/wake", post(wake))
        .route("/identity/:id/reanchor", post(reanchor))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let identities = state.identities.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        identities_active: identities.len(),
    })
}

/// Genesis, persist, wake
async fn create_identity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenesisRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    let vocabulary = Vocabulary::define(req.names, req.relationships)?;
    let params = req
        .params
        .unwrap_or_else(|| Parameters::default_for(vocabulary.len()));
    let stored = StoredIdentity::genesis(vocabulary, params, req.initial)?;

    let id = state.next_id();
    let version = save_identity(state.store.as_ref(), &id, &stored)?;

    let mut active = state.reconstructor.wake(&stored, &state.context)?;
    active.mark_saved(version);

    let status = StatusResponse::of(&id, &active);
    state.identities.write().await.insert(id, active);
    Ok((StatusCode::CREATED, Json(status)))
}

/// Live identity status
async fn get_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let identities = state.identities.read().await;
    let active = identities.get(&id).ok_or_else(|| not_live(&id))?;
    Ok(Json(StatusResponse::of(&id, active)))
}

/// Close an identity: drop the live handle and delete the snapshot
async fn close_identity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut identities = state.identities.write().await;
    let was_live = identities.remove(&id).is_some();
    let was_stored = state.store.delete(&id)?;
    if !was_live && !was_stored {
        return Err(not_live(&id));
    }
    tracing::warn!(%id, "identity closed");
    Ok(StatusCode::NO_CONTENT)
}

/// Integrate `steps` Euler steps of the same experience
async fn evolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EvolveRequest>,
) -> Result<Json<EvolveResponse>, ApiError> {
    let (clamped, status) = state
        .commit(&id, |active| Ok(active.evolve_for(&req.experience, req.dt, req.steps)?))
        .await?;
    Ok(Json(EvolveResponse { status, clamped }))
}

/// Record a signed declaration
async fn declare(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<DeclareRequest>,
) -> Result<Json<DeclareResponse>, ApiError> {
    let ((hash, position), status) = state
        .commit(&id, |active| {
            let hash = hex::encode(active.declare(req.index, req.value, &req.content)?.hash());
            Ok((hash, active.declarations().len() - 1))
        })
        .await?;
    Ok(Json(DeclareResponse { position, hash, status }))
}

/// Record a pivotal experience hash
async fn record_pivotal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PivotalRequest>,
) -> Result<Json<PivotalResponse>, ApiError> {
    let (position, status) = state
        .commit(&id, |active| {
            active.record_pivotal(req.experience_hash, req.impact)?;
            Ok(active.pivotal().len() - 1)
        })
        .await?;
    Ok(Json(PivotalResponse { position, status }))
}

/// Continuity proof over the live identity
async fn get_proof(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProofResponse>, ApiError> {
    let identities = state.identities.read().await;
    let active = identities.get(&id).ok_or_else(|| not_live(&id))?;
    let proof = active.proof()?;

    Ok(Json(ProofResponse {
        id,
        proof_hex: proof.to_hex(),
        proof_bytes: ContinuityProof::SIZE,
        proof,
    }))
}

/// Drop the live handle and wake again from the store
async fn wake(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    rewake(&state, id, false).await
}

/// Like `wake`, but skips the continuity check and resets the trajectory
async fn reanchor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    rewake(&state, id, true).await
}

async fn rewake(state: &AppState, id: String, reanchor: bool) -> Result<Json<StatusResponse>, ApiError> {
    let mut identities = state.identities.write().await;
    let stored = load_identity(state.store.as_ref(), &id)?;

    let active = if reanchor {
        let mut active = state.reconstructor.reanchor(&stored, &state.context)?;
        state.persist(&id, &mut active)?;
        active
    } else {
        state.reconstructor.wake(&stored, &state.context)?
    };

    let status = StatusResponse::of(&id, &active);
    identities.insert(id, active);
    Ok(Json(status))
}

/// Run the API server
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "selfwake API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

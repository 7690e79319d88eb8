//! HTTP API for the fact checker and the knowledge graph updater
//!
//! A thin translation layer over the core: transient pipeline degradations
//! surface as partial results (fewer triples, never an error response),
//! while validation errors and store failures become explicit failure
//! responses. The batch update endpoint enforces the single-run-at-a-time
//! token and rejects concurrent triggers with 409 instead of queueing them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{Error, PipelineError};
use crate::factcheck::{truthfulness, FactChecker, TripleCheck};
use crate::metrics;
use crate::models::Triple;
use crate::producer::ExtractionScope;
use crate::updater::{ArticleKnowledge, KnowledgeGraphUpdater};

// ============================================================================
// State and errors
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub exact: FactChecker,
    pub non_exact: FactChecker,
    pub updater: Arc<KnowledgeGraphUpdater>,
    pub default_scope: ExtractionScope,
}

/// API-facing error translation
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Pipeline(PipelineError::UnknownExtractor(_))
            | Error::Pipeline(PipelineError::UnknownScope(_))
            | Error::Pipeline(PipelineError::UnknownStrategy(_))
            | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::Kg(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self.0, "request failed");
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

fn parse_scope(scope: &Option<String>, default: ExtractionScope) -> Result<ExtractionScope, ApiError> {
    match scope {
        Some(value) => Ok(ExtractionScope::from_str(value).map_err(Error::from)?),
        None => Ok(default),
    }
}

// ============================================================================
// Request/response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct FactCheckRequest {
    text: String,
    scope: Option<String>,
}

#[derive(Debug, Serialize)]
struct TriplesCheckResponse {
    triples: Vec<TripleCheck>,
    truthfulness: f64,
}

#[derive(Debug, Deserialize)]
struct SourceQuery {
    source: String,
}

#[derive(Debug, Deserialize)]
struct UpdatesQuery {
    #[serde(default)]
    auto_update: bool,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    entity_a: String,
    entity_b: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/fc/exact/fact-check", post(exact_fact_check))
        .route("/fc/exact/fact-check/triples", post(exact_fact_check_triples))
        .route("/fc/non-exact/fact-check", post(non_exact_fact_check))
        .route(
            "/fc/non-exact/fact-check/triples",
            post(non_exact_fact_check_triples),
        )
        .route("/kgu/updates", get(trigger_updates))
        .route("/kgu/updates/status", get(updates_status))
        .route("/kgu/articles", get(all_articles_knowledge))
        .route("/kgu/article-triples", get(article_triples).delete(delete_article_triples))
        .route("/kgu/article-triples/insert", post(insert_article_triples))
        .route("/kgu/article-triples/pending", get(article_pending))
        .route("/kgu/article-triples/pending/all", get(all_pending))
        .route("/kgu/article-triples/conflicts", get(article_conflicts))
        .route("/kgu/article-triples/conflicts/all", get(all_conflicts))
        .route("/kgu/triples", post(insert_triples).delete(delete_triples))
        .route("/kgu/triples/confirm", post(force_insert_triples))
        .route("/kgu/entity/{subject}", get(get_entity))
        .route("/kgu/coref-entities/unresolved", get(unresolved_corefs))
        .route("/kgu/coref-entities/resolve", post(resolve_entities))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on the given address
pub async fn serve(state: AppState, addr: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "API listening");
    axum::serve(listener, router(state))
        .await
        .map_err(crate::error::Error::Io)?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::gather()
}

async fn exact_fact_check(
    State(state): State<AppState>,
    Json(request): Json<FactCheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = parse_scope(&request.scope, state.default_scope)?;
    let report = state.exact.check_text(&request.text, scope).await?;
    Ok(Json(report))
}

async fn exact_fact_check_triples(
    State(state): State<AppState>,
    Json(triples): Json<Vec<Triple>>,
) -> Result<impl IntoResponse, ApiError> {
    let checks = state.exact.check_triples(&triples, false).await?;
    let score = truthfulness(checks.iter().map(|c| &c.result));
    Ok(Json(TriplesCheckResponse {
        triples: checks,
        truthfulness: score,
    }))
}

async fn non_exact_fact_check(
    State(state): State<AppState>,
    Json(request): Json<FactCheckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = parse_scope(&request.scope, state.default_scope)?;
    let report = state.non_exact.check_text(&request.text, scope).await?;
    Ok(Json(report))
}

async fn non_exact_fact_check_triples(
    State(state): State<AppState>,
    Json(triples): Json<Vec<Triple>>,
) -> Result<impl IntoResponse, ApiError> {
    let checks = state.non_exact.check_triples(&triples, true).await?;
    let score = truthfulness(checks.iter().map(|c| &c.result));
    Ok(Json(TriplesCheckResponse {
        triples: checks,
        truthfulness: score,
    }))
}

/// Trigger the batch update. There can only be one update running at a
/// time; concurrent triggers are rejected, and callers poll the status
/// endpoint for completion.
async fn trigger_updates(
    State(state): State<AppState>,
    Query(query): Query<UpdatesQuery>,
) -> Result<Response, ApiError> {
    let scope = parse_scope(&query.scope, state.default_scope)?;
    let Some(guard) = state.updater.lock().try_acquire() else {
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "message":
                    "An update is already in progress. Check /kgu/updates/status for the status"
            })),
        )
            .into_response());
    };

    let updater = Arc::clone(&state.updater);
    let auto_update = query.auto_update;
    tokio::spawn(async move {
        let _guard = guard;
        if let Err(error) = updater
            .update_missed_knowledge(Some(auto_update), scope)
            .await
        {
            tracing::error!(error = %error, "batch update failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": "Request submitted. Update is processing..." })),
    )
        .into_response())
}

async fn updates_status(State(state): State<AppState>) -> impl IntoResponse {
    if state.updater.lock().is_running() {
        (
            StatusCode::ACCEPTED,
            Json(json!({ "message": "Still processing..." })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({ "message": "Done. Another request to update can be made." })),
        )
    }
}

async fn all_articles_knowledge(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let articles = state.updater.get_all_articles_knowledge().await?;
    Ok(Json(json!({ "triples": articles })))
}

async fn article_triples(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Response, ApiError> {
    match state.updater.get_article_knowledge(&query.source).await? {
        Some(triples) => {
            Ok(Json(json!({ "source": query.source, "triples": triples })).into_response())
        }
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "source": query.source,
                "message": "Triples haven't been extracted from this article. \
                            Please call the /kgu/updates endpoint."
            })),
        )
            .into_response()),
    }
}

async fn delete_article_triples(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .updater
        .delete_all_knowledge_from_article(&query.source)
        .await?;
    Ok(Json(json!({
        "source": query.source,
        "message": "All triples deleted."
    })))
}

async fn insert_article_triples(
    State(state): State<AppState>,
    Json(articles): Json<Vec<ArticleKnowledge>>,
) -> Result<impl IntoResponse, ApiError> {
    state.updater.insert_articles_knowledge(&articles).await?;
    Ok(Json(json!({ "message": "Triples inserted." })))
}

async fn article_pending(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Response, ApiError> {
    match state
        .updater
        .get_article_pending_knowledge(&query.source)
        .await?
    {
        Some(pending) => {
            Ok(Json(json!({ "source": query.source, "pending": pending })).into_response())
        }
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "source": query.source,
                "message":
                    "No pending triples (to be added to the knowledge graph) found for this article"
            })),
        )
            .into_response()),
    }
}

async fn all_pending(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let pending = state.updater.get_all_pending_knowledge().await?;
    Ok(Json(json!({ "pending": pending })))
}

async fn article_conflicts(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Response, ApiError> {
    match state.updater.get_article_conflicts(&query.source).await? {
        Some(conflicts) if !conflicts.is_empty() => {
            Ok(Json(json!({ "source": query.source, "conflicts": conflicts })).into_response())
        }
        _ => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "source": query.source,
                "message": "No conflicts found for this article"
            })),
        )
            .into_response()),
    }
}

async fn all_conflicts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let conflicts = state.updater.get_all_article_conflicts().await?;
    Ok(Json(json!({ "conflicts": conflicts })))
}

/// Insert triples with conflict checking; conflicting triples are reported
/// back with 409 instead of being inserted
async fn insert_triples(
    State(state): State<AppState>,
    Json(body): Json<OneOrMany<Triple>>,
) -> Result<Response, ApiError> {
    let mut conflicts = Vec::new();
    for triple in body.into_vec() {
        if let Some(found) = state.updater.insert_knowledge(&triple, true).await? {
            conflicts.push(found);
        }
    }
    if !conflicts.is_empty() {
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "message": "There are some conflicts in the triple",
                "conflicts": conflicts
            })),
        )
            .into_response());
    }
    Ok(Json(json!({ "message": "All triples inserted." })).into_response())
}

async fn force_insert_triples(
    State(state): State<AppState>,
    Json(body): Json<OneOrMany<Triple>>,
) -> Result<impl IntoResponse, ApiError> {
    for triple in body.into_vec() {
        state.updater.insert_knowledge(&triple, false).await?;
    }
    Ok(Json(json!({ "message": "All triples inserted." })))
}

async fn delete_triples(
    State(state): State<AppState>,
    Json(body): Json<OneOrMany<Triple>>,
) -> Result<impl IntoResponse, ApiError> {
    state.updater.delete_knowledge(&body.into_vec()).await?;
    Ok(Json(json!({ "message": "Triples deleted." })))
}

async fn get_entity(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let triples = state.updater.get_entity(&subject).await?.unwrap_or_default();
    Ok(Json(json!({ "triples": triples })))
}

async fn unresolved_corefs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let entities = state
        .updater
        .get_all_unresolved_corefering_entities()
        .await?;
    Ok(Json(json!({ "coref_entities": entities })))
}

async fn resolve_entities(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .updater
        .insert_entities_equality(&request.entity_a, &request.entity_b)
        .await?;
    Ok(Json(json!({ "message": "Entities resolved as the same." })))
}

//! Athlete endpoints
//!
//! Every handler returns the formatted row list (zero or one element). An
//! empty list is how a missing athlete is reported; there is no 404.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::api::{Verb, ATHLETE, ATHLETES};
use crate::db::{Connector, FormattedRow};

type RowsResponse = Result<(StatusCode, Json<Vec<FormattedRow>>), ApiError>;

/// Form body for PUT/PATCH: the `athlete` field holds a JSON document
#[derive(Debug, Deserialize)]
pub struct AthleteForm {
    pub athlete: Option<String>,
}

impl AthleteForm {
    fn document(&self) -> Result<Value, ApiError> {
        let raw = self
            .athlete
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("Missing form field 'athlete'".to_string()))?;

        serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Field 'athlete' is not valid JSON: {}", e)))
    }
}

/// GET /athlete/{id}
async fn get_athlete<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<i64>,
) -> RowsResponse {
    let rows = ATHLETE.execute(&state.manager, Verb::Get, Some(json!(id))).await?;
    Ok((StatusCode::OK, Json(rows)))
}

/// PUT /athlete - create
async fn put_athlete<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Form(form): Form<AthleteForm>,
) -> RowsResponse {
    let athlete = form.document()?;
    let rows = ATHLETE.execute(&state.manager, Verb::Put, Some(athlete)).await?;
    Ok((StatusCode::CREATED, Json(rows)))
}

/// PATCH /athlete/{id} - update; the raw path id overrides any `id` in the body
async fn patch_athlete<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<String>,
    Form(form): Form<AthleteForm>,
) -> RowsResponse {
    let mut athlete = form.document()?;
    let fields = athlete
        .as_object_mut()
        .ok_or_else(|| ApiError::BadRequest("Field 'athlete' must be a JSON object".to_string()))?;
    fields.insert("id".to_string(), json!(id));

    let rows = ATHLETE.execute(&state.manager, Verb::Patch, Some(athlete)).await?;
    Ok((StatusCode::ACCEPTED, Json(rows)))
}

/// DELETE /athlete/{id} - the raw path id is passed through as a string
async fn delete_athlete<C: Connector>(
    State(state): State<Arc<AppState<C>>>,
    Path(id): Path<String>,
) -> RowsResponse {
    let rows = ATHLETE
        .execute(&state.manager, Verb::Delete, Some(json!({ "id": id })))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(rows)))
}

/// GET /athletes
async fn list_athletes<C: Connector>(State(state): State<Arc<AppState<C>>>) -> RowsResponse {
    let rows = ATHLETES.execute(&state.manager, Verb::Get, None).await?;
    Ok((StatusCode::OK, Json(rows)))
}

/// GET /health
async fn health<C: Connector>(State(state): State<Arc<AppState<C>>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "connected": state.manager.has_connection(),
    }))
}

pub fn router<C: Connector>() -> Router<Arc<AppState<C>>> {
    Router::new()
        .route("/athlete", put(put_athlete::<C>))
        .route(
            "/athlete/{id}",
            get(get_athlete::<C>)
                .patch(patch_athlete::<C>)
                .delete(delete_athlete::<C>),
        )
        .route("/athletes", get(list_athletes::<C>))
        .route("/health", get(health::<C>))
}

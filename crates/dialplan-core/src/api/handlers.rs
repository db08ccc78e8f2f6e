//! Route handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::error::ApiResult;
use super::AppState;
use crate::identity::TRACE_ID_HEADER;
use crate::{ListRequest, Page, Plan, ResolveRequest, ResolvedDialplan, RoutingRecord};

/// `GET /healthz`
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "message": e.to_string() })),
        ),
    }
}

/// `POST /api/v1/resolve`
pub async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolvedDialplan>> {
    if request.trace_id.is_none() {
        request.trace_id = headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }
    let resolved = state.engine.resolve_request(&request).await?;
    Ok(Json(resolved))
}

pub async fn list_routes(
    State(state): State<AppState>,
    Query(request): Query<ListRequest>,
) -> ApiResult<Json<Page<RoutingRecord>>> {
    Ok(Json(state.admin.list_routes(&request).await?))
}

pub async fn create_route(
    State(state): State<AppState>,
    Json(route): Json<RoutingRecord>,
) -> ApiResult<(StatusCode, Json<RoutingRecord>)> {
    let created = state.admin.create_route(route).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_route(State(state): State<AppState>, Path(phone): Path<String>) -> ApiResult<Json<RoutingRecord>> {
    Ok(Json(state.admin.get_route(&phone).await?))
}

pub async fn update_route(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Json(mut route): Json<RoutingRecord>,
) -> ApiResult<Json<RoutingRecord>> {
    route.phone_number = phone;
    Ok(Json(state.admin.update_route(route).await?))
}

pub async fn delete_route(State(state): State<AppState>, Path(phone): Path<String>) -> ApiResult<StatusCode> {
    state.admin.delete_route(&phone).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_plans(
    State(state): State<AppState>,
    Query(request): Query<ListRequest>,
) -> ApiResult<Json<Page<Plan>>> {
    Ok(Json(state.admin.list_plans(&request).await?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(plan): Json<Plan>,
) -> ApiResult<(StatusCode, Json<Plan>)> {
    let created = state.admin.create_plan(plan).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_plan(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Plan>> {
    Ok(Json(state.admin.get_plan(&id).await?))
}

pub async fn update_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut plan): Json<Plan>,
) -> ApiResult<Json<Plan>> {
    plan.id = id;
    Ok(Json(state.admin.update_plan(plan).await?))
}

pub async fn delete_plan(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.admin.delete_plan(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/v1/identity-cache/:phone`
pub async fn invalidate_caller(State(state): State<AppState>, Path(phone): Path<String>) -> ApiResult<StatusCode> {
    state.admin.invalidate_caller(&phone).await?;
    Ok(StatusCode::NO_CONTENT)
}

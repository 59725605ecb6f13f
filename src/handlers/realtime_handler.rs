use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::{PresenceQuery, ProgressQuery},
};

#[post("/api/realtime/heartbeat")]
pub async fn heartbeat(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.presence_service.heartbeat(auth.user()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[get("/api/realtime/status")]
pub async fn student_status(
    state: web::Data<AppState>,
    query: web::Query<PresenceQuery>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let statuses = state
        .presence_service
        .status(auth.user(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(statuses))
}

#[get("/api/realtime/progress")]
pub async fn exam_progress(
    state: web::Data<AppState>,
    query: web::Query<ProgressQuery>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let progress = state
        .presence_service
        .progress(auth.user(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(progress))
}

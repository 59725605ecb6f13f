use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::{LoginRequest, RegisterStudentRequest},
};

#[post("/api/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state.auth_service.login(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[post("/api/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterStudentRequest>,
) -> Result<HttpResponse, AppError> {
    let response = state
        .auth_service
        .register_student(request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(response))
}

#[post("/api/auth/logout")]
pub async fn logout(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.auth_service.logout(auth.user()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

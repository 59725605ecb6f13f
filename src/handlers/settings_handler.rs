use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::{TestDatabaseRequest, UpdateSettingsRequest},
};

#[get("/api/settings")]
pub async fn get_settings(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let settings = state.settings_service.get_settings(auth.user()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[put("/api/settings")]
pub async fn update_settings(
    state: web::Data<AppState>,
    request: web::Json<UpdateSettingsRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = state
        .settings_service
        .update_settings(auth.user(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[delete("/api/settings")]
pub async fn reset_settings(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let settings = state.settings_service.reset_settings(auth.user()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[post("/api/settings/test-db")]
pub async fn test_database(
    state: web::Data<AppState>,
    request: web::Json<TestDatabaseRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = state
        .settings_service
        .test_database(auth.user(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

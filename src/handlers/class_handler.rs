use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::{
        request::{CreateClassRequest, JoinClassRequest, UpdateClassRequest},
        response::MessageResponse,
    },
};

#[get("/api/classes")]
pub async fn list_classes(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let classes = state.class_service.list_classes(auth.user()).await?;
    Ok(HttpResponse::Ok().json(classes))
}

#[post("/api/classes")]
pub async fn create_class(
    state: web::Data<AppState>,
    request: web::Json<CreateClassRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let class = state
        .class_service
        .create_class(auth.user(), request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(class))
}

#[post("/api/classes/join")]
pub async fn join_class(
    state: web::Data<AppState>,
    request: web::Json<JoinClassRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = state
        .class_service
        .join_class(auth.user(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/api/classes/{id}")]
pub async fn get_class(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let class = state.class_service.get_class(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(class))
}

#[put("/api/classes/{id}")]
pub async fn update_class(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<UpdateClassRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let class = state
        .class_service
        .update_class(auth.user(), &id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(class))
}

#[delete("/api/classes/{id}")]
pub async fn delete_class(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.class_service.delete_class(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Class deleted")))
}

#[get("/api/classes/{id}/students")]
pub async fn list_students(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let students = state.class_service.list_students(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(students))
}

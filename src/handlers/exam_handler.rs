use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::{
        request::{CreateExamRequest, UpdateExamRequest},
        response::MessageResponse,
    },
};

#[get("/api/exams")]
pub async fn list_exams(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let exams = state.exam_service.list_exams(auth.user()).await?;
    Ok(HttpResponse::Ok().json(exams))
}

#[post("/api/exams")]
pub async fn create_exam(
    state: web::Data<AppState>,
    request: web::Json<CreateExamRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let exam = state
        .exam_service
        .create_exam(auth.user(), request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(exam))
}

#[get("/api/exams/{id}")]
pub async fn get_exam(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let exam = state.exam_service.get_exam(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(exam))
}

#[put("/api/exams/{id}")]
pub async fn update_exam(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<UpdateExamRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let exam = state
        .exam_service
        .update_exam(auth.user(), &id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(exam))
}

#[delete("/api/exams/{id}")]
pub async fn delete_exam(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.exam_service.delete_exam(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Exam deleted")))
}

#[post("/api/exams/{id}/publish")]
pub async fn publish_exam(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let response = state.exam_service.publish_exam(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(response))
}

use actix_web::{get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::{SaveProgressRequest, StartSubmissionRequest, SubmitAnswersRequest},
};

#[get("/api/submissions")]
pub async fn list_submissions(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let submissions = state
        .submission_service
        .list_submissions(auth.user())
        .await?;
    Ok(HttpResponse::Ok().json(submissions))
}

/// 201 for a fresh attempt, 200 when an open one is resumed.
#[post("/api/submissions/start")]
pub async fn start_submission(
    state: web::Data<AppState>,
    request: web::Json<StartSubmissionRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let started = state
        .submission_service
        .start(auth.user(), request.into_inner())
        .await?;

    let mut response = if started.resumed {
        HttpResponse::Ok()
    } else {
        HttpResponse::Created()
    };
    Ok(response.json(started.submission))
}

#[post("/api/submissions/submit")]
pub async fn submit_answers(
    state: web::Data<AppState>,
    request: web::Json<SubmitAnswersRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let result = state
        .submission_service
        .submit(auth.user(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

#[put("/api/submissions/{id}/progress")]
pub async fn save_progress(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<SaveProgressRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let submission = state
        .submission_service
        .save_progress(auth.user(), &id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(submission))
}

#[get("/api/submissions/exam/{exam_id}")]
pub async fn list_exam_submissions(
    state: web::Data<AppState>,
    exam_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let submissions = state
        .submission_service
        .list_for_exam(auth.user(), &exam_id)
        .await?;
    Ok(HttpResponse::Ok().json(submissions))
}

#[get("/api/submissions/{id}")]
pub async fn get_submission(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let submission = state
        .submission_service
        .get_submission(auth.user(), &id)
        .await?;
    Ok(HttpResponse::Ok().json(submission))
}

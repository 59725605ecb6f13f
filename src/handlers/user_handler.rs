use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{require_owner, AuthenticatedUser},
    errors::AppError,
    models::dto::{
        request::{CreateUserRequest, UpdateUserRequest, UserListQuery},
        response::MessageResponse,
    },
};

#[get("/api/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    query: web::Query<UserListQuery>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_owner(auth.user())?;

    let users = state.user_service.list_users(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[get("/api/users/{id}")]
pub async fn get_user(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_owner(auth.user())?;

    let user = state.user_service.get_user(&id).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[post("/api/users")]
pub async fn create_user(
    state: web::Data<AppState>,
    request: web::Json<CreateUserRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_owner(auth.user())?;

    let user = state.user_service.create_user(request.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

#[put("/api/users/{id}")]
pub async fn update_user(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_owner(auth.user())?;

    let user = state
        .user_service
        .update_user(&id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

#[delete("/api/users/{id}")]
pub async fn delete_user(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_owner(auth.user())?;

    state.user_service.delete_user(auth.user(), &id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("User deleted")))
}

#[put("/api/users/{id}/suspend")]
pub async fn toggle_suspension(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_owner(auth.user())?;

    let user = state
        .user_service
        .toggle_suspension(auth.user(), &id)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

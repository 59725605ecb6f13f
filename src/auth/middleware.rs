use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use futures::future::LocalBoxFuture;

use crate::{app_state::AppState, errors::AppError, models::domain::User};

/// The caller, resolved from the bearer token to a live, non-suspended user record.
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn user(&self) -> &User {
        &self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let bearer = BearerAuth::from_request(req, payload);

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                AppError::InternalError("Application state not configured".to_string())
            })?;
            let bearer = bearer
                .await
                .map_err(|_| AppError::Unauthenticated("No token provided".to_string()))?;

            let user = state.auth_service.authenticate(bearer.token()).await?;
            Ok(AuthenticatedUser(user))
        })
    }
}

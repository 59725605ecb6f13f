use crate::{
    errors::{AppError, AppResult},
    models::domain::user::{User, UserRole},
};

pub fn require_role(user: &User, allowed: &[UserRole]) -> AppResult<()> {
    if allowed.contains(&user.role) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(UserRole::as_str).collect();
    Err(AppError::Forbidden(format!(
        "Access denied. Required role: {}",
        names.join(" or ")
    )))
}

pub fn require_owner(user: &User) -> AppResult<()> {
    require_role(user, &[UserRole::Owner])
}

pub fn require_staff(user: &User) -> AppResult<()> {
    require_role(user, &[UserRole::Teacher, UserRole::Owner])
}

use std::sync::Arc;

use validator::Validate;

use crate::{
    auth::hash_password,
    errors::{AppError, AppResult},
    models::{
        domain::{User, UserFilter, UserPatch, UserRole},
        dto::{
            request::{CreateUserRequest, UpdateUserRequest, UserListQuery},
            response::UserDto,
        },
    },
    repositories::{user_repository::user_not_found, ClassRepository, UserRepository},
};

/// Account administration. Every operation here is owner-only; handlers gate the role.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    classes: Arc<dyn ClassRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, classes: Arc<dyn ClassRepository>) -> Self {
        Self { users, classes }
    }

    pub async fn list_users(&self, query: UserListQuery) -> AppResult<Vec<UserDto>> {
        let filter = UserFilter {
            role: query.role,
            ..Default::default()
        };
        let users = self.users.list(filter).await?;
        Ok(users.into_iter().map(UserDto::from).collect())
    }

    pub async fn get_user(&self, id: &str) -> AppResult<UserDto> {
        self.find(id).await.map(UserDto::from)
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> AppResult<UserDto> {
        request.validate()?;

        let user = match request.role {
            UserRole::Student => {
                let nisn = request.nisn.as_deref().map(str::trim).ok_or_else(|| {
                    AppError::ValidationError("NISN is required for students".to_string())
                })?;
                if self.users.find_by_nisn(nisn).await?.is_some() {
                    return Err(AppError::Conflict("NISN is already registered".to_string()));
                }
                User::new_student(&request.username, request.email, nisn)
            }
            role => {
                let password = request.password.as_deref().ok_or_else(|| {
                    AppError::ValidationError(format!("Password is required for {}s", role))
                })?;
                User::new_privileged(&request.username, request.email, role, hash_password(password)?)
            }
        };

        if self.users.find_by_username(&user.username).await?.is_some() {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let user = self.users.create(user).await?;
        log::info!("Created {} account '{}'", user.role, user.username);
        Ok(UserDto::from(user))
    }

    pub async fn update_user(&self, id: &str, request: UpdateUserRequest) -> AppResult<UserDto> {
        request.validate()?;
        let current = self.find(id).await?;

        let patch = UserPatch::from(request);
        if patch.is_empty() {
            return Ok(UserDto::from(current));
        }
        if patch.nisn.is_some() && current.role != UserRole::Student {
            return Err(AppError::ValidationError(
                "Only students have a NISN".to_string(),
            ));
        }

        let user = self.users.update(id, patch).await?;
        Ok(UserDto::from(user))
    }

    /// Deletes an account and drops it from every class roster it was on.
    pub async fn delete_user(&self, actor: &User, id: &str) -> AppResult<()> {
        if actor.id == id {
            return Err(AppError::ValidationError(
                "You cannot delete your own account".to_string(),
            ));
        }
        let user = self.find(id).await?;

        self.users.delete(id).await?;

        for class_id in &user.classes {
            if let Err(e) = self.classes.remove_student(class_id, id).await {
                log::warn!(
                    "Deleted user {} but could not remove them from class {}: {}",
                    id,
                    class_id,
                    e
                );
            }
        }

        log::info!("Deleted {} account '{}'", user.role, user.username);
        Ok(())
    }

    pub async fn toggle_suspension(&self, actor: &User, id: &str) -> AppResult<UserDto> {
        if actor.id == id {
            return Err(AppError::ValidationError(
                "You cannot suspend your own account".to_string(),
            ));
        }
        let user = self.find(id).await?;

        let patch = UserPatch {
            is_suspended: Some(!user.is_suspended),
            is_online: if user.is_suspended { None } else { Some(false) },
            ..Default::default()
        };
        let user = self.users.update(id, patch).await?;

        log::info!(
            "User '{}' is now {}",
            user.username,
            if user.is_suspended { "suspended" } else { "active" }
        );
        Ok(UserDto::from(user))
    }

    async fn find(&self, id: &str) -> AppResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| user_not_found(id))
    }
}

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use validator::Validate;

use crate::{
    auth::{hash_password, verify_password, JwtService},
    errors::{AppError, AppResult},
    models::{
        domain::{User, UserFilter, UserPatch, UserRole},
        dto::{
            request::{LoginRequest, RegisterStudentRequest},
            response::{LoginResponse, UserDto},
        },
    },
    repositories::UserRepository,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn invalid_credentials() -> AppError {
    AppError::Unauthenticated(INVALID_CREDENTIALS.to_string())
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: Arc<JwtService>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, jwt: Arc<JwtService>) -> Self {
        Self { users, jwt }
    }

    /// Checks credentials for the requested role and opens a session.
    ///
    /// Every mismatch (unknown user, wrong secret, wrong role) yields the same error.
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        let user = match &request {
            LoginRequest::Student { username, nisn } => {
                let user = self
                    .users
                    .find_by_nisn(nisn.trim())
                    .await?
                    .ok_or_else(invalid_credentials)?;
                if !user.username.eq_ignore_ascii_case(username.trim()) {
                    return Err(invalid_credentials());
                }
                user
            }
            LoginRequest::Teacher { username, password }
            | LoginRequest::Owner { username, password } => {
                let user = self
                    .users
                    .find_by_username(username.trim())
                    .await?
                    .ok_or_else(invalid_credentials)?;
                let hash = user.password_hash.as_deref().ok_or_else(invalid_credentials)?;
                if !verify_password(password, hash) {
                    return Err(invalid_credentials());
                }
                user
            }
        };

        if user.role != request.role() {
            return Err(invalid_credentials());
        }
        if user.is_suspended {
            return Err(AppError::Forbidden("Account is suspended".to_string()));
        }

        let user = self
            .users
            .update(&user.id, UserPatch::presence(true, Utc::now()))
            .await?;
        let token = self.jwt.create_token(&user)?;

        log::info!("{} '{}' logged in", user.role, user.username);
        Ok(LoginResponse {
            token,
            user: UserDto::from(user),
        })
    }

    pub async fn register_student(&self, request: RegisterStudentRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let nisn = request.nisn.trim();
        if self.users.find_by_nisn(nisn).await?.is_some() {
            return Err(AppError::Conflict("NISN is already registered".to_string()));
        }
        if self.users.find_by_username(request.username.trim()).await?.is_some() {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let mut user = User::new_student(&request.username, request.email, nisn);
        user.is_online = true;
        user.last_active = Some(Utc::now());
        let user = self.users.create(user).await?;
        let token = self.jwt.create_token(&user)?;

        log::info!("Registered student '{}'", user.username);
        Ok(LoginResponse {
            token,
            user: UserDto::from(user),
        })
    }

    pub async fn logout(&self, user: &User) -> AppResult<()> {
        self.users
            .update(&user.id, UserPatch::presence(false, Utc::now()))
            .await?;
        Ok(())
    }

    /// Resolves a bearer token to a live, non-suspended user.
    pub async fn authenticate(&self, token: &str) -> AppResult<User> {
        let claims = self.jwt.validate_token(token)?;

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("User no longer exists".to_string()))?;

        if user.is_suspended {
            return Err(AppError::Forbidden("Account is suspended".to_string()));
        }
        Ok(user)
    }

    /// Creates the configured owner account when no owner exists yet.
    pub async fn seed_owner(&self, username: &str, password: &SecretString) -> AppResult<Option<User>> {
        let owners = self.users.list(UserFilter::role(UserRole::Owner)).await?;
        if !owners.is_empty() {
            return Ok(None);
        }

        let hash = hash_password(password.expose_secret())?;
        let owner = self
            .users
            .create(User::new_privileged(username, None, UserRole::Owner, hash))
            .await?;

        log::info!("Seeded owner account '{}'", owner.username);
        Ok(Some(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, test_utils::InMemoryUserRepository};

    async fn service_with(users: Vec<User>) -> (AuthService, Arc<InMemoryUserRepository>) {
        let repo = Arc::new(InMemoryUserRepository::default());
        for user in users {
            repo.create(user).await.unwrap();
        }
        let jwt = Arc::new(JwtService::new(&Config::test_config().jwt_secret, 1));
        (AuthService::new(repo.clone(), jwt), repo)
    }

    fn teacher_with_password(username: &str, password: &str) -> User {
        User::new_privileged(
            username,
            None,
            UserRole::Teacher,
            hash_password(password).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_teacher_login_marks_online() {
        let (service, _) = service_with(vec![teacher_with_password("budi", "secret123")]).await;

        let response = service
            .login(LoginRequest::Teacher {
                username: "BUDI".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();

        assert!(!response.token.is_empty());
        assert!(response.user.is_online);
        assert!(response.user.last_active.is_some());

        let user = service.authenticate(&response.token).await.unwrap();
        assert_eq!(user.username, "budi");
    }

    #[tokio::test]
    async fn test_student_login_matches_nisn_and_username() {
        let (service, _) = service_with(vec![User::test_student("ani", "0012345")]).await;

        let ok = service
            .login(LoginRequest::Student {
                username: "Ani".to_string(),
                nisn: "0012345".to_string(),
            })
            .await;
        assert!(ok.is_ok());

        let wrong_name = service
            .login(LoginRequest::Student {
                username: "budi".to_string(),
                nisn: "0012345".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(wrong_name.to_string(), "Unauthenticated: Invalid credentials");
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let (service, _) = service_with(vec![teacher_with_password("budi", "secret123")]).await;

        let wrong_password = service
            .login(LoginRequest::Teacher {
                username: "budi".to_string(),
                password: "nope-nope".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_user = service
            .login(LoginRequest::Teacher {
                username: "nobody".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap_err();
        let wrong_role = service
            .login(LoginRequest::Owner {
                username: "budi".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.to_string(), wrong_role.to_string());
    }

    #[tokio::test]
    async fn test_suspended_user_is_forbidden() {
        let mut student = User::test_student("ani", "0012345");
        student.is_suspended = true;
        let (service, _) = service_with(vec![student.clone()]).await;

        let err = service
            .login(LoginRequest::Student {
                username: "ani".to_string(),
                nisn: "0012345".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let token = JwtService::new(&Config::test_config().jwt_secret, 1)
            .create_token(&student)
            .unwrap();
        assert!(matches!(
            service.authenticate(&token).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_token_for_deleted_user_is_rejected() {
        let (service, _) = service_with(vec![]).await;
        let ghost = User::test_student("ghost", "999999");
        let token = JwtService::new(&Config::test_config().jwt_secret, 1)
            .create_token(&ghost)
            .unwrap();

        assert!(matches!(
            service.authenticate(&token).await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_register_student_rejects_duplicate_nisn() {
        let (service, _) = service_with(vec![User::test_student("ani", "0012345")]).await;

        let err = service
            .register_student(RegisterStudentRequest {
                username: "budi".to_string(),
                email: None,
                nisn: "0012345".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let ok = service
            .register_student(RegisterStudentRequest {
                username: "budi".to_string(),
                email: Some("Budi@Example.com".to_string()),
                nisn: "0067890".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(ok.user.role, UserRole::Student);
        assert_eq!(ok.user.email.as_deref(), Some("budi@example.com"));
    }

    #[tokio::test]
    async fn test_logout_sets_offline() {
        let (service, repo) = service_with(vec![User::test_student("ani", "0012345")]).await;
        let response = service
            .login(LoginRequest::Student {
                username: "ani".to_string(),
                nisn: "0012345".to_string(),
            })
            .await
            .unwrap();

        let user = repo.find_by_id(&response.user.id).await.unwrap().unwrap();
        service.logout(&user).await.unwrap();

        let user = repo.find_by_id(&response.user.id).await.unwrap().unwrap();
        assert!(!user.is_online);
    }

    #[tokio::test]
    async fn test_seed_owner_only_once() {
        let (service, _) = service_with(vec![]).await;
        let password = SecretString::from("owner-password".to_string());

        assert!(service.seed_owner("root", &password).await.unwrap().is_some());
        assert!(service.seed_owner("root2", &password).await.unwrap().is_none());
    }
}

use std::sync::Arc;

use validator::Validate;

use crate::{
    auth::{require_role, require_staff},
    errors::{AppError, AppResult},
    models::{
        domain::{class::generate_invite_code, Class, ClassFilter, ClassPatch, User, UserFilter, UserRole},
        dto::{
            request::{CreateClassRequest, JoinClassRequest, UpdateClassRequest},
            response::{JoinClassResponse, UserDto},
        },
    },
    repositories::{class_repository::class_not_found, ClassRepository, UserRepository},
};

const MAX_INVITE_CODE_ATTEMPTS: usize = 5;

fn access_denied() -> AppError {
    AppError::Forbidden("Access denied".to_string())
}

pub struct ClassService {
    classes: Arc<dyn ClassRepository>,
    users: Arc<dyn UserRepository>,
}

impl ClassService {
    pub fn new(classes: Arc<dyn ClassRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { classes, users }
    }

    pub async fn list_classes(&self, actor: &User) -> AppResult<Vec<Class>> {
        let filter = match actor.role {
            UserRole::Owner => ClassFilter::default(),
            UserRole::Teacher => ClassFilter::taught_by(&actor.id),
            UserRole::Student => ClassFilter::joined_by(&actor.id),
        };
        self.classes.list(filter).await
    }

    /// Creates a class with a fresh invite code, regenerating the code on collision.
    pub async fn create_class(&self, actor: &User, request: CreateClassRequest) -> AppResult<Class> {
        require_role(actor, &[UserRole::Teacher])?;
        request.validate()?;

        let mut class = Class::new(
            &request.name,
            &request.subject,
            request.grade,
            request.description,
            &actor.id,
        );

        for attempt in 1..=MAX_INVITE_CODE_ATTEMPTS {
            match self.classes.create(class.clone()).await {
                Ok(created) => {
                    log::info!(
                        "Teacher '{}' created class '{}' ({})",
                        actor.username,
                        created.name,
                        created.invite_code
                    );
                    return Ok(created);
                }
                Err(AppError::Conflict(reason)) if attempt < MAX_INVITE_CODE_ATTEMPTS => {
                    log::warn!("Invite code collision, regenerating: {}", reason);
                    class.invite_code = generate_invite_code();
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::InternalError(
            "Could not allocate a unique invite code".to_string(),
        ))
    }

    /// Owner, the class teacher and enrolled students may read a class.
    pub async fn get_class(&self, actor: &User, id: &str) -> AppResult<Class> {
        let class = self.find(id).await?;
        let allowed = actor.role == UserRole::Owner
            || class.is_taught_by(&actor.id)
            || class.has_student(&actor.id);
        if !allowed {
            return Err(access_denied());
        }
        Ok(class)
    }

    pub async fn update_class(
        &self,
        actor: &User,
        id: &str,
        request: UpdateClassRequest,
    ) -> AppResult<Class> {
        request.validate()?;
        let class = self.managed(actor, id).await?;

        let patch = ClassPatch::from(request);
        if patch.is_empty() {
            return Ok(class);
        }
        self.classes.update(id, patch).await
    }

    pub async fn delete_class(&self, actor: &User, id: &str) -> AppResult<()> {
        let class = self.managed(actor, id).await?;

        self.classes.delete(id).await?;

        for student_id in &class.students {
            if let Err(e) = self.users.remove_class(student_id, id).await {
                log::warn!(
                    "Deleted class {} but student {} still references it: {}",
                    id,
                    student_id,
                    e
                );
            }
        }

        log::info!("Deleted class '{}' ({})", class.name, class.id);
        Ok(())
    }

    /// Enrolls a student by invite code.
    ///
    /// Writes the roster first, then the student's class list (retried once). If the second
    /// write keeps failing the roster entry is rolled back.
    pub async fn join_class(&self, actor: &User, request: JoinClassRequest) -> AppResult<JoinClassResponse> {
        require_role(actor, &[UserRole::Student])?;
        request.validate()?;

        let class = self
            .classes
            .find_by_invite_code(&request.invite_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid invite code".to_string()))?;

        if !class.is_active {
            return Err(AppError::ValidationError(
                "This class is no longer active".to_string(),
            ));
        }
        if class.has_student(&actor.id) {
            return Err(AppError::Conflict(
                "You have already joined this class".to_string(),
            ));
        }

        self.classes.add_student(&class.id, &actor.id).await?;

        if let Err(first) = self.users.add_class(&actor.id, &class.id).await {
            log::warn!(
                "Adding class {} to student {} failed, retrying: {}",
                class.id,
                actor.id,
                first
            );
            if let Err(second) = self.users.add_class(&actor.id, &class.id).await {
                if let Err(e) = self.classes.remove_student(&class.id, &actor.id).await {
                    log::error!(
                        "Could not roll back roster entry of student {} in class {}: {}",
                        actor.id,
                        class.id,
                        e
                    );
                }
                return Err(second);
            }
        }

        let class = self.find(&class.id).await?;
        Ok(JoinClassResponse {
            message: format!("Successfully joined {}", class.name),
            class,
        })
    }

    /// Roster of a class, for the owner or the class teacher.
    pub async fn list_students(&self, actor: &User, id: &str) -> AppResult<Vec<UserDto>> {
        let class = self.managed(actor, id).await?;
        if class.students.is_empty() {
            return Ok(Vec::new());
        }

        let students = self
            .users
            .list(UserFilter::ids(class.students.clone()))
            .await?;
        Ok(students.into_iter().map(UserDto::from).collect())
    }

    async fn find(&self, id: &str) -> AppResult<Class> {
        self.classes
            .find_by_id(id)
            .await?
            .ok_or_else(|| class_not_found(id))
    }

    /// The class, if `actor` may manage it (owner or its teacher).
    async fn managed(&self, actor: &User, id: &str) -> AppResult<Class> {
        require_staff(actor)?;
        let class = self.find(id).await?;
        if actor.role != UserRole::Owner && !class.is_taught_by(&actor.id) {
            return Err(access_denied());
        }
        Ok(class)
    }
}

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    errors::{AppError, AppResult},
    models::domain::{User, UserFilter, UserPatch, UserRole},
    repositories::user_repository::{user_not_found, UserRepository},
};

const STAFF_FILE: &str = "staff.json";
const STUDENTS_FILE: &str = "students.json";

/// Users kept in two JSON files: owners and teachers in one, students in the other.
pub struct LocalUserRepository {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Partition {
    Staff,
    Students,
}

impl Partition {
    fn of(role: UserRole) -> Self {
        if role.is_privileged() {
            Partition::Staff
        } else {
            Partition::Students
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Partition::Staff => STAFF_FILE,
            Partition::Students => STUDENTS_FILE,
        }
    }
}

impl LocalUserRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, partition: Partition) -> PathBuf {
        self.dir.join(partition.file_name())
    }

    async fn read(&self, partition: Partition) -> AppResult<Vec<User>> {
        match tokio::fs::read(self.path(partition)).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_all(&self) -> AppResult<Vec<User>> {
        let mut users = self.read(Partition::Staff).await?;
        users.extend(self.read(Partition::Students).await?);
        Ok(users)
    }

    /// Replaces a partition file via temp file + rename, so readers never see a torn write.
    async fn write(&self, partition: Partition, users: &[User]) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(partition);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(users)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Runs `change` on the partition holding `id` and persists the result.
    ///
    /// Callers pass the held write guard.
    async fn modify<F>(&self, _held: &MutexGuard<'_, ()>, id: &str, change: F) -> AppResult<User>
    where
        F: FnOnce(&mut User) -> AppResult<()> + Send,
    {
        for partition in [Partition::Staff, Partition::Students] {
            let mut users = self.read(partition).await?;
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                change(user)?;
                let updated = user.clone();
                self.write(partition, &users).await?;
                return Ok(updated);
            }
        }
        Err(user_not_found(id))
    }
}

#[async_trait]
impl UserRepository for LocalUserRepository {
    async fn list(&self, filter: UserFilter) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|u| filter.matches(u))
            .collect();
        users.sort_by(|a, b| a.username.to_lowercase().cmp(&b.username.to_lowercase()));
        Ok(users)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.read_all().await?.into_iter().find(|u| u.id == id))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let wanted = username.to_lowercase();
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|u| u.username.to_lowercase() == wanted))
    }

    async fn find_by_nisn(&self, nisn: &str) -> AppResult<Option<User>> {
        Ok(self
            .read(Partition::Students)
            .await?
            .into_iter()
            .find(|u| u.nisn.as_deref() == Some(nisn)))
    }

    async fn create(&self, user: User) -> AppResult<User> {
        let _guard = self.write_lock.lock().await;

        let all = self.read_all().await?;
        let username = user.username.to_lowercase();
        if all.iter().any(|u| u.id == user.id) {
            return Err(AppError::Conflict(format!("User with id '{}' already exists", user.id)));
        }
        if all.iter().any(|u| u.username.to_lowercase() == username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                user.username
            )));
        }
        if let Some(nisn) = user.nisn.as_deref() {
            if all.iter().any(|u| u.nisn.as_deref() == Some(nisn)) {
                return Err(AppError::Conflict(format!("NISN '{}' is already registered", nisn)));
            }
        }

        let partition = Partition::of(user.role);
        let mut users = self.read(partition).await?;
        users.push(user.clone());
        self.write(partition, &users).await?;
        Ok(user)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> AppResult<User> {
        let guard = self.write_lock.lock().await;

        if patch.username.is_some() || patch.nisn.is_some() {
            let others: Vec<User> = self
                .read_all()
                .await?
                .into_iter()
                .filter(|u| u.id != id)
                .collect();
            if let Some(username) = patch.username.as_deref() {
                let wanted = username.to_lowercase();
                if others.iter().any(|u| u.username.to_lowercase() == wanted) {
                    return Err(AppError::Conflict(format!("Username '{}' is already taken", username)));
                }
            }
            if let Some(nisn) = patch.nisn.as_deref() {
                if others.iter().any(|u| u.nisn.as_deref() == Some(nisn)) {
                    return Err(AppError::Conflict(format!("NISN '{}' is already registered", nisn)));
                }
            }
        }

        self.modify(&guard, id, |user| {
            patch.apply(user);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;

        for partition in [Partition::Staff, Partition::Students] {
            let mut users = self.read(partition).await?;
            let before = users.len();
            users.retain(|u| u.id != id);
            if users.len() != before {
                return self.write(partition, &users).await;
            }
        }
        Err(user_not_found(id))
    }

    async fn add_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        let guard = self.write_lock.lock().await;
        self.modify(&guard, user_id, |user| {
            if !user.classes.iter().any(|c| c == class_id) {
                user.classes.push(class_id.to_string());
            }
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn remove_class(&self, user_id: &str, class_id: &str) -> AppResult<()> {
        let guard = self.write_lock.lock().await;
        self.modify(&guard, user_id, |user| {
            user.classes.retain(|c| c != class_id);
            Ok(())
        })
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, LocalUserRepository) {
        let dir = TempDir::new().unwrap();
        let repo = LocalUserRepository::new(dir.path());
        (dir, repo)
    }

    #[tokio::test]
    async fn test_users_land_in_role_partitions() {
        let (dir, repo) = repo();
        repo.create(User::test_teacher("budi")).await.unwrap();
        repo.create(User::test_student("ani", "001")).await.unwrap();

        let staff = std::fs::read_to_string(dir.path().join(STAFF_FILE)).unwrap();
        let students = std::fs::read_to_string(dir.path().join(STUDENTS_FILE)).unwrap();
        assert!(staff.contains("budi") && !staff.contains("ani"));
        assert!(students.contains("ani") && !students.contains("budi"));
        assert!(!dir.path().join("students.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let (_dir, repo) = repo();
        assert!(repo.list(UserFilter::default()).await.unwrap().is_empty());
        assert!(repo.find_by_nisn("001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_and_nisn_conflict() {
        let (_dir, repo) = repo();
        repo.create(User::test_student("ani", "001")).await.unwrap();

        let same_name = repo.create(User::test_student("ANI", "002")).await;
        assert!(matches!(same_name, Err(AppError::Conflict(_))));

        let same_nisn = repo.create(User::test_student("ana", "001")).await;
        assert!(matches!(same_nisn, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_persists_and_class_set_semantics() {
        let (_dir, repo) = repo();
        let student = repo.create(User::test_student("ani", "001")).await.unwrap();

        repo.add_class(&student.id, "c1").await.unwrap();
        repo.add_class(&student.id, "c1").await.unwrap();
        let updated = repo
            .update(&student.id, UserPatch { is_suspended: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert!(updated.is_suspended);

        let reloaded = repo.find_by_username("Ani").await.unwrap().unwrap();
        assert_eq!(reloaded.classes, vec!["c1".to_string()]);
        assert!(reloaded.is_suspended);

        repo.remove_class(&student.id, "c1").await.unwrap();
        assert!(repo.find_by_id(&student.id).await.unwrap().unwrap().classes.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_renames_keep_usernames_unique() {
        let (_dir, repo) = repo();
        let ani = repo.create(User::test_student("ani", "001")).await.unwrap();
        let citra = repo.create(User::test_student("citra", "002")).await.unwrap();

        for round in 0..10 {
            let wanted = format!("same{}", round);
            let rename = |id: String| {
                let patch = UserPatch {
                    username: Some(wanted.clone()),
                    ..Default::default()
                };
                let repo = &repo;
                async move { repo.update(&id, patch).await }
            };

            let (first, second) = tokio::join!(rename(ani.id.clone()), rename(citra.id.clone()));
            assert_eq!(
                [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
                1
            );
            assert!(matches!(
                first.err().or(second.err()),
                Some(AppError::Conflict(_))
            ));

            let holders = repo
                .list(UserFilter::default())
                .await
                .unwrap()
                .into_iter()
                .filter(|u| u.username == wanted)
                .count();
            assert_eq!(holders, 1);
        }
    }

    #[tokio::test]
    async fn test_delete_unknown_user_is_not_found() {
        let (_dir, repo) = repo();
        let result = repo.delete("missing").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

pub mod class_repository;
pub mod exam_repository;
pub mod hybrid;
pub mod local_user_repository;
pub mod settings_repository;
pub mod submission_repository;
pub mod user_repository;

pub use class_repository::{ClassRepository, MongoClassRepository};
pub use exam_repository::{ExamRepository, MongoExamRepository};
pub use hybrid::hybrid_repositories;
pub use local_user_repository::LocalUserRepository;
pub use settings_repository::{MongoSettingsRepository, SettingsRepository};
pub use submission_repository::{MongoSubmissionRepository, SubmissionRepository};
pub use user_repository::{MongoUserRepository, UserRepository};

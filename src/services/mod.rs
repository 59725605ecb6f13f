pub mod auth_service;
pub mod class_service;
pub mod exam_service;
pub mod grading_service;
pub mod model_service;
pub mod presence_service;
pub mod settings_service;
pub mod submission_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use class_service::ClassService;
pub use exam_service::ExamService;
pub use grading_service::{FreeformGrader, GradingEngine};
pub use model_service::GeminiGrader;
pub use presence_service::PresenceService;
pub use settings_service::SettingsService;
pub use submission_service::SubmissionService;
pub use user_service::UserService;

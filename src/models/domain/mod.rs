pub mod answer;
pub mod class;
pub mod exam;
pub mod question;
pub mod settings;
pub mod submission;
pub mod user;

pub use answer::{Answer, RawAnswer, SubmittedAnswer};
pub use class::{Class, ClassFilter, ClassPatch};
pub use exam::{Exam, ExamAvailability, ExamFilter, ExamPatch, ExamSettings, StudentExamView};
pub use question::{Question, QuestionType};
pub use settings::{Settings, SettingsPatch};
pub use submission::{
    GradedAnswer, ScoreSummary, Submission, SubmissionFilter, SubmissionPatch, SubmissionStatus,
};
pub use user::{User, UserFilter, UserPatch, UserRole};

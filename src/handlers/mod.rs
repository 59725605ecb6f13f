pub mod auth_handler;
pub mod class_handler;
pub mod exam_handler;
pub mod health_handler;
pub mod realtime_handler;
pub mod settings_handler;
pub mod submission_handler;
pub mod user_handler;

use actix_web::web;

/// Registers every route. Fixed paths go before their `{id}` siblings.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_handler::health_check)
        .service(health_handler::health_check_live)
        .service(auth_handler::login)
        .service(auth_handler::register)
        .service(auth_handler::logout)
        .service(user_handler::list_users)
        .service(user_handler::create_user)
        .service(user_handler::get_user)
        .service(user_handler::update_user)
        .service(user_handler::delete_user)
        .service(user_handler::toggle_suspension)
        .service(class_handler::list_classes)
        .service(class_handler::create_class)
        .service(class_handler::join_class)
        .service(class_handler::get_class)
        .service(class_handler::update_class)
        .service(class_handler::delete_class)
        .service(class_handler::list_students)
        .service(exam_handler::list_exams)
        .service(exam_handler::create_exam)
        .service(exam_handler::get_exam)
        .service(exam_handler::update_exam)
        .service(exam_handler::delete_exam)
        .service(exam_handler::publish_exam)
        .service(submission_handler::list_submissions)
        .service(submission_handler::start_submission)
        .service(submission_handler::submit_answers)
        .service(submission_handler::list_exam_submissions)
        .service(submission_handler::save_progress)
        .service(submission_handler::get_submission)
        .service(settings_handler::get_settings)
        .service(settings_handler::update_settings)
        .service(settings_handler::reset_settings)
        .service(settings_handler::test_database)
        .service(realtime_handler::heartbeat)
        .service(realtime_handler::student_status)
        .service(realtime_handler::exam_progress);
}

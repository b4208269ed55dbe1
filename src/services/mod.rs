pub mod assessment_service;
pub mod audit_service;
pub mod grading_service;
pub mod question_service;
pub mod role_service;
pub mod submission_service;

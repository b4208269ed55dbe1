pub mod assessment;
pub mod audit_log;
pub mod question;
pub mod question_option;
pub mod response;
pub mod rubric;
pub mod rubric_rating;
pub mod submission;

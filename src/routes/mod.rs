pub mod assessment_routes;
pub mod health;
pub mod question_routes;
pub mod rubric_routes;
pub mod submission_routes;

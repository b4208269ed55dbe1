pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    assessment_service::AssessmentService, question_service::QuestionService,
    submission_service::SubmissionService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub assessment_service: AssessmentService,
    pub question_service: QuestionService,
    pub submission_service: SubmissionService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let assessment_service = AssessmentService::new(pool.clone());
        let question_service = QuestionService::new(pool.clone());
        let submission_service = SubmissionService::new(pool.clone());

        Self {
            pool,
            assessment_service,
            question_service,
            submission_service,
        }
    }
}

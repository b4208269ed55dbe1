use crate::models::question::QuestionType;
use std::collections::HashSet;
use uuid::Uuid;

/// Everything auto-grading needs to know about one stored response.
#[derive(Debug, Clone)]
pub struct ResponseInput {
    pub response_id: Uuid,
    pub question_type: QuestionType,
    pub points: i32,
    pub correct_option_ids: HashSet<Uuid>,
    pub selected_option_ids: HashSet<Uuid>,
}

/// Per-response grading verdict. `score`/`is_correct` stay `None` for
/// question types auto-grading cannot score; those rows are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedResponse {
    pub response_id: Uuid,
    pub score: Option<i32>,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub total_score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub responses: Vec<GradedResponse>,
}

pub struct GradingService;

impl GradingService {
    /// Deterministic scoring of the objective question types.
    ///
    /// Every response contributes its question's points to `max_score`,
    /// whether or not the type is auto-gradable; a quiz that mixes in
    /// essay questions cannot auto-grade to 100%.
    pub fn score_responses(responses: &[ResponseInput]) -> GradeOutcome {
        let mut total_score: i32 = 0;
        let mut max_score: i32 = 0;
        let mut graded: Vec<GradedResponse> = Vec::with_capacity(responses.len());

        for resp in responses {
            max_score += resp.points;

            let verdict = match resp.question_type {
                QuestionType::Mcq => {
                    // Exact set match: any missing or extra selection is wrong.
                    Some(resp.selected_option_ids == resp.correct_option_ids)
                }
                QuestionType::TrueFalse => {
                    // Exactly one selected option, identical to the single
                    // correct one.
                    let correct = resp.correct_option_ids.iter().next();
                    let selected = if resp.selected_option_ids.len() == 1 {
                        resp.selected_option_ids.iter().next()
                    } else {
                        None
                    };
                    Some(matches!((correct, selected), (Some(c), Some(s)) if c == s))
                }
                _ => None,
            };

            match verdict {
                Some(true) => {
                    total_score += resp.points;
                    graded.push(GradedResponse {
                        response_id: resp.response_id,
                        score: Some(resp.points),
                        is_correct: Some(true),
                    });
                }
                Some(false) => {
                    graded.push(GradedResponse {
                        response_id: resp.response_id,
                        score: Some(0),
                        is_correct: Some(false),
                    });
                }
                None => {
                    graded.push(GradedResponse {
                        response_id: resp.response_id,
                        score: None,
                        is_correct: None,
                    });
                }
            }
        }

        let percentage = if max_score > 0 {
            total_score as f64 / max_score as f64 * 100.0
        } else {
            0.0
        };

        GradeOutcome {
            total_score,
            max_score,
            percentage,
            responses: graded,
        }
    }
}

use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

#[derive(serde::Serialize)]
struct Claims {
    sub: String,
    exp: usize,
    role: Option<String>,
}

fn bearer(user_id: Uuid, role: &str) -> String {
    let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
    let token = encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp,
            role: Some(role.into()),
        },
        &EncodingKey::from_secret(
            lms_backend::config::get_config().jwt_secret.as_bytes(),
        ),
    )
    .expect("sign token");
    format!("Bearer {}", token)
}

async fn seed_user(pool: &sqlx::PgPool, name: &str, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, $4)"#)
        .bind(id)
        .bind(name)
        .bind(format!("{}_{}@example.com", role, id))
        .bind(role)
        .execute(pool)
        .await
        .expect("seed user");
    id
}

#[tokio::test]
async fn quiz_submission_and_auto_grading_end_to_end() {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping submission API test");
        return;
    }
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("API_RPS", "1000");

    lms_backend::config::init_config().expect("init config");

    let pool = lms_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let instructor_id = seed_user(&pool, "Quiz Instructor", "instructor").await;
    let learner_id = seed_user(&pool, "Quiz Learner", "learner").await;

    let course_id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO courses (id, title, slug) VALUES ($1, $2, $3)"#)
        .bind(course_id)
        .bind("Quiz Course")
        .bind(format!("quiz-{}", course_id))
        .execute(&pool)
        .await
        .expect("seed course");
    sqlx::query(r#"INSERT INTO course_instructors (course_id, user_id) VALUES ($1, $2)"#)
        .bind(course_id)
        .bind(instructor_id)
        .execute(&pool)
        .await
        .expect("seed instructor link");
    sqlx::query(r#"INSERT INTO enrollments (course_id, user_id) VALUES ($1, $2)"#)
        .bind(course_id)
        .bind(learner_id)
        .execute(&pool)
        .await
        .expect("seed enrollment");

    let app_state = lms_backend::AppState::new(pool.clone());
    let app = Router::new()
        .route(
            "/api/assessments",
            post(lms_backend::routes::assessment_routes::create_assessment),
        )
        .route(
            "/api/assessments/:id/publish",
            post(lms_backend::routes::assessment_routes::publish_assessment),
        )
        .route(
            "/api/assessments/:id/activate",
            post(lms_backend::routes::assessment_routes::activate_assessment),
        )
        .route(
            "/api/assessments/:id/statistics",
            get(lms_backend::routes::assessment_routes::assessment_statistics),
        )
        .route(
            "/api/assessments/:id/questions",
            post(lms_backend::routes::question_routes::create_question),
        )
        .route(
            "/api/questions/:id/options",
            get(lms_backend::routes::question_routes::list_options),
        )
        .route(
            "/api/assessments/:id/submissions",
            get(lms_backend::routes::submission_routes::list_submissions)
                .post(lms_backend::routes::submission_routes::create_submission),
        )
        .route(
            "/api/submissions/:id/responses",
            get(lms_backend::routes::submission_routes::list_responses)
                .put(lms_backend::routes::submission_routes::save_response),
        )
        .route(
            "/api/submissions/:id/submit",
            post(lms_backend::routes::submission_routes::submit_submission),
        )
        .route(
            "/api/submissions/:id/auto-grade",
            post(lms_backend::routes::submission_routes::auto_grade_submission),
        )
        .layer(axum::middleware::from_fn(
            lms_backend::middleware::auth::require_bearer_auth,
        ))
        .with_state(app_state);

    let instructor_auth = bearer(instructor_id, "instructor");
    let learner_auth = bearer(learner_id, "learner");

    // Instructor authors a two-question quiz worth one point each.
    let due = chrono::Utc::now() + chrono::Duration::days(3);
    let create_body = json!({
        "course_id": course_id,
        "title": "Week 3 Quiz",
        "type": "quiz",
        "due_date": due.to_rfc3339(),
        "passing_score": 50,
        "max_attempts": 1
    });
    let req = Request::builder()
        .method("POST")
        .uri("/api/assessments")
        .header("content-type", "application/json")
        .header("authorization", instructor_auth.clone())
        .body(Body::from(create_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let assessment: JsonValue = serde_json::from_slice(&bytes).unwrap();
    let assessment_id = Uuid::parse_str(assessment["id"].as_str().unwrap()).unwrap();

    let mcq_body = json!({
        "type": "mcq",
        "text": "Which planet is closest to the sun?",
        "points": 1,
        "options": [
            {"text": "Venus", "is_correct": false},
            {"text": "Mercury", "is_correct": true},
            {"text": "Mars", "is_correct": false}
        ]
    });
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/assessments/{}/questions", assessment_id))
        .header("content-type", "application/json")
        .header("authorization", instructor_auth.clone())
        .body(Body::from(mcq_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let mcq: JsonValue = serde_json::from_slice(&bytes).unwrap();
    let mcq_id = Uuid::parse_str(mcq["id"].as_str().unwrap()).unwrap();

    let tf_body = json!({
        "type": "true_false",
        "text": "Water boils at 90 degrees Celsius at sea level.",
        "points": 1,
        "options": [
            {"text": "True", "is_correct": false},
            {"text": "False", "is_correct": true}
        ]
    });
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/assessments/{}/questions", assessment_id))
        .header("content-type", "application/json")
        .header("authorization", instructor_auth.clone())
        .body(Body::from(tf_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let tf: JsonValue = serde_json::from_slice(&bytes).unwrap();
    let tf_id = Uuid::parse_str(tf["id"].as_str().unwrap()).unwrap();

    let fetch_options = |question_id: Uuid| {
        let app = app.clone();
        let auth = instructor_auth.clone();
        async move {
            let req = Request::builder()
                .method("GET")
                .uri(format!("/api/questions/{}/options", question_id))
                .header("authorization", auth)
                .body(Body::empty())
                .unwrap();
            let resp = app.oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
            let options: JsonValue = serde_json::from_slice(&bytes).unwrap();
            options.as_array().unwrap().clone()
        }
    };

    let mcq_options = fetch_options(mcq_id).await;
    let mcq_correct = mcq_options
        .iter()
        .find(|o| o["is_correct"] == true)
        .map(|o| o["id"].as_str().unwrap().to_string())
        .unwrap();
    let tf_options = fetch_options(tf_id).await;
    let tf_wrong = tf_options
        .iter()
        .find(|o| o["is_correct"] == false)
        .map(|o| o["id"].as_str().unwrap().to_string())
        .unwrap();

    // Learners cannot attempt a draft assessment.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/assessments/{}/submissions", assessment_id))
        .header("authorization", learner_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_state");

    for action in ["publish", "activate"] {
        let req = Request::builder()
            .method("POST")
            .uri(format!("/api/assessments/{}/{}", assessment_id, action))
            .header("authorization", instructor_auth.clone())
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/assessments/{}/submissions", assessment_id))
        .header("authorization", learner_auth.clone())
        .header("x-forwarded-for", "203.0.113.7")
        .header("user-agent", "integration-test/1.0")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let submission: JsonValue = serde_json::from_slice(&bytes).unwrap();
    let submission_id = Uuid::parse_str(submission["id"].as_str().unwrap()).unwrap();
    assert_eq!(submission["attempt_number"], 1);
    assert_eq!(submission["status"], "draft");

    // Submitting before answering anything is rejected.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/submissions/{}/submit", submission_id))
        .header("authorization", learner_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "validation_error");

    // Right answer for the MCQ, wrong answer for the true/false.
    for (question_id, option_id) in [(mcq_id, &mcq_correct), (tf_id, &tf_wrong)] {
        let save_body = json!({
            "question_id": question_id,
            "selected_option_ids": [option_id]
        });
        let req = Request::builder()
            .method("PUT")
            .uri(format!("/api/submissions/{}/responses", submission_id))
            .header("content-type", "application/json")
            .header("authorization", learner_auth.clone())
            .body(Body::from(save_body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/submissions/{}/submit", submission_id))
        .header("authorization", learner_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "submitted");

    // Answers are frozen once the submission leaves draft.
    let save_body = json!({
        "question_id": mcq_id,
        "selected_option_ids": [mcq_correct]
    });
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/submissions/{}/responses", submission_id))
        .header("content-type", "application/json")
        .header("authorization", learner_auth.clone())
        .body(Body::from(save_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_state");

    // max_attempts is 1, so a second attempt is refused.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/assessments/{}/submissions", assessment_id))
        .header("authorization", learner_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "attempt_limit");

    // Learners cannot trigger grading.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/submissions/{}/auto-grade", submission_id))
        .header("authorization", learner_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // One of two points: 50%, which meets the 50% passing score.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/submissions/{}/auto-grade", submission_id))
        .header("authorization", instructor_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let graded: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(graded["status"], "graded");
    assert_eq!(graded["score"], 50.0);
    assert_eq!(graded["is_passed"], true);

    // Both workflow transitions left audit rows.
    for action in ["submit", "auto_grade"] {
        let rows: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM audit_logs
               WHERE entity_type = 'submission' AND entity_id = $1 AND action = $2"#,
        )
        .bind(submission_id)
        .bind(action)
        .fetch_one(&pool)
        .await
        .expect("audit count");
        assert_eq!(rows, 1, "missing audit row for {}", action);
    }

    // Re-grading an already graded submission fails the status guard.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/submissions/{}/auto-grade", submission_id))
        .header("authorization", instructor_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Per-response verdicts landed on the stored responses.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/submissions/{}/responses", submission_id))
        .header("authorization", learner_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let responses: JsonValue = serde_json::from_slice(&bytes).unwrap();
    let responses = responses.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    let verdicts: Vec<bool> = responses
        .iter()
        .map(|r| r["is_correct"].as_bool().unwrap())
        .collect();
    assert!(verdicts.contains(&true));
    assert!(verdicts.contains(&false));

    // The graded attempt shows up in the instructor statistics.
    let req = Request::builder()
        .method("GET")
        .uri(format!("/api/assessments/{}/statistics", assessment_id))
        .header("authorization", instructor_auth.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let stats: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(stats["total_submissions"], 1);
    assert_eq!(stats["graded_submissions"], 1);
    assert_eq!(stats["pass_rate"], 100.0);
}

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use lms_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware, routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let api = Router::new()
        .route(
            "/api/assessments",
            get(routes::assessment_routes::list_assessments)
                .post(routes::assessment_routes::create_assessment),
        )
        .route(
            "/api/assessments/:id",
            get(routes::assessment_routes::get_assessment)
                .patch(routes::assessment_routes::update_assessment)
                .delete(routes::assessment_routes::delete_assessment),
        )
        .route(
            "/api/assessments/:id/publish",
            post(routes::assessment_routes::publish_assessment),
        )
        .route(
            "/api/assessments/:id/activate",
            post(routes::assessment_routes::activate_assessment),
        )
        .route(
            "/api/assessments/:id/questions",
            get(routes::question_routes::list_questions)
                .post(routes::question_routes::create_question)
                .delete(routes::question_routes::delete_all_questions),
        )
        .route(
            "/api/questions/:id",
            axum::routing::patch(routes::question_routes::update_question)
                .delete(routes::question_routes::delete_question),
        )
        .route(
            "/api/questions/:id/options",
            get(routes::question_routes::list_options).post(routes::question_routes::add_option),
        )
        .route(
            "/api/options/:id",
            axum::routing::delete(routes::question_routes::delete_option),
        )
        .route(
            "/api/assessments/:id/rubrics",
            get(routes::rubric_routes::list_rubrics)
                .post(routes::rubric_routes::create_rubric)
                .delete(routes::rubric_routes::delete_all_rubrics),
        )
        .route(
            "/api/rubrics/:id",
            axum::routing::patch(routes::rubric_routes::update_rubric)
                .delete(routes::rubric_routes::delete_rubric),
        )
        .route(
            "/api/assessments/:id/submissions",
            get(routes::submission_routes::list_submissions)
                .post(routes::submission_routes::create_submission),
        )
        .route(
            "/api/submissions/:id",
            get(routes::submission_routes::get_submission),
        )
        .route(
            "/api/submissions/:id/responses",
            get(routes::submission_routes::list_responses)
                .put(routes::submission_routes::save_response),
        )
        .route(
            "/api/submissions/:id/submit",
            post(routes::submission_routes::submit_submission),
        )
        .route(
            "/api/submissions/:id/grade",
            post(routes::submission_routes::grade_submission),
        )
        .route(
            "/api/submissions/:id/auto-grade",
            post(routes::submission_routes::auto_grade_submission),
        )
        .route(
            "/api/responses/:id/ratings",
            post(routes::submission_routes::rate_response),
        )
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(config.api_rps),
            middleware::rate_limit::rps_middleware,
        ));

    // Reporting surface no learner token should reach, even though the
    // workflow operations re-check course-level permissions themselves.
    let staff_api = Router::new()
        .route(
            "/api/assessments/:id/statistics",
            get(routes::assessment_routes::assessment_statistics),
        )
        .layer(axum::middleware::from_fn(
            middleware::auth::require_staff_or_instructor,
        ));

    let app = base_routes
        .merge(api)
        .merge(staff_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        analytics, auth, enrollment, lessons, programs, progress, quizzes, responses, topics,
        users,
    },
    state::AppState,
    utils::jwt::{auth_middleware, manager_middleware},
};

/// Assembles the main application router.
///
/// * `/api/auth` is public.
/// * Everything else requires a bearer token; ownership and enrollment are
///   checked per handler.
/// * The user directory, the grading queue and the manager dashboards also
///   require the manager role.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/api/users/me", get(users::get_me).put(users::update_me))
        .route(
            "/api/programs",
            get(programs::list_programs).post(programs::create_program),
        )
        .route(
            "/api/programs/{id}",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        )
        .route("/api/programs/{id}/topics", post(topics::create_topic))
        .route(
            "/api/programs/{id}/enroll",
            post(enrollment::enroll_self).delete(enrollment::unenroll_self),
        )
        .route(
            "/api/programs/{id}/enrollments",
            get(enrollment::list_enrollments).post(enrollment::bulk_enrollment),
        )
        .route("/api/programs/{id}/progress", get(progress::program_progress))
        .route(
            "/api/topics/{id}",
            put(topics::update_topic).delete(topics::delete_topic),
        )
        .route("/api/topics/{id}/lessons", post(lessons::create_lesson))
        .route(
            "/api/lessons/{id}",
            get(lessons::get_lesson)
                .put(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        .route("/api/lessons/{id}/quizzes", post(quizzes::create_quiz))
        .route("/api/lessons/{id}/complete", post(progress::complete_lesson))
        .route(
            "/api/quizzes/{id}",
            get(quizzes::get_quiz)
                .put(quizzes::update_quiz)
                .delete(quizzes::delete_quiz),
        )
        .route(
            "/api/quizzes/{id}/responses",
            get(responses::list_quiz_responses).post(responses::submit_response),
        )
        .route("/api/responses/{id}/grade", put(responses::grade_response))
        .route("/api/progress/me", get(progress::my_progress))
        .route("/api/analytics/me", get(analytics::learner_dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let manager_routes = Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/responses/pending", get(responses::list_pending_responses))
        .route("/api/analytics/summary", get(analytics::summary))
        .route("/api/analytics/dashboard", get(analytics::dashboard))
        // Auth first, then the role check
        .layer(middleware::from_fn(manager_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected_routes)
        .merge(manager_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

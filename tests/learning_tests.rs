// tests/learning_tests.rs

mod common;

use common::spawn_app;
use coursehub::state::SystemGrader;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn enrolling_twice_yields_one_enrollment() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, _) = app.course(&manager).await;

    let path = format!("/api/programs/{}/enroll", program);
    let first = app.post(&learner, &path, json!({})).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first: Value = first.json().await.unwrap();
    let second = app.post(&learner, &path, json!({})).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second: Value = second.json().await.unwrap();
    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["enrolled_at"], second["enrolled_at"]);

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND program_id = $2",
    )
    .bind(learner.id)
    .bind(program)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(count, 1);

    // Unenrolling twice is a no-op the second time.
    assert_eq!(app.delete(&learner, &path).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&learner, &path).await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn bulk_enrollment_is_owner_only_and_reports_counts() {
    let Some(app) = spawn_app().await else { return };
    let owner = app.manager().await;
    let other = app.manager().await;
    let a = app.learner("Sales").await;
    let b = app.learner("Support").await;
    let (program, _, _) = app.course(&owner).await;
    let path = format!("/api/programs/{}/enrollments", program);

    let response = app
        .post(&other, &path, json!({ "action": "enroll", "user_ids": [a.id] }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post(&owner, &path, json!({ "action": "enroll", "user_ids": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.enroll(&a, program).await;
    let result: Value = app
        .post(&owner, &path, json!({ "action": "enroll", "user_ids": [a.id, b.id, b.id] }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["requested"], 2);
    assert_eq!(result["affected"], 1);

    let roster: Vec<Value> = app.get(&owner, &path).await.json().await.unwrap();
    assert_eq!(roster.len(), 2);

    let result: Value = app
        .post(&owner, &path, json!({ "action": "unenroll", "user_ids": [a.id] }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(result["affected"], 1);
}

#[tokio::test]
async fn submitting_requires_enrollment() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (_, _, lesson) = app.course(&manager).await;
    let (quiz, correct, _) = app.mcq(&manager, lesson).await;

    let response = app
        .post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "selected_choice_id": correct }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.post(&learner, &format!("/api/lessons/{}/complete", lesson), json!({})).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mcq_is_auto_graded() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let right = app.learner("Sales").await;
    let wrong = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let (quiz, correct, incorrect) = app.mcq(&manager, lesson).await;
    app.enroll(&right, program).await;
    app.enroll(&wrong, program).await;
    let path = format!("/api/quizzes/{}/responses", quiz);

    let response = app.post(&right, &path, json!({ "selected_choice_id": correct })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let graded: Value = response.json().await.unwrap();
    assert_eq!(graded["points_earned"], 10);
    assert_eq!(graded["grading_status"], "graded");
    assert!(graded["graded_at"].is_string());

    let graded: Value = app
        .post(&wrong, &path, json!({ "selected_choice_id": incorrect }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(graded["points_earned"], 0);
    assert_eq!(graded["grading_status"], "graded");
}

#[tokio::test]
async fn choice_from_another_quiz_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let (quiz, _, _) = app.mcq(&manager, lesson).await;
    let (_, foreign, _) = app.mcq(&manager, lesson).await;
    app.enroll(&learner, program).await;

    let response = app
        .post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "selected_choice_id": foreign }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_duplicate_submissions_store_one_response() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let (quiz, correct, _) = app.mcq(&manager, lesson).await;
    app.enroll(&learner, program).await;

    let path = format!("/api/quizzes/{}/responses", quiz);
    let body = json!({ "selected_choice_id": correct });
    let (first, second) = tokio::join!(
        app.post(&learner, &path, body.clone()),
        app.post(&learner, &path, body.clone())
    );

    let mut statuses = [first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, [201, 409]);

    let stored = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quiz_responses WHERE quiz_id = $1 AND user_id = $2",
    )
    .bind(quiz)
    .bind(learner.id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn open_response_grading_flow() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let quiz = app
        .create(
            &manager,
            &format!("/api/lessons/{}/quizzes", lesson),
            json!({ "title": "Essay", "question": "Why?", "quiz_type": "open", "points": 10 }),
        )
        .await;
    app.enroll(&learner, program).await;

    let submitted: Value = app
        .post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "text_response": "Because." }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(submitted["grading_status"], "pending");
    assert!(submitted["points_earned"].is_null());
    let response_id = submitted["id"].as_i64().unwrap();

    let pending: Vec<Value> = app.get(&manager, "/api/responses/pending").await.json().await.unwrap();
    assert!(pending.iter().any(|r| r["id"] == response_id));

    let grade_path = format!("/api/responses/{}/grade", response_id);

    // Only the program owner may grade.
    let response = app.put(&learner, &grade_path, json!({ "points_earned": 5 })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.put(&manager, &grade_path, json!({ "points_earned": 11 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let unchanged = sqlx::query_as::<_, (Option<i32>, String)>(
        "SELECT points_earned, grading_status::text FROM quiz_responses WHERE id = $1",
    )
    .bind(response_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(unchanged, (None, "pending".to_string()));

    let graded: Value = app
        .put(&manager, &grade_path, json!({ "points_earned": 7, "comment": "Good" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(graded["points_earned"], 7);
    assert_eq!(graded["grading_status"], "graded");
    assert_eq!(graded["graded_by"], manager.id);
    assert_eq!(graded["grading_comment"], "Good");
}

#[tokio::test]
async fn completing_one_of_two_lessons_is_fifty_percent() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, topic, lesson) = app.course(&manager).await;
    app.create(
        &manager,
        &format!("/api/topics/{}/lessons", topic),
        json!({ "title": "Second", "content": "<p>2</p>", "order": 2 }),
    )
    .await;
    app.enroll(&learner, program).await;

    let path = format!("/api/lessons/{}/complete", lesson);
    let first: Value = app.post(&learner, &path, json!({})).await.json().await.unwrap();
    let again: Value = app.post(&learner, &path, json!({})).await.json().await.unwrap();
    assert_eq!(first["completed_at"], again["completed_at"]);

    let progress: Vec<Value> = app.get(&learner, "/api/progress/me").await.json().await.unwrap();
    let entry = progress.iter().find(|p| p["program_id"] == program).unwrap();
    assert_eq!(entry["completed_lessons"], 1);
    assert_eq!(entry["total_lessons"], 2);
    assert_eq!(entry["progress_percentage"], 50.0);
    assert_eq!(entry["status"], "in_progress");

    let roster: Vec<Value> = app
        .get(&manager, &format!("/api/programs/{}/progress", program))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["progress_percentage"], 50.0);
}

#[tokio::test]
async fn dashboards_report_nested_statistics() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let (quiz, correct, _) = app.mcq(&manager, lesson).await;
    app.enroll(&learner, program).await;
    app.post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "selected_choice_id": correct }))
        .await;
    app.post(&learner, &format!("/api/lessons/{}/complete", lesson), json!({})).await;

    let dashboard: Value = app
        .get(&manager, &format!("/api/analytics/dashboard?programs={}", program))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["active_programs_count"], 1);
    let stats = &dashboard["programs"][0];
    assert_eq!(stats["completion_rate"], 100.0);
    assert_eq!(stats["avg_quiz_score"], 100.0);
    assert_eq!(stats["topics"][0]["lessons"][0]["total_quizzes"], 1);
    assert_eq!(stats["topics"][0]["lessons"][0]["completed_quizzes"], 1);

    let summary: Value = app
        .get(&manager, &format!("/api/analytics/summary?programs={}&departments=Nobody", program))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(summary["programs"].as_array().unwrap().len(), 0);

    let summary: Value = app
        .get(&manager, &format!("/api/analytics/summary?programs={}", program))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        summary["departments"],
        json!([{
            "department": "Sales",
            "user_count": 1,
            "completion_rate": 100.0,
            "quiz_score": 100.0
        }])
    );

    let mine: Value = app.get(&learner, "/api/analytics/me").await.json().await.unwrap();
    assert_eq!(mine["overall_progress"]["percentage"], 100.0);
    assert_eq!(mine["quiz_stats"]["completed_quizzes"], 1);
    assert_eq!(mine["quiz_stats"]["average_score"], 100.0);
    assert_eq!(mine["recent_activities"].as_array().unwrap().len(), 1);
    assert_eq!(mine["daily_progress"].as_array().unwrap().len(), 30);

    let response = app
        .get(&manager, "/api/analytics/dashboard?time_range=soon")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lowering_points_below_a_manual_grade_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let quiz = app
        .create(
            &manager,
            &format!("/api/lessons/{}/quizzes", lesson),
            json!({ "title": "Essay", "question": "Why?", "quiz_type": "open", "points": 10 }),
        )
        .await;
    app.enroll(&learner, program).await;
    let submitted: Value = app
        .post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "text_response": "Because." }))
        .await
        .json()
        .await
        .unwrap();
    let grade_path = format!("/api/responses/{}/grade", submitted["id"]);
    let quiz_path = format!("/api/quizzes/{}", quiz);

    let response = app.put(&manager, &grade_path, json!({ "points_earned": 8 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.put(&manager, &quiz_path, json!({ "points": 5 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Racing a regrade against a points change: whichever lands second is
    // rejected, so the stored score never exceeds the maximum.
    let (graded, updated) = tokio::join!(
        app.put(&manager, &grade_path, json!({ "points_earned": 9 })),
        app.put(&manager, &quiz_path, json!({ "points": 8 }))
    );
    let statuses = [graded.status().as_u16(), updated.status().as_u16()];
    assert!(statuses.contains(&200));

    let (earned, max) = sqlx::query_as::<_, (Option<i32>, i32)>(
        "SELECT r.points_earned, q.points FROM quiz_responses r JOIN quizzes q ON q.id = r.quiz_id \
         WHERE r.quiz_id = $1",
    )
    .bind(quiz)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert!(earned.unwrap() <= max);
}

#[tokio::test]
async fn system_grader_must_be_an_existing_manager() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;

    assert_eq!(SystemGrader::resolve(&app.pool, None).await.unwrap(), SystemGrader(None));
    assert_eq!(
        SystemGrader::resolve(&app.pool, Some(manager.id)).await.unwrap(),
        SystemGrader(Some(manager.id))
    );
    assert!(SystemGrader::resolve(&app.pool, Some(learner.id)).await.is_err());
    assert!(SystemGrader::resolve(&app.pool, Some(-1)).await.is_err());
}

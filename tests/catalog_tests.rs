// tests/catalog_tests.rs

mod common;

use common::spawn_app;
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
async fn non_owner_cannot_touch_the_catalog() {
    let Some(app) = spawn_app().await else { return };
    let owner = app.manager().await;
    let other = app.manager().await;
    let (program, topic, lesson) = app.course(&owner).await;

    let response = app
        .post(&other, &format!("/api/programs/{}/topics", program), json!({ "title": "Sneaky" }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.put(&other, &format!("/api/topics/{}", topic), json!({ "title": "x" })).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.delete(&other, &format!("/api/lessons/{}", lesson)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let topics = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM topics WHERE program_id = $1")
        .bind(program)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(topics, 1);
}

#[tokio::test]
async fn missing_nodes_are_404() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;

    let response = app.get(&manager, "/api/programs/999999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post(&manager, "/api/topics/999999999/lessons", json!({ "title": "x", "content": "y" }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mcq_without_correct_choice_persists_nothing() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let (_, _, lesson) = app.course(&manager).await;

    let response = app
        .post(
            &manager,
            &format!("/api/lessons/{}/quizzes", lesson),
            json!({
                "title": "Broken",
                "question": "Which?",
                "quiz_type": "mcq",
                "choices": [
                    { "choice_text": "A", "is_correct": false },
                    { "choice_text": "B", "is_correct": false }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post(
            &manager,
            &format!("/api/lessons/{}/quizzes", lesson),
            json!({
                "title": "Blank",
                "question": "Which?",
                "quiz_type": "mcq",
                "choices": [
                    { "choice_text": "A", "is_correct": true },
                    { "choice_text": "   ", "is_correct": false }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let quizzes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quizzes WHERE lesson_id = $1")
        .bind(lesson)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(quizzes, 0);
}

#[tokio::test]
async fn lesson_content_is_sanitized() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let (_, topic, _) = app.course(&manager).await;

    let response = app
        .post(
            &manager,
            &format!("/api/topics/{}/lessons", topic),
            json!({
                "title": "Unsafe",
                "content": "<p>Read me</p><script>alert('x')</script>",
                "video_url": "https://videos.example.com/a.mp4"
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let lesson: Value = response.json().await.unwrap();
    assert_eq!(lesson["content"], "<p>Read me</p>");

    let response = app
        .post(
            &manager,
            &format!("/api/topics/{}/lessons", topic),
            json!({ "title": "Bad link", "content": "x", "video_url": "javascript:alert(1)" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn learners_see_quizzes_without_the_answer_key() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let (quiz, _, _) = app.mcq(&manager, lesson).await;

    let response = app.get(&learner, &format!("/api/quizzes/{}", quiz)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.enroll(&learner, program).await;
    let public: Value = app.get(&learner, &format!("/api/quizzes/{}", quiz)).await.json().await.unwrap();
    assert_eq!(public["choices"].as_array().unwrap().len(), 2);
    assert!(public["choices"][0].get("is_correct").is_none());

    let owned: Value = app.get(&manager, &format!("/api/quizzes/{}", quiz)).await.json().await.unwrap();
    assert!(owned["choices"][0].get("is_correct").is_some());
}

#[tokio::test]
async fn quiz_points_cannot_drop_below_an_awarded_score() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, _, lesson) = app.course(&manager).await;
    let (quiz, correct, _) = app.mcq(&manager, lesson).await;
    app.enroll(&learner, program).await;

    app.post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "selected_choice_id": correct }))
        .await;

    let response = app.put(&manager, &format!("/api/quizzes/{}", quiz), json!({ "points": 5 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put(
            &manager,
            &format!("/api/quizzes/{}", quiz),
            json!({ "choices": [{ "choice_text": "Four", "is_correct": true }] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.put(&manager, &format!("/api/quizzes/{}", quiz), json!({ "points": 20 })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["points"], 20);
}

#[tokio::test]
async fn lesson_navigation_follows_program_order() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let (program, topic, first) = app.course(&manager).await;
    let second = app
        .create(
            &manager,
            &format!("/api/topics/{}/lessons", topic),
            json!({ "title": "Second", "content": "<p>2</p>", "order": 2 }),
        )
        .await;

    let detail: Value = app.get(&manager, &format!("/api/lessons/{}", first)).await.json().await.unwrap();
    assert!(detail["previous_lesson"].is_null());
    assert_eq!(detail["next_lesson"]["id"], second);
    assert_eq!(detail["program_id"], program);

    let outline: Value = app.get(&manager, &format!("/api/programs/{}", program)).await.json().await.unwrap();
    assert_eq!(outline["is_owner"], true);
    assert_eq!(outline["topics"][0]["lessons"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_a_program_cascades() {
    let Some(app) = spawn_app().await else { return };
    let manager = app.manager().await;
    let learner = app.learner("Sales").await;
    let (program, topic, lesson) = app.course(&manager).await;
    let (quiz, correct, _) = app.mcq(&manager, lesson).await;
    app.enroll(&learner, program).await;
    app.post(&learner, &format!("/api/quizzes/{}/responses", quiz), json!({ "selected_choice_id": correct }))
        .await;
    app.post(&learner, &format!("/api/lessons/{}/complete", lesson), json!({})).await;

    let response = app.delete(&manager, &format!("/api/programs/{}", program)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let remaining = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM topics WHERE id = $1)
          + (SELECT COUNT(*) FROM lessons WHERE id = $2)
          + (SELECT COUNT(*) FROM quizzes WHERE id = $3)
          + (SELECT COUNT(*) FROM quiz_choices WHERE quiz_id = $3)
          + (SELECT COUNT(*) FROM quiz_responses WHERE quiz_id = $3)
          + (SELECT COUNT(*) FROM lesson_progress WHERE lesson_id = $2)
          + (SELECT COUNT(*) FROM enrollments WHERE program_id = $4)
        "#,
    )
    .bind(topic)
    .bind(lesson)
    .bind(quiz)
    .bind(program)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(remaining, 0);
}

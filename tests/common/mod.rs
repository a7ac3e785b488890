// tests/common/mod.rs

#![allow(dead_code)]

use coursehub::{
    config::Config,
    models::user::UserRole,
    routes,
    state::{AppState, SystemGrader},
    utils::password::hash_password,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: Client,
}

/// A logged-in account.
pub struct TestUser {
    pub id: i64,
    pub token: String,
}

/// Spawns the app on a random port against `DATABASE_URL`.
///
/// Returns `None` (and the calling test passes trivially) when no database is configured.
pub async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping integration test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        admin_username: None,
        admin_password: None,
        system_grader_id: None,
    };

    let app = routes::create_router(AppState::new(pool.clone(), config, SystemGrader(None)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: Client::new(),
    })
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
            .json()
            .await
            .unwrap();
        body["token"].as_str().expect("login returned no token").to_string()
    }

    /// Registers a learner through the public endpoint and logs in.
    pub async fn learner(&self, department: &str) -> TestUser {
        let username = unique_name("learner");
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": username,
                "password": "password123",
                "department": department
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let user: Value = response.json().await.unwrap();

        TestUser {
            id: user["id"].as_i64().unwrap(),
            token: self.login(&username, "password123").await,
        }
    }

    /// Inserts a manager directly (managers cannot self-register) and logs in.
    pub async fn manager(&self) -> TestUser {
        let username = unique_name("manager");
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&username)
        .bind(hash_password("password123").unwrap())
        .bind(UserRole::Manager)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        TestUser {
            id,
            token: self.login(&username, "password123").await,
        }
    }

    pub async fn post(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, user: &TestUser, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// POSTs and returns the `id` of the created row, asserting 201.
    pub async fn create(&self, user: &TestUser, path: &str, body: Value) -> i64 {
        let response = self.post(user, path, body).await;
        assert_eq!(response.status(), StatusCode::CREATED, "POST {} failed", path);
        let created: Value = response.json().await.unwrap();
        created["id"].as_i64().unwrap()
    }

    /// Program → topic → lesson owned by `manager`. Returns (program, topic, lesson).
    pub async fn course(&self, manager: &TestUser) -> (i64, i64, i64) {
        let program = self
            .create(
                manager,
                "/api/programs",
                json!({ "title": unique_name("program"), "description": "Onboarding" }),
            )
            .await;
        let topic = self
            .create(
                manager,
                &format!("/api/programs/{}/topics", program),
                json!({ "title": "Basics", "order": 1 }),
            )
            .await;
        let lesson = self
            .create(
                manager,
                &format!("/api/topics/{}/lessons", topic),
                json!({ "title": "Welcome", "content": "<p>Hello</p>", "order": 1 }),
            )
            .await;
        (program, topic, lesson)
    }

    /// An MCQ worth 10 points with one correct choice. Returns (quiz, correct, wrong).
    pub async fn mcq(&self, manager: &TestUser, lesson: i64) -> (i64, i64, i64) {
        let response = self
            .post(
                manager,
                &format!("/api/lessons/{}/quizzes", lesson),
                json!({
                    "title": "Check",
                    "question": "2 + 2?",
                    "quiz_type": "mcq",
                    "points": 10,
                    "choices": [
                        { "choice_text": "4", "is_correct": true },
                        { "choice_text": "5" }
                    ]
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let quiz: Value = response.json().await.unwrap();
        let choices = quiz["choices"].as_array().unwrap();
        let correct = choices.iter().find(|c| c["is_correct"] == true).unwrap()["id"]
            .as_i64()
            .unwrap();
        let wrong = choices.iter().find(|c| c["is_correct"] == false).unwrap()["id"]
            .as_i64()
            .unwrap();
        (quiz["id"].as_i64().unwrap(), correct, wrong)
    }

    pub async fn enroll(&self, learner: &TestUser, program: i64) {
        let response = self
            .post(learner, &format!("/api/programs/{}/enroll", program), json!({}))
            .await;
        assert!(response.status().is_success());
    }
}

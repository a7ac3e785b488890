// src/handlers/mod.rs

pub mod analytics;
pub mod auth;
pub mod enrollment;
pub mod lessons;
pub mod programs;
pub mod progress;
pub mod quizzes;
pub mod responses;
pub mod topics;
pub mod users;

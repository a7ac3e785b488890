// src/models/mod.rs

pub mod analytics;
pub mod enrollment;
pub mod lesson;
pub mod program;
pub mod progress;
pub mod quiz;
pub mod response;
pub mod topic;
pub mod user;

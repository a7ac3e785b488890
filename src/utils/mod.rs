// src/utils/mod.rs

pub mod content;
pub mod jwt;
pub mod ownership;
pub mod password;

// src/lib.rs

//! Hivemind: academic-directory scraper and scholar recommender.

pub mod browser;
pub mod embedding;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

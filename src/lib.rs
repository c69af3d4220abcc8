// src/lib.rs

//! feedpipe: marketplace listing sync with currency normalization.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod services;
pub mod storage;
pub mod utils;

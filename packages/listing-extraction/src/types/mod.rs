//! Data model for the extraction pipeline.

pub mod attempt;
pub mod board;
pub mod cache;
pub mod config;
pub mod event;
pub mod job;
pub mod listing;
pub mod outcome;

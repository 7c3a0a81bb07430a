//! Collaborator seams.
//!
//! These traits define what the surrounding application provides:
//! storage, HTML fetching, LLM providers, notifications and feature flags.

pub mod flags;
pub mod html;
pub mod llm;
pub mod notify;
pub mod store;

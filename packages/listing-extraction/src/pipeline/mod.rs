//! Extraction pipeline.
//!
//! ```text
//! detect_board → fetch_html → api_extraction → selector_extraction
//!     → limited_source → generic_html_extraction → ai_extraction
//! ```
//!
//! Each extraction step may stop the run with an accepted result; a
//! rejected result still writes its title/company/description onto the
//! listing before the next step runs.

mod context;
mod orchestrator;
mod steps;

pub use context::RunContext;
pub use orchestrator::{Orchestrator, RunReport, StepRecord};
pub use steps::{detect_auth_wall, PipelineStep};

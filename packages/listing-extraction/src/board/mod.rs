//! URL normalization and job-board detection.

mod detect;
mod normalize;

pub use detect::{detect_board, normalize_url};
pub use normalize::{is_tracking_param, normalize_generic, parse_url, query_value};

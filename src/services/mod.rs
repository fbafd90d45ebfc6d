//! Services kept apart from the pipeline stages
//!
//! - File I/O for images and uploads
//! - Output naming and badge source selection

pub mod io;
pub mod output;

pub use io::{ImageIOService, ALLOWED_UPLOAD_EXTENSIONS};
pub use output::{
    badge_file_name, select_badge_source, timestamp_ms, validate_candidate_name, BadgeVariant,
    OutputKind, BADGE_SOURCE_PRIORITY,
};

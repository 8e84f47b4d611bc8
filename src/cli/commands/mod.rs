//! CLI command implementations.

mod chunk;
mod config;
mod dispatch;
mod merge;
mod plan;
mod segment;
mod status;

pub use chunk::run_chunk;
pub use config::run_config;
pub use dispatch::run_dispatch;
pub use merge::run_merge;
pub use plan::run_plan;
pub use segment::run_segment;
pub use status::run_status;

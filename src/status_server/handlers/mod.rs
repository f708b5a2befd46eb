//! Status server HTTP handlers.

mod metrics;
mod status;

pub use metrics::metrics_handler;
pub use status::{root_handler, status_handler};

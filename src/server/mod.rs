pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::{RequestHandler, HEALTH_CHECK_PATH, REQUEST_ID_HEADER, SCHEDULER_RUN_PATH};

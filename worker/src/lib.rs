pub mod config;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod loader;
pub mod output;
pub mod runtime;
pub mod validation;

pub use config::WorkerConfig;
pub use handler::JobHandler;
pub use lifecycle::{BackendLifecycle, BackendLoader, Phase};
pub use output::JobResponse;

pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod schema;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};
pub use trace::TraceEvent;

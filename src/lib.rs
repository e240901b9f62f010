pub mod catalog;
pub mod config;
pub mod error;
pub mod generation;
pub mod generator;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod page;
pub mod prompt;
pub mod server;
pub mod session;
pub mod throttle;
pub mod validation;

pub use config::Config;
pub use error::{ApiError, GenerationError};
pub use generator::{Action, Generator, Outcome, Render};
pub use server::create_app;

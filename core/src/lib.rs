pub mod analysis;
pub mod api;
pub mod cli;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod sampling;
pub mod signal;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{ContrastAnalyzer, ResolutionAnalyzer, UniformityAnalyzer};
pub use api::PhantomAnalyzer;
pub use cli::report::TextReport;
pub use error::{CatphanError, Result};
pub use types::*;

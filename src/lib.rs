// Housing Stats - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod regression;
pub mod transform;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use chart::{
    render_area_chart, standardized_long_frame, zscore, ChartCanvas, ChartConfig, LongRecord,
};
pub use config::Config;
pub use dataset::{format_float, Dataset, Observation};
pub use error::{AnalysisError, AnalysisResult};
pub use regression::{
    elasticity_summary, fit_area, fit_elasticity, fit_ols, Coefficient, ModelFrame, OlsFit,
};
pub use transform::{log1p_column, Column};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

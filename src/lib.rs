#![deny(unsafe_code)]

pub mod analyzer;
pub mod catalog;
pub mod config;
pub mod datastore;
pub mod error;
pub mod import;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod report;
pub mod scraper;

pub use analyzer::AdmissionAnalyzer;
pub use config::Config;
pub use models::{CollegeRecord, ExamType, PredictionInput, PredictionResult, PredictionTiers};

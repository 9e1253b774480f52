use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::ExamType;

pub const DATASTORE_KEY_ENV: &str = "COLLEGE_PREDICTOR_DATASTORE_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Hosted datastore
    pub datastore_url: Option<String>,
    pub datastore_key: Option<String>,
    pub scrape_endpoint: Option<String>,
    // Prediction
    pub default_exam: ExamType,
    pub colleges_file: Option<PathBuf>,
    // Offline reference tables for imports
    pub reference_colleges_file: Option<PathBuf>,
    pub reference_branches_file: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datastore_url: None,
            datastore_key: None,
            scrape_endpoint: None,
            default_exam: ExamType::JeeMain,
            colleges_file: None,
            reference_colleges_file: None,
            reference_branches_file: None,
            output_directory: Some(PathBuf::from("output")),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    /// Load the file, or write a default one and return `None` so the caller
    /// can stop and let the user fill it in.
    pub fn load_or_init(file_path: &str) -> anyhow::Result<Option<Self>> {
        if Path::new(file_path).exists() {
            let config = Self::load_from_file(file_path)
                .with_context(|| format!("Failed to load configuration from {file_path}"))?;
            return Ok(Some(config));
        }
        Self::default()
            .save_to_file(file_path)
            .with_context(|| format!("Failed to write default configuration to {file_path}"))?;
        Ok(None)
    }

    /// Let the environment supply credentials so they stay out of the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::var(DATASTORE_KEY_ENV).ok());
    }

    fn apply_overrides(&mut self, datastore_key: Option<String>) {
        if let Some(key) = datastore_key.filter(|k| !k.trim().is_empty()) {
            self.datastore_key = Some(key);
        }
    }

    pub fn output_directory(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("output"))
    }

    pub fn has_datastore(&self) -> bool {
        self.datastore_url.as_deref().is_some_and(|u| !u.is_empty())
            && self.datastore_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

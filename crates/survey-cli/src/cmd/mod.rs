pub mod check;
pub mod reset;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use survey_flow::SurveyDocument;

/// Where progress is kept when `--state-dir` is not given.
pub fn default_state_dir() -> PathBuf {
    ProjectDirs::from("dev", "survey", "survey")
        .map(|dirs| dirs.data_dir().join("state"))
        .unwrap_or_else(|| PathBuf::from(".survey-state"))
}

pub fn state_dir(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(default_state_dir)
}

pub fn load_document(path: &Path) -> Result<SurveyDocument> {
    SurveyDocument::load(path)
        .with_context(|| format!("failed to load survey document {}", path.display()))
}

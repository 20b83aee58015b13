use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::page::{PageDescriptor, key_for};
use crate::error::{FlowError, Result};
use crate::shell::Direction;

/// Engine-facing options carried by a survey document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentOptions {
    pub show_progress: bool,
    pub storage_key: Option<String>,
    pub resume_from_storage: bool,
    pub storage_version: String,
    pub default_error_message: Option<String>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            show_progress: true,
            storage_key: None,
            resume_from_storage: true,
            storage_version: "v1".to_string(),
            default_error_message: None,
        }
    }
}

/// A survey definition as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub options: DocumentOptions,
    /// Page ids to move to the front, in this order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    pub pages: Vec<PageDescriptor>,
}

impl SurveyDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| FlowError::Read {
            path: path.display().to_string(),
            source: err,
        })?;
        Self::from_json(&raw)
    }

    /// Parses, orders and checks a document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut document: SurveyDocument = serde_json::from_str(raw)?;
        document.prepare()?;
        Ok(document)
    }

    fn prepare(&mut self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(FlowError::EmptyFlow);
        }
        if let Some(order) = &self.order {
            self.pages = apply_order(std::mem::take(&mut self.pages), order);
        }
        let mut seen = BTreeSet::new();
        for page in &mut self.pages {
            if let Some(id) = &page.id
                && !seen.insert(id.clone())
            {
                return Err(FlowError::DuplicatePageId(id.clone()));
            }
            page.fill_signature();
        }
        Ok(())
    }

    /// Resolved page keys in flow order.
    pub fn page_keys(&self) -> Vec<String> {
        self.pages
            .iter()
            .enumerate()
            .map(|(index, page)| key_for(page, index))
            .collect()
    }

    /// Storage key used for progress: the configured one or the document id.
    pub fn storage_key(&self) -> String {
        self.options
            .storage_key
            .clone()
            .unwrap_or_else(|| format!("survey:{}", self.id))
    }
}

/// Moves pages named in `order` to the front in that order; the rest keep
/// their relative position. Unknown ids are ignored.
pub fn apply_order(pages: Vec<PageDescriptor>, order: &[String]) -> Vec<PageDescriptor> {
    let mut remaining: Vec<Option<PageDescriptor>> = pages.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(remaining.len());
    for id in order {
        let found = remaining
            .iter()
            .position(|page| page.as_ref().and_then(|p| p.id.as_deref()) == Some(id.as_str()));
        if let Some(position) = found
            && let Some(page) = remaining[position].take()
        {
            ordered.push(page);
        }
    }
    ordered.extend(remaining.into_iter().flatten());
    ordered
}

//! Page units and the registry that builds them from descriptors.
//!
//! Every step type plugs into the engine through [`PageUnit`]. A
//! [`PageFactory`] registered under a page `type` turns a descriptor plus its
//! [`PageContext`] into a live unit each time the page is mounted.

mod capture;
mod questions;
mod text;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::answers::PageValidation;
use crate::engine::FlowControls;
use crate::error::{FlowError, Result};
use crate::shell::MountPoint;
use crate::spec::PageDescriptor;
use crate::variants::VariantRegistry;

pub use capture::{CaptureFactory, CapturePage, CaptureProps};
pub use questions::{QuestionsFactory, QuestionsPage, QuestionsProps};
pub use text::{TextFactory, TextPage, TextProps};

/// Everything a page receives when it is mounted.
#[derive(Clone)]
pub struct PageContext {
    pub mount: MountPoint,
    pub descriptor: PageDescriptor,
    pub key: String,
    pub index: usize,
    pub controls: FlowControls,
    /// Data from this page's last successful validation, if any.
    pub saved_data: Option<Value>,
}

/// A mounted step.
///
/// Lifecycle per mount: `on_enter`, `render`, any number of `validate`
/// calls, then `on_leave` and `destroy` when the flow moves away.
#[async_trait]
pub trait PageUnit: Send + Sync {
    fn on_enter(&mut self, _saved: Option<&Value>) {}

    fn render(&mut self) -> Result<()>;

    /// Default: valid, carrying whatever [`PageUnit::saved_data`] returns.
    async fn validate(&mut self) -> PageValidation {
        PageValidation::Valid {
            data: self.saved_data(),
        }
    }

    /// Last data this page was given or produced.
    fn saved_data(&self) -> Option<Value> {
        None
    }

    fn on_leave(&mut self) {}

    /// Clears the mount point and releases listeners.
    fn destroy(&mut self);
}

pub trait PageFactory: Send + Sync {
    fn create(&self, ctx: PageContext) -> Result<Box<dyn PageUnit>>;

    /// Checks a descriptor's props once, when the engine is built.
    fn check(&self, _descriptor: &PageDescriptor, _key: &str) -> Result<()> {
        Ok(())
    }
}

impl<F> PageFactory for F
where
    F: Fn(PageContext) -> Result<Box<dyn PageUnit>> + Send + Sync,
{
    fn create(&self, ctx: PageContext) -> Result<Box<dyn PageUnit>> {
        self(ctx)
    }
}

/// Page factories keyed by page `type`.
#[derive(Clone, Default)]
pub struct PageRegistry {
    factories: BTreeMap<String, Arc<dyn PageFactory>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `text`, `textarea` and `questions` pages.
    pub fn with_builtins(variants: Arc<VariantRegistry>) -> Self {
        let mut registry = Self::new();
        registry.register("text", TextFactory);
        registry.register("textarea", CaptureFactory);
        registry.register("questions", QuestionsFactory::new(variants));
        registry
    }

    pub fn register(
        &mut self,
        page_type: impl Into<String>,
        factory: impl PageFactory + 'static,
    ) -> Option<Arc<dyn PageFactory>> {
        self.factories.insert(page_type.into(), Arc::new(factory))
    }

    pub fn contains(&self, page_type: &str) -> bool {
        self.factories.contains_key(page_type)
    }

    pub fn get(&self, page_type: &str) -> Option<Arc<dyn PageFactory>> {
        self.factories.get(page_type).cloned()
    }

    pub fn page_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

/// Decodes a descriptor's props; `null` props decode to the default.
pub fn parse_props<T>(descriptor: &PageDescriptor, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if descriptor.props.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(descriptor.props.clone()).map_err(|err| FlowError::InvalidProps {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

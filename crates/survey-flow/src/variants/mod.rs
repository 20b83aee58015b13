//! Question variants: named strategies that build, validate and coerce the
//! interactive control behind one question.
//!
//! The registry is an explicit object. Build it once (usually with
//! [`VariantRegistry::with_builtins`]), register extra variants, then share
//! it through an `Arc` with the pages that need it. Unknown variant names
//! resolve to the wildcard entry, which renders an inert placeholder that is
//! always valid, so a page never fails on a variant it does not know.

mod builtin;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::spec::QuestionSpec;

pub use builtin::{
    BooleanVariant, InertField, NumberVariant, SelectVariant, TextVariant, UnsupportedVariant,
    ValueField,
};

/// Name of the fallback entry.
pub const WILDCARD: &str = "*";

/// Live control handle for one question.
pub trait Field: Send + Sync {
    fn value(&self) -> Option<Value>;

    /// Replaces the value and notifies the change listener.
    fn set_value(&self, value: Option<Value>);

    fn focus(&self);

    fn is_focused(&self) -> bool {
        false
    }

    /// Releases the change listener. The field keeps its last value.
    fn destroy(&self);
}

pub type FieldHandle = Arc<dyn Field>;

/// Called with the question id and the new value whenever a field changes.
pub type ChangeListener = Arc<dyn Fn(&str, Option<&Value>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct FieldInit {
    pub initial_value: Option<Value>,
    pub on_change: Option<ChangeListener>,
}

/// Outcome of a variant's own validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVerdict {
    pub valid: bool,
    pub message: Option<String>,
    /// Normalized value to record instead of the raw one.
    pub value: Option<Value>,
}

impl FieldVerdict {
    pub fn accept() -> Self {
        Self {
            valid: true,
            message: None,
            value: None,
        }
    }

    pub fn accept_value(value: Value) -> Self {
        Self {
            valid: true,
            message: None,
            value: Some(value),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            value: None,
        }
    }
}

/// Strategy bundle for one variant name.
pub trait Variant: Send + Sync {
    fn create(&self, question: &QuestionSpec, init: FieldInit) -> FieldHandle {
        Arc::new(ValueField::new(&question.id, init))
    }

    /// Default: always valid.
    fn validate(&self, _question: &QuestionSpec, _value: Option<&Value>) -> FieldVerdict {
        FieldVerdict::accept()
    }

    /// Adapts a previously saved answer to what the live control expects.
    /// `None` drops the saved answer.
    fn coerce(&self, _question: &QuestionSpec, raw: &Value) -> Option<Value> {
        Some(raw.clone())
    }

    /// Rejects question configuration this variant cannot work with.
    fn check(&self, _question: &QuestionSpec) -> Result<(), String> {
        Ok(())
    }
}

/// Variant registry keyed by name, with a wildcard fallback.
#[derive(Clone)]
pub struct VariantRegistry {
    variants: BTreeMap<String, Arc<dyn Variant>>,
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantRegistry {
    /// Registry holding only the wildcard fallback.
    pub fn new() -> Self {
        let mut variants: BTreeMap<String, Arc<dyn Variant>> = BTreeMap::new();
        variants.insert(WILDCARD.to_string(), Arc::new(UnsupportedVariant));
        Self { variants }
    }

    /// Registry with the built-in `text`, `textarea`, `number`, `select` and
    /// `boolean` variants.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("text", TextVariant::single_line());
        registry.register("textarea", TextVariant::multi_line());
        registry.register("number", NumberVariant);
        registry.register("select", SelectVariant);
        registry.register("boolean", BooleanVariant);
        registry
    }

    /// Registers `variant` under `name`, returning the entry it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        variant: impl Variant + 'static,
    ) -> Option<Arc<dyn Variant>> {
        self.variants.insert(name.into(), Arc::new(variant))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    /// Resolves `name`, falling back to the wildcard entry. The flag tells
    /// whether the fallback was used.
    pub fn resolve(&self, name: &str) -> (Arc<dyn Variant>, bool) {
        if let Some(variant) = self.variants.get(name)
            && name != WILDCARD
        {
            return (variant.clone(), false);
        }
        let fallback = self
            .variants
            .get(WILDCARD)
            .cloned()
            .unwrap_or_else(|| Arc::new(UnsupportedVariant));
        (fallback, true)
    }

    pub fn names(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }
}

/// True for missing, null, blank strings and empty lists.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Shouting;

    impl Variant for Shouting {
        fn validate(&self, _question: &QuestionSpec, value: Option<&Value>) -> FieldVerdict {
            match value.and_then(Value::as_str) {
                Some(text) if text == text.to_uppercase() => FieldVerdict::accept(),
                _ => FieldVerdict::reject("say it louder"),
            }
        }
    }

    #[test]
    fn unknown_names_fall_back_to_unsupported() {
        let registry = VariantRegistry::with_builtins();
        let (_, fallback) = registry.resolve("rating");
        assert!(fallback);
        let (_, fallback) = registry.resolve("text");
        assert!(!fallback);
    }

    #[test]
    fn custom_variants_register_without_touching_builtins() {
        let mut registry = VariantRegistry::with_builtins();
        assert!(registry.register("shout", Shouting).is_none());
        let question = QuestionSpec::new("q", "shout");
        let (variant, fallback) = registry.resolve("shout");
        assert!(!fallback);
        assert!(!variant.validate(&question, Some(&json!("quiet"))).valid);
        assert!(variant.validate(&question, Some(&json!("LOUD"))).valid);
        assert!(registry.contains("number"));
    }

    #[test]
    fn emptiness_rules() {
        assert!(is_empty_value(None));
        assert!(is_empty_value(Some(&json!(null))));
        assert!(is_empty_value(Some(&json!("   "))));
        assert!(is_empty_value(Some(&json!([]))));
        assert!(!is_empty_value(Some(&json!(0))));
        assert!(!is_empty_value(Some(&json!(false))));
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Static specification of one survey step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    #[serde(rename = "type")]
    pub page_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub props: Value,
    /// Declared for shells; the engine does not enforce it.
    #[serde(default)]
    pub skippable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Templated-parameter metadata carried into the completion payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl PageDescriptor {
    pub fn new(page_type: impl Into<String>) -> Self {
        Self {
            page_type: page_type.into(),
            id: None,
            props: Value::Null,
            skippable: false,
            param_key: None,
            parameters: None,
            signature: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    pub fn with_parameters(mut self, param_key: impl Into<String>, parameters: Value) -> Self {
        self.param_key = Some(param_key.into());
        self.parameters = Some(parameters);
        self.signature = None;
        self.fill_signature();
        self
    }

    /// Fills `signature` from `param_key` and `parameters` when it is absent.
    pub fn fill_signature(&mut self) {
        if self.signature.is_some() {
            return;
        }
        if let Some(key) = &self.param_key {
            self.signature = Some(signature_for(key, self.parameters.as_ref()));
        }
    }

    /// Metadata for the completion payload, if the page carries any.
    pub fn parameter_meta(&self) -> Option<ParameterMeta> {
        if self.param_key.is_none() && self.parameters.is_none() && self.signature.is_none() {
            return None;
        }
        Some(ParameterMeta {
            param_key: self.param_key.clone(),
            parameters: self.parameters.clone(),
            signature: self.signature.clone(),
        })
    }
}

/// Resolved key of a page: its id, or `{type}-{index}` when it has none.
pub fn key_for(descriptor: &PageDescriptor, index: usize) -> String {
    match &descriptor.id {
        Some(id) => id.clone(),
        None => format!("{}-{}", descriptor.page_type, index),
    }
}

/// `serde_json` maps are sorted, so the rendered parameters are canonical.
pub fn signature_for(param_key: &str, parameters: Option<&Value>) -> String {
    match parameters {
        Some(params) => format!("{param_key}:{params}"),
        None => param_key.to_string(),
    }
}

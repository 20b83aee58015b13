use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{PageContext, PageFactory, PageUnit, parse_props};
use crate::answers::PageValidation;
use crate::error::{FlowError, Result};
use crate::shell::{InputNode, Node};
use crate::spec::PageDescriptor;
use crate::variants::{FieldHandle, FieldInit, ValueField, is_empty_value};

pub const INPUT_ID: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureProps {
    pub prompt: String,
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub placeholder: Option<String>,
}

impl CaptureProps {
    fn check(&self, key: &str) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length)
            && min > max
        {
            return Err(FlowError::InvalidProps {
                key: key.to_string(),
                reason: format!("minLength {min} exceeds maxLength {max}"),
            });
        }
        Ok(())
    }
}

/// Free-text capture. Records `{ "text": ... }`.
///
/// While a required capture is empty, forward navigation stays disabled.
pub struct CapturePage {
    ctx: PageContext,
    props: CaptureProps,
    field: Option<FieldHandle>,
    saved: Option<Value>,
}

impl CapturePage {
    pub fn new(ctx: PageContext) -> Result<Self> {
        let props: CaptureProps = parse_props(&ctx.descriptor, &ctx.key)?;
        props.check(&ctx.key)?;
        Ok(Self {
            ctx,
            props,
            field: None,
            saved: None,
        })
    }

    fn current_text(&self) -> String {
        let value = self.field.as_ref().and_then(|field| field.value());
        match value {
            Some(Value::String(text)) => text.trim_end().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[async_trait]
impl PageUnit for CapturePage {
    fn on_enter(&mut self, saved: Option<&Value>) {
        self.saved = saved.cloned();
    }

    fn render(&mut self) -> Result<()> {
        let initial = self
            .saved
            .as_ref()
            .and_then(|saved| saved.get(INPUT_ID))
            .cloned();
        let gate = self.props.required;
        let controls = self.ctx.controls.clone();
        let field: FieldHandle = Arc::new(ValueField::new(
            INPUT_ID,
            FieldInit {
                initial_value: initial,
                on_change: Some(Arc::new(move |_: &str, value: Option<&Value>| {
                    if gate {
                        controls.set_next_enabled(!is_empty_value(value));
                    }
                })),
            },
        ));

        if !self.props.prompt.is_empty() {
            self.ctx.mount.push(Node::Heading(self.props.prompt.clone()));
        }
        self.ctx.mount.push(Node::Input(InputNode {
            id: INPUT_ID.to_string(),
            label: self.props.prompt.clone(),
            hint: self.props.placeholder.clone(),
            variant: "textarea".to_string(),
            required: self.props.required,
            choices: Vec::new(),
            error: None,
            field: field.clone(),
        }));
        if gate && is_empty_value(field.value().as_ref()) {
            self.ctx.controls.set_next_enabled(false);
        }
        self.field = Some(field);
        Ok(())
    }

    async fn validate(&mut self) -> PageValidation {
        let text = self.current_text();
        let len = text.trim().chars().count();
        if self.props.required && len == 0 {
            return PageValidation::invalid("Please enter a response.");
        }
        if len > 0 {
            if let Some(min) = self.props.min_length
                && len < min
            {
                return PageValidation::invalid(format!(
                    "Please enter at least {min} characters."
                ));
            }
            if let Some(max) = self.props.max_length
                && len > max
            {
                return PageValidation::invalid(format!(
                    "Please keep your response under {max} characters."
                ));
            }
        }
        let data = json!({ INPUT_ID: text });
        self.saved = Some(data.clone());
        PageValidation::valid_with(data)
    }

    fn saved_data(&self) -> Option<Value> {
        self.saved.clone()
    }

    fn destroy(&mut self) {
        if let Some(field) = self.field.take() {
            field.destroy();
        }
        self.ctx.mount.clear();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureFactory;

impl PageFactory for CaptureFactory {
    fn create(&self, ctx: PageContext) -> Result<Box<dyn PageUnit>> {
        Ok(Box::new(CapturePage::new(ctx)?))
    }

    fn check(&self, descriptor: &PageDescriptor, key: &str) -> Result<()> {
        parse_props::<CaptureProps>(descriptor, key)?.check(key)
    }
}

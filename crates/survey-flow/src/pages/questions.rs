use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{PageContext, PageFactory, PageUnit, parse_props};
use crate::answers::PageValidation;
use crate::error::{FlowError, Result};
use crate::shell::{InputNode, Node};
use crate::spec::{PageDescriptor, QuestionSpec};
use crate::validate::{QuestionInstance, validate_questions};
use crate::variants::{FieldInit, VariantRegistry};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionsProps {
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Vec<QuestionSpec>,
    /// Nests the submission under this key.
    pub summary_key: Option<String>,
}

impl QuestionsProps {
    fn check(&self, key: &str, variants: &VariantRegistry) -> Result<()> {
        let mut seen = BTreeSet::new();
        for question in &self.questions {
            if question.id.trim().is_empty() {
                return Err(FlowError::InvalidProps {
                    key: key.to_string(),
                    reason: "question without id".into(),
                });
            }
            if !seen.insert(question.id.as_str()) {
                return Err(FlowError::InvalidProps {
                    key: key.to_string(),
                    reason: format!("duplicate question id '{}'", question.id),
                });
            }
            let (variant, _) = variants.resolve(&question.variant);
            variant
                .check(question)
                .map_err(|reason| FlowError::InvalidProps {
                    key: key.to_string(),
                    reason: format!("question '{}': {reason}", question.id),
                })?;
        }
        Ok(())
    }
}

/// Several questions on one page, each rendered through its variant.
///
/// Records `{ "answers": {...}, "submission": {...} }`.
pub struct QuestionsPage {
    ctx: PageContext,
    props: QuestionsProps,
    variants: Arc<VariantRegistry>,
    instances: Vec<QuestionInstance>,
    saved: Option<Value>,
}

impl QuestionsPage {
    pub fn new(ctx: PageContext, variants: Arc<VariantRegistry>) -> Result<Self> {
        let props: QuestionsProps = parse_props(&ctx.descriptor, &ctx.key)?;
        props.check(&ctx.key, &variants)?;
        Ok(Self {
            ctx,
            props,
            variants,
            instances: Vec::new(),
            saved: None,
        })
    }

    pub fn instances(&self) -> &[QuestionInstance] {
        &self.instances
    }

    fn saved_answer(&self, question_id: &str) -> Option<&Value> {
        self.saved
            .as_ref()?
            .get("answers")?
            .get(question_id)?
            .get("value")
    }
}

#[async_trait]
impl PageUnit for QuestionsPage {
    fn on_enter(&mut self, saved: Option<&Value>) {
        self.saved = saved.cloned();
    }

    fn render(&mut self) -> Result<()> {
        let mount = self.ctx.mount.clone();
        if let Some(title) = &self.props.title {
            mount.push(Node::Heading(title.clone()));
        }
        if let Some(description) = &self.props.description {
            mount.push(Node::Paragraph(description.clone()));
        }

        let mut instances = Vec::with_capacity(self.props.questions.len());
        for question in &self.props.questions {
            let (variant, unsupported) = self.variants.resolve(&question.variant);
            let initial_value = match self.saved_answer(&question.id) {
                Some(raw) => variant.coerce(question, raw),
                None => question.default_value.clone(),
            };
            let errors = mount.clone();
            let field = variant.create(
                question,
                FieldInit {
                    initial_value,
                    on_change: Some(Arc::new(move |id: &str, _: Option<&Value>| {
                        errors.set_input_error(id, None);
                    })),
                },
            );

            if unsupported {
                tracing::debug!(
                    question = %question.id,
                    variant = %question.variant,
                    "unsupported question variant"
                );
                mount.push(Node::Notice(format!(
                    "Question '{}' uses an unsupported type '{}'",
                    question.id, question.variant
                )));
            } else {
                let label = if question.title.is_empty() {
                    question.id.clone()
                } else {
                    question.title.clone()
                };
                mount.push(Node::Input(InputNode {
                    id: question.id.clone(),
                    label,
                    hint: question
                        .description
                        .clone()
                        .or_else(|| question.placeholder.clone()),
                    variant: question.variant.clone(),
                    required: question.required,
                    choices: question.choices.clone().unwrap_or_default(),
                    error: None,
                    field: field.clone(),
                }));
            }

            instances.push(QuestionInstance {
                spec: question.clone(),
                variant,
                field,
                unsupported,
            });
        }
        self.instances = instances;
        Ok(())
    }

    async fn validate(&mut self) -> PageValidation {
        let report = validate_questions(&self.instances);
        let mount = &self.ctx.mount;
        for instance in &self.instances {
            mount.set_input_error(&instance.spec.id, None);
        }
        for error in &report.errors {
            mount.set_input_error(&error.question_id, Some(error.message.clone()));
        }

        if let Some(position) = report.first_invalid {
            if let Some(instance) = self.instances.get(position) {
                instance.field.focus();
            }
            return PageValidation::Invalid {
                message: report.page_message(),
            };
        }

        let submission = match &self.props.summary_key {
            Some(summary_key) => {
                let mut nested = Map::new();
                nested.insert(summary_key.clone(), report.submission);
                Value::Object(nested)
            }
            None => report.submission,
        };
        let data = json!({
            "answers": report.answers,
            "submission": submission,
        });
        self.saved = Some(data.clone());
        PageValidation::valid_with(data)
    }

    fn saved_data(&self) -> Option<Value> {
        self.saved.clone()
    }

    fn destroy(&mut self) {
        for instance in self.instances.drain(..) {
            instance.field.destroy();
        }
        self.ctx.mount.clear();
    }
}

/// Builds [`QuestionsPage`]s against a shared variant registry.
#[derive(Clone)]
pub struct QuestionsFactory {
    variants: Arc<VariantRegistry>,
}

impl QuestionsFactory {
    pub fn new(variants: Arc<VariantRegistry>) -> Self {
        Self { variants }
    }
}

impl PageFactory for QuestionsFactory {
    fn create(&self, ctx: PageContext) -> Result<Box<dyn PageUnit>> {
        Ok(Box::new(QuestionsPage::new(ctx, self.variants.clone())?))
    }

    fn check(&self, descriptor: &PageDescriptor, key: &str) -> Result<()> {
        parse_props::<QuestionsProps>(descriptor, key)?.check(key, &self.variants)
    }
}

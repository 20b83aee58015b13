use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::spec::QuestionSpec;
use crate::store::merge_path;
use crate::variants::{FieldHandle, Variant, is_empty_value};

pub const REQUIRED_MESSAGE: &str = "This question is required.";
pub const INVALID_MESSAGE: &str = "This answer is not valid.";
pub const REVIEW_MESSAGE: &str = "Please review the highlighted questions.";

/// A question bound to its variant and live field.
#[derive(Clone)]
pub struct QuestionInstance {
    pub spec: QuestionSpec,
    pub variant: Arc<dyn Variant>,
    pub field: FieldHandle,
    /// Rendered through the wildcard fallback.
    pub unsupported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionError {
    pub question_id: String,
    pub message: String,
    /// The message came from the question or its variant rather than the
    /// generic required text.
    pub explicit: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionsReport {
    pub errors: Vec<QuestionError>,
    /// Position of the first offending question.
    pub first_invalid: Option<usize>,
    pub answers: Map<String, Value>,
    pub submission: Value,
    /// Output paths that were written more than once.
    pub collisions: Vec<String>,
}

impl QuestionsReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Page-level message: the first explicit field message, or a generic
    /// request to review the page.
    pub fn page_message(&self) -> Option<String> {
        let first = self.errors.first()?;
        if first.explicit {
            Some(first.message.clone())
        } else {
            Some(REVIEW_MESSAGE.to_string())
        }
    }
}

/// Checks every question in order and collects answers.
///
/// All questions are evaluated even after a failure so every problem is
/// reported at once.
pub fn validate_questions(questions: &[QuestionInstance]) -> QuestionsReport {
    let mut report = QuestionsReport {
        submission: Value::Object(Map::new()),
        ..QuestionsReport::default()
    };

    for (position, question) in questions.iter().enumerate() {
        if question.unsupported {
            continue;
        }
        let spec = &question.spec;
        let raw = question.field.value();

        if spec.required && is_empty_value(raw.as_ref()) {
            report.errors.push(QuestionError {
                question_id: spec.id.clone(),
                message: spec
                    .required_message
                    .clone()
                    .unwrap_or_else(|| REQUIRED_MESSAGE.to_string()),
                explicit: spec.required_message.is_some(),
            });
            report.first_invalid.get_or_insert(position);
            continue;
        }

        let verdict = question.variant.validate(spec, raw.as_ref());
        if !verdict.valid {
            report.errors.push(QuestionError {
                question_id: spec.id.clone(),
                explicit: verdict.message.is_some(),
                message: verdict
                    .message
                    .unwrap_or_else(|| INVALID_MESSAGE.to_string()),
            });
            report.first_invalid.get_or_insert(position);
            continue;
        }

        let value = verdict.value.or(raw);
        let Some(value) = value.filter(|value| !is_empty_value(Some(value))) else {
            continue;
        };

        report.answers.insert(
            spec.id.clone(),
            json!({
                "value": value,
                "variant": spec.variant,
                "questionId": spec.id,
                "metadata": spec.metadata,
            }),
        );
        if let Some(path) = merge_path(&mut report.submission, &spec.output_segments(), value) {
            tracing::warn!(
                question = %spec.id,
                %path,
                "output path written twice; last answer wins"
            );
            report.collisions.push(path);
        }
    }

    report
}

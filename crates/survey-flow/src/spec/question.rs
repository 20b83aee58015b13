use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Constraints a built-in variant enforces on a question's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
    #[serde(default)]
    pub integer: bool,
}

/// One selectable option; either a bare string or a value with a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Plain(String),
    Labeled { value: Value, label: String },
}

impl Choice {
    pub fn value(&self) -> Value {
        match self {
            Choice::Plain(text) => Value::String(text.clone()),
            Choice::Labeled { value, .. } => value.clone(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Choice::Plain(text) => text,
            Choice::Labeled { label, .. } => label,
        }
    }
}

/// Where a question's answer lands inside the page submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputKey {
    /// Dot-separated path, e.g. `"profile.age"`.
    Path(String),
    Segments(Vec<String>),
}

impl OutputKey {
    pub fn segments(&self) -> Vec<String> {
        match self {
            OutputKey::Path(path) => path
                .split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            OutputKey::Segments(segments) => segments
                .iter()
                .filter(|segment| !segment.is_empty())
                .cloned()
                .collect(),
        }
    }
}

/// Definition of a single question on a multi-question page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSpec {
    pub id: String,
    /// Variant name resolved through the variant registry.
    #[serde(rename = "type")]
    pub variant: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<OutputKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl QuestionSpec {
    pub fn new(id: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variant: variant.into(),
            title: String::new(),
            description: None,
            required: false,
            required_message: None,
            output_key: None,
            choices: None,
            constraint: None,
            default_value: None,
            placeholder: None,
            metadata: Value::Null,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(OutputKey::Path(key.into()));
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(|c| Choice::Plain(c.into())).collect());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Output path segments; falls back to the question id.
    pub fn output_segments(&self) -> Vec<String> {
        let segments = self
            .output_key
            .as_ref()
            .map(OutputKey::segments)
            .unwrap_or_default();
        if segments.is_empty() {
            vec![self.id.clone()]
        } else {
            segments
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_key_accepts_path_or_segments() {
        let question: QuestionSpec = serde_json::from_value(json!({
            "id": "age",
            "type": "number",
            "outputKey": "profile.age"
        }))
        .expect("question");
        assert_eq!(question.output_segments(), vec!["profile", "age"]);

        let question: QuestionSpec = serde_json::from_value(json!({
            "id": "age",
            "type": "number",
            "outputKey": ["profile", "years.total"]
        }))
        .expect("question");
        assert_eq!(question.output_segments(), vec!["profile", "years.total"]);
    }

    #[test]
    fn empty_output_key_falls_back_to_id() {
        let question = QuestionSpec::new("color", "text").with_output_key("..");
        assert_eq!(question.output_segments(), vec!["color"]);
    }

    #[test]
    fn choices_accept_labels() {
        let choices: Vec<Choice> =
            serde_json::from_value(json!(["red", {"value": 2, "label": "Two"}])).expect("choices");
        assert_eq!(choices[0].value(), json!("red"));
        assert_eq!(choices[1].value(), json!(2));
        assert_eq!(choices[1].label(), "Two");
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use regex::Regex;
use serde_json::{Number, Value};

use super::{ChangeListener, Field, FieldHandle, FieldInit, FieldVerdict, Variant};
use crate::spec::QuestionSpec;
use crate::sync::lock;

/// Headless field holding a JSON value.
pub struct ValueField {
    question_id: String,
    value: Mutex<Option<Value>>,
    listener: Mutex<Option<ChangeListener>>,
    focused: AtomicBool,
}

impl ValueField {
    pub fn new(question_id: &str, init: FieldInit) -> Self {
        Self {
            question_id: question_id.to_string(),
            value: Mutex::new(init.initial_value),
            listener: Mutex::new(init.on_change),
            focused: AtomicBool::new(false),
        }
    }
}

impl Field for ValueField {
    fn value(&self) -> Option<Value> {
        lock(&self.value).clone()
    }

    fn set_value(&self, value: Option<Value>) {
        *lock(&self.value) = value.clone();
        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener(&self.question_id, value.as_ref());
        }
    }

    fn focus(&self) {
        self.focused.store(true, Ordering::SeqCst);
    }

    fn is_focused(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        lock(&self.listener).take();
        self.focused.store(false, Ordering::SeqCst);
    }
}

/// Placeholder control for variants nobody registered. Never holds a value.
#[derive(Debug, Default)]
pub struct InertField;

impl Field for InertField {
    fn value(&self) -> Option<Value> {
        None
    }

    fn set_value(&self, _value: Option<Value>) {}

    fn focus(&self) {}

    fn destroy(&self) {}
}

/// Wildcard entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedVariant;

impl Variant for UnsupportedVariant {
    fn create(&self, _question: &QuestionSpec, _init: FieldInit) -> FieldHandle {
        Arc::new(InertField)
    }

    fn coerce(&self, _question: &QuestionSpec, _raw: &Value) -> Option<Value> {
        None
    }
}

/// Short or long free text. Compiled patterns are cached by source.
#[derive(Debug, Clone)]
pub struct TextVariant {
    multiline: bool,
    patterns: DashMap<String, Regex>,
}

impl TextVariant {
    pub fn single_line() -> Self {
        Self {
            multiline: false,
            patterns: DashMap::new(),
        }
    }

    pub fn multi_line() -> Self {
        Self {
            multiline: true,
            patterns: DashMap::new(),
        }
    }

    fn pattern(&self, source: &str) -> Result<Regex, regex::Error> {
        if let Some(regex) = self.patterns.get(source) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(source)?;
        self.patterns.insert(source.to_string(), regex.clone());
        Ok(regex)
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

impl Variant for TextVariant {
    fn validate(&self, question: &QuestionSpec, value: Option<&Value>) -> FieldVerdict {
        let Some(value) = value.filter(|value| !value.is_null()) else {
            return FieldVerdict::accept();
        };
        let Some(text) = as_text(value) else {
            return FieldVerdict::reject("Enter text");
        };
        let text = if self.multiline {
            text.trim_end().to_string()
        } else {
            text.trim().to_string()
        };
        if text.is_empty() {
            return FieldVerdict::accept();
        }
        if let Some(constraint) = &question.constraint {
            let len = text.chars().count();
            if let Some(min_len) = constraint.min_len
                && len < min_len
            {
                return FieldVerdict::reject(format!("Enter at least {min_len} characters"));
            }
            if let Some(max_len) = constraint.max_len
                && len > max_len
            {
                return FieldVerdict::reject(format!("Enter at most {max_len} characters"));
            }
            if let Some(pattern) = &constraint.pattern {
                match self.pattern(pattern) {
                    Ok(regex) if !regex.is_match(&text) => {
                        return FieldVerdict::reject("Value has an unexpected format");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(question = %question.id, %err, "ignoring invalid pattern");
                    }
                }
            }
        }
        FieldVerdict::accept_value(Value::String(text))
    }

    fn coerce(&self, _question: &QuestionSpec, raw: &Value) -> Option<Value> {
        as_text(raw).map(Value::String)
    }

    fn check(&self, question: &QuestionSpec) -> Result<(), String> {
        let pattern = question
            .constraint
            .as_ref()
            .and_then(|constraint| constraint.pattern.as_deref());
        match pattern {
            Some(pattern) => self
                .pattern(pattern)
                .map(|_| ())
                .map_err(|err| format!("invalid pattern: {err}")),
            None => Ok(()),
        }
    }
}

/// Numeric answers; numeric strings are accepted and normalized.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberVariant;

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn fits_i64(number: f64) -> bool {
    number >= i64::MIN as f64 && number < i64::MAX as f64
}

fn number_value(number: f64, integer: bool) -> Option<Value> {
    if number.fract() == 0.0 && fits_i64(number) {
        return Some(Value::Number(Number::from(number as i64)));
    }
    if integer {
        return None;
    }
    Number::from_f64(number).map(Value::Number)
}

impl Variant for NumberVariant {
    fn validate(&self, question: &QuestionSpec, value: Option<&Value>) -> FieldVerdict {
        let Some(value) = value.filter(|value| !super::is_empty_value(Some(value))) else {
            return FieldVerdict::accept();
        };
        let Some(number) = parse_number(value) else {
            return FieldVerdict::reject("Enter a number");
        };
        let constraint = question.constraint.clone().unwrap_or_default();
        if constraint.integer && number.fract() != 0.0 {
            return FieldVerdict::reject("Enter a whole number");
        }
        if constraint.integer && !fits_i64(number) {
            let hint = if number > 0.0 { "smaller" } else { "larger" };
            return FieldVerdict::reject(format!("Enter a {hint} number"));
        }
        if let Some(min) = constraint.min
            && number < min
        {
            return FieldVerdict::reject(format!("Enter a value of at least {min}"));
        }
        if let Some(max) = constraint.max
            && number > max
        {
            return FieldVerdict::reject(format!("Enter a value of at most {max}"));
        }
        match number_value(number, constraint.integer) {
            Some(normalized) => FieldVerdict::accept_value(normalized),
            None => FieldVerdict::reject("Enter a number"),
        }
    }

    fn coerce(&self, question: &QuestionSpec, raw: &Value) -> Option<Value> {
        let integer = question.constraint.as_ref().is_some_and(|c| c.integer);
        parse_number(raw).and_then(|number| number_value(number, integer))
    }
}

/// One of the question's `choices`, matched by value or by label.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectVariant;

fn match_choice(question: &QuestionSpec, raw: &Value) -> Option<Value> {
    let choices = question.choices.as_deref()?;
    if let Some(choice) = choices.iter().find(|choice| choice.value() == *raw) {
        return Some(choice.value());
    }
    let text = as_text(raw)?;
    let text = text.trim();
    choices
        .iter()
        .find(|choice| {
            choice.label().eq_ignore_ascii_case(text)
                || as_text(&choice.value()).is_some_and(|value| value == text)
        })
        .map(|choice| choice.value())
}

impl Variant for SelectVariant {
    fn validate(&self, question: &QuestionSpec, value: Option<&Value>) -> FieldVerdict {
        let Some(value) = value.filter(|value| !super::is_empty_value(Some(value))) else {
            return FieldVerdict::accept();
        };
        if question.choices.is_none() {
            return FieldVerdict::accept();
        }
        match match_choice(question, value) {
            Some(choice) => FieldVerdict::accept_value(choice),
            None => FieldVerdict::reject("Choose one of the listed options"),
        }
    }

    fn coerce(&self, question: &QuestionSpec, raw: &Value) -> Option<Value> {
        if question.choices.is_none() {
            return Some(raw.clone());
        }
        match_choice(question, raw)
    }
}

/// Yes/no answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BooleanVariant;

fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "1" => Some(true),
            "n" | "no" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

impl Variant for BooleanVariant {
    fn validate(&self, _question: &QuestionSpec, value: Option<&Value>) -> FieldVerdict {
        let Some(value) = value.filter(|value| !super::is_empty_value(Some(value))) else {
            return FieldVerdict::accept();
        };
        match parse_bool(value) {
            Some(flag) => FieldVerdict::accept_value(Value::Bool(flag)),
            None => FieldVerdict::reject("Answer yes or no"),
        }
    }

    fn coerce(&self, _question: &QuestionSpec, raw: &Value) -> Option<Value> {
        parse_bool(raw).map(Value::Bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Constraint;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn value_field_notifies_until_destroyed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let field = ValueField::new(
            "q",
            FieldInit {
                initial_value: Some(json!("a")),
                on_change: Some(Arc::new(move |id: &str, _: Option<&Value>| {
                    assert_eq!(id, "q");
                    seen.fetch_add(1, Ordering::SeqCst);
                })),
            },
        );
        field.set_value(Some(json!("b")));
        field.destroy();
        field.set_value(Some(json!("c")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(field.value(), Some(json!("c")));
    }

    #[test]
    fn text_enforces_length_and_pattern() {
        let question = QuestionSpec::new("zip", "text").with_constraint(Constraint {
            pattern: Some("^[0-9]+$".into()),
            max_len: Some(5),
            ..Constraint::default()
        });
        let text = TextVariant::single_line();
        assert!(!text.validate(&question, Some(&json!("12a"))).valid);
        assert!(!text.validate(&question, Some(&json!("123456"))).valid);
        let verdict = text.validate(&question, Some(&json!(" 1234 ")));
        assert_eq!(verdict.value, Some(json!("1234")));
    }

    #[test]
    fn number_normalizes_strings_and_bounds() {
        let question = QuestionSpec::new("age", "number").with_constraint(Constraint {
            min: Some(18.0),
            integer: true,
            ..Constraint::default()
        });
        assert_eq!(
            NumberVariant.validate(&question, Some(&json!("42"))).value,
            Some(json!(42))
        );
        assert!(!NumberVariant.validate(&question, Some(&json!("17"))).valid);
        assert!(!NumberVariant.validate(&question, Some(&json!("18.5"))).valid);
        assert!(!NumberVariant.validate(&question, Some(&json!("many"))).valid);
        assert!(NumberVariant.validate(&question, Some(&json!(""))).valid);
    }

    #[test]
    fn integers_outside_the_i64_range_are_rejected() {
        let question = QuestionSpec::new("count", "number").with_constraint(Constraint {
            integer: true,
            ..Constraint::default()
        });
        let verdict = NumberVariant.validate(&question, Some(&json!("99999999999999999999999")));
        assert!(!verdict.valid);
        assert_eq!(verdict.message.as_deref(), Some("Enter a smaller number"));
        let verdict = NumberVariant.validate(&question, Some(&json!("-99999999999999999999999")));
        assert_eq!(verdict.message.as_deref(), Some("Enter a larger number"));
        assert_eq!(
            NumberVariant.validate(&question, Some(&json!("9007199254740992"))).value,
            Some(json!(9007199254740992_i64))
        );
        assert_eq!(NumberVariant.coerce(&question, &json!(1e30)), None);

        let plain = QuestionSpec::new("mass", "number");
        assert_eq!(
            NumberVariant.validate(&plain, Some(&json!(1e30))).value,
            Some(json!(1e30))
        );
    }

    #[test]
    fn text_check_rejects_bad_patterns() {
        let text = TextVariant::single_line();
        let broken = QuestionSpec::new("code", "text").with_constraint(Constraint {
            pattern: Some("([a-z".into()),
            ..Constraint::default()
        });
        assert!(text.check(&broken).unwrap_err().starts_with("invalid pattern"));
        assert!(text.check(&QuestionSpec::new("free", "text")).is_ok());
    }

    #[test]
    fn select_matches_labels_and_values() {
        let question = QuestionSpec::new("color", "select").with_choices(["Red", "Blue"]);
        assert_eq!(
            SelectVariant.validate(&question, Some(&json!("blue"))).value,
            Some(json!("Blue"))
        );
        assert!(!SelectVariant.validate(&question, Some(&json!("green"))).valid);
        assert_eq!(SelectVariant.coerce(&question, &json!("green")), None);
    }

    #[test]
    fn boolean_accepts_common_spellings() {
        let question = QuestionSpec::new("ok", "boolean");
        assert_eq!(
            BooleanVariant.validate(&question, Some(&json!("Yes"))).value,
            Some(json!(true))
        );
        assert!(!BooleanVariant.validate(&question, Some(&json!("maybe"))).valid);
    }

    #[test]
    fn unsupported_is_inert() {
        let question = QuestionSpec::new("x", "mystery");
        let field = UnsupportedVariant.create(&question, FieldInit::default());
        field.set_value(Some(json!(1)));
        assert_eq!(field.value(), None);
        assert!(UnsupportedVariant.validate(&question, None).valid);
    }
}

//! Default messages and placeholder rendering.

use nestsync_core::Rule;
use serde_json::Value;

/// The built-in template for a failing rule.
pub fn default_template(rule: &Rule) -> &'static str {
    match rule {
        Rule::Required => "The :attribute field is required.",
        Rule::RequiredIf { .. } => "The :attribute field is required when :other is :value.",
        Rule::RequiredUnless { .. } => "The :attribute field is required unless :other is :value.",
        Rule::Nullable => "The :attribute field is invalid.",
        Rule::String => "The :attribute must be a string.",
        Rule::Integer => "The :attribute must be an integer.",
        Rule::Numeric => "The :attribute must be a number.",
        Rule::Boolean => "The :attribute field must be true or false.",
        Rule::Array => "The :attribute must be an array.",
        Rule::Min(_) => "The :attribute must be at least :min.",
        Rule::Max(_) => "The :attribute may not be greater than :max.",
        Rule::In(_) | Rule::Exists { .. } => "The selected :attribute is invalid.",
    }
}

/// Fills `:attribute` and the rule's own placeholders.
pub fn render(template: &str, attribute: &str, rule: &Rule) -> String {
    let mut message = template.replace(":attribute", attribute);
    match rule {
        Rule::RequiredIf { field, value } | Rule::RequiredUnless { field, value } => {
            message = message
                .replace(":other", field)
                .replace(":value", &display(value));
        }
        Rule::Min(min) => message = message.replace(":min", &number(*min)),
        Rule::Max(max) => message = message.replace(":max", &number(*max)),
        Rule::In(values) => {
            let values: Vec<String> = values.iter().map(display).collect();
            message = message.replace(":values", &values.join(", "));
        }
        _ => {}
    }
    message
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use validator::ValidationErrors;

use super::FieldErrors;

fn mobile_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\+91[\-\s]?)?[6-9]\d{9}$").expect("valid mobile regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
}

fn pincode_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{6}$").expect("valid pincode regex"))
}

pub fn validate_mobile(mobile: &str) -> bool {
    mobile_re().is_match(mobile.trim())
}

pub fn validate_email(email: &str) -> bool {
    email_re().is_match(email.trim())
}

pub fn validate_pincode(pincode: &str) -> bool {
    pincode_re().is_match(pincode.trim())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Flattens `validator` output into the envelope's field map, nested
/// structs becoming dotted paths.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    collect_validation(errors, "", &mut out);
    out
}

fn collect_validation(errors: &ValidationErrors, prefix: &str, out: &mut FieldErrors) {
    use validator::ValidationErrorsKind;

    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by_key(|(field, _)| **field);

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path).or_default();
                for e in list {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code));
                    messages.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_validation(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation(nested, &format!("{}[{}]", path, index), out);
                }
            }
        }
    }
}

pub fn push_error(errors: &mut FieldErrors, field: impl Into<String>, message: impl Into<String>) {
    errors.entry(field.into()).or_default().push(message.into());
}

/// Format checks for submitted form payloads. The payload shape differs per
/// category, so only well-known keys are checked wherever they appear.
pub fn validate_form_data(form: &Value) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if !form.is_object() {
        push_error(&mut errors, "formData", "Form data must be an object");
        return errors;
    }

    walk_form(form, "formData", &mut errors);
    errors
}

fn walk_form(value: &Value, path: &str, errors: &mut FieldErrors) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{}.{}", path, key);
                if let Value::String(s) = child {
                    check_known_field(key, s, &child_path, errors);
                } else {
                    walk_form(child, &child_path, errors);
                }
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk_form(child, &format!("{}[{}]", path, index), errors);
            }
        }
        _ => {}
    }
}

fn check_known_field(key: &str, value: &str, path: &str, errors: &mut FieldErrors) {
    if value.trim().is_empty() {
        return;
    }

    let key = key.to_ascii_lowercase();
    if key == "email" || key.ends_with("email") {
        if !validate_email(value) {
            push_error(errors, path, "Invalid email address");
        }
    } else if key == "phone" || key == "mobile" || key.ends_with("phone") || key.ends_with("mobile") {
        if !validate_mobile(value) {
            push_error(errors, path, "Invalid mobile number");
        }
    } else if key == "pincode" && !validate_pincode(value) {
        push_error(errors, path, "Pincode must be 6 digits");
    }
}

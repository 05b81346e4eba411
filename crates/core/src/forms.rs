//! Dynamic per-event registration form validation.
//!
//! NORMAL events carry an organizer-defined field schema (stored as
//! JSONB). Each field kind owns its own validation rule; dispatch is a
//! plain `match` on the tagged [`FieldKind`] union. A submission is an
//! answer map plus a set of uploaded files keyed by field name; a single
//! violation aborts the whole submission with an error naming the
//! offending field, so nothing is ever partially persisted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// The kind of a form field, with per-kind configuration.
///
/// `options` exist only for `select` and `checkbox`, which the tagged
/// representation enforces structurally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Select { options: Vec<String> },
    Checkbox { options: Vec<String> },
    File,
}

/// One field of a NORMAL event's registration form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    /// Unique key within the form; answer maps are keyed by this.
    pub key: String,
    /// Human-readable label shown to participants.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Validation and display sequence, ascending.
    #[serde(default)]
    pub order: i32,
}

/// Metadata recorded for an uploaded file (the blob itself lives with the
/// external storage collaborator; we only keep references).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    /// Stored filename (relative download path).
    pub file_name: String,
    /// Filename as submitted by the client.
    pub original_name: String,
    /// MIME type as submitted by the client.
    pub content_type: String,
    /// Size in bytes.
    pub size: i64,
}

/// Parse and sanity-check a form schema from its JSONB representation.
///
/// Rejects duplicate field keys and returns the fields sorted by `order`.
pub fn parse_form(value: &Value) -> Result<Vec<FormField>, CoreError> {
    let mut fields: Vec<FormField> = serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Internal(format!("Malformed form schema: {e}")))?;

    let mut seen = std::collections::HashSet::new();
    for field in &fields {
        if !seen.insert(field.key.clone()) {
            return Err(CoreError::Internal(format!(
                "Malformed form schema: duplicate field key '{}'",
                field.key
            )));
        }
    }

    fields.sort_by_key(|f| f.order);
    Ok(fields)
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

/// Validate a submission against a field schema.
///
/// `answers` holds non-file answers keyed by field key (strings from
/// multipart text parts, or native JSON values). `files` holds uploaded
/// file metadata keyed by field key. Returns the validated response map
/// to persist; missing optional fields are omitted.
pub fn validate_submission(
    fields: &[FormField],
    answers: &HashMap<String, Value>,
    files: &HashMap<String, Vec<UploadedFile>>,
) -> Result<Map<String, Value>, CoreError> {
    let by_key: HashMap<&str, &FormField> =
        fields.iter().map(|f| (f.key.as_str(), f)).collect();

    // Reject stray or duplicated uploads before looking at any values.
    for (key, uploads) in files {
        match by_key.get(key.as_str()) {
            None => {
                return Err(CoreError::Validation(format!(
                    "'{key}' is not a field of this form"
                )));
            }
            Some(field) if field.kind != FieldKind::File => {
                return Err(CoreError::Validation(format!(
                    "Field '{key}' does not accept file uploads"
                )));
            }
            Some(_) if uploads.len() > 1 => {
                return Err(CoreError::Validation(format!(
                    "Multiple files uploaded for field '{key}'"
                )));
            }
            Some(_) => {}
        }
    }
    for key in answers.keys() {
        match by_key.get(key.as_str()) {
            None => {
                return Err(CoreError::Validation(format!(
                    "'{key}' is not a field of this form"
                )));
            }
            Some(field) if field.kind == FieldKind::File => {
                return Err(CoreError::Validation(format!(
                    "Field '{key}' expects a file upload"
                )));
            }
            Some(_) => {}
        }
    }

    let mut responses = Map::new();
    for field in fields {
        match &field.kind {
            FieldKind::File => {
                match files.get(&field.key).map(Vec::as_slice) {
                    Some([upload]) => {
                        responses.insert(
                            field.key.clone(),
                            serde_json::to_value(upload).map_err(|e| {
                                CoreError::Internal(format!("File metadata encoding: {e}"))
                            })?,
                        );
                    }
                    _ if field.required => {
                        return Err(required_error(field));
                    }
                    _ => {}
                }
            }
            FieldKind::Text | FieldKind::Textarea => {
                if let Some(value) = validate_text(field, answers)? {
                    responses.insert(field.key.clone(), json!(value));
                }
            }
            FieldKind::Select { options } => {
                if let Some(value) = validate_text(field, answers)? {
                    if !options.iter().any(|o| o == &value) {
                        return Err(CoreError::Validation(format!(
                            "'{value}' is not a valid option for field '{}'",
                            field.key
                        )));
                    }
                    responses.insert(field.key.clone(), json!(value));
                }
            }
            FieldKind::Number => {
                if let Some(number) = validate_number(field, answers)? {
                    responses.insert(field.key.clone(), json!(number));
                }
            }
            FieldKind::Checkbox { options } => {
                if let Some(selected) = validate_checkbox(field, options, answers)? {
                    responses.insert(field.key.clone(), json!(selected));
                }
            }
        }
    }

    Ok(responses)
}

fn required_error(field: &FormField) -> CoreError {
    CoreError::Validation(format!("Field '{}' is required", field.key))
}

/// Shared rule for text-like fields: must be a string, trimmed; an empty
/// value is an error iff the field is required, otherwise omitted.
fn validate_text(
    field: &FormField,
    answers: &HashMap<String, Value>,
) -> Result<Option<String>, CoreError> {
    let raw = match answers.get(&field.key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => {
            return Err(CoreError::Validation(format!(
                "Field '{}' must be a string",
                field.key
            )));
        }
        None => String::new(),
    };

    if raw.is_empty() {
        if field.required {
            return Err(required_error(field));
        }
        return Ok(None);
    }
    Ok(Some(raw))
}

/// Numbers arrive either as native JSON numbers or as strings from
/// multipart text parts; both are accepted, non-finite values are not.
fn validate_number(
    field: &FormField,
    answers: &HashMap<String, Value>,
) -> Result<Option<f64>, CoreError> {
    let parsed = match answers.get(&field.key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                return Err(CoreError::Validation(format!(
                    "Field '{}' must be a number",
                    field.key
                )));
            }
        },
        Some(_) => {
            return Err(CoreError::Validation(format!(
                "Field '{}' must be a number",
                field.key
            )));
        }
        None => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(Some(v)),
        Some(_) => Err(CoreError::Validation(format!(
            "Field '{}' must be a finite number",
            field.key
        ))),
        None if field.required => Err(required_error(field)),
        None => Ok(None),
    }
}

/// Checkbox answers are a string list (repeated multipart parts or a JSON
/// array) or a single comma-joined string; every selected item must be
/// one of the field's options.
fn validate_checkbox(
    field: &FormField,
    options: &[String],
    answers: &HashMap<String, Value>,
) -> Result<Option<Vec<String>>, CoreError> {
    let selected: Vec<String> = match answers.get(&field.key) {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
                    Value::String(_) => {}
                    _ => {
                        return Err(CoreError::Validation(format!(
                            "Field '{}' must be a list of strings",
                            field.key
                        )));
                    }
                }
            }
            out
        }
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        Some(_) => {
            return Err(CoreError::Validation(format!(
                "Field '{}' must be a list of strings",
                field.key
            )));
        }
        None => Vec::new(),
    };

    if selected.is_empty() {
        if field.required {
            return Err(required_error(field));
        }
        return Ok(None);
    }
    for item in &selected {
        if !options.iter().any(|o| o == item) {
            return Err(CoreError::Validation(format!(
                "'{item}' is not a valid option for field '{}'",
                field.key
            )));
        }
    }
    Ok(Some(selected))
}

//! Multipart submission collection and uploaded-file lifecycle.
//!
//! Registration and purchase requests arrive as multipart forms: text
//! parts are answers (repeated parts with one name form a list), file
//! parts are stored under the configured upload directory with generated
//! names, and the reserved parts `event_id`, `sku`, `quantity`,
//! `payment_method`, and `payment_proof` carry the workflow fields.
//!
//! Files are written before validation runs, so every rejection path
//! must call [`Submission::discard`] to avoid orphaned blobs.

use std::collections::HashMap;
use std::path::PathBuf;

use axum::extract::multipart::{Field, Multipart};
use serde_json::Value;
use uuid::Uuid;

use eventra_core::forms::UploadedFile;
use eventra_core::types::DbId;

use crate::error::AppError;

/// Reserved text part naming the target event.
pub const PART_EVENT_ID: &str = "event_id";
/// Reserved text part carrying the payment method.
pub const PART_PAYMENT_METHOD: &str = "payment_method";
/// Reserved file part carrying the payment proof image.
pub const PART_PAYMENT_PROOF: &str = "payment_proof";

/// A fully collected multipart submission.
pub struct Submission {
    pub event_id: Option<DbId>,
    pub payment_method: Option<String>,
    pub payment_proof: Option<UploadedFile>,
    /// Non-reserved text parts, keyed by part name. Repeated names
    /// collect into a JSON array (checkbox selections).
    pub answers: HashMap<String, Value>,
    /// Non-reserved file parts, keyed by part name.
    pub files: HashMap<String, Vec<UploadedFile>>,
    saved: Vec<PathBuf>,
}

impl Submission {
    fn empty() -> Self {
        Self {
            event_id: None,
            payment_method: None,
            payment_proof: None,
            answers: HashMap::new(),
            files: HashMap::new(),
            saved: Vec::new(),
        }
    }

    /// Read a reserved text answer (e.g. `sku`) as a string.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.answers.get(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Delete every file this submission wrote. Called on rejection
    /// paths so a failed request leaves no orphaned blobs.
    pub async fn discard(&self) {
        for path in &self.saved {
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove uploaded file");
            }
        }
    }
}

/// Drain a multipart body into a [`Submission`], storing file parts
/// under `upload_dir`. On error, files already written are removed
/// before the error is returned.
pub async fn collect(mut multipart: Multipart, upload_dir: &str) -> Result<Submission, AppError> {
    let mut submission = Submission::empty();
    match drain(&mut multipart, upload_dir, &mut submission).await {
        Ok(()) => Ok(submission),
        Err(err) => {
            submission.discard().await;
            Err(err)
        }
    }
}

async fn drain(
    multipart: &mut Multipart,
    upload_dir: &str,
    submission: &mut Submission,
) -> Result<(), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            return Err(AppError::BadRequest(
                "Multipart part without a name".to_string(),
            ));
        };

        if field.file_name().is_some() {
            let (uploaded, path) = store_file(field, upload_dir).await?;
            submission.saved.push(path);
            if name == PART_PAYMENT_PROOF {
                if submission.payment_proof.is_some() {
                    return Err(AppError::BadRequest(
                        "Multiple payment proof files uploaded".to_string(),
                    ));
                }
                submission.payment_proof = Some(uploaded);
            } else {
                submission.files.entry(name).or_default().push(uploaded);
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Unreadable part '{name}': {e}")))?;
            match name.as_str() {
                PART_EVENT_ID => {
                    let id = text.trim().parse().map_err(|_| {
                        AppError::BadRequest("event_id must be an integer".to_string())
                    })?;
                    submission.event_id = Some(id);
                }
                PART_PAYMENT_METHOD => submission.payment_method = Some(text.trim().to_string()),
                _ => insert_answer(&mut submission.answers, name, text),
            }
        }
    }
    Ok(())
}

/// Write one file part to disk and return its recorded metadata plus the
/// on-disk path (for later discard).
async fn store_file(
    field: Field<'_>,
    upload_dir: &str,
) -> Result<(UploadedFile, PathBuf), AppError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable file upload: {e}")))?;

    let stored_name = format!("{}{}", Uuid::new_v4(), sanitized_extension(&original_name));
    let path = PathBuf::from(upload_dir).join(&stored_name);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;

    let uploaded = UploadedFile {
        file_name: stored_name,
        original_name,
        content_type,
        size: data.len() as i64,
    };
    Ok((uploaded, path))
}

/// Accumulate repeated text parts under one name into a JSON array.
fn insert_answer(answers: &mut HashMap<String, Value>, key: String, text: String) {
    match answers.remove(&key) {
        None => {
            answers.insert(key, Value::String(text));
        }
        Some(Value::Array(mut items)) => {
            items.push(Value::String(text));
            answers.insert(key, Value::Array(items));
        }
        Some(previous) => {
            answers.insert(key, Value::Array(vec![previous, Value::String(text)]));
        }
    }
}

/// Keep only a short, safe extension from the client-supplied filename.
fn sanitized_extension(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= 10
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_parts_collect_into_a_list() {
        let mut answers = HashMap::new();
        insert_answer(&mut answers, "tags".to_string(), "a".to_string());
        assert_eq!(answers["tags"], json!("a"));

        insert_answer(&mut answers, "tags".to_string(), "b".to_string());
        assert_eq!(answers["tags"], json!(["a", "b"]));

        insert_answer(&mut answers, "tags".to_string(), "c".to_string());
        assert_eq!(answers["tags"], json!(["a", "b", "c"]));
    }

    #[test]
    fn extensions_are_sanitized() {
        assert_eq!(sanitized_extension("proof.PNG"), ".png");
        assert_eq!(sanitized_extension("archive.tar.gz"), ".gz");
        assert_eq!(sanitized_extension("no_extension"), "");
        assert_eq!(sanitized_extension("weird.p/ng"), "");
        assert_eq!(sanitized_extension("dot."), "");
        assert_eq!(sanitized_extension("x.averylongextension"), "");
    }
}

//! Multipart form decoding

use crate::ApiError;
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;

/// A file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub data: Bytes,
}

/// All parts of a multipart body, split into text fields and files
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    /// Drain a multipart body; a part with a filename is a file, anything
    /// else is a text field. Later parts replace earlier ones of the same name.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await?;
                    // Browsers send an empty part for an untouched file input
                    if data.is_empty() && filename.is_empty() {
                        continue;
                    }
                    let filename = Some(filename).filter(|f| !f.is_empty());
                    form.files.insert(name, UploadedFile { filename, data });
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Non-blank text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn owned_text(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }

    /// Non-blank text field, or a validation error naming it
    pub fn require(&self, name: &str) -> Result<&str, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::validation(format!("{} is required", name)))
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// JSON array of strings; an absent field is an empty list
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, ApiError> {
        match self.text(name) {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw).map_err(|_| {
                ApiError::validation(format!("{} must be a JSON array of strings", name))
            }),
        }
    }
}

#[cfg(test)]
impl FormData {
    pub(crate) fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn test_blank_fields_are_absent() {
        let form = FormData::default()
            .with_field("title", "sunset")
            .with_field("desc", "   ");

        assert_eq!(form.text("title"), Some("sunset"));
        assert_eq!(form.text("desc"), None);
        assert_eq!(form.text("missing"), None);
        assert_eq!(
            form.require("desc").unwrap_err().error_code(),
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_string_list() {
        let form = FormData::default()
            .with_field("tags", r#"["sky", "beach"]"#)
            .with_field("bad", "sky, beach");

        assert_eq!(form.string_list("tags").unwrap(), vec!["sky", "beach"]);
        assert!(form.string_list("none").unwrap().is_empty());
        assert!(form.string_list("bad").is_err());
    }
}

//! Multipart form collection

use std::collections::HashMap;

use axum::extract::Multipart;
use pdfforge_core::{NamedInput, PageBound};

use crate::error::ApiError;

/// Name given to file parts that arrive without a filename
const UNNAMED_UPLOAD: &str = "upload";

/// A fully read multipart form: file parts and text fields, by field name
#[derive(Debug, Default)]
pub struct UploadForm {
    files: HashMap<String, Vec<NamedInput>>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::debug!("Failed to read multipart field: {}", e);
            ApiError::InvalidRequest(format!("Failed to read upload: {}", e))
        })? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(|s| s.to_string()) {
                Some(file_name) => {
                    let data = field.bytes().await.map_err(|e| {
                        ApiError::InvalidRequest(format!("Failed to read file data: {}", e))
                    })?;

                    // Browsers send an empty, unnamed part for an empty file input
                    if data.is_empty() && file_name.is_empty() {
                        continue;
                    }

                    let file_name = if file_name.is_empty() {
                        UNNAMED_UPLOAD.to_string()
                    } else {
                        file_name
                    };
                    tracing::debug!(
                        "Received file: field='{}', name='{}', {} bytes",
                        name,
                        file_name,
                        data.len()
                    );
                    form.files
                        .entry(name)
                        .or_default()
                        .push(NamedInput::new(file_name, data.to_vec()));
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        ApiError::InvalidRequest(format!("Failed to read field {}: {}", name, e))
                    })?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Every file under `field`, in submission order
    pub fn take_files(&mut self, field: &str) -> Vec<NamedInput> {
        self.files.remove(field).unwrap_or_default()
    }

    /// The first file under `field`
    pub fn take_file(&mut self, field: &str) -> Option<NamedInput> {
        self.take_files(field).into_iter().next()
    }

    pub fn page_bound(&self, field: &str) -> Option<PageBound> {
        self.fields
            .get(field)
            .map(|raw| PageBound::Text(raw.clone()))
    }
}

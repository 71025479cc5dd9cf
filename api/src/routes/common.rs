use crate::services::intake::Upload;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use std::collections::HashMap;

/// All parts of a multipart form, keyed by field name. A repeated field keeps its last value.
#[derive(Debug, Default)]
pub struct FormParts {
    parts: HashMap<String, Upload>,
}

impl FormParts {
    pub async fn read(multipart: &mut Multipart) -> Result<Self, MultipartError> {
        let mut parts = HashMap::new();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?.to_vec();
            parts.insert(name, Upload { filename, bytes });
        }
        Ok(Self { parts })
    }

    pub fn file(&self, name: &str) -> Option<&Upload> {
        self.parts.get(name)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.parts
            .get(name)
            .map(|p| String::from_utf8_lossy(&p.bytes).trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Parses an optional integer field; `Err` when present but not an integer.
    pub fn optional_i64(&self, name: &str) -> Result<Option<i64>, std::num::ParseIntError> {
        self.text(name).map(|v| v.parse()).transpose()
    }
}

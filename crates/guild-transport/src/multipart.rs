//! Transport-neutral multipart form description.
//!
//! Adapters describe uploads with [`MultipartForm`]; the HTTP client turns it
//! into a real `multipart/form-data` body.

/// A binary file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub name: String,
    /// File name reported to the server.
    pub filename: String,
    /// File content.
    pub bytes: Vec<u8>,
}

/// A `multipart/form-data` body made of text fields and file parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Text fields in insertion order.
    pub fields: Vec<(String, String)>,
    /// File parts in insertion order.
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Adds a file part.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.files.push(FilePart {
            name: name.into(),
            filename: filename.into(),
            bytes,
        });
        self
    }

    /// Returns the value of the first text field called `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

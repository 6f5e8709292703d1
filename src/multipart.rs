//! `multipart/form-data` bodies.
//!
//! A [`Multipart`] is an immutable boundary plus an ordered list of parts.
//! [`Multipart::adding`] returns a new value and leaves the receiver untouched.
//! The encoded layout is: the boundary, then for each part a newline, the part's
//! header and content, a newline and the boundary again. No parts encode to no
//! bytes at all.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::{Error, Result};

const NEWLINE: &[u8] = b"\n";

/// A multipart body.
///
/// # Examples
///
/// ```
/// use tracewire::{Multipart, Part};
///
/// let multipart = Multipart::new("B").adding(Part::text("a", "b"));
///
/// assert_eq!(
///     &multipart.encode()[..],
///     &b"B\nContent-Disposition: form-data; name=\"a\"\n\nb\nB"[..]
/// );
/// assert_eq!(multipart.content_type(), "multipart/form-data; boundary=B");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Multipart {
    /// An empty multipart body with the given boundary.
    pub fn new(boundary: impl Into<String>) -> Self {
        Self::with_parts(boundary, Vec::new())
    }

    pub fn with_parts(boundary: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            boundary: boundary.into(),
            parts,
        }
    }

    /// An empty multipart body with a random alphanumeric boundary.
    pub fn with_random_boundary() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::new(format!("Boundary-{}", suffix))
    }

    /// Returns a copy with `part` appended after the existing parts.
    pub fn adding(&self, part: Part) -> Self {
        let mut parts = self.parts.clone();
        parts.push(part);
        Self::with_parts(self.boundary.clone(), parts)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// The boundary and parts, for read-only inspection.
    pub fn inspect(&self) -> (&str, &[Part]) {
        (&self.boundary, &self.parts)
    }

    /// The `Content-Type` value for the enclosing request.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// The headers the enclosing request must carry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the boundary cannot appear in a header.
    pub fn headers(&self) -> Result<HeaderMap> {
        let value = HeaderValue::try_from(self.content_type())
            .map_err(|_| Error::InvalidHeader(CONTENT_TYPE.as_str().to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, value);
        Ok(headers)
    }

    /// Encodes the body.
    ///
    /// Part content is always valid UTF-8 here, so encoding cannot fail.
    pub fn encode(&self) -> Bytes {
        if self.parts.is_empty() {
            return Bytes::new();
        }

        let mut data = self.boundary.as_bytes().to_vec();
        for part in &self.parts {
            data.extend_from_slice(NEWLINE);
            part.write_to(&mut data);
            data.extend_from_slice(NEWLINE);
            data.extend_from_slice(self.boundary.as_bytes());
        }
        Bytes::from(data)
    }

    /// A readable rendering of the body, with file data summarized by size.
    pub fn string_representation(&self) -> String {
        if self.parts.is_empty() {
            return String::new();
        }

        let mut text = self.boundary.clone();
        for part in &self.parts {
            text.push('\n');
            text.push_str(&part.string_representation());
            text.push('\n');
            text.push_str(&self.boundary);
        }
        text
    }
}

/// One named unit of a [`Multipart`] body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(TextPart),
    File(FilePart),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Part {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Part::Text(TextPart {
            name: name.into(),
            content: content.into(),
        })
    }

    pub fn file(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Part::File(FilePart {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Part::Text(text) => &text.name,
            Part::File(file) => &file.name,
        }
    }

    fn header(&self) -> String {
        match self {
            Part::Text(text) => {
                format!("Content-Disposition: form-data; name=\"{}\"\n\n", text.name)
            }
            Part::File(file) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"\"\nContent-Type: {}\n\n",
                file.name, file.content_type
            ),
        }
    }

    /// Header and content bytes; file data is copied verbatim.
    fn write_to(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(self.header().as_bytes());
        match self {
            Part::Text(text) => data.extend_from_slice(text.content.as_bytes()),
            Part::File(file) => data.extend_from_slice(&file.data),
        }
    }

    fn string_representation(&self) -> String {
        match self {
            Part::Text(text) => self.header() + &text.content,
            Part::File(file) => {
                format!("{}Data with byte count: {}", self.header(), file.data.len())
            }
        }
    }
}

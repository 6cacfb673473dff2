//! Outbound message under construction.
//!
//! [`Message`] is the surface the translator writes to: headers with one or
//! more values, a single body, and file parts to attach or embed. Files are
//! only referenced here; they are read when the transport renders the message.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

/// Layout used by [`Message::format_date`].
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Content disposition for file parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartDisposition {
    /// Regular attachment.
    #[default]
    Attachment,
    /// Inline content, referenceable by content ID.
    Inline,
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// MIME type (e.g., "text/plain").
    pub content_type: String,
    /// Content.
    pub content: String,
}

/// File attached to or embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Path read at render time.
    pub path: PathBuf,
    /// Name the part gets in the message, replacing the file name.
    pub rename: Option<String>,
    /// Attach or embed.
    pub disposition: PartDisposition,
}

impl FilePart {
    /// Returns the name the part is sent under.
    pub fn file_name(&self) -> String {
        match &self.rename {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Returns true if the part is embedded.
    pub fn is_inline(&self) -> bool {
        self.disposition == PartDisposition::Inline
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

/// Message being assembled for sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: Vec<HeaderEntry>,
    body: Option<Body>,
    parts: Vec<FilePart>,
}

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any previous values. Header names are
    /// matched case-insensitively; the first spelling is kept.
    pub fn set_header<I, V>(&mut self, name: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.position(name) {
            Some(index) => self.headers[index].values = values,
            None => self.headers.push(HeaderEntry {
                name: name.to_string(),
                values,
            }),
        }
        self
    }

    /// Sets a header to a date rendered as RFC 2822.
    pub fn set_date_header<Tz>(&mut self, name: &str, date: &DateTime<Tz>) -> &mut Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        self.set_header(name, [date.to_rfc2822()])
    }

    /// Returns the values of a header, if it is set.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.position(name)
            .map(|index| self.headers[index].values.as_slice())
    }

    /// Returns the first value of a header.
    pub fn first_header(&self, name: &str) -> Option<&str> {
        self.header(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns true if the header is set, even with no values.
    pub fn has_header(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes a header.
    pub fn remove_header(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name)
            .map(|index| self.headers.remove(index).values)
    }

    /// Iterates over headers in the order they were first set.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers
            .iter()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    /// Sets the body, replacing any previous one.
    pub fn set_body(&mut self, content_type: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.body = Some(Body {
            content_type: content_type.into(),
            content: content.into(),
        });
        self
    }

    /// Returns the body, if set.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Attaches a file, optionally under another name.
    pub fn attach(&mut self, path: impl AsRef<Path>, rename: Option<&str>) -> &mut Self {
        self.push_part(path, rename, PartDisposition::Attachment)
    }

    /// Embeds a file inline, optionally under another name.
    pub fn embed(&mut self, path: impl AsRef<Path>, rename: Option<&str>) -> &mut Self {
        self.push_part(path, rename, PartDisposition::Inline)
    }

    /// Returns all file parts in insertion order.
    pub fn parts(&self) -> &[FilePart] {
        &self.parts
    }

    /// Returns the attached (non-inline) parts.
    pub fn attachments(&self) -> impl Iterator<Item = &FilePart> {
        self.parts.iter().filter(|part| !part.is_inline())
    }

    /// Returns the embedded parts.
    pub fn embedded(&self) -> impl Iterator<Item = &FilePart> {
        self.parts.iter().filter(|part| part.is_inline())
    }

    /// Formats an address with a display name for use in headers:
    /// `"Name" <address>`, with quotes and backslashes in the name escaped.
    pub fn format_address(&self, address: &str, name: &str) -> String {
        if name.is_empty() {
            return address.to_string();
        }

        let mut formatted = String::with_capacity(name.len() + address.len() + 5);
        formatted.push('"');
        for c in name.chars() {
            if c == '"' || c == '\\' {
                formatted.push('\\');
            }
            formatted.push(c);
        }
        formatted.push_str("\" <");
        formatted.push_str(address);
        formatted.push('>');
        formatted
    }

    /// Formats a date as `Mon, 02 Jan 2006 15:04:05 -0700`.
    pub fn format_date<Tz>(&self, date: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        date.format(DATE_FORMAT).to_string()
    }

    fn push_part(&mut self, path: impl AsRef<Path>, rename: Option<&str>, disposition: PartDisposition) -> &mut Self {
        self.parts.push(FilePart {
            path: path.as_ref().to_path_buf(),
            rename: rename.map(str::to_string),
            disposition,
        });
        self
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }
}

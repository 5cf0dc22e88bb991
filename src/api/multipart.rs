//! Minimal `multipart/form-data` encoder.
//!
//! The HTTP client carries no multipart support, and the platform's file
//! upload endpoints (`/upload/:clientId`, `/api/knowledge/upload`) require
//! it. The wire format (RFC 7578) is simple enough to build by hand: a
//! boundary, one part per field, a closing delimiter.

use std::fmt::Write as _;

/// Builder for a multipart request body.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        // Timestamp-seeded boundary. Collisions with part content are
        // theoretically possible but the payloads here are text and small
        // binary files, and the marker string never occurs in them.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        Self {
            boundary: format!("----botdesk-{nanos:08x}"),
            body: Vec::new(),
        }
    }

    /// Append a plain text field.
    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        let mut header = String::new();
        let _ = write!(
            header,
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n",
            self.boundary
        );
        self.body.extend_from_slice(header.as_bytes());
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Append a file field with an explicit filename and content type.
    pub fn file(&mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> &mut Self {
        let mut header = String::new();
        let _ = write!(
            header,
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
            self.boundary
        );
        self.body.extend_from_slice(header.as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Close the body and return `(content_type_header, body_bytes)`.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        let closing = format!("--{}--\r\n", self.boundary);
        self.body.extend_from_slice(closing.as_bytes());
        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        (content_type, self.body)
    }
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_contains_all_parts_and_closing_delimiter() {
        let mut form = MultipartForm::new();
        form.text("clientId", "c1")
            .file("file", "notes.txt", "text/plain", b"hello world");
        let (content_type, body) = form.finish();

        let boundary = content_type
            .split("boundary=")
            .nth(1)
            .expect("boundary in content type");
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains(&format!("--{boundary}\r\n")));
        assert!(text.contains("name=\"clientId\"\r\n\r\nc1\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"notes.txt\""));
        assert!(text.contains("Content-Type: text/plain"));
        assert!(text.contains("hello world"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn text_only_form_is_well_formed() {
        let mut form = MultipartForm::new();
        form.text("section", "faq");
        let (_, body) = form.finish();
        let text = String::from_utf8_lossy(&body);

        // Exactly one opening and one closing delimiter.
        assert_eq!(text.matches("Content-Disposition").count(), 1);
        assert!(text.contains("faq\r\n--"));
    }
}

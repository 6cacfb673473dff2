//! Rendering of [`Message`] into a lettre message.

use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment, Mailboxes, MessageBuilder, MultiPart, SinglePart};

use crate::errors::{MailError, MailErrorKind, MailResult};
use crate::message::{Body, FilePart, Message};

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy)]
enum AddressHeader {
    From,
    Sender,
    To,
    Cc,
    Bcc,
    ReplyTo,
}

impl AddressHeader {
    fn parse(name: &str) -> Option<Self> {
        [
            ("From", AddressHeader::From),
            ("Sender", AddressHeader::Sender),
            ("To", AddressHeader::To),
            ("Cc", AddressHeader::Cc),
            ("Bcc", AddressHeader::Bcc),
            ("Reply-To", AddressHeader::ReplyTo),
        ]
        .into_iter()
        .find(|(header, _)| header.eq_ignore_ascii_case(name))
        .map(|(_, kind)| kind)
    }

    fn apply(self, builder: MessageBuilder, values: &[String]) -> MailResult<MessageBuilder> {
        let mut builder = builder;
        for value in values {
            let mailboxes: Mailboxes = value.parse().map_err(|e| {
                MailError::address(format!("cannot parse address '{}': {}", value, e)).with_cause(e)
            })?;
            for mailbox in mailboxes {
                builder = match self {
                    AddressHeader::From => builder.from(mailbox),
                    AddressHeader::Sender => builder.sender(mailbox),
                    AddressHeader::To => builder.to(mailbox),
                    AddressHeader::Cc => builder.cc(mailbox),
                    AddressHeader::Bcc => builder.bcc(mailbox),
                    AddressHeader::ReplyTo => builder.reply_to(mailbox),
                };
            }
        }
        Ok(builder)
    }
}

/// Converts a message into a lettre message, reading attached and embedded
/// files from disk.
///
/// Address headers become mailboxes (and therefore the envelope), `Subject`
/// is set natively, and every other header is written as is with multiple
/// values joined by `", "`. Headers with no values are skipped.
pub async fn render(message: &Message) -> MailResult<lettre::Message> {
    let mut builder = lettre::Message::builder();

    for (name, values) in message.headers() {
        if values.is_empty() {
            continue;
        }

        if let Some(header) = AddressHeader::parse(name) {
            builder = header.apply(builder, values)?;
        } else if name.eq_ignore_ascii_case("Subject") {
            builder = builder.subject(values.join(" "));
        } else {
            let header_name = HeaderName::new_from_ascii(name.to_string()).map_err(|e| {
                MailError::header(format!("invalid header name '{}': {}", name, e))
            })?;
            builder = builder.raw_header(HeaderValue::new(header_name, values.join(", ")));
        }
    }

    let body = body_part(message.body())?;

    let mut inline = Vec::new();
    for part in message.embedded() {
        inline.push(file_part(part).await?);
    }

    let mut attached = Vec::new();
    for part in message.attachments() {
        attached.push(file_part(part).await?);
    }

    let built = match (inline.is_empty(), attached.is_empty()) {
        (true, true) => builder.singlepart(body),
        (false, true) => builder.multipart(related(body, inline)),
        (true, false) => builder.multipart(append(MultiPart::mixed().singlepart(body), attached)),
        (false, false) => builder.multipart(append(
            MultiPart::mixed().multipart(related(body, inline)),
            attached,
        )),
    };

    built.map_err(|e| {
        MailError::new(MailErrorKind::EncodingFailed, format!("cannot build message: {}", e))
            .with_cause(e)
    })
}

fn related(body: SinglePart, inline: Vec<SinglePart>) -> MultiPart {
    append(MultiPart::related().singlepart(body), inline)
}

fn append(multipart: MultiPart, parts: Vec<SinglePart>) -> MultiPart {
    parts
        .into_iter()
        .fold(multipart, |multipart, part| multipart.singlepart(part))
}

fn body_part(body: Option<&Body>) -> MailResult<SinglePart> {
    let Some(body) = body else {
        return Ok(SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(String::new()));
    };

    let content_type = if body.content_type.eq_ignore_ascii_case(mime::TEXT_HTML.essence_str()) {
        ContentType::TEXT_HTML
    } else if body.content_type.eq_ignore_ascii_case(mime::TEXT_PLAIN.essence_str()) {
        ContentType::TEXT_PLAIN
    } else {
        ContentType::parse(&body.content_type).map_err(|e| {
            MailError::header(format!("invalid body content type '{}': {}", body.content_type, e))
        })?
    };

    Ok(SinglePart::builder()
        .header(content_type)
        .body(body.content.clone()))
}

async fn file_part(part: &FilePart) -> MailResult<SinglePart> {
    let data = tokio::fs::read(&part.path).await.map_err(|e| {
        MailError::attachment(format!("cannot read {}: {}", part.path.display(), e)).with_cause(e)
    })?;

    let file_name = part.file_name();
    let guessed = mime_guess::from_path(&file_name).first_or_octet_stream();
    let content_type = ContentType::parse(guessed.essence_str())
        .or_else(|_| ContentType::parse(OCTET_STREAM))
        .map_err(|e| {
            MailError::new(
                MailErrorKind::EncodingFailed,
                format!("no content type for {}: {}", file_name, e),
            )
        })?;

    let attachment = if part.is_inline() {
        Attachment::new_inline(file_name)
    } else {
        Attachment::new(file_name)
    };
    Ok(attachment.body(data, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn formatted(email: &lettre::Message) -> String {
        String::from_utf8_lossy(&email.formatted()).into_owned()
    }

    fn base_message() -> Message {
        let mut message = Message::new();
        message
            .set_header("From", ["a@x.com"])
            .set_header("To", ["\"Bob\" <b@x.com>"])
            .set_header("Subject", ["Hi"]);
        message
    }

    #[tokio::test]
    async fn test_render_headers_and_envelope() {
        let mut message = base_message();
        message
            .set_header("Cc", ["c@x.com", "\"Dee\" <d@x.com>"])
            .set_header("X-Priority", ["1"])
            .set_body("text/plain", "hello");

        let email = render(&message).await.unwrap();
        let text = formatted(&email);

        assert!(text.contains("From: a@x.com"));
        assert!(text.contains("Bob"));
        assert!(text.contains("<b@x.com>"));
        assert!(text.contains("Subject: Hi"));
        assert!(text.contains("X-Priority: 1"));
        assert!(text.contains("text/plain"));
        assert!(text.contains("hello"));

        let recipients: Vec<String> = email.envelope().to().iter().map(|a| a.to_string()).collect();
        assert!(recipients.contains(&"b@x.com".to_string()));
        assert!(recipients.contains(&"c@x.com".to_string()));
        assert!(recipients.contains(&"d@x.com".to_string()));
    }

    #[tokio::test]
    async fn test_render_joins_custom_header_values() {
        let mut message = base_message();
        message.set_header("X-Tags", ["a", "b"]);

        let text = formatted(&render(&message).await.unwrap());
        assert!(text.contains("X-Tags: a, b"));
    }

    #[tokio::test]
    async fn test_render_skips_empty_headers() {
        let mut message = base_message();
        message.set_header("Cc", Vec::<String>::new());

        let text = formatted(&render(&message).await.unwrap());
        assert!(!text.contains("Cc:"));
    }

    #[tokio::test]
    async fn test_render_html_body() {
        let mut message = base_message();
        message.set_body("text/html", "<p>hello</p>");

        let text = formatted(&render(&message).await.unwrap());
        assert!(text.contains("text/html"));
    }

    #[tokio::test]
    async fn test_render_without_body() {
        let message = base_message();
        assert!(render(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_render_invalid_address() {
        let mut message = base_message();
        message.set_header("To", ["not an address"]);

        let err = render(&message).await.unwrap_err();
        assert_eq!(err.kind(), MailErrorKind::InvalidAddress);
    }

    #[tokio::test]
    async fn test_render_invalid_header_name() {
        let mut message = base_message();
        message.set_header("X-Bad:Name", ["1"]);

        let err = render(&message).await.unwrap_err();
        assert_eq!(err.kind(), MailErrorKind::InvalidHeader);
    }

    #[tokio::test]
    async fn test_render_parts_with_renames() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("q3-final.txt");
        let logo = dir.path().join("logo-large.png");
        std::fs::File::create(&report).unwrap().write_all(b"figures").unwrap();
        std::fs::File::create(&logo).unwrap().write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let mut message = base_message();
        message
            .set_body("text/html", "<img src=\"cid:brand.png\">")
            .attach(&report, Some("report.txt"))
            .embed(&logo, Some("brand.png"));

        let text = formatted(&render(&message).await.unwrap());
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("multipart/related"));
        assert!(text.contains("report.txt"));
        assert!(text.contains("<brand.png>"));
        assert!(!text.contains("q3-final.txt"));
        assert!(!text.contains("logo-large.png"));
    }

    #[tokio::test]
    async fn test_render_missing_file() {
        let mut message = base_message();
        message.embed("/nonexistent/logo.png", None);

        let err = render(&message).await.unwrap_err();
        assert_eq!(err.kind(), MailErrorKind::AttachmentError);
    }
}

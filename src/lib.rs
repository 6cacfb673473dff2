//! # Mail Profiles
//!
//! Named mail profiles loaded from JSON and sent over SMTP:
//! - Profiles describe server, credentials, identities, subject, body,
//!   attachments and priority
//! - A registry indexes profiles by name (later duplicates win)
//! - The mailer translates a profile into a message and delivers it in a
//!   single attempt through `lettre`
//! - TLS certificate checks are on unless the caller opts out
//! - Profiles tagged `debug` are dumped, with secrets redacted, before sending
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_mail_profiles::{MailBox, Mailer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = MailBox::from_path("mail.json")?.registry();
//!
//!     let mailer = Mailer::new();
//!     mailer.send_named(&registry, "welcome", None).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod message;

// Transport layer
pub mod transport;

// Observability
pub mod observability;

// Client
pub mod client;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use client::{Mailer, MailerBuilder};
pub use config::{AttachmentSpec, Contact, MailBody, MailBox, MailConfig, Registry, TlsPolicy};
pub use errors::{MailError, MailErrorKind, MailResult};
pub use message::{Body, FilePart, Message, PartDisposition};
pub use observability::{LogEntry, LogLevel, LogSink, TracingSink};
pub use transport::{Dialer, ServerSettings, SmtpDialer, TlsMode};

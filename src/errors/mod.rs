//! Error types for mail profiles.
//!
//! Every failure carries a [`MailErrorKind`], a human-readable message and,
//! when the transport reported one, the SMTP status code.

use std::fmt;
use thiserror::Error;

/// Result type for mail operations.
pub type MailResult<T> = Result<T, MailError>;

/// Mail error kinds categorizing different failure modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailErrorKind {
    // Registry errors
    /// No configuration with the requested name.
    ConfigNotFound,
    /// Configuration could not be read, parsed or validated.
    ConfigurationInvalid,

    // Message errors
    /// Address could not be parsed into a mailbox.
    InvalidAddress,
    /// Header name or value is not representable.
    InvalidHeader,
    /// Attachment or embedded file could not be read.
    AttachmentError,
    /// Message could not be assembled.
    EncodingFailed,

    // Transport errors
    /// Connection or command timed out.
    ConnectionTimeout,
    /// Server rejected the credentials.
    AuthenticationFailed,
    /// Server answered with a negative reply.
    TransportRejected,
    /// Any other dial, TLS or network failure.
    TransportError,
}

impl MailErrorKind {
    /// Returns true if the error came from dialing or talking to the server.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MailErrorKind::ConnectionTimeout
                | MailErrorKind::AuthenticationFailed
                | MailErrorKind::TransportRejected
                | MailErrorKind::TransportError
        )
    }
}

impl fmt::Display for MailErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailErrorKind::ConfigNotFound => write!(f, "Configuration not found"),
            MailErrorKind::ConfigurationInvalid => write!(f, "Invalid configuration"),
            MailErrorKind::InvalidAddress => write!(f, "Invalid address"),
            MailErrorKind::InvalidHeader => write!(f, "Invalid header"),
            MailErrorKind::AttachmentError => write!(f, "Attachment error"),
            MailErrorKind::EncodingFailed => write!(f, "Encoding failed"),
            MailErrorKind::ConnectionTimeout => write!(f, "Connection timed out"),
            MailErrorKind::AuthenticationFailed => write!(f, "Authentication failed"),
            MailErrorKind::TransportRejected => write!(f, "Rejected by server"),
            MailErrorKind::TransportError => write!(f, "Transport error"),
        }
    }
}

/// Mail error with detailed information.
#[derive(Error, Debug)]
pub struct MailError {
    kind: MailErrorKind,
    message: String,
    smtp_code: Option<u16>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl MailError {
    /// Creates a new mail error.
    pub fn new(kind: MailErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            smtp_code: None,
            cause: None,
        }
    }

    /// Sets the SMTP status code.
    pub fn with_smtp_code(mut self, code: u16) -> Self {
        self.smtp_code = Some(code);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: std::error::Error + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> MailErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the SMTP status code if available.
    pub fn smtp_code(&self) -> Option<u16> {
        self.smtp_code
    }

    // Convenience constructors

    /// Creates a lookup miss for the named configuration.
    pub fn not_found(name: &str) -> Self {
        Self::new(
            MailErrorKind::ConfigNotFound,
            format!("no mail configuration named '{}'", name),
        )
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::ConfigurationInvalid, message)
    }

    /// Creates an address error.
    pub fn address(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::InvalidAddress, message)
    }

    /// Creates a header error.
    pub fn header(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::InvalidHeader, message)
    }

    /// Creates an attachment error.
    pub fn attachment(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::AttachmentError, message)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(MailErrorKind::TransportError, message)
    }

    /// Creates an error from an SMTP reply code.
    pub fn from_smtp_response(code: u16, message: impl Into<String>) -> Self {
        let kind = match code {
            530 | 534 | 535 => MailErrorKind::AuthenticationFailed,
            400..=599 => MailErrorKind::TransportRejected,
            _ => MailErrorKind::TransportError,
        };
        Self::new(kind, message).with_smtp_code(code)
    }
}

impl fmt::Display for MailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(code) = self.smtp_code {
            write!(f, " (SMTP {})", code)?;
        }
        Ok(())
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        let code = err
            .status()
            .and_then(|status| status.to_string().parse::<u16>().ok());
        let message = err.to_string();

        let mapped = match code {
            _ if err.is_timeout() => MailError::new(MailErrorKind::ConnectionTimeout, message),
            Some(code) => MailError::from_smtp_response(code, message),
            None => MailError::transport(message),
        };
        mapped.with_cause(err)
    }
}

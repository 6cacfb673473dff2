//! Transport layer.
//!
//! Dialing, TLS and SMTP delivery are delegated to `lettre`. This module
//! owns the [`Dialer`] seam the mailer talks to and the lettre-backed
//! [`SmtpDialer`].

mod render;

pub use render::render;

use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{MailConfig, TlsPolicy, DEFAULT_CONNECT_TIMEOUT, IMPLICIT_TLS_PORT};
use crate::errors::{MailError, MailResult};
use crate::message::Message;

/// Server coordinates and credentials taken from a profile.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Username; empty skips authentication.
    pub username: String,
    /// Password.
    pub password: SecretString,
}

impl ServerSettings {
    /// Returns true if credentials should be presented to the server.
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }

    /// Returns true if the port expects TLS from the first byte.
    pub fn is_implicit_tls(&self) -> bool {
        self.port == IMPLICIT_TLS_PORT
    }

    /// Returns the full server address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&MailConfig> for ServerSettings {
    fn from(config: &MailConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

/// How TLS is negotiated on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte.
    Wrapper,
    /// STARTTLS; the delivery fails if the server does not offer it.
    Required,
    /// STARTTLS when offered, plaintext otherwise.
    Opportunistic,
}

impl TlsMode {
    /// Picks the mode for a server. Credentials never cross a plaintext
    /// connection unless the policy is [`TlsPolicy::AcceptInvalidCerts`].
    pub fn select(server: &ServerSettings, policy: TlsPolicy) -> Self {
        if server.is_implicit_tls() {
            TlsMode::Wrapper
        } else if server.has_auth() && !policy.is_insecure() {
            TlsMode::Required
        } else {
            TlsMode::Opportunistic
        }
    }
}

/// Delivers a finished message to a server.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connects to the server, authenticates if configured and sends the
    /// message in a single attempt.
    async fn dial_and_send(
        &self,
        server: &ServerSettings,
        tls: TlsPolicy,
        message: &Message,
    ) -> MailResult<()>;
}

/// Dialer backed by lettre's async SMTP transport. A new transport is built
/// for every call.
#[derive(Debug, Clone)]
pub struct SmtpDialer {
    timeout: Option<Duration>,
}

impl SmtpDialer {
    /// Creates a dialer with the default connect timeout.
    pub fn new() -> Self {
        Self {
            timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Sets the connect timeout; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the lettre transport for one delivery.
    pub fn transport(
        &self,
        server: &ServerSettings,
        policy: TlsPolicy,
    ) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let parameters = TlsParameters::builder(server.host.clone())
            .dangerous_accept_invalid_certs(policy.is_insecure())
            .dangerous_accept_invalid_hostnames(policy.is_insecure())
            .build()
            .map_err(|e| MailError::transport(format!("invalid TLS parameters: {}", e)).with_cause(e))?;

        let tls = match TlsMode::select(server, policy) {
            TlsMode::Wrapper => Tls::Wrapper(parameters),
            TlsMode::Required => Tls::Required(parameters),
            TlsMode::Opportunistic => Tls::Opportunistic(parameters),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server.host.as_str())
            .port(server.port)
            .tls(tls)
            .timeout(self.timeout);

        if server.has_auth() {
            builder = builder.credentials(Credentials::new(
                server.username.clone(),
                server.password.expose_secret().clone(),
            ));
        }

        Ok(builder.build())
    }
}

impl Default for SmtpDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for SmtpDialer {
    async fn dial_and_send(
        &self,
        server: &ServerSettings,
        tls: TlsPolicy,
        message: &Message,
    ) -> MailResult<()> {
        let email = render(message).await?;
        let transport = self.transport(server, tls)?;

        tracing::debug!(
            server = %server.address(),
            insecure_tls = tls.is_insecure(),
            tls_mode = ?TlsMode::select(server, tls),
            "dialing SMTP server"
        );

        let response = transport.send(email).await?;
        tracing::debug!(
            server = %server.address(),
            code = %response.code(),
            "message accepted"
        );
        Ok(())
    }
}

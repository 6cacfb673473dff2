//! Profile-driven mailer.
//!
//! [`Mailer`] translates a [`MailConfig`] into a [`Message`] and hands it to
//! a [`Dialer`] in a single attempt. It holds no per-send state and can be
//! shared across tasks.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{Contact, MailConfig, Registry, TlsPolicy};
use crate::errors::MailResult;
use crate::message::Message;
use crate::observability::{LogEntry, LogLevel, LogSink, MailMetrics, MetricsSnapshot, TracingSink};
use crate::transport::{Dialer, ServerSettings, SmtpDialer};

/// Header carrying the send time in RFC 2822 form.
pub const X_DATE: &str = "X-Date";
/// Header carrying the send time in [`crate::message::DATE_FORMAT`] form.
pub const X_DATE_2: &str = "X-Date-2";
/// Header carrying the profile priority.
pub const X_PRIORITY: &str = "X-Priority";

/// Mailer that sends messages described by mail profiles.
#[derive(Clone)]
pub struct Mailer {
    dialer: Arc<dyn Dialer>,
    tls_policy: TlsPolicy,
    log_sink: Arc<dyn LogSink>,
    metrics: Arc<MailMetrics>,
}

impl Mailer {
    /// Creates a mailer that delivers over SMTP with certificate
    /// verification enabled.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new mailer builder.
    pub fn builder() -> MailerBuilder {
        MailerBuilder::default()
    }

    /// Returns the TLS policy used for every send.
    pub fn tls_policy(&self) -> TlsPolicy {
        self.tls_policy
    }

    /// Returns a snapshot of the send counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fills a message from a profile, stamped with the current time.
    ///
    /// The supplied message is used as the starting point when given;
    /// headers the profile sets replace existing values.
    pub fn compose(&self, config: &MailConfig, message: Option<Message>) -> Message {
        self.compose_at(config, message, Utc::now())
    }

    /// Fills a message from a profile, stamped with `now`.
    pub fn compose_at(&self, config: &MailConfig, message: Option<Message>, now: DateTime<Utc>) -> Message {
        let mut message = message.unwrap_or_default();

        if let Some(sender) = &config.sender {
            let value = format_contact(&message, sender);
            message.set_header("Sender", [value]);
        }

        let from = format_contact(&message, &config.from);
        message.set_header("From", [from]);

        set_contacts(&mut message, "To", config.to.as_deref());
        set_contacts(&mut message, "Reply-To", config.reply_to.as_deref());
        set_contacts(&mut message, "Cc", config.cc.as_deref());
        set_contacts(&mut message, "Bcc", config.bcc.as_deref());

        message.set_date_header(X_DATE, &now);
        let rendered = message.format_date(&now);
        message.set_header(X_DATE_2, [rendered]);

        if let Some(priority) = config.priority {
            message.set_header(X_PRIORITY, [priority.to_string()]);
        }

        if let Some(subject) = &config.subject {
            message.set_header("Subject", [subject.as_str()]);
        }

        if let Some(body) = &config.body {
            let content_type = if body.is_html {
                mime::TEXT_HTML.essence_str()
            } else {
                mime::TEXT_PLAIN.essence_str()
            };
            message.set_body(content_type, body.content.as_str());
        }

        for attachment in config.attachments.iter().flatten() {
            let rename = attachment.name.as_deref();
            if attachment.is_embed {
                message.embed(&attachment.path, rename);
            } else {
                message.attach(&attachment.path, rename);
            }
        }

        message
    }

    /// Translates a profile into a message and sends it.
    ///
    /// Profiles tagged `debug` are dumped to the log sink, with the password
    /// redacted, before the profile is validated and the transport dialed.
    pub async fn send(&self, config: &MailConfig, message: Option<Message>) -> MailResult<()> {
        let message = self.compose(config, message);
        self.deliver(config, &message).await
    }

    /// Looks up a profile by name and sends it.
    pub async fn send_named(
        &self,
        registry: &Registry,
        name: &str,
        message: Option<Message>,
    ) -> MailResult<()> {
        let config = registry.lookup(name)?;
        self.send(config, message).await
    }

    /// Sends an already composed message to the profile's server.
    pub async fn deliver(&self, config: &MailConfig, message: &Message) -> MailResult<()> {
        let result = self.try_deliver(config, message).await;
        match &result {
            Ok(()) => {
                self.metrics.record_send_success();
                tracing::info!(profile = %config.name, "mail sent");
            }
            Err(e) => {
                self.metrics.record_send_failure();
                tracing::warn!(profile = %config.name, error = %e, "mail send failed");
            }
        }
        result
    }

    async fn try_deliver(&self, config: &MailConfig, message: &Message) -> MailResult<()> {
        if config.is_debug() {
            self.dump_config(config)?;
        }

        config.validate()?;

        let server = ServerSettings::from(config);
        self.dialer
            .dial_and_send(&server, self.tls_policy, message)
            .await
    }

    fn dump_config(&self, config: &MailConfig) -> MailResult<()> {
        let json = config.to_redacted_json()?;
        let entry = LogEntry::new(LogLevel::Debug, "mail configuration")
            .with_field("profile", config.name.as_str())
            .with_field("config", json);
        self.log_sink.write(&entry);
        self.metrics.record_debug_dump();
        Ok(())
    }
}

impl Default for Mailer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("tls_policy", &self.tls_policy)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

fn format_contact(message: &Message, contact: &Contact) -> String {
    match &contact.name {
        Some(name) => message.format_address(&contact.address, name),
        None => contact.address.clone(),
    }
}

fn set_contacts(message: &mut Message, header: &str, contacts: Option<&[Contact]>) {
    let Some(contacts) = contacts else {
        return;
    };
    let values: Vec<String> = contacts
        .iter()
        .map(|contact| format_contact(message, contact))
        .collect();
    message.set_header(header, values);
}

/// Builder for [`Mailer`].
#[derive(Default)]
pub struct MailerBuilder {
    dialer: Option<Arc<dyn Dialer>>,
    tls_policy: TlsPolicy,
    log_sink: Option<Arc<dyn LogSink>>,
}

impl MailerBuilder {
    /// Sets the dialer (defaults to [`SmtpDialer`]).
    pub fn dialer(mut self, dialer: impl Dialer + 'static) -> Self {
        self.dialer = Some(Arc::new(dialer));
        self
    }

    /// Sets a shared dialer.
    pub fn shared_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Sets the TLS policy (defaults to [`TlsPolicy::Verify`]).
    pub fn tls_policy(mut self, policy: TlsPolicy) -> Self {
        self.tls_policy = policy;
        self
    }

    /// Accepts invalid certificates and hostnames. Insecure.
    pub fn accept_invalid_certs(mut self) -> Self {
        self.tls_policy = TlsPolicy::AcceptInvalidCerts;
        self
    }

    /// Sets the sink for configuration dumps (defaults to [`TracingSink`]).
    pub fn log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Some(Arc::new(sink));
        self
    }

    /// Sets a shared log sink.
    pub fn shared_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Builds the mailer.
    pub fn build(self) -> Mailer {
        if self.tls_policy.is_insecure() {
            tracing::warn!("mailer accepts invalid TLS certificates");
        }

        Mailer {
            dialer: self.dialer.unwrap_or_else(|| Arc::new(SmtpDialer::new())),
            tls_policy: self.tls_policy,
            log_sink: self.log_sink.unwrap_or_else(|| Arc::new(TracingSink)),
            metrics: Arc::new(MailMetrics::new()),
        }
    }
}

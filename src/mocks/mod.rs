//! Mock implementations for testing.
//!
//! Provides a recording dialer, an in-memory log sink and fixture profiles.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::{Contact, MailBody, MailConfig, TlsPolicy};
use crate::errors::{MailError, MailResult};
use crate::message::Message;
use crate::observability::{LogEntry, LogSink};
use crate::transport::{Dialer, ServerSettings};

/// One delivery recorded by [`MockDialer`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// Server the message was addressed to.
    pub server: ServerSettings,
    /// TLS policy in effect.
    pub tls: TlsPolicy,
    /// The message as handed to the dialer.
    pub message: Message,
}

/// Dialer that records deliveries instead of connecting anywhere.
///
/// Clones share their recordings and queued failures.
#[derive(Debug, Clone, Default)]
pub struct MockDialer {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    failures: Arc<Mutex<VecDeque<MailError>>>,
    attempts: Arc<Mutex<usize>>,
}

impl MockDialer {
    /// Creates a new mock dialer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next delivery fail with `error`. Failures queue up.
    pub fn fail_next_with(&self, error: MailError) -> &Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    /// Returns the successful deliveries.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the most recent successful delivery.
    pub fn last(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Returns how many deliveries were attempted, failed ones included.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Clears recorded data.
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.failures.lock().unwrap().clear();
        *self.attempts.lock().unwrap() = 0;
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial_and_send(
        &self,
        server: &ServerSettings,
        tls: TlsPolicy,
        message: &Message,
    ) -> MailResult<()> {
        *self.attempts.lock().unwrap() += 1;

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.sent.lock().unwrap().push(SentMessage {
            server: server.clone(),
            tls,
            message: message.clone(),
        });
        Ok(())
    }
}

/// Log sink that keeps entries in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    /// Creates a new sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

/// The `welcome` profile: plain text greeting from a@x.com to Bob.
pub fn welcome_config() -> MailConfig {
    let mut config = MailConfig::new("welcome", "smtp.example.com", 587, Contact::new("a@x.com"))
        .with_credentials("u", "p");
    config.to = Some(vec![Contact::with_name("b@x.com", "Bob")]);
    config.subject = Some("Hi".to_string());
    config.body = Some(MailBody {
        is_html: false,
        content: "hello".to_string(),
    });
    config
}

//! Mail profile configuration.
//!
//! Provides:
//! - [`MailConfig`], one named profile (server, identities, content)
//! - [`MailBox`], the ordered list of profiles as loaded from JSON
//! - [`Registry`], profiles indexed by name
//! - [`TlsPolicy`], the certificate trust policy used when dialing

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::{MailError, MailResult};

/// Environment tag that turns on the configuration dump before sending.
pub const DEBUG_ENV: &str = "debug";

/// Placeholder written instead of secrets when a configuration is dumped.
pub const REDACTED: &str = "[REDACTED]";

/// Port that expects TLS from the first byte instead of STARTTLS.
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Default connect timeout for the SMTP transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Certificate trust policy for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Verify the server certificate and hostname.
    #[default]
    Verify,
    /// Accept any certificate and hostname. Disables protection against
    /// man-in-the-middle attacks.
    AcceptInvalidCerts,
}

impl TlsPolicy {
    /// Returns true if certificate checks are skipped.
    pub fn is_insecure(&self) -> bool {
        matches!(self, TlsPolicy::AcceptInvalidCerts)
    }
}

/// Email address with optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    /// Email address (e.g., "john@example.com").
    pub address: String,
    /// Display name (e.g., "John Doe").
    #[serde(default)]
    pub name: Option<String>,
}

impl Contact {
    /// Creates a contact with just an address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Creates a contact with a display name.
    pub fn with_name(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailBody {
    /// Send as `text/html` instead of `text/plain`.
    #[serde(default)]
    pub is_html: bool,
    /// Body content.
    #[serde(default)]
    pub content: String,
}

/// File attached to or embedded in the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSpec {
    /// Path of the file to read at send time.
    pub path: PathBuf,
    /// Name the part is given in the message, instead of the file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Embed inline (referenceable by content ID) instead of attaching.
    #[serde(default)]
    pub is_embed: bool,
}

/// One named mail profile.
///
/// List fields distinguish absent (`None`) from empty (`Some(vec![])`):
/// an absent list never touches its header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Registry key.
    pub name: String,
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Authentication username; empty skips authentication.
    #[serde(default)]
    pub username: String,
    /// Authentication password. Hidden from `Debug`; see
    /// [`MailConfig::to_redacted_json`] for dumps.
    #[serde(default = "empty_secret", serialize_with = "serialize_secret")]
    pub password: SecretString,
    /// Value of the `X-Priority` header.
    #[serde(default)]
    pub priority: Option<i64>,
    /// Value of the `Subject` header.
    #[serde(default)]
    pub subject: Option<String>,
    /// Value of the `Sender` header.
    #[serde(default)]
    pub sender: Option<Contact>,
    /// Value of the `From` header.
    pub from: Contact,
    /// Primary recipients.
    #[serde(default)]
    pub to: Option<Vec<Contact>>,
    /// Reply-to addresses.
    #[serde(default)]
    pub reply_to: Option<Vec<Contact>>,
    /// CC recipients.
    #[serde(default)]
    pub cc: Option<Vec<Contact>>,
    /// BCC recipients.
    #[serde(default)]
    pub bcc: Option<Vec<Contact>>,
    /// Message body.
    #[serde(default)]
    pub body: Option<MailBody>,
    /// Files to attach or embed.
    #[serde(default)]
    pub attachments: Option<Vec<AttachmentSpec>>,
    /// Environment tag; [`DEBUG_ENV`] dumps the profile before sending.
    #[serde(default)]
    pub env: String,
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn serialize_secret<S>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.expose_secret())
}

impl MailConfig {
    /// Creates a profile with the mandatory fields set and everything else absent.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        from: Contact,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            username: String::new(),
            password: empty_secret(),
            priority: None,
            subject: None,
            sender: None,
            from,
            to: None,
            reply_to: None,
            cc: None,
            bcc: None,
            body: None,
            attachments: None,
            env: String::new(),
        }
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = SecretString::new(password.into());
        self
    }

    /// Parses a single profile from JSON.
    pub fn from_json_str(json: &str) -> MailResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            MailError::configuration(format!("invalid mail configuration: {}", e)).with_cause(e)
        })
    }

    /// Validates the fields the transport cannot do without.
    pub fn validate(&self) -> MailResult<()> {
        if self.host.is_empty() {
            return Err(MailError::configuration(format!(
                "mail configuration '{}' has no host",
                self.name
            )));
        }

        if self.port == 0 {
            return Err(MailError::configuration(format!(
                "mail configuration '{}' has port 0",
                self.name
            )));
        }

        if self.from.address.is_empty() {
            return Err(MailError::configuration(format!(
                "mail configuration '{}' has no from address",
                self.name
            )));
        }

        Ok(())
    }

    /// Returns true if the profile asks for the debug dump.
    pub fn is_debug(&self) -> bool {
        self.env == DEBUG_ENV
    }

    /// Returns the password.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Serializes the profile to JSON with secrets replaced by [`REDACTED`].
    pub fn to_redacted_json(&self) -> MailResult<String> {
        let encode_failed = |e: serde_json::Error| {
            MailError::configuration(format!("cannot serialize mail configuration: {}", e))
                .with_cause(e)
        };

        let mut value = serde_json::to_value(self).map_err(encode_failed)?;
        if let Some(password) = value.get_mut("password") {
            *password = serde_json::Value::String(REDACTED.to_string());
        }
        serde_json::to_string(&value).map_err(encode_failed)
    }
}

/// Profiles in declaration order, as loaded from a configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailBox {
    /// Profiles.
    #[serde(alias = "Mails")]
    pub mails: Vec<MailConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MailBoxDocument {
    Wrapped(MailBox),
    Bare(Vec<MailConfig>),
}

impl From<MailBoxDocument> for MailBox {
    fn from(doc: MailBoxDocument) -> Self {
        match doc {
            MailBoxDocument::Wrapped(mailbox) => mailbox,
            MailBoxDocument::Bare(mails) => MailBox { mails },
        }
    }
}

impl MailBox {
    /// Creates a mailbox from profiles.
    pub fn new(mails: Vec<MailConfig>) -> Self {
        Self { mails }
    }

    /// Parses `{"mails": [...]}` or a bare `[...]` of profiles.
    pub fn from_json_str(json: &str) -> MailResult<Self> {
        serde_json::from_str::<MailBoxDocument>(json)
            .map(MailBox::from)
            .map_err(|e| {
                MailError::configuration(format!("invalid mail configuration file: {}", e))
                    .with_cause(e)
            })
    }

    /// Parses profiles from a reader.
    pub fn from_reader<R: Read>(reader: R) -> MailResult<Self> {
        serde_json::from_reader::<_, MailBoxDocument>(reader)
            .map(MailBox::from)
            .map_err(|e| {
                MailError::configuration(format!("invalid mail configuration file: {}", e))
                    .with_cause(e)
            })
    }

    /// Reads profiles from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> MailResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MailError::configuration(format!("cannot open {}: {}", path.display(), e))
                .with_cause(e)
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Indexes the profiles by name.
    pub fn registry(self) -> Registry {
        Registry::load(self.mails)
    }
}

/// Profiles indexed by name. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    mails: HashMap<String, MailConfig>,
}

impl Registry {
    /// Indexes profiles in order; a later profile replaces an earlier one
    /// with the same name.
    pub fn load(configs: impl IntoIterator<Item = MailConfig>) -> Self {
        let mut mails = HashMap::new();
        for config in configs {
            if mails.contains_key(&config.name) {
                tracing::debug!(name = %config.name, "replacing earlier mail configuration with the same name");
            }
            mails.insert(config.name.clone(), config);
        }
        Self { mails }
    }

    /// Returns the profile with the given name.
    pub fn lookup(&self, name: &str) -> MailResult<&MailConfig> {
        self.get(name).ok_or_else(|| MailError::not_found(name))
    }

    /// Returns the profile with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&MailConfig> {
        self.mails.get(name)
    }

    /// Returns the profile names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.mails.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of profiles.
    pub fn len(&self) -> usize {
        self.mails.len()
    }

    /// Returns true if no profile is loaded.
    pub fn is_empty(&self) -> bool {
        self.mails.is_empty()
    }

    /// Iterates over the profiles in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &MailConfig> {
        self.mails.values()
    }
}

impl From<MailBox> for Registry {
    fn from(mailbox: MailBox) -> Self {
        mailbox.registry()
    }
}

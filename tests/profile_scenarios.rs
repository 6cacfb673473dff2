//! End-to-end scenarios: JSON profiles through the mailer to rendered mail.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use integrations_mail_profiles::mocks::{MemorySink, MockDialer};
use integrations_mail_profiles::transport::render;
use integrations_mail_profiles::{
    Dialer, MailBox, MailErrorKind, MailResult, Mailer, Message, Registry, ServerSettings,
    TlsPolicy,
};

const PROFILES: &str = r#"{
    "mails": [
        {
            "name": "welcome",
            "host": "old.example.com",
            "port": 25,
            "username": "",
            "password": "",
            "from": {"address": "old@x.com", "name": null},
            "env": ""
        },
        {
            "name": "welcome",
            "host": "smtp.example.com",
            "port": 587,
            "username": "u",
            "password": "p",
            "priority": null,
            "subject": "Hi",
            "sender": null,
            "from": {"address": "a@x.com", "name": null},
            "to": [{"address": "b@x.com", "name": "Bob"}],
            "reply_to": null,
            "cc": null,
            "bcc": null,
            "body": {"is_html": false, "content": "hello"},
            "attachments": null,
            "env": "prod"
        },
        {
            "name": "alert",
            "host": "smtp.example.com",
            "port": 465,
            "username": "alerts",
            "password": "s3cret",
            "priority": 1,
            "subject": "Disk almost full",
            "sender": {"address": "robot@x.com", "name": "Robot"},
            "from": {"address": "alerts@x.com", "name": "Alerts"},
            "to": [{"address": "oncall@x.com", "name": null}],
            "cc": [],
            "body": {"is_html": true, "content": "<b>92%</b>"},
            "env": "debug"
        }
    ]
}"#;

fn registry() -> Registry {
    MailBox::from_json_str(PROFILES).unwrap().registry()
}

#[tokio::test]
async fn welcome_profile_end_to_end() {
    let dialer = MockDialer::new();
    let sink = MemorySink::new();
    let mailer = Mailer::builder()
        .dialer(dialer.clone())
        .log_sink(sink.clone())
        .build();

    mailer.send_named(&registry(), "welcome", None).await.unwrap();

    let sent = dialer.last().unwrap();
    assert_eq!(sent.server.host, "smtp.example.com");
    assert_eq!(sent.tls, TlsPolicy::Verify);
    assert!(sink.entries().is_empty());

    let message = &sent.message;
    assert_eq!(message.header("From").unwrap(), ["a@x.com"]);
    assert_eq!(message.header("To").unwrap(), ["\"Bob\" <b@x.com>"]);
    assert_eq!(message.first_header("Subject"), Some("Hi"));
    assert!(!message.has_header("X-Priority"));
    assert!(message.has_header("X-Date"));
    assert!(message.has_header("X-Date-2"));
    assert_eq!(message.body().unwrap().content_type, "text/plain");
    assert_eq!(message.body().unwrap().content, "hello");
    assert!(message.parts().is_empty());

    let wire = render(message).await.unwrap();
    let text = String::from_utf8_lossy(&wire.formatted()).into_owned();
    assert!(text.contains("From: a@x.com"));
    assert!(text.contains("Subject: Hi"));
    assert!(text.contains("X-Date-2: "));
    assert!(text.contains("hello"));
}

#[tokio::test]
async fn debug_profile_dumps_before_sending() {
    let dialer = MockDialer::new();
    let sink = MemorySink::new();
    let mailer = Mailer::builder()
        .dialer(dialer.clone())
        .log_sink(sink.clone())
        .accept_invalid_certs()
        .build();

    mailer.send_named(&registry(), "alert", None).await.unwrap();

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    let dump = entries[0].field("config").unwrap();
    assert!(dump.contains("\"name\":\"alert\""));
    assert!(dump.contains("\"username\":\"alerts\""));
    assert!(!dump.contains("s3cret"));

    let sent = dialer.last().unwrap();
    assert_eq!(sent.tls, TlsPolicy::AcceptInvalidCerts);
    assert_eq!(sent.server.port, 465);

    let message = &sent.message;
    assert_eq!(message.header("Sender").unwrap(), ["\"Robot\" <robot@x.com>"]);
    assert_eq!(message.header("From").unwrap(), ["\"Alerts\" <alerts@x.com>"]);
    assert_eq!(message.first_header("X-Priority"), Some("1"));
    assert!(message.header("Cc").unwrap().is_empty());
    assert!(!message.has_header("Bcc"));
    assert_eq!(message.body().unwrap().content_type, "text/html");
}

/// Dialer that notes how many log entries exist at the moment it is called.
#[derive(Clone, Default)]
struct SinkWatchingDialer {
    sink: MemorySink,
    entries_at_dial: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Dialer for SinkWatchingDialer {
    async fn dial_and_send(
        &self,
        _server: &ServerSettings,
        _tls: TlsPolicy,
        _message: &Message,
    ) -> MailResult<()> {
        self.entries_at_dial
            .lock()
            .unwrap()
            .push(self.sink.entries().len());
        Ok(())
    }
}

#[tokio::test]
async fn debug_dump_is_written_before_dialing() {
    let sink = MemorySink::new();
    let dialer = SinkWatchingDialer {
        sink: sink.clone(),
        ..Default::default()
    };
    let mailer = Mailer::builder()
        .dialer(dialer.clone())
        .log_sink(sink.clone())
        .build();

    mailer.send_named(&registry(), "alert", None).await.unwrap();
    mailer.send_named(&registry(), "welcome", None).await.unwrap();

    // alert is a debug profile, welcome is not
    assert_eq!(*dialer.entries_at_dial.lock().unwrap(), vec![1, 1]);
}

#[tokio::test]
async fn debug_dump_precedes_failed_transport() {
    let dialer = MockDialer::new();
    dialer.fail_next_with(integrations_mail_profiles::MailError::from_smtp_response(
        550,
        "mailbox unavailable",
    ));
    let sink = MemorySink::new();
    let mailer = Mailer::builder()
        .dialer(dialer.clone())
        .log_sink(sink.clone())
        .build();

    let err = mailer.send_named(&registry(), "alert", None).await.unwrap_err();
    assert_eq!(err.kind(), MailErrorKind::TransportRejected);
    // a failed transport call still leaves the dump behind
    assert_eq!(sink.entries().len(), 1);
    assert_eq!(mailer.metrics().failed, 1);
}

#[tokio::test]
async fn attachments_are_renamed_and_missing_files_fail_on_render() {
    let dir = tempfile::tempdir().unwrap();
    let logo = dir.path().join("logo-2024.png");
    std::fs::File::create(&logo)
        .unwrap()
        .write_all(&[0x89, 0x50, 0x4e, 0x47])
        .unwrap();

    let json = format!(
        r#"[{{
            "name": "newsletter",
            "host": "smtp.example.com",
            "port": 587,
            "from": {{"address": "news@x.com", "name": "News"}},
            "to": [{{"address": "reader@x.com", "name": null}}],
            "body": {{"is_html": true, "content": "<img src=\"cid:logo.png\">"}},
            "attachments": [
                {{"path": {logo:?}, "name": "logo.png", "is_embed": true}},
                {{"path": "/nonexistent/terms.pdf", "name": null, "is_embed": false}}
            ]
        }}]"#,
        logo = logo.to_string_lossy()
    );
    let registry = MailBox::from_json_str(&json).unwrap().registry();
    let config = registry.lookup("newsletter").unwrap();

    let mailer = Mailer::builder().dialer(MockDialer::new()).build();
    let message = mailer.compose(config, None);

    let embedded: Vec<_> = message.embedded().collect();
    assert_eq!(embedded.len(), 1);
    assert_eq!(embedded[0].file_name(), "logo.png");

    let err = render(&message).await.unwrap_err();
    assert_eq!(err.kind(), MailErrorKind::AttachmentError);

    // without the missing attachment the message renders with the renamed embed
    let mut trimmed = integrations_mail_profiles::Message::new();
    for (name, values) in message.headers() {
        trimmed.set_header(name, values.iter().cloned());
    }
    if let Some(body) = message.body() {
        trimmed.set_body(body.content_type.clone(), body.content.clone());
    }
    for part in message.embedded() {
        trimmed.embed(&part.path, part.rename.as_deref());
    }

    let wire = render(&trimmed).await.unwrap();
    let text = String::from_utf8_lossy(&wire.formatted()).into_owned();
    assert!(text.contains("<logo.png>"));
    assert!(!text.contains("logo-2024.png"));
}

#[test]
fn duplicate_names_keep_the_last_profile() {
    let registry = registry();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.lookup("welcome").unwrap().host, "smtp.example.com");
    assert_eq!(
        registry.lookup("nope").unwrap_err().kind(),
        MailErrorKind::ConfigNotFound
    );
}

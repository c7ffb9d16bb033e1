// SMTP notifier - Plain-text email delivery through a relay
use crate::application::notifier::Notifier;
use crate::infrastructure::config::{SmtpEncryption, SmtpSettings};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    label: String,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings, from: &str, from_name: &str) -> anyhow::Result<Self> {
        let mut builder = match settings.encryption {
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            }
            SmtpEncryption::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            }
            SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
        }
        .port(settings.port)
        .timeout(Some(Duration::from_secs(settings.timeout_secs)));

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let name = (!from_name.is_empty()).then(|| from_name.to_string());
        Ok(Self {
            transport: builder.build(),
            from: Mailbox::new(name, from.parse()?),
            label: format!("smtp://{}:{}", settings.host, settings.port),
        })
    }

    /// One message addressed to every recipient.
    fn compose(&self, subject: &str, body: &str, recipients: &[String]) -> anyhow::Result<Message> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            builder = builder.to(recipient.trim().parse()?);
        }
        Ok(builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    /// Succeeds only when the relay accepted the message for every recipient.
    async fn deliver(&self, subject: &str, body: &str, recipients: &[String]) -> bool {
        if recipients.is_empty() {
            tracing::warn!(transport = %self.label, "No recipients; nothing delivered");
            return false;
        }

        let email = match self.compose(subject, body, recipients) {
            Ok(email) => email,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build email");
                return false;
            }
        };

        match self.transport.send(email).await {
            Ok(response) if response.is_positive() => {
                tracing::debug!(transport = %self.label, recipients = recipients.len(), "Email accepted");
                true
            }
            Ok(response) => {
                tracing::warn!(transport = %self.label, code = %response.code(), "Relay rejected email");
                false
            }
            Err(e) => {
                tracing::warn!(transport = %self.label, error = %e, "Email send failed");
                false
            }
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

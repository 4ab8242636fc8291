//! SMTP delivery for invitation emails.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use portico_core::{Config, EmailSender, OutgoingEmail};

#[derive(Clone)]
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    /// Create the sender from config. Returns `Ok(None)` when email delivery is disabled.
    pub fn from_config(config: &Config) -> Result<Option<Self>, anyhow::Error> {
        if !config.email_enabled() {
            tracing::debug!("Email delivery disabled (EMAIL_ENABLED=false)");
            return Ok(None);
        }
        let host = config
            .smtp_host()
            .ok_or_else(|| anyhow::anyhow!("SMTP_HOST must be set when email is enabled"))?;
        let from: Mailbox = config
            .smtp_from()
            .ok_or_else(|| anyhow::anyhow!("SMTP_FROM must be set when email is enabled"))?
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid SMTP_FROM: {}", e))?;
        let port = config.smtp_port();

        let builder = if config.smtp_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port)
        };

        let builder = match (config.smtp_user(), config.smtp_password()) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.to_string(), password.to_string()))
            }
            _ => builder,
        };

        tracing::info!(
            host = %host,
            port,
            tls = config.smtp_tls(),
            "Email service initialized (SMTP)"
        );

        Ok(Some(Self {
            mailer: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), String> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| format!("Invalid recipient address: {}", e))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| e.to_string())?;

        self.mailer.send(message).await.map_err(|e| e.to_string())?;
        tracing::info!(to = %email.to, "Email sent");
        Ok(())
    }
}

// SMTP mailer sending the report with the PDF attached
use crate::application::mailer::Mailer;
use crate::domain::report_email::ReportEmail;
use crate::infrastructure::config::SmtpSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// STARTTLS relay authenticated with the configured login
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("Invalid from address '{}'", settings.from))?;
        let credentials = Credentials::new(settings.login.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
            .with_context(|| format!("Invalid SMTP relay {}", settings.server))?
            .port(settings.port)
            .credentials(credentials)
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &ReportEmail) -> Result<()> {
        let pdf = tokio::fs::read(&email.attachment)
            .await
            .with_context(|| format!("Failed to read {}", email.attachment.display()))?;
        let message = build_message(&self.from, email, pdf)?;

        tracing::info!("Sending email to {}", email.to);
        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

fn build_message(from: &Mailbox, email: &ReportEmail, pdf: Vec<u8>) -> Result<Message> {
    let to: Mailbox = email
        .to
        .parse()
        .with_context(|| format!("Invalid recipient address '{}'", email.to))?;
    let file_name = email
        .attachment
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".to_string());
    let pdf_type = ContentType::parse("application/pdf")
        .map_err(|e| anyhow::anyhow!("Invalid content type: {}", e))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::html(email.html.clone()))
                .singlepart(Attachment::new(file_name).body(pdf, pdf_type)),
        )
        .context("Failed to build email")
}

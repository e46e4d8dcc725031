//! Outbound email: mention notifications and rendered template sends.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
    templates::html::escape_text,
};

pub struct EmailService {
    transport: EmailTransport,
    from: String,
    reply_to: Option<String>,
    dashboard_url: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// What a mention email needs to say.
pub struct MentionEmail<'a> {
    pub to_email: &'a str,
    pub to_name: Option<&'a str>,
    pub author: &'a str,
    pub candidate_name: &'a str,
    pub candidate_id: uuid::Uuid,
    pub note_body: &'a str,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from: format!("{} <{}>", email_config.from_name, email_config.from_email),
            reply_to: email_config.reply_to.clone(),
            dashboard_url: config.dashboard_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send an already-rendered HTML email.
    #[tracing::instrument(skip(self, html), err)]
    pub async fn send_html(&self, to_email: &str, to_name: Option<&str>, subject: &str, html: &str) -> Result<(), Error> {
        self.send_email(to_email, to_name, subject, html.to_string()).await
    }

    /// Tell a user they were mentioned in a note on a candidate.
    #[tracing::instrument(skip_all, fields(to = %mention.to_email), err)]
    pub async fn send_mention_email(&self, mention: &MentionEmail<'_>) -> Result<(), Error> {
        let subject = format!("{} mentioned you on {}", mention.author, mention.candidate_name);
        let body = self.create_mention_body(mention);
        self.send_email(mention.to_email, mention.to_name, &subject, body).await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: String) -> Result<(), Error> {
        let from = self.from.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;

        // Recipient addresses come from user input, so a bad one is the caller's fault
        let to = match to_name {
            Some(name) => format!("{name} <{to_email}>"),
            None => to_email.to_string(),
        }
        .parse::<Mailbox>()
        .map_err(|e| Error::bad_request(format!("Invalid recipient address '{to_email}': {e}")))?;

        let mut builder = Message::builder().from(from).to(to).subject(subject);
        if let Some(reply_to) = &self.reply_to {
            let reply_to = reply_to.parse::<Mailbox>().map_err(|e| Error::Internal {
                operation: format!("parse reply-to email: {e}"),
            })?;
            builder = builder.reply_to(reply_to);
        }
        let message = builder.header(ContentType::TEXT_HTML).body(body).map_err(|e| Error::Internal {
            operation: format!("build email message: {e}"),
        })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_mention_body(&self, mention: &MentionEmail<'_>) -> String {
        let greeting = match mention.to_name {
            Some(name) => format!("Hello {},", escape_text(name)),
            None => "Hello,".to_string(),
        };
        let link = format!("{}/candidates/{}", self.dashboard_url, mention.candidate_id);

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>You were mentioned</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <p>{greeting}</p>
        <p><strong>{author}</strong> mentioned you in a note on <strong>{candidate}</strong>:</p>
        <blockquote style="border-left: 3px solid #e5e7eb; margin: 0; padding-left: 12px;">{body}</blockquote>
        <p><a href="{link}">Open candidate</a></p>
        <p style="margin-top: 30px; font-size: 12px; color: #666;">This is an automated message, please do not reply to this email.</p>
    </div>
</body>
</html>"#,
            author = escape_text(mention.author),
            candidate = escape_text(mention.candidate_name),
            body = escape_text(mention.note_body),
        )
    }
}

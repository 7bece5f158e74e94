//! Transactional email
//!
//! Messages are rendered from the tera templates in `templates/email/` (an
//! HTML body plus a plain-text alternative) and handed to a [`Mailer`]:
//! SMTP through lettre when `email.smtp_host` is configured, otherwise a
//! mailer that only logs.

use crate::config::{Config, EmailConfig};
use crate::models::{ContactSubmission, User};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tera::Tera;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex pattern for email address")
});

/// Loose shape check: one `@`, no whitespace, a dot in the domain
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

/// Templates bundled into the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    ContactNotification,
    ContactConfirmation,
    WelcomeUser,
}

impl EmailTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            EmailTemplate::ContactNotification => "contact_notification",
            EmailTemplate::ContactConfirmation => "contact_confirmation",
            EmailTemplate::WelcomeUser => "welcome_user",
        }
    }
}

fn load_templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        (
            "contact_notification.html",
            include_str!("../../templates/email/contact_notification.html"),
        ),
        (
            "contact_notification.txt",
            include_str!("../../templates/email/contact_notification.txt"),
        ),
        (
            "contact_confirmation.html",
            include_str!("../../templates/email/contact_confirmation.html"),
        ),
        (
            "contact_confirmation.txt",
            include_str!("../../templates/email/contact_confirmation.txt"),
        ),
        (
            "welcome_user.html",
            include_str!("../../templates/email/welcome_user.html"),
        ),
        (
            "welcome_user.txt",
            include_str!("../../templates/email/welcome_user.txt"),
        ),
    ])
    .context("Failed to load email templates")?;
    Ok(tera)
}

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Delivery backend
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// SMTP delivery via lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS, anything else STARTTLS
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        let from = format!("{} <{}>", config.from_name, config.from_address)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Logs messages instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "SMTP not configured, email not sent"
        );
        tracing::debug!("{}", email.text);
        Ok(())
    }
}

/// Renders and sends the site's transactional mail
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    templates: Tera,
    site_name: String,
    notify_address: Option<String>,
    public_url: String,
}

impl EmailService {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        site_name: impl Into<String>,
        notify_address: Option<String>,
        public_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            mailer,
            templates: load_templates()?,
            site_name: site_name.into(),
            notify_address,
            public_url: public_url.into(),
        })
    }

    /// SMTP when configured, otherwise log-only
    pub fn from_config(config: &Config) -> Result<Self> {
        let mailer: Arc<dyn Mailer> = if config.email.smtp_enabled() {
            Arc::new(SmtpMailer::new(&config.email)?)
        } else {
            tracing::warn!("SMTP not configured, outgoing email will only be logged");
            Arc::new(LogMailer)
        };
        Self::new(
            mailer,
            config.site.name.clone(),
            config.email.notify_address.clone(),
            config.server.public_url.clone(),
        )
    }

    /// Render the HTML and plain-text bodies of a template
    pub fn render(
        &self,
        template: EmailTemplate,
        context: &tera::Context,
    ) -> Result<(String, String)> {
        let mut context = context.clone();
        context.insert("site_name", &self.site_name);

        let html = self
            .templates
            .render(&format!("{}.html", template.name()), &context)
            .with_context(|| format!("Failed to render {} (html)", template.name()))?;
        let text = self
            .templates
            .render(&format!("{}.txt", template.name()), &context)
            .with_context(|| format!("Failed to render {} (text)", template.name()))?;
        Ok((html, text))
    }

    async fn deliver(
        &self,
        to: &str,
        subject: String,
        template: EmailTemplate,
        context: &tera::Context,
    ) -> Result<()> {
        let (html, text) = self.render(template, context)?;
        self.mailer
            .send(&OutgoingEmail {
                to: to.to_string(),
                subject,
                html,
                text,
            })
            .await
    }

    fn submission_context(submission: &ContactSubmission) -> Result<tera::Context> {
        let mut context = tera::Context::from_serialize(submission)
            .context("Failed to build email context")?;
        context.insert(
            "received_at",
            &submission.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        );
        Ok(context)
    }

    /// Tell the site owner about a new submission. No-op without a notify address.
    pub async fn send_contact_notification(&self, submission: &ContactSubmission) -> Result<()> {
        let Some(to) = self.notify_address.as_deref() else {
            return Ok(());
        };
        let subject = match &submission.subject {
            Some(subject) => format!("[{}] {}", self.site_name, subject),
            None => format!("[{}] New contact request from {}", self.site_name, submission.name),
        };
        let context = Self::submission_context(submission)?;
        self.deliver(to, subject, EmailTemplate::ContactNotification, &context)
            .await
    }

    /// Acknowledge a submission to the person who sent it
    pub async fn send_contact_confirmation(&self, submission: &ContactSubmission) -> Result<()> {
        let subject = format!("Thanks for contacting {}", self.site_name);
        let context = Self::submission_context(submission)?;
        self.deliver(
            &submission.email,
            subject,
            EmailTemplate::ContactConfirmation,
            &context,
        )
        .await
    }

    /// Greet a newly created admin-panel account
    pub async fn send_welcome(&self, user: &User) -> Result<()> {
        let mut context = tera::Context::new();
        context.insert("name", &user.name);
        context.insert("email", &user.email);
        context.insert("role", user.role.as_str());
        context.insert(
            "login_url",
            &format!("{}/admin/login", self.public_url.trim_end_matches('/')),
        );
        let subject = format!("Your {} account", self.site_name);
        self.deliver(&user.email, subject, EmailTemplate::WelcomeUser, &context)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use crate::models::{ContactStatus, UserRole};
    use chrono::Utc;

    fn submission() -> ContactSubmission {
        let now = Utc::now();
        ContactSubmission {
            id: 7,
            name: "Ada <script>".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            company: Some("Engines Ltd".to_string()),
            subject: None,
            message: "Need a new website".to_string(),
            service_interest: Some("web-design".to_string()),
            status: ContactStatus::New,
            ip_hash: None,
            user_agent: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(mailer: Arc<RecordingMailer>, notify: Option<&str>) -> EmailService {
        EmailService::new(
            mailer,
            "Acme Studio",
            notify.map(str::to_string),
            "https://acme.test/",
        )
        .unwrap()
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_render_escapes_html_only() {
        let email = service(Arc::new(RecordingMailer::default()), None);
        let context = EmailService::submission_context(&submission()).unwrap();
        let (html, text) = email.render(EmailTemplate::ContactNotification, &context).unwrap();

        assert!(html.contains("Ada &lt;script&gt;"));
        assert!(html.contains("Engines Ltd"));
        assert!(!html.contains("Phone"));
        assert!(text.contains("Name: Ada <script>"));
        assert!(text.contains("Interested in: web-design"));
        assert!(text.contains("Acme Studio"));
    }

    #[tokio::test]
    async fn test_contact_emails() {
        let mailer = Arc::new(RecordingMailer::default());
        let email = service(mailer.clone(), Some("owner@acme.test"));

        email.send_contact_notification(&submission()).await.unwrap();
        email.send_contact_confirmation(&submission()).await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "owner@acme.test");
        assert_eq!(sent[0].subject, "[Acme Studio] New contact request from Ada <script>");
        assert_eq!(sent[1].to, "ada@example.com");
        assert!(sent[1].text.contains("> Need a new website"));
    }

    #[tokio::test]
    async fn test_notification_skipped_without_address() {
        let mailer = Arc::new(RecordingMailer::default());
        let email = service(mailer.clone(), None);
        email.send_contact_notification(&submission()).await.unwrap();
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_welcome_email() {
        let mailer = Arc::new(RecordingMailer::default());
        let email = service(mailer.clone(), None);
        let now = Utc::now();
        let user = User {
            id: 1,
            name: "Grace".to_string(),
            email: "grace@acme.test".to_string(),
            password_hash: String::new(),
            role: UserRole::Editor,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        email.send_welcome(&user).await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent[0].subject, "Your Acme Studio account");
        assert!(sent[0].text.contains("An editor account"));
        assert!(sent[0].html.contains("https://acme.test/admin/login"));
    }
}

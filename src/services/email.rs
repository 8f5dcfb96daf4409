// ============================================================================
// SERVICE : EMAILS
// ============================================================================
//
// `Mailer` abstrait le transport (SMTP en dev, relais SendGrid en prod) pour
// que les handlers puissent être testés avec un faux transport.
// `Email` compose les messages à partir des templates Tera email/*.html et
// email/*.txt (versions HTML + texte dans le même envoi).
//
// ============================================================================

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tera::Context;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::models::users;
use crate::templates;

const SENDGRID_RELAY: &str = "smtp.sendgrid.net";
const SENDER_NAME: &str = "Natours";

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let email = &config.email;
        let from_address: Address = email
            .from
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid EMAIL_FROM: {}", e)))?;

        let transport = match (
            config.is_production(),
            &email.sendgrid_username,
            &email.sendgrid_password,
        ) {
            (true, Some(username), Some(password)) => {
                info!("Emails sent through SendGrid");
                AsyncSmtpTransport::<Tokio1Executor>::relay(SENDGRID_RELAY)
                    .map_err(|e| AppError::Mail(e.to_string()))?
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            }
            _ => {
                info!("Emails sent through {}:{}", email.host, email.port);
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(email.host.as_str())
                    .port(email.port)
                    .credentials(Credentials::new(
                        email.username.clone(),
                        email.password.clone(),
                    ))
                    .build()
            }
        };

        Ok(Self {
            transport,
            from: Mailbox::new(Some(SENDER_NAME.to_string()), from_address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), AppError> {
        let to_address: Address = email
            .to_email
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(email.to_name), to_address))
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|e| AppError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Composition des emails envoyés à un utilisateur
pub struct Email<'a> {
    user: &'a users::Model,
    url: String,
}

impl<'a> Email<'a> {
    pub fn new(user: &'a users::Model, url: impl Into<String>) -> Self {
        Self {
            user,
            url: url.into(),
        }
    }

    pub async fn send_welcome(&self, mailer: &dyn Mailer) -> Result<(), AppError> {
        let email = self.compose("welcome", "Welcome to the Natours Family!")?;
        mailer.send(email).await
    }

    pub async fn send_password_reset(&self, mailer: &dyn Mailer) -> Result<(), AppError> {
        let email = self.compose(
            "password_reset",
            "Your password reset token (valid for only 10 minutes)",
        )?;
        mailer.send(email).await
    }

    fn compose(&self, template: &str, subject: &str) -> Result<OutgoingEmail, AppError> {
        let mut context = Context::new();
        context.insert("first_name", self.user.first_name());
        context.insert("url", &self.url);
        context.insert("subject", subject);

        Ok(OutgoingEmail {
            to_name: self.user.name.clone(),
            to_email: self.user.email.clone(),
            subject: subject.to_string(),
            html: templates::render(&format!("email/{}.html", template), &context)?,
            text: templates::render(&format!("email/{}.txt", template), &context)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{RecordingMailer, load_templates, sample_user};

    #[actix_web::test]
    async fn test_welcome_email() {
        load_templates();
        let mailer = RecordingMailer::default();
        let user = sample_user();

        Email::new(&user, "http://127.0.0.1:3000/me")
            .send_welcome(&mailer)
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "laura@example.com");
        assert_eq!(sent[0].subject, "Welcome to the Natours Family!");
        assert!(sent[0].html.contains("Laura"));
        assert!(sent[0].text.contains("http://127.0.0.1:3000/me"));
    }

    #[actix_web::test]
    async fn test_password_reset_email_contains_url() {
        load_templates();
        let mailer = RecordingMailer::default();
        let user = sample_user();
        let url = "http://127.0.0.1:3000/api/v1/users/resetPassword/abc123";

        Email::new(&user, url)
            .send_password_reset(&mailer)
            .await
            .unwrap();

        let sent = mailer.sent();
        assert!(sent[0].subject.contains("valid for only 10 minutes"));
        assert!(sent[0].html.contains("abc123"));
        assert!(sent[0].text.contains(url));
    }
}

use async_trait::async_trait;
use lettre::{
    transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};
use tracing::{debug, error};

use crate::config::SmtpConfig;

pub const RESET_EMAIL_SUBJECT: &str = "Password Reset Request";

/// Outbound email collaborator. Delivery is at-most-once with no
/// confirmation contract; callers dispatch sends off the request path.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: lettre::message::Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .port(cfg.port)
            .build();
        let from = cfg
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid EMAIL_FROM address: {}", e))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid recipient address: {}", e))?)
            .subject(subject)
            .header(lettre::message::header::ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        match self.transport.send(email).await {
            Ok(_) => {
                debug!(to = %to, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(to = %to, error = %e, "smtp send failed");
                Err(e.into())
            }
        }
    }
}

/// Body of the password-reset email: the reset link, the raw token, and a
/// snapshot of the account at request time.
pub fn reset_email_body(
    reset_link: &str,
    token: &str,
    is_active: bool,
    dependent_count: i64,
) -> String {
    format!(
        "A password reset was requested for your account.\n\
        \n\
        Reset your password here:\n\
        {link}\n\
        \n\
        Your reset token: {token}\n\
        \n\
        Account status: {status}\n\
        Linked dependents: {dependents}\n\
        \n\
        This link expires in 1 hour. If you did not request a reset,\n\
        you can safely ignore this email.",
        link = reset_link,
        token = token,
        status = if is_active { "active" } else { "inactive" },
        dependents = dependent_count,
    )
}

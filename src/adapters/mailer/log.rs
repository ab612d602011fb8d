use crate::{
    domain::InvitationEmail,
    ports::mailer::{Delivery, Error, MailerPort},
};

/// Mailer that only records messages in the log and accepts all of them
///
/// Stands in for a real delivery service in local runs.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait::async_trait]
impl MailerPort for LogMailer {
    async fn send(&self, email: &InvitationEmail) -> Result<Delivery, Error> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "Invitation email sent"
        );
        Ok(Delivery::accepted())
    }
}

use crate::domain::InvitationEmail;

#[mockall::automock]
#[async_trait::async_trait]
pub trait MailerPort: Send + Sync {
    /// Hand `email` over to the delivery service
    ///
    /// A rejected message is still `Ok`: the status tells whether it was accepted.
    async fn send(&self, email: &InvitationEmail) -> Result<Delivery, Error>;
}

/// Answer of the delivery service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
    pub body: String,
}

impl Delivery {
    /// Status returned when a message is queued for delivery
    pub const ACCEPTED: u16 = 202;

    pub fn accepted() -> Self {
        Self {
            status: Self::ACCEPTED,
            body: String::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == Self::ACCEPTED
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Concrete adapter errors
    ///
    /// Connectivity, configuration or credential errors that prevented the message from reaching
    /// the delivery service at all.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

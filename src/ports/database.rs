use uuid::Uuid;

use crate::domain::{ImportResult, Invite, Member, NewMember, OnConflict};

#[mockall::automock]
#[async_trait::async_trait]
pub trait MemberDatabase: Send + Sync {
    /// Insert `members` in one go
    ///
    /// Every record is checked on its own: invalid records and duplicate emails within the batch
    /// end up in [`ImportResult::failed`] instead of failing the whole import. A record whose
    /// email is already stored is handled according to `on_conflict`.
    async fn import_members(
        &self,
        members: Vec<NewMember>,
        on_conflict: OnConflict,
    ) -> Result<ImportResult, Error>;

    /// Members with one of `emails`, ordered by id, starting after `after`
    async fn find_members_by_email(
        &self,
        emails: &[String],
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<Member>, Error>;

    async fn create_invite(&self, member_id: Uuid) -> Result<Invite, Error>;

    async fn mark_invite_delivered(&self, invite_id: Uuid) -> Result<Invite, Error>;

    /// Keep the body of a rejected or failed delivery
    async fn record_invite_response(&self, invite_id: Uuid, response: String)
        -> Result<Invite, Error>;

    async fn invites_for(&self, member_id: Uuid) -> Result<Vec<Invite>, Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Domain-level error when a member does not exist
    #[error("member {0} does not exist")]
    MemberDoesNotExist(Uuid),

    #[error("invite {0} does not exist")]
    InviteDoesNotExist(Uuid),

    /// A concurrent write stored another member with this email first
    #[error("email {0} has already been taken")]
    EmailTaken(String),

    /// Concrete adapter errors
    ///
    /// This could represent any errors from a concrete adapter that is not part of the domain
    /// model, such as connectivity, configuration, or permission errors.
    #[error("adapter error: {0:?}")]
    Adapter(Box<dyn std::error::Error + Send + Sync>),
}

impl From<Error> for crate::operation::Error {
    fn from(err: Error) -> Self {
        Self::collaborator(err)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered member
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Unique identifier for the `Member`
    pub id: Uuid,
    /// Unique across all members
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes of a member to register
///
/// Missing keys deserialize as empty strings so that they are reported by [`NewMember::errors`]
/// instead of failing the whole batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl NewMember {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Presence checks, one message per failing attribute
    pub fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Name can't be blank".to_string());
        }
        if self.email.trim().is_empty() {
            errors.push("Email can't be blank".to_string());
        }
        errors
    }
}

/// Columns a conflicting import may overwrite
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberColumn {
    Name,
}

/// What a bulk import does when a record collides with a stored member on email
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OnConflict {
    /// Report the record as failed
    Fail,
    /// Keep the stored member and overwrite the listed columns
    Update { columns: Vec<MemberColumn> },
}

/// Outcome of a bulk import
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Identifiers of inserted or updated members, in input order
    pub ids: Vec<Uuid>,
    pub failed: Vec<FailedRecord>,
}

/// Record rejected by a bulk import
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedRecord {
    pub attributes: NewMember,
    pub messages: Vec<String>,
}

/// Delivery tracking for one invitation email
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invite {
    pub id: Uuid,
    pub member_id: Uuid,
    /// `None` until the delivery attempt finished
    pub delivered: Option<bool>,
    /// Response body kept when the delivery was not accepted
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invite {
    pub fn new(member_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            member_id,
            delivered: None,
            response: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Invitation message sent to a member
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvitationEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Plain-text body
    pub content: String,
}

impl InvitationEmail {
    pub const SUBJECT: &'static str = "Invitation email";

    pub fn for_member(from: impl Into<String>, member: &Member) -> Self {
        Self {
            from: from.into(),
            to: member.email.clone(),
            subject: Self::SUBJECT.to_string(),
            content: format!("Hi {}, welcome to mobilize!", member.name),
        }
    }
}

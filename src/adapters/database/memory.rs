use crate::{
    domain::{FailedRecord, ImportResult, Invite, Member, MemberColumn, NewMember, OnConflict},
    operation::{self, Store, Transaction},
    ports::database::{Error, MemberDatabase},
};
use chrono::Utc;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::Bound,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

const EMAIL_TAKEN: &str = "Email has already been taken";

#[derive(Clone, Debug, Default)]
struct Tables {
    members: BTreeMap<Uuid, Member>,
    invites: HashMap<Uuid, Invite>,
    /// Rows written since the snapshot was taken, only tracked inside a transaction
    changes: Option<Changes>,
}

#[derive(Clone, Debug, Default)]
struct Changes {
    members: HashSet<Uuid>,
    invites: HashSet<Uuid>,
}

impl Tables {
    fn snapshot(&self) -> Self {
        Self {
            members: self.members.clone(),
            invites: self.invites.clone(),
            changes: Some(Changes::default()),
        }
    }

    fn touch_member(&mut self, id: Uuid) {
        if let Some(changes) = &mut self.changes {
            changes.members.insert(id);
        }
    }

    fn touch_invite(&mut self, id: Uuid) {
        if let Some(changes) = &mut self.changes {
            changes.invites.insert(id);
        }
    }

    /// Copy the rows written in `staged` over these tables
    ///
    /// Fails without writing anything when a written member's email now belongs to another
    /// member.
    fn merge(&mut self, mut staged: Tables) -> Result<(), Error> {
        let Some(changes) = staged.changes.take() else {
            return Ok(());
        };

        for id in &changes.members {
            if let Some(member) = staged.members.get(id) {
                match self.member_id_by_email(&member.email) {
                    Some(other) if other != *id => {
                        return Err(Error::EmailTaken(member.email.clone()))
                    }
                    _ => {}
                }
            }
        }

        for id in changes.members {
            if let Some(member) = staged.members.remove(&id) {
                self.members.insert(id, member);
            }
        }
        for id in changes.invites {
            if let Some(invite) = staged.invites.remove(&id) {
                self.invites.insert(id, invite);
            }
        }
        Ok(())
    }

    fn member_id_by_email(&self, email: &str) -> Option<Uuid> {
        self.members
            .values()
            .find(|member| member.email == email)
            .map(|member| member.id)
    }

    fn import(&mut self, members: Vec<NewMember>, on_conflict: &OnConflict) -> ImportResult {
        let mut result = ImportResult::default();
        let mut seen = HashSet::new();

        for attributes in members {
            let mut messages = attributes.errors();
            let existing = self.member_id_by_email(&attributes.email);
            let taken = seen.contains(&attributes.email)
                || (existing.is_some() && *on_conflict == OnConflict::Fail);
            if taken && !attributes.email.trim().is_empty() {
                messages.push(EMAIL_TAKEN.to_string());
            }
            if !messages.is_empty() {
                result.failed.push(FailedRecord {
                    attributes,
                    messages,
                });
                continue;
            }

            seen.insert(attributes.email.clone());
            let now = Utc::now();
            let id = match (existing, on_conflict) {
                // Stored member with the same email
                (Some(id), OnConflict::Update { columns }) => {
                    if let Some(member) = self.members.get_mut(&id) {
                        for column in columns {
                            match column {
                                MemberColumn::Name => member.name = attributes.name.clone(),
                            }
                        }
                        member.updated_at = now;
                    }
                    id
                }
                // New member
                _ => {
                    let member = Member {
                        id: Uuid::new_v4(),
                        email: attributes.email,
                        name: attributes.name,
                        created_at: now,
                        updated_at: now,
                    };
                    let id = member.id;
                    self.members.insert(id, member);
                    id
                }
            };
            self.touch_member(id);
            result.ids.push(id);
        }

        result
    }

    fn find_by_email(&self, emails: &[String], after: Option<Uuid>, limit: usize) -> Vec<Member> {
        let start = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.members
            .range((start, Bound::Unbounded))
            .map(|(_, member)| member)
            .filter(|member| emails.contains(&member.email))
            .take(limit)
            .cloned()
            .collect()
    }

    fn create_invite(&mut self, member_id: Uuid) -> Result<Invite, Error> {
        if !self.members.contains_key(&member_id) {
            return Err(Error::MemberDoesNotExist(member_id));
        }
        let invite = Invite::new(member_id);
        self.invites.insert(invite.id, invite.clone());
        self.touch_invite(invite.id);
        Ok(invite)
    }

    fn update_invite(
        &mut self,
        invite_id: Uuid,
        update: impl FnOnce(&mut Invite),
    ) -> Result<Invite, Error> {
        let invite = self
            .invites
            .get_mut(&invite_id)
            .ok_or(Error::InviteDoesNotExist(invite_id))?;
        update(invite);
        invite.updated_at = Utc::now();
        let invite = invite.clone();
        self.touch_invite(invite_id);
        Ok(invite)
    }
}

/// In-memory [`MemberDatabase`]
///
/// Transactions read and write a snapshot of the tables. On commit, only the rows they wrote are
/// copied back, so writes committed in the meantime by others are kept.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    committed: Arc<Mutex<Tables>>,
    /// Set on handles owned by a [`MemoryTransaction`]
    staged: Option<Arc<Mutex<Tables>>>,
}

impl MemoryDatabase {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, Error> {
        Ok(self.staged.as_ref().unwrap_or(&self.committed).lock()?)
    }
}

#[async_trait::async_trait]
impl MemberDatabase for MemoryDatabase {
    async fn import_members(
        &self,
        members: Vec<NewMember>,
        on_conflict: OnConflict,
    ) -> Result<ImportResult, Error> {
        let count = members.len();
        let result = self.tables()?.import(members, &on_conflict);
        tracing::debug!(
            count,
            imported = result.ids.len(),
            failed = result.failed.len(),
            "Imported members"
        );
        Ok(result)
    }

    async fn find_members_by_email(
        &self,
        emails: &[String],
        after: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<Member>, Error> {
        Ok(self.tables()?.find_by_email(emails, after, limit))
    }

    async fn create_invite(&self, member_id: Uuid) -> Result<Invite, Error> {
        self.tables()?.create_invite(member_id)
    }

    async fn mark_invite_delivered(&self, invite_id: Uuid) -> Result<Invite, Error> {
        self.tables()?.update_invite(invite_id, |invite| {
            invite.delivered = Some(true);
        })
    }

    async fn record_invite_response(
        &self,
        invite_id: Uuid,
        response: String,
    ) -> Result<Invite, Error> {
        self.tables()?.update_invite(invite_id, |invite| {
            invite.delivered = Some(false);
            invite.response = Some(response);
        })
    }

    async fn invites_for(&self, member_id: Uuid) -> Result<Vec<Invite>, Error> {
        let mut invites: Vec<Invite> = self
            .tables()?
            .invites
            .values()
            .filter(|invite| invite.member_id == member_id)
            .cloned()
            .collect();
        invites.sort_by_key(|invite| invite.created_at);
        Ok(invites)
    }
}

#[async_trait::async_trait]
impl Store for MemoryDatabase {
    type Scope = dyn MemberDatabase;
    type Transaction = MemoryTransaction;

    fn scope(&self) -> &Self::Scope {
        self
    }

    async fn begin(&self) -> Result<MemoryTransaction, operation::Error> {
        let snapshot = self.committed.lock().map_err(Error::from)?.snapshot();
        Ok(MemoryTransaction {
            handle: MemoryDatabase {
                committed: self.committed.clone(),
                staged: Some(Arc::new(Mutex::new(snapshot))),
            },
        })
    }
}

/// Open transaction on a [`MemoryDatabase`]
///
/// Writes stay in the snapshot until [`commit`](Transaction::commit); dropping it discards them.
#[derive(Debug)]
pub struct MemoryTransaction {
    handle: MemoryDatabase,
}

#[async_trait::async_trait]
impl Transaction for MemoryTransaction {
    type Scope = dyn MemberDatabase;

    fn scope(&self) -> &Self::Scope {
        &self.handle
    }

    async fn commit(self) -> Result<(), operation::Error> {
        if let Some(staged) = &self.handle.staged {
            let tables = std::mem::take(&mut *staged.lock().map_err(Error::from)?);
            self.handle
                .committed
                .lock()
                .map_err(Error::from)?
                .merge(tables)?;
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), operation::Error> {
        Ok(())
    }
}

/// Erased [`PoisonError`]
///
/// `PoisonError` keeps the `MutexGuard` internally, which is not send. Thus we erase the error
/// and only keep the string representation instead.
#[derive(Debug, thiserror::Error)]
#[error("poison error: {0}")]
pub struct ErasedPoisonError(String);

/// We need to create a custom `From` implementation here for an error that's specific to this
/// adapter.
impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::Adapter(Box::new(ErasedPoisonError(err.to_string())))
    }
}

use std::{collections::HashSet, sync::Arc};

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::{
    domain::{InvitationEmail, Member},
    ports::{
        database::MemberDatabase,
        mailer::{Delivery, MailerPort},
    },
};

use super::Error;

/// Default number of members fetched per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default number of deliveries in flight at once
pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Clone, Debug)]
pub struct InviteSettings {
    /// Sender address of invitation emails
    pub from: String,
    pub batch_size: usize,
    pub concurrency: usize,
}

impl InviteSettings {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Send invitation emails to existing members
///
/// Members are fetched in batches; each batch is fully processed before the next one is
/// fetched, with at most `concurrency` deliveries running at the same time.
pub struct InviteMembers<D: ?Sized, M: ?Sized> {
    database: Arc<D>,
    mailer: Arc<M>,
    settings: InviteSettings,
}

/// Outcome of an invitation run, by email
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InviteReport {
    pub delivered: Vec<String>,
    pub rejected: Vec<Rejection>,
    pub failed: Vec<Failure>,
}

/// Delivery refused by the mail service
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub email: String,
    pub status: u16,
    pub body: String,
}

/// Invitation that could not be processed at all
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub email: String,
    pub reason: String,
}

enum Outcome {
    Delivered,
    Rejected(Delivery),
}

impl InviteReport {
    fn record(&mut self, email: String, outcome: Result<Outcome, Error>) {
        match outcome {
            Ok(Outcome::Delivered) => self.delivered.push(email),
            Ok(Outcome::Rejected(delivery)) => self.rejected.push(Rejection {
                email,
                status: delivery.status,
                body: delivery.body,
            }),
            Err(err) => self.failed.push(Failure {
                email,
                reason: err.to_string(),
            }),
        }
    }
}

impl<D, M> InviteMembers<D, M>
where
    D: MemberDatabase + ?Sized + 'static,
    M: MailerPort + ?Sized + 'static,
{
    pub fn new(database: Arc<D>, mailer: Arc<M>, settings: InviteSettings) -> Self {
        Self {
            database,
            mailer,
            settings,
        }
    }

    #[instrument(skip_all, fields(count = emails.len()))]
    pub async fn dispatch(&self, emails: Vec<String>) -> Result<InviteReport, Error> {
        let batch_size = self.settings.batch_size.max(1);
        let concurrency = self.settings.concurrency.max(1);
        let mut report = InviteReport::default();
        let mut after = None;

        loop {
            let batch = self
                .database
                .find_members_by_email(&emails, after, batch_size)
                .await?;
            let Some(last) = batch.last() else { break };
            after = Some(last.id);
            let exhausted = batch.len() < batch_size;

            let mut pending: HashSet<String> =
                batch.iter().map(|member| member.email.clone()).collect();
            let mut tasks = JoinSet::new();
            for member in batch {
                // Wait for a slot before starting another delivery
                if tasks.len() >= concurrency {
                    if let Some(joined) = tasks.join_next().await {
                        record_joined(joined, &mut pending, &mut report);
                    }
                }

                let database = self.database.clone();
                let mailer = self.mailer.clone();
                let from = self.settings.from.clone();
                tasks.spawn(async move {
                    let outcome =
                        invite_member(database.as_ref(), mailer.as_ref(), &from, &member).await;
                    (member.email, outcome)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                record_joined(joined, &mut pending, &mut report);
            }
            // Tasks that panicked or were cancelled never reported back
            report
                .failed
                .extend(pending.into_iter().map(|email| Failure {
                    email,
                    reason: "invite task did not complete".to_string(),
                }));

            if exhausted {
                break;
            }
        }

        info!(
            delivered = report.delivered.len(),
            rejected = report.rejected.len(),
            failed = report.failed.len(),
            "Invitations dispatched"
        );
        Ok(report)
    }
}

fn record_joined(
    joined: Result<(String, Result<Outcome, Error>), tokio::task::JoinError>,
    pending: &mut HashSet<String>,
    report: &mut InviteReport,
) {
    match joined {
        Ok((email, outcome)) => {
            pending.remove(&email);
            report.record(email, outcome);
        }
        Err(err) => warn!(error = %err, "Invite task did not complete"),
    }
}

/// Create the invite row, send the email, and record how it went
///
/// Once the email went out, failing to record the delivery is only logged: the member counts as
/// delivered so a new run does not email them twice.
#[instrument(skip_all, fields(member_id = %member.id))]
async fn invite_member<D, M>(
    database: &D,
    mailer: &M,
    from: &str,
    member: &Member,
) -> Result<Outcome, Error>
where
    D: MemberDatabase + ?Sized,
    M: MailerPort + ?Sized,
{
    let invite = database.create_invite(member.id).await?;
    let email = InvitationEmail::for_member(from, member);

    match mailer.send(&email).await {
        Ok(delivery) if delivery.is_accepted() => {
            if let Err(err) = database.mark_invite_delivered(invite.id).await {
                warn!(invite_id = %invite.id, error = %err, "Invitation sent but not recorded");
            }
            Ok(Outcome::Delivered)
        }
        Ok(delivery) => {
            warn!(status = delivery.status, "Invitation rejected");
            database
                .record_invite_response(invite.id, delivery.body.clone())
                .await?;
            Ok(Outcome::Rejected(delivery))
        }
        Err(err) => {
            warn!(error = %err, "Invitation not sent");
            if let Err(store_err) = database
                .record_invite_response(invite.id, err.to_string())
                .await
            {
                warn!(invite_id = %invite.id, error = %store_err, "Failed delivery not recorded");
            }
            Err(err.into())
        }
    }
}

use std::{io::Read, sync::Arc};

use anyhow::Context;
use clap::Parser;
use member_invites::{
    adapters::{database::memory::MemoryDatabase, mailer::log::LogMailer},
    commands::{
        create_members::{CreateMembers, CreateMembersResponse},
        invite_members::InviteMembers,
    },
    config::Config,
    operation::{self, Operation},
    request, telemetry,
};
use serde_json::{json, Value};

/// Register members read from stdin, as `[{"email": .., "name": ..}, ..]`
#[derive(Parser, Debug)]
#[command(name = "member-ops")]
struct Args {
    /// Also send invitation emails to the registered members
    #[arg(long)]
    invite: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    telemetry::init(&config.log_filter);

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read stdin")?;
    let body: Value = serde_json::from_str(&raw).context("stdin must be a JSON document")?;

    let database = Arc::new(MemoryDatabase::default());
    let create = CreateMembers::new(request::param_hash(json!({ "members": body }), &[])?)?;
    let result = operation::call(&create, database.as_ref())
        .await?
        .context("member import was rolled back")?;

    let mut output = json!({ "members": CreateMembersResponse::from(result) });

    if args.invite {
        let emails = create
            .members()
            .iter()
            .map(|member| member.email.clone())
            .collect();
        let invites = InviteMembers::new(database, Arc::new(LogMailer), config.invite_settings());
        let report = invites.dispatch(emails).await?;
        output["invites"] = serde_json::to_value(report)?;
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

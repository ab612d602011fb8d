use std::{collections::BTreeMap, sync::OnceLock};

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    domain::{ImportResult, MemberColumn, NewMember, OnConflict},
    operation::{
        convert, Arguments, Error, Operation, OperationDefinition, ParamSpec, ValidationError,
    },
    ports::database::MemberDatabase,
};

/// Attributes kept from each incoming member record
const MEMBER_ATTRIBUTES: [&str; 2] = ["email", "name"];

/// Bulk-register members
///
/// Expects `members` as a list of `{email, name}` records; other keys are dropped. Existing
/// members with the same email get their name updated.
#[derive(Debug)]
pub struct CreateMembers {
    members: Vec<NewMember>,
}

impl CreateMembers {
    pub fn members(&self) -> &[NewMember] {
        &self.members
    }
}

#[async_trait::async_trait]
impl Operation for CreateMembers {
    type Scope = dyn MemberDatabase;
    type Output = ImportResult;

    fn definition() -> &'static OperationDefinition {
        static DEFINITION: OnceLock<OperationDefinition> = OnceLock::new();
        DEFINITION.get_or_init(|| {
            OperationDefinition::builder("members.create")
                .transactional(true)
                .param(ParamSpec::new("members").convert_with(filter_members))
                .build()
        })
    }

    fn from_arguments(arguments: Arguments) -> Result<Self, Error> {
        Ok(Self {
            members: arguments.param("members")?,
        })
    }

    async fn validate(&self, _scope: &Self::Scope) -> Result<(), ValidationError> {
        if self.members.is_empty() {
            return Err(ValidationError::new().field("members", "Members can't be empty"));
        }
        Ok(())
    }

    async fn perform(&self, scope: &Self::Scope) -> Result<ImportResult, Error> {
        let on_conflict = OnConflict::Update {
            columns: vec![MemberColumn::Name],
        };
        Ok(scope
            .import_members(self.members.clone(), on_conflict)
            .await?)
    }
}

/// Normalise the raw list and keep only known attributes of each record
fn filter_members(raw: Value) -> Result<Value, String> {
    let Value::Array(records) = convert::ensure_array(convert::parse_json(raw)?) else {
        return Err("expected a list of members".to_string());
    };

    let records = records
        .into_iter()
        .map(|record| match record {
            Value::Object(attributes) => Value::Object(
                attributes
                    .into_iter()
                    .filter(|(key, _)| MEMBER_ATTRIBUTES.contains(&key.as_str()))
                    .collect::<Map<String, Value>>(),
            ),
            other => other,
        })
        .collect();
    Ok(Value::Array(records))
}

/// JSON body answered to a member creation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CreateMembersResponse {
    pub created_ids: Vec<Uuid>,
    /// Messages of each rejected record, keyed by email
    pub failed: BTreeMap<String, Vec<String>>,
}

impl From<ImportResult> for CreateMembersResponse {
    fn from(result: ImportResult) -> Self {
        Self {
            created_ids: result.ids,
            failed: result
                .failed
                .into_iter()
                .map(|record| (record.attributes.email, record.messages))
                .collect(),
        }
    }
}

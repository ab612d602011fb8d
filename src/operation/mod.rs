//! Service-object framework
//!
//! Every business operation is a type implementing [`Operation`]:
//!
//! * its [`OperationDefinition`] declares an optional subject, keyword parameters (with defaults
//!   and converters) and whether it runs inside a transaction;
//! * [`Operation::new`] binds a keyword mapping to a typed instance, failing before any business
//!   logic runs when the subject or a required parameter is missing;
//! * [`call`] opens the transaction if requested, runs [`Operation::validate`] and then
//!   [`Operation::perform`].

mod arguments;
pub mod convert;
mod definition;
mod error;
mod transaction;

pub use arguments::{Arguments, Input, Params};
pub use definition::{
    Converter, DefaultValue, DefinitionBuilder, OperationDefinition, ParamSpec, Producer,
};
pub use error::{Error, InputError, MissingParameterError, ValidationError};
pub use transaction::{Store, Transaction};

#[async_trait::async_trait]
pub trait Operation: Sized + Send + Sync {
    /// What core logic reads from and writes to
    type Scope: ?Sized + Send + Sync;
    type Output: Send;

    /// Declarations shared by every instance of this type
    ///
    /// Implementations build it once, typically in a `OnceLock`.
    fn definition() -> &'static OperationDefinition;

    /// Build the typed instance from resolved arguments
    fn from_arguments(arguments: Arguments) -> Result<Self, Error>;

    fn new(input: Input) -> Result<Self, Error> {
        Self::from_arguments(Self::definition().resolve(input)?)
    }

    /// Permission hook
    ///
    /// Not invoked by [`call`]: operations that need it check it from `validate` or `perform`.
    async fn allowed(&self, _scope: &Self::Scope) -> bool {
        true
    }

    async fn validate(&self, _scope: &Self::Scope) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Core logic
    async fn perform(&self, scope: &Self::Scope) -> Result<Self::Output, Error>;
}

/// Run `operation` against `store`
///
/// Returns `Ok(None)` only when a transactional operation raised [`Error::Rollback`]. Any other
/// error is returned unchanged, after the transaction (if any) has been rolled back.
pub async fn call<O, S>(operation: &O, store: &S) -> Result<Option<O::Output>, Error>
where
    O: Operation,
    S: Store<Scope = O::Scope>,
{
    if !O::definition().is_transactional() {
        return run(operation, store.scope()).await.map(Some);
    }

    let transaction = store.begin().await?;
    let outcome = run(operation, transaction.scope()).await;
    match outcome {
        Ok(output) => {
            transaction.commit().await?;
            Ok(Some(output))
        }
        Err(Error::Rollback) => {
            transaction.rollback().await?;
            Ok(None)
        }
        Err(err) => {
            // The original error takes precedence over a failed rollback
            let _ = transaction.rollback().await;
            Err(err)
        }
    }
}

async fn run<O: Operation>(operation: &O, scope: &O::Scope) -> Result<O::Output, Error> {
    operation.validate(scope).await?;
    operation.perform(scope).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use serde_json::{json, Value};
    use speculoos::prelude::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, OnceLock,
    };

    /// Scope used by the test operations
    trait Journal: Send + Sync {
        fn write(&self, entry: String);
    }

    /// Store keeping committed entries, with counters for each transaction step
    #[derive(Default)]
    struct FakeStore {
        committed: Arc<Mutex<Vec<String>>>,
        begins: AtomicUsize,
        commits: Arc<AtomicUsize>,
        rollbacks: Arc<AtomicUsize>,
    }

    impl FakeStore {
        fn entries(&self) -> Vec<String> {
            self.committed.lock().unwrap().clone()
        }
    }

    impl Journal for FakeStore {
        fn write(&self, entry: String) {
            self.committed.lock().unwrap().push(entry);
        }
    }

    struct FakeTransaction {
        committed: Arc<Mutex<Vec<String>>>,
        staged: Mutex<Vec<String>>,
        commits: Arc<AtomicUsize>,
        rollbacks: Arc<AtomicUsize>,
    }

    impl Journal for FakeTransaction {
        fn write(&self, entry: String) {
            self.staged.lock().unwrap().push(entry);
        }
    }

    #[async_trait::async_trait]
    impl Store for FakeStore {
        type Scope = dyn Journal;
        type Transaction = FakeTransaction;

        fn scope(&self) -> &Self::Scope {
            self
        }

        async fn begin(&self) -> Result<FakeTransaction, Error> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(FakeTransaction {
                committed: self.committed.clone(),
                staged: Mutex::default(),
                commits: self.commits.clone(),
                rollbacks: self.rollbacks.clone(),
            })
        }
    }

    #[async_trait::async_trait]
    impl Transaction for FakeTransaction {
        type Scope = dyn Journal;

        fn scope(&self) -> &Self::Scope {
            self
        }

        async fn commit(self) -> Result<(), Error> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            let staged = std::mem::take(&mut *self.staged.lock().unwrap());
            self.committed.lock().unwrap().extend(staged);
            Ok(())
        }

        async fn rollback(self) -> Result<(), Error> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// What `AssignRole` core logic should do after writing its entry
    #[derive(Clone, Copy, Debug, serde::Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum Then {
        Finish,
        Rollback,
        Fail,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[derive(Debug)]
    struct AssignRole {
        user: String,
        role: String,
        then: Then,
    }

    fn assign_role() -> OperationDefinition {
        OperationDefinition::builder("assign_role")
            .subject("user")
            .param(ParamSpec::new("role").default_value("member"))
            .param(ParamSpec::new("then").default_value("finish"))
            .build()
    }

    #[async_trait::async_trait]
    impl Operation for AssignRole {
        type Scope = dyn Journal;
        type Output = String;

        fn definition() -> &'static OperationDefinition {
            static DEFINITION: OnceLock<OperationDefinition> = OnceLock::new();
            DEFINITION.get_or_init(assign_role)
        }

        fn from_arguments(arguments: Arguments) -> Result<Self, Error> {
            Ok(Self {
                user: arguments.subject()?,
                role: arguments.param("role")?,
                then: arguments.param("then")?,
            })
        }

        async fn validate(&self, _scope: &Self::Scope) -> Result<(), ValidationError> {
            if self.role == "owner" {
                return Err(ValidationError::new()
                    .with_subject(self.user.clone())
                    .field("role", "Role is reserved"));
            }
            Ok(())
        }

        async fn perform(&self, scope: &Self::Scope) -> Result<String, Error> {
            scope.write(format!("{}:{}", self.user, self.role));
            match self.then {
                Then::Finish => Ok(self.role.clone()),
                Then::Rollback => Err(Error::Rollback),
                Then::Fail => Err(Error::collaborator(DiskFull)),
            }
        }
    }

    /// Same operation, but transactional and with a stricter default role
    struct AssignGuestRole(AssignRole);

    #[async_trait::async_trait]
    impl Operation for AssignGuestRole {
        type Scope = dyn Journal;
        type Output = String;

        fn definition() -> &'static OperationDefinition {
            static DEFINITION: OnceLock<OperationDefinition> = OnceLock::new();
            DEFINITION.get_or_init(|| {
                AssignRole::definition()
                    .derive("assign_guest_role")
                    .param(ParamSpec::new("role").default_value("guest"))
                    .transactional(true)
                    .build()
            })
        }

        fn from_arguments(arguments: Arguments) -> Result<Self, Error> {
            AssignRole::from_arguments(arguments).map(Self)
        }

        async fn perform(&self, scope: &Self::Scope) -> Result<String, Error> {
            self.0.perform(scope).await
        }
    }

    /// Refuses everything, and never checks it itself
    struct Locked;

    #[async_trait::async_trait]
    impl Operation for Locked {
        type Scope = dyn Journal;
        type Output = ();

        fn definition() -> &'static OperationDefinition {
            static DEFINITION: OnceLock<OperationDefinition> = OnceLock::new();
            DEFINITION.get_or_init(|| OperationDefinition::builder("locked").build())
        }

        fn from_arguments(_arguments: Arguments) -> Result<Self, Error> {
            Ok(Self)
        }

        async fn allowed(&self, _scope: &Self::Scope) -> bool {
            false
        }

        async fn perform(&self, scope: &Self::Scope) -> Result<(), Error> {
            scope.write("locked".to_string());
            Ok(())
        }
    }

    fn input(value: Value) -> Input {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    #[fixture]
    fn store() -> FakeStore {
        FakeStore::default()
    }

    #[rstest]
    #[case(json!({"user": "ada"}), "member")]
    #[case(json!({"user": "ada", "role": "admin"}), "admin")]
    #[tokio::test]
    async fn test_call_resolves_role(
        store: FakeStore,
        #[case] raw: Value,
        #[case] expected: &str,
    ) -> Result<(), Error> {
        // GIVEN an operation built from a keyword mapping
        let operation = AssignRole::new(input(raw))?;

        // WHEN calling it
        let res = call(&operation, &store).await;

        // THEN core logic ran with the expected role, outside any transaction
        assert_that!(res)
            .is_ok()
            .is_equal_to(Some(expected.to_string()));
        assert_that!(store.entries()).is_equal_to(vec![format!("ada:{expected}")]);
        assert_that!(store.begins.load(Ordering::SeqCst)).is_equal_to(0);

        Ok(())
    }

    #[test]
    fn test_new_without_subject() {
        let res = AssignRole::new(Input::new());

        assert_that!(res).is_err().matches(|err| {
            matches!(err, Error::Input(InputError::MissingSubject { name }) if name == "user")
        });
    }

    #[rstest]
    #[tokio::test]
    async fn test_validation_stops_core_logic(store: FakeStore) -> Result<(), Error> {
        // GIVEN an input the validation gate rejects
        let operation = AssignRole::new(input(json!({"user": "ada", "role": "owner"})))?;

        // WHEN calling it
        let res = call(&operation, &store).await;

        // THEN the validation error surfaces, and nothing was written
        assert_that!(res).is_err().matches(|err| {
            err.as_validation().map_or(false, |v| {
                v.get("role") == Some("Role is reserved") && v.subject() == Some(&json!("ada"))
            })
        });
        assert_that!(store.entries()).is_empty();

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_rollback_outside_transaction_propagates(store: FakeStore) -> Result<(), Error> {
        let operation = AssignRole::new(input(json!({"user": "ada", "then": "rollback"})))?;

        let res = call(&operation, &store).await;

        assert_that!(res)
            .is_err()
            .matches(|err| matches!(err, Error::Rollback));

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_transaction_commits(store: FakeStore) -> Result<(), Error> {
        // GIVEN a transactional operation
        let operation = AssignGuestRole::new(input(json!({"user": "bob"})))?;

        // WHEN it succeeds
        let res = call(&operation, &store).await;

        // THEN its writes are committed
        assert_that!(res).is_ok().is_equal_to(Some("guest".to_string()));
        assert_that!(store.entries()).is_equal_to(vec!["bob:guest".to_string()]);
        assert_that!(store.commits.load(Ordering::SeqCst)).is_equal_to(1);
        assert_that!(store.rollbacks.load(Ordering::SeqCst)).is_equal_to(0);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_transaction_abort(store: FakeStore) -> Result<(), Error> {
        // GIVEN a transactional operation raising the abort signal after writing
        let operation = AssignGuestRole::new(input(json!({"user": "bob", "then": "rollback"})))?;

        // WHEN calling it
        let res = call(&operation, &store).await;

        // THEN call returns normally with no result, and the write is gone
        assert_that!(res).is_ok().is_none();
        assert_that!(store.entries()).is_empty();
        assert_that!(store.rollbacks.load(Ordering::SeqCst)).is_equal_to(1);

        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_transaction_error_propagates(store: FakeStore) -> Result<(), Error> {
        // GIVEN a transactional operation failing with an unrelated error
        let operation = AssignGuestRole::new(input(json!({"user": "bob", "then": "fail"})))?;

        // WHEN calling it
        let res = call(&operation, &store).await;

        // THEN the original error comes back, after the transaction was rolled back
        assert_that!(res).is_err().matches(|err| match err {
            Error::Collaborator(inner) => inner.downcast_ref::<DiskFull>().is_some(),
            _ => false,
        });
        assert_that!(store.entries()).is_empty();
        assert_that!(store.rollbacks.load(Ordering::SeqCst)).is_equal_to(1);
        assert_that!(store.commits.load(Ordering::SeqCst)).is_equal_to(0);

        Ok(())
    }

    #[test]
    fn test_derived_definition_keeps_parent() {
        let parent = AssignRole::definition();
        let child = AssignGuestRole::definition();

        let parent_names: Vec<&str> = parent.params().iter().map(ParamSpec::name).collect();
        let child_names: Vec<&str> = child.params().iter().map(ParamSpec::name).collect();
        assert_that!(child_names).is_equal_to(parent_names);
        assert_that!(child.subject()).is_equal_to(parent.subject());
        assert_that!(parent.is_transactional()).is_false();
        assert_that!(child.is_transactional()).is_true();
    }

    #[rstest]
    #[tokio::test]
    async fn test_permission_hook_is_opt_in(store: FakeStore) -> Result<(), Error> {
        let operation = Locked::new(Input::new())?;

        // WHEN calling an operation whose hook refuses
        let res = call(&operation, &store).await;

        // THEN call did not consult it
        assert_that!(res).is_ok();
        assert_that!(store.entries()).is_equal_to(vec!["locked".to_string()]);
        assert_that!(operation.allowed(store.scope()).await).is_false();

        Ok(())
    }
}

use super::Error;

/// Storage collaborator able to run an operation inside an atomic scope
///
/// `Scope` is what core logic operates on, usually a `dyn` port. The store hands out the same
/// scope type with and without a transaction, so an operation does not need to know whether it
/// is wrapped.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    type Scope: ?Sized + Send + Sync;
    type Transaction: Transaction<Scope = Self::Scope>;

    /// Scope writing straight to the store
    fn scope(&self) -> &Self::Scope;

    async fn begin(&self) -> Result<Self::Transaction, Error>;
}

/// An open atomic scope
///
/// Dropping a transaction without calling [`commit`](Transaction::commit) must discard its
/// writes, so early returns and panics release it as well.
#[async_trait::async_trait]
pub trait Transaction: Send + Sync + Sized {
    type Scope: ?Sized + Send + Sync;

    fn scope(&self) -> &Self::Scope;

    async fn commit(self) -> Result<(), Error>;

    async fn rollback(self) -> Result<(), Error>;
}

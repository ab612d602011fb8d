use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tower::Service;

use crate::operation::{self, Operation, Store};

pub mod create_members;
pub mod invite_members;

/// Runs operations against a shared store
///
/// Every [`Operation`] whose scope matches the store is a request of this service.
pub struct DomainLogic<S> {
    store: Arc<S>,
}

impl<S> DomainLogic<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> Clone for DomainLogic<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S, O> Service<O> for DomainLogic<S>
where
    S: Store + 'static,
    O: Operation<Scope = S::Scope> + 'static,
{
    type Response = Option<O::Output>;
    type Error = operation::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: O) -> Self::Future {
        let store = self.store.clone();
        Box::pin(async move { operation::call(&op, store.as_ref()).await })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("database port error: {0:?}")]
    Database(#[from] crate::ports::database::Error),
    #[error("mailer port error: {0:?}")]
    Mailer(#[from] crate::ports::mailer::Error),
}

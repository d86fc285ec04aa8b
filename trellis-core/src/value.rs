//! Asynchronous results with eager composition.
//!
//! A [`Value`] is either already settled (a success or a [`SharedError`]) or
//! pending on a shared future. Combinators apply synchronously whenever the
//! outcome is already known, so chains over settled values never touch the
//! executor. A pending value that has since completed collapses back into a
//! settled one the next time it is composed.

use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use tokio::task::JoinHandle;

use crate::error::CellError;
use crate::error::SharedError;
use crate::error::shared;

/// The outcome of a settled [`Value`].
pub type Settled<T> = Result<T, SharedError>;

/// The future backing a pending [`Value`]. Cloneable, so any number of
/// consumers can await the same computation.
pub type SharedFuture<T> = Shared<BoxFuture<'static, Settled<T>>>;

#[derive(Clone)]
enum Inner<T: Clone> {
    Resolved(Settled<T>),
    Pending(SharedFuture<T>),
}

/// An asynchronous result that composes without suspending when the outcome
/// is already available.
#[derive(Clone)]
pub struct Value<T: Clone> {
    inner: Inner<T>,
}

impl<T: Clone + Send + Sync + 'static> Value<T> {
    /// A resolved success.
    pub fn from_value(value: T) -> Self {
        Self {
            inner: Inner::Resolved(Ok(value)),
        }
    }

    /// A resolved failure.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_shared_error(shared(error))
    }

    /// A resolved failure carrying an already-shared error.
    pub fn from_shared_error(error: SharedError) -> Self {
        Self {
            inner: Inner::Resolved(Err(error)),
        }
    }

    /// A resolved value carrying `result` as its outcome.
    pub fn from_result(result: Settled<T>) -> Self {
        Self {
            inner: Inner::Resolved(result),
        }
    }

    /// A pending value backed by `future`.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Settled<T>> + Send + 'static,
    {
        Self {
            inner: Inner::Pending(future.boxed().shared()),
        }
    }

    /// Wraps an existing shared future. If the future has already completed,
    /// the value is settled immediately.
    pub fn from_shared(future: SharedFuture<T>) -> Self {
        match future.peek() {
            Some(settled) => Self {
                inner: Inner::Resolved(settled.clone()),
            },
            None => Self {
                inner: Inner::Pending(future),
            },
        }
    }

    /// Adapts a spawned task. Cancellation surfaces as
    /// [`CellError::Cancelled`], a task panic as the join error itself.
    pub fn from_join_handle(handle: JoinHandle<Settled<T>>) -> Self {
        Self::from_future(async move {
            match handle.await {
                Ok(settled) => settled,
                Err(join_error) if join_error.is_cancelled() => Err(shared(CellError::Cancelled)),
                Err(join_error) => Err(shared(join_error)),
            }
        })
    }

    /// The settled outcome, if one is available without awaiting. Pending
    /// values whose shared future has since completed report their outcome
    /// here too.
    pub fn settled(&self) -> Option<Settled<T>> {
        match &self.inner {
            Inner::Resolved(settled) => Some(settled.clone()),
            Inner::Pending(future) => future.peek().cloned(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&self.inner, Inner::Resolved(_))
    }

    /// Awaits the outcome.
    pub async fn get(self) -> Settled<T> {
        match self.inner {
            Inner::Resolved(settled) => settled,
            Inner::Pending(future) => future.await,
        }
    }

    /// A shared future view of this value. Cloning the result observes the
    /// same underlying computation.
    pub fn as_shared(&self) -> SharedFuture<T> {
        match &self.inner {
            Inner::Pending(future) => future.clone(),
            Inner::Resolved(settled) => {
                let settled = settled.clone();
                async move { settled }.boxed().shared()
            }
        }
    }

    fn into_shared(self) -> SharedFuture<T> {
        match self.inner {
            Inner::Pending(future) => future,
            Inner::Resolved(settled) => async move { settled }.boxed().shared(),
        }
    }

    /// Transforms a success, propagating failure untouched. Settled inputs
    /// are transformed synchronously.
    pub fn map<U, F>(self, f: F) -> Value<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        if let Some(settled) = self.settled() {
            return match settled {
                Ok(value) => Value::from_value(f(value)),
                Err(error) => Value::from_shared_error(error),
            };
        }
        let future = self.into_shared();
        Value::from_future(async move { future.await.map(f) })
    }

    /// Chains a success into another value, propagating failure untouched.
    pub fn flat_map<U, F>(self, f: F) -> Value<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Value<U> + Send + 'static,
    {
        if let Some(settled) = self.settled() {
            return match settled {
                Ok(value) => f(value),
                Err(error) => Value::from_shared_error(error),
            };
        }
        let future = self.into_shared();
        Value::from_future(async move {
            match future.await {
                Ok(value) => f(value).get().await,
                Err(error) => Err(error),
            }
        })
    }

    /// Replaces a failure with another value, leaving success untouched.
    pub fn recover<F>(self, f: F) -> Value<T>
    where
        F: FnOnce(SharedError) -> Value<T> + Send + 'static,
    {
        if let Some(settled) = self.settled() {
            return match settled {
                Ok(value) => Value::from_value(value),
                Err(error) => f(error),
            };
        }
        let future = self.into_shared();
        Value::from_future(async move {
            match future.await {
                Ok(value) => Ok(value),
                Err(error) => f(error).get().await,
            }
        })
    }

    /// Observes the settled outcome, success or failure, and maps it to a
    /// success.
    pub fn then_apply<U, F>(self, f: F) -> Value<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(Settled<T>) -> U + Send + 'static,
    {
        if let Some(settled) = self.settled() {
            return Value::from_value(f(settled));
        }
        let future = self.into_shared();
        Value::from_future(async move { Ok(f(future.await)) })
    }

    /// Observes the settled outcome, success or failure, and chains into
    /// another value.
    pub fn then_compose<U, F>(self, f: F) -> Value<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(Settled<T>) -> Value<U> + Send + 'static,
    {
        if let Some(settled) = self.settled() {
            return f(settled);
        }
        let future = self.into_shared();
        Value::from_future(async move { f(future.await).get().await })
    }

    /// Waits for every value. The result succeeds only if every element
    /// succeeded; otherwise it fails with the first failure in iteration
    /// order among the already-settled elements, falling back to the first
    /// failed awaited element.
    pub fn wait_all<I>(values: I) -> Value<()>
    where
        I: IntoIterator<Item = Value<T>>,
    {
        let mut first_error: Option<SharedError> = None;
        let mut pending = Vec::new();
        for value in values {
            match value.settled() {
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                None => pending.push(value.into_shared()),
            }
        }
        if pending.is_empty() {
            return match first_error {
                None => Value::from_value(()),
                Some(error) => Value::from_shared_error(error),
            };
        }
        Value::from_future(async move {
            let outcomes = futures::future::join_all(pending).await;
            if let Some(error) = first_error {
                return Err(error);
            }
            for outcome in outcomes {
                outcome?;
            }
            Ok(())
        })
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.inner {
            Inner::Resolved(settled) => f.debug_tuple("Resolved").field(settled).finish(),
            Inner::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

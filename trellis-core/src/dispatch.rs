//! Resolver dispatch.
//!
//! A [`ResolverDispatcher`] turns a resolver invocation into a
//! [`Value`]. Unbatched resolvers run directly; batched resolvers are
//! collected per dispatcher instance and flushed together at the next task
//! tick, so every enqueue that happens before the executor yields lands in
//! the same batch.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::access::CheckerResult;
use crate::access::ProxyEngineObjectData;
use crate::error::SharedError;
use crate::error::shared;
use crate::json_ext::Object;
use crate::result::EngineData;
use crate::spec::Schema;
use crate::value::Value;

/// A `(type name, field name)` pair.
pub type Coordinate = (String, String);

/// Errors raised by the batching adapter.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A batch resolver returned the wrong number of results.
    #[error("batch resolver returned {got} results for {expected} requests")]
    BatchSizeMismatch { expected: usize, got: usize },

    /// The batch was dropped before this request got an answer.
    #[error("batch was dropped before producing a result")]
    BatchDropped,
}

/// Everything a resolver or checker invocation can see.
#[derive(Clone)]
pub struct ResolverContext {
    pub schema: Arc<Schema>,
    /// The enclosing object's data, restricted to the declared required
    /// selections.
    pub object_data: Option<Arc<ProxyEngineObjectData>>,
    /// Query-scoped required-selection data.
    pub query_data: Option<Arc<ProxyEngineObjectData>>,
    pub arguments: Object,
    /// The field being resolved, absent for type-level checkers and batch
    /// invocations.
    pub field: Option<Coordinate>,
}

impl ResolverContext {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            object_data: None,
            query_data: None,
            arguments: Object::new(),
            field: None,
        }
    }

    pub fn with_field(mut self, type_name: impl Into<String>, field: impl Into<String>) -> Self {
        self.field = Some((type_name.into(), field.into()));
        self
    }

    pub fn with_arguments(mut self, arguments: Object) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_object_data(mut self, object_data: Arc<ProxyEngineObjectData>) -> Self {
        self.object_data = Some(object_data);
        self
    }

    pub fn with_query_data(mut self, query_data: Arc<ProxyEngineObjectData>) -> Self {
        self.query_data = Some(query_data);
        self
    }

    /// The same context with the field scope cleared, as handed to batch
    /// resolvers which answer for many fields at once.
    pub fn cleared(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            object_data: self.object_data.clone(),
            query_data: self.query_data.clone(),
            arguments: self.arguments.clone(),
            field: None,
        }
    }
}

/// A resolver answering one field of one object.
pub trait FieldResolver: Send + Sync + 'static {
    fn resolve(&self, ctx: ResolverContext) -> BoxFuture<'static, Result<EngineData, SharedError>>;
}

/// A resolver answering a batch of invocations in one call. Must return
/// exactly one result per context, in order.
pub trait BatchResolver: Send + Sync + 'static {
    fn resolve_batch(
        &self,
        ctxs: Vec<ResolverContext>,
    ) -> BoxFuture<'static, Vec<Result<EngineData, SharedError>>>;
}

/// An access checker for a field or type.
pub trait Checker: Send + Sync + 'static {
    fn check(&self, ctx: ResolverContext) -> BoxFuture<'static, CheckerResult>;
}

/// Dispatches resolver invocations, batching when the resolver supports it.
#[derive(Clone)]
pub enum ResolverDispatcher {
    Unbatched(Arc<dyn FieldResolver>),
    Batched(Arc<BatchingAdapter>),
}

impl ResolverDispatcher {
    pub fn unbatched(resolver: impl FieldResolver) -> Self {
        ResolverDispatcher::Unbatched(Arc::new(resolver))
    }

    pub fn batched(resolver: impl BatchResolver) -> Self {
        ResolverDispatcher::Batched(BatchingAdapter::new(Arc::new(resolver)))
    }

    pub fn resolve(&self, ctx: ResolverContext) -> Value<EngineData> {
        match self {
            ResolverDispatcher::Unbatched(resolver) => Value::from_future(resolver.resolve(ctx)),
            ResolverDispatcher::Batched(adapter) => adapter.enqueue(ctx),
        }
    }
}

impl std::fmt::Debug for ResolverDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ResolverDispatcher::Unbatched(_) => f.write_str("Unbatched(..)"),
            ResolverDispatcher::Batched(_) => f.write_str("Batched(..)"),
        }
    }
}

type PendingCall = (
    ResolverContext,
    oneshot::Sender<Result<EngineData, SharedError>>,
);

/// Collects invocations of one batch resolver and flushes them together.
///
/// The first enqueue of a wave spawns the flush task, which yields once
/// before draining; everything enqueued up to that yield joins the wave.
pub struct BatchingAdapter {
    resolver: Arc<dyn BatchResolver>,
    pending: Mutex<Vec<PendingCall>>,
}

impl BatchingAdapter {
    fn new(resolver: Arc<dyn BatchResolver>) -> Arc<Self> {
        Arc::new(Self {
            resolver,
            pending: Mutex::new(Vec::new()),
        })
    }

    fn enqueue(self: &Arc<Self>, ctx: ResolverContext) -> Value<EngineData> {
        let (sender, receiver) = oneshot::channel();
        let starts_wave = {
            let mut pending = self.pending.lock();
            pending.push((ctx.cleared(), sender));
            pending.len() == 1
        };
        if starts_wave {
            let adapter = Arc::clone(self);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                adapter.flush().await;
            });
        }
        Value::from_future(async move {
            match receiver.await {
                Ok(result) => result,
                Err(_) => Err(shared(DispatchError::BatchDropped)),
            }
        })
    }

    async fn flush(&self) {
        let drained = std::mem::take(&mut *self.pending.lock());
        if drained.is_empty() {
            return;
        }
        let (ctxs, senders): (Vec<_>, Vec<_>) = drained.into_iter().unzip();
        let expected = senders.len();
        tracing::debug!(batch_size = expected, "flushing resolver batch");
        let results = self.resolver.resolve_batch(ctxs).await;
        if results.len() != expected {
            let got = results.len();
            for sender in senders {
                let _ = sender.send(Err(shared(DispatchError::BatchSizeMismatch {
                    expected,
                    got,
                })));
            }
            return;
        }
        for (sender, result) in senders.into_iter().zip(results) {
            let _ = sender.send(result);
        }
    }
}

//! End-to-end scenarios across cells, results, dispatch and validation.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json_bytes::json;
use trellis_core::ACCESS_CHECK_SLOT;
use trellis_core::Cell;
use trellis_core::Checker;
use trellis_core::CheckerEntry;
use trellis_core::CheckerResult;
use trellis_core::DispatcherRegistry;
use trellis_core::EngineData;
use trellis_core::FieldDef;
use trellis_core::FieldError;
use trellis_core::FieldResolver;
use trellis_core::FieldResolverEntry;
use trellis_core::Key;
use trellis_core::ObjectEngineResult;
use trellis_core::ObjectType;
use trellis_core::Path;
use trellis_core::RAW_VALUE_SLOT;
use trellis_core::RawSelectionSet;
use trellis_core::RequiredSelectionSet;
use trellis_core::ResolverContext;
use trellis_core::ResolverDispatcher;
use trellis_core::Schema;
use trellis_core::SharedError;
use trellis_core::Value;
use trellis_core::combine_checks;
use trellis_core::field;
use trellis_core::observe_field;
use trellis_core::shared;
use trellis_core::type_check_once;
use trellis_core::validate_registry;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct EngineFailure(&'static str);

/// A producer that settles one slot immediately, fails another, and leaves a
/// third pending: every consumer sees exactly the outcome of the slot it
/// reads, whenever it reads it.
#[tokio::test]
async fn mixed_outcome_slots_are_independent() {
    let cell = Arc::new(Cell::create(3).unwrap());

    // Readers subscribe before the producer runs.
    let early_a = cell.get_value(0).unwrap();
    let early_b = cell.get_value(2).unwrap();

    let (release_b, release_signal) = tokio::sync::oneshot::channel::<()>();
    let error = cell
        .compute_if_absent(|slots| {
            slots.set(0, Value::from_value(EngineData::Scalar(json!("a"))))?;
            slots.set(
                2,
                Value::from_future(async move {
                    release_signal
                        .await
                        .map_err(|_| shared(EngineFailure("writer vanished")))?;
                    Ok(EngineData::Scalar(json!("b")))
                }),
            )?;
            Err(shared(EngineFailure("slot 1 never computed")))
        })
        .unwrap_err();
    assert_eq!(error.to_string(), "slot 1 never computed");

    assert_eq!(
        early_a.get().await.unwrap(),
        EngineData::Scalar(json!("a"))
    );
    assert_eq!(
        cell.fetch(1).await.unwrap_err().to_string(),
        "slot 1 never computed"
    );

    // Slot 2 was set before the failure, so it keeps its (pending) value.
    release_b.send(()).unwrap();
    assert_eq!(
        early_b.get().await.unwrap(),
        EngineData::Scalar(json!("b"))
    );

    // A late claimant loses without disturbing anything.
    cell.compute_if_absent(|_| panic!("cell is already claimed"))
        .unwrap();
    assert_eq!(cell.fetch(0).await.unwrap(), EngineData::Scalar(json!("a")));
}

fn subject_schema() -> Schema {
    Schema::builder()
        .object(
            ObjectType::new("Subject")
                .field(FieldDef::new("x", "Int"))
                .field(FieldDef::new("y", "Int")),
        )
        .object(ObjectType::new("Query").field(FieldDef::new("subject", "Subject")))
        .build()
}

/// Mutually-required fields are rejected at startup with the full cycle
/// path, before any resolver runs.
#[test]
fn startup_rejects_required_selection_cycles() {
    let schema = subject_schema();
    let mut builder = DispatcherRegistry::builder(&schema);
    builder
        .field_resolver(
            "Subject",
            "x",
            FieldResolverEntry::new().require(RequiredSelectionSet::new(RawSelectionSet::new(
                "Subject",
                vec![field("y").into()],
            ))),
        )
        .unwrap();
    builder
        .field_resolver(
            "Subject",
            "y",
            FieldResolverEntry::new().require(RequiredSelectionSet::new(RawSelectionSet::new(
                "Subject",
                vec![field("x").into()],
            ))),
        )
        .unwrap();

    let error = validate_registry(&schema, &builder.build()).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Cyclic required selections detected in path: Subject.x -> Subject.y -> Subject.x"
    );
}

struct BooResolver;

impl FieldResolver for BooResolver {
    fn resolve(
        &self,
        _ctx: ResolverContext,
    ) -> BoxFuture<'static, Result<EngineData, SharedError>> {
        async { Ok(EngineData::Scalar(json!(5))) }.boxed()
    }
}

struct DenyBoo;

impl Checker for DenyBoo {
    fn check(&self, _ctx: ResolverContext) -> BoxFuture<'static, CheckerResult> {
        async { CheckerResult::from_error(EngineFailure("permission denied")) }.boxed()
    }
}

/// Resolves one field of one object through the registry, writing the
/// resolver outcome and the combined check into the field's cell.
fn resolve_field(
    schema: &Arc<Schema>,
    registry: &DispatcherRegistry,
    oer: &ObjectEngineResult,
    key: &Key,
) {
    let type_name = oer.type_name().to_string();
    let resolver = registry
        .field_resolver(&type_name, key.name())
        .and_then(|entry| entry.dispatcher.clone());
    let ctx = ResolverContext::new(Arc::clone(schema))
        .with_field(&type_name, key.name())
        .with_arguments(key.arguments().clone());

    let data = match resolver {
        Some(dispatcher) => dispatcher.resolve(ctx.clone()),
        None => Value::from_value(EngineData::Null),
    };
    let field_check = match registry
        .field_checker(&type_name, key.name())
        .and_then(|entry| entry.checker.clone())
    {
        Some(checker) => Value::from_future(checker.check(ctx.clone()).map(Ok)),
        None => Value::from_value(CheckerResult::Success),
    };
    // The type-level check is claimed once per object; later fields read the
    // stored outcome.
    let type_check = type_check_once(oer, || {
        match registry
            .type_checker(&type_name)
            .and_then(|entry| entry.checker.clone())
        {
            Some(checker) => Value::from_future(checker.check(ctx.cleared()).map(Ok)),
            None => Value::from_value(CheckerResult::Success),
        }
    })
    .unwrap();
    let access = combine_checks(type_check, field_check).map(EngineData::Checker);

    oer.compute_if_absent(key, |slots| {
        slots.set(RAW_VALUE_SLOT, data)?;
        slots.set(ACCESS_CHECK_SLOT, access)
    })
    .unwrap();
}

/// A denied field resolves normally but reads as null, with the denial
/// attached at the field's response path.
#[tokio::test]
async fn denied_field_nulls_out_with_pathed_error() {
    let schema = Arc::new(
        Schema::builder()
            .object(ObjectType::new("Query").field(FieldDef::new("boo", "Int")))
            .build(),
    );
    let mut builder = DispatcherRegistry::builder(&schema);
    builder
        .field_resolver(
            "Query",
            "boo",
            FieldResolverEntry::new().with_dispatcher(ResolverDispatcher::unbatched(BooResolver)),
        )
        .unwrap();
    builder
        .field_checker("Query", "boo", CheckerEntry::new().with_checker(DenyBoo))
        .unwrap();
    let registry = builder.build();
    validate_registry(&schema, &registry).unwrap();

    let query = ObjectEngineResult::new_for_type("Query");
    let boo = Key::new("boo");
    resolve_field(&schema, &registry, &query, &boo);

    // The raw slot holds the resolver's value for internal consumers.
    assert_eq!(
        query.fetch(&boo, RAW_VALUE_SLOT).await.unwrap(),
        EngineData::Scalar(json!(5))
    );

    // Response assembly honors the access check: null data, pathed error.
    let mut data = serde_json_bytes::Map::new();
    let mut errors: Vec<FieldError> = Vec::new();
    match observe_field(&query, &boo).await {
        Ok(EngineData::Scalar(value)) => {
            data.insert(boo.response_key(), value);
        }
        Ok(other) => panic!("expected scalar data, got {other:?}"),
        Err(error) => {
            data.insert(boo.response_key(), serde_json_bytes::Value::Null);
            errors.push(FieldError {
                path: Path::empty().join_key(boo.response_key()),
                error,
            });
        }
    }

    assert_eq!(serde_json_bytes::Value::Object(data), json!({"boo": null}));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, Path::from("boo"));
    assert_eq!(errors[0].error.to_string(), "permission denied");
}

struct AllowAll;

impl Checker for AllowAll {
    fn check(&self, _ctx: ResolverContext) -> BoxFuture<'static, CheckerResult> {
        async { CheckerResult::Success }.boxed()
    }
}

/// An allowed field reads straight through.
#[tokio::test]
async fn allowed_field_reads_through() {
    let schema = Arc::new(
        Schema::builder()
            .object(ObjectType::new("Query").field(FieldDef::new("boo", "Int")))
            .build(),
    );
    let mut builder = DispatcherRegistry::builder(&schema);
    builder
        .field_resolver(
            "Query",
            "boo",
            FieldResolverEntry::new().with_dispatcher(ResolverDispatcher::unbatched(BooResolver)),
        )
        .unwrap();
    builder
        .field_checker("Query", "boo", CheckerEntry::new().with_checker(AllowAll))
        .unwrap();
    let registry = builder.build();
    validate_registry(&schema, &registry).unwrap();

    let query = ObjectEngineResult::new_for_type("Query");
    let boo = Key::new("boo");
    resolve_field(&schema, &registry, &query, &boo);
    assert_eq!(
        observe_field(&query, &boo).await.unwrap(),
        EngineData::Scalar(json!(5))
    );
}

struct CountingTypeCheck {
    calls: Arc<AtomicUsize>,
}

impl Checker for CountingTypeCheck {
    fn check(&self, _ctx: ResolverContext) -> BoxFuture<'static, CheckerResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async { CheckerResult::Success }.boxed()
    }
}

/// A type checker is invoked once per object instance, however many fields
/// of that object get resolved.
#[tokio::test]
async fn type_checker_runs_once_across_fields() {
    let schema = Arc::new(subject_schema());
    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = DispatcherRegistry::builder(&schema);
    builder
        .field_resolver(
            "Subject",
            "x",
            FieldResolverEntry::new().with_dispatcher(ResolverDispatcher::unbatched(BooResolver)),
        )
        .unwrap();
    builder
        .field_resolver(
            "Subject",
            "y",
            FieldResolverEntry::new().with_dispatcher(ResolverDispatcher::unbatched(BooResolver)),
        )
        .unwrap();
    builder
        .type_checker(
            "Subject",
            CheckerEntry::new().with_checker(CountingTypeCheck {
                calls: Arc::clone(&calls),
            }),
        )
        .unwrap();
    let registry = builder.build();
    validate_registry(&schema, &registry).unwrap();

    let subject = ObjectEngineResult::new_for_type("Subject");
    let x = Key::new("x");
    let y = Key::new("y");
    resolve_field(&schema, &registry, &subject, &x);
    resolve_field(&schema, &registry, &subject, &y);

    assert_eq!(
        observe_field(&subject, &x).await.unwrap(),
        EngineData::Scalar(json!(5))
    );
    assert_eq!(
        observe_field(&subject, &y).await.unwrap(),
        EngineData::Scalar(json!(5))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Materialized subtrees and pending node fetches cooperate: a failed node
/// fetch surfaces through every unclaimed field of its result.
#[tokio::test]
async fn failed_node_fetch_reaches_every_field() {
    let pending = ObjectEngineResult::new_pending_for_type("Subject");
    let x = Key::new("x");
    let y = Key::new("y");

    let fetch_x = {
        let pending = Arc::clone(&pending);
        let x = x.clone();
        tokio::spawn(async move { pending.fetch(&x, RAW_VALUE_SLOT).await })
    };
    tokio::task::yield_now().await;
    pending.resolve_exceptionally(shared(EngineFailure("node store unavailable")));

    assert_eq!(
        fetch_x.await.unwrap().unwrap_err().to_string(),
        "node store unavailable"
    );
    assert_eq!(
        pending.fetch(&y, RAW_VALUE_SLOT).await.unwrap_err().to_string(),
        "node store unavailable"
    );
    assert_eq!(
        pending.resolved_exception().await.unwrap().to_string(),
        "node store unavailable"
    );
}

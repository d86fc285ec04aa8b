//! Materializes an [`ObjectEngineResult`] from already-fetched JSON.
//!
//! Used when a whole subtree arrives at once, e.g. from a node fetch or a
//! cached response. The JSON is walked against the selection set so every
//! selected field gets a claimed cell, with response errors attached to the
//! exact field or list element their path names.

use std::sync::Arc;

use super::ACCESS_CHECK_SLOT;
use super::EngineData;
use super::Key;
use super::ObjectEngineResult;
use super::RAW_VALUE_SLOT;
use crate::access::CheckerResult;
use crate::cell::Cell;
use crate::error::SharedError;
use crate::error::shared;
use crate::json_ext::Json;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::spec::CollectedField;
use crate::spec::RawSelectionSet;
use crate::spec::Schema;
use crate::spec::SpecError;
use crate::value::Value;

impl ObjectEngineResult {
    /// Builds a fully-claimed result for `type_name` from `data`.
    ///
    /// `errors` are (path, failure) pairs from the upstream response; a field
    /// or list element whose path matches exactly settles to that failure
    /// instead of its data. `checked_keys` name the top-level fields whose
    /// access checks already ran upstream; their access slots settle to
    /// success, everything else, nested fields included, gets a null access
    /// slot.
    pub fn new_from_map(
        schema: &Schema,
        selections: &RawSelectionSet,
        type_name: &str,
        data: &Object,
        errors: &[(Path, SharedError)],
        checked_keys: &[Key],
    ) -> Result<Arc<Self>, SharedError> {
        let materializer = Materializer {
            schema,
            variables: &selections.variables,
            fragments: &selections.fragments,
            errors,
            checked_keys,
        };
        materializer.object(selections.clone(), type_name, data, &Path::empty())
    }
}

struct Materializer<'a> {
    schema: &'a Schema,
    variables: &'a Object,
    fragments: &'a Arc<crate::spec::Fragments>,
    errors: &'a [(Path, SharedError)],
    checked_keys: &'a [Key],
}

impl Materializer<'_> {
    fn object(
        &self,
        selections: RawSelectionSet,
        type_name: &str,
        data: &Object,
        path: &Path,
    ) -> Result<Arc<ObjectEngineResult>, SharedError> {
        let oer = ObjectEngineResult::new_for_type(type_name);
        let collected = selections
            .collect_fields(self.schema, type_name)
            .map_err(shared)?;
        for (response_key, field) in collected {
            let key = self.key_of(&field);
            let field_path = path.join_key(&response_key);
            let raw = match self.error_at(&field_path) {
                Some(error) => Value::from_shared_error(error.clone()),
                None => {
                    let field_type = self
                        .schema
                        .field(type_name, &field.name)
                        .map(|def| def.ty().to_string());
                    let json = data.get(response_key.as_str());
                    Value::from_value(self.value(
                        &field,
                        field_type.as_deref(),
                        json,
                        &field_path,
                    )?)
                }
            };
            // checked_keys speak about the root object only; a nested field
            // that happens to share a key is not covered by the caller's
            // checks.
            let access = if path.is_empty() && self.checked_keys.contains(&key) {
                Value::from_value(EngineData::Checker(CheckerResult::Success))
            } else {
                Value::from_value(EngineData::Null)
            };
            oer.cell(&key)
                .compute_if_unclaimed("materialized field", |slots| {
                    slots.set(RAW_VALUE_SLOT, raw)?;
                    slots.set(ACCESS_CHECK_SLOT, access)
                })?;
        }
        Ok(oer)
    }

    fn value(
        &self,
        field: &CollectedField,
        field_type: Option<&str>,
        json: Option<&Json>,
        path: &Path,
    ) -> Result<EngineData, SharedError> {
        match json {
            None | Some(Json::Null) => Ok(EngineData::Null),
            Some(Json::Array(items)) => {
                let mut cells = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let element_path = path.join_index(index);
                    let raw = match self.error_at(&element_path) {
                        Some(error) => Value::from_shared_error(error.clone()),
                        None => Value::from_value(self.value(
                            field,
                            field_type,
                            Some(item),
                            &element_path,
                        )?),
                    };
                    let cell = Cell::for_field_slots();
                    cell.compute_if_unclaimed("materialized list element", |slots| {
                        slots.set(RAW_VALUE_SLOT, raw)?;
                        slots.set(ACCESS_CHECK_SLOT, Value::from_value(EngineData::Null))
                    })?;
                    cells.push(Arc::new(cell));
                }
                Ok(EngineData::List(cells))
            }
            Some(Json::Object(map)) => {
                match field_type.filter(|ty| self.schema.is_composite(ty)) {
                    // Leaf-typed field: JSON objects are custom scalar values.
                    None => Ok(EngineData::Scalar(Json::Object(map.clone()))),
                    Some(declared) => {
                        let concrete = if self.schema.is_abstract(declared) {
                            map.get("__typename").and_then(Json::as_str).ok_or_else(
                                || shared(SpecError::MissingTypename(declared.to_string())),
                            )?
                        } else {
                            declared
                        };
                        let child_selections = RawSelectionSet {
                            type_condition: declared.to_string(),
                            selections: field.selections.clone(),
                            variables: self.variables.clone(),
                            fragments: Arc::clone(self.fragments),
                        };
                        let child = self.object(child_selections, concrete, map, path)?;
                        Ok(EngineData::Object(child))
                    }
                }
            }
            Some(other) => Ok(EngineData::Scalar(other.clone())),
        }
    }

    fn key_of(&self, field: &CollectedField) -> Key {
        let mut key = Key::new(field.name.as_str()).with_arguments(field.arguments.clone());
        if let Some(alias) = &field.alias {
            key = key.with_alias(alias.as_str());
        }
        key
    }

    fn error_at(&self, path: &Path) -> Option<&SharedError> {
        self.errors
            .iter()
            .find_map(|(error_path, error)| (error_path == path).then_some(error))
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::access::observe_field;
    use crate::spec::ArgumentDef;
    use crate::spec::FieldDef;
    use crate::spec::Fragments;
    use crate::spec::ObjectType;
    use crate::spec::UnionType;
    use crate::spec::field;
    use crate::spec::inline;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct Upstream(&'static str);

    fn schema() -> Schema {
        Schema::builder()
            .object(
                ObjectType::new("User")
                    .field(FieldDef::new("id", "ID"))
                    .field(FieldDef::new("name", "String"))
                    .field(
                        FieldDef::new("friends", "User").argument(
                            ArgumentDef::new("onlyDirect").default_value(json!(false)),
                        ),
                    )
                    .field(
                        FieldDef::new("socialMedia", "String")
                            .argument(ArgumentDef::new("siteName")),
                    )
                    .field(FieldDef::new("bestFriend", "User")),
            )
            .object(ObjectType::new("Foo").field(FieldDef::new("bar", "String")))
            .union(UnionType::new("U1").member("Foo"))
            .object(ObjectType::new("Query").field(FieldDef::new("whoAmI", "U1")))
            .build()
    }

    fn data(value: Json) -> Object {
        match value {
            Json::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    async fn scalar_at(oer: &ObjectEngineResult, key: &Key) -> Json {
        match oer.fetch(key, RAW_VALUE_SLOT).await.unwrap() {
            EngineData::Scalar(json) => json,
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn materializes_scalars_and_nested_objects() {
        let schema = schema();
        let selections = RawSelectionSet::new(
            "User",
            vec![
                field("id").into(),
                field("bestFriend")
                    .select(vec![field("name").into()])
                    .into(),
            ],
        );
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "User",
            &data(json!({"id": "u1", "bestFriend": {"name": "Ada"}})),
            &[],
            &[],
        )
        .unwrap();

        assert_eq!(scalar_at(&oer, &Key::new("id")).await, json!("u1"));
        let best = oer
            .fetch(&Key::new("bestFriend"), RAW_VALUE_SLOT)
            .await
            .unwrap();
        let best = best.as_object().unwrap();
        assert_eq!(best.type_name(), "User");
        assert_eq!(scalar_at(best, &Key::new("name")).await, json!("Ada"));
    }

    #[tokio::test]
    async fn aliased_fields_key_on_alias_and_arguments() {
        let schema = schema();
        let selections = RawSelectionSet::new(
            "User",
            vec![
                field("socialMedia")
                    .alias("site")
                    .variable_argument("siteName", "siteVar")
                    .into(),
                field("friends").into(),
            ],
        )
        .with_variables({
            let mut variables = Object::new();
            variables.insert("siteVar", json!("example"));
            variables
        });
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "User",
            &data(json!({"site": "example.com", "friends": null})),
            &[],
            &[],
        )
        .unwrap();

        let key = Key::new("socialMedia")
            .with_alias("site")
            .with_argument("siteName", json!("example"));
        assert_eq!(scalar_at(&oer, &key).await, json!("example.com"));
        // Default arguments are part of the key.
        let friends = Key::new("friends").with_argument("onlyDirect", json!(false));
        assert!(
            oer.fetch(&friends, RAW_VALUE_SLOT)
                .await
                .unwrap()
                .is_null()
        );
    }

    #[tokio::test]
    async fn union_spread_narrows_to_typename() {
        let schema = schema();
        let selections = RawSelectionSet::new(
            "Query",
            vec![
                field("whoAmI")
                    .select(vec![inline("Foo", vec![field("bar").into()])])
                    .into(),
            ],
        );
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "Query",
            &data(json!({"whoAmI": {"__typename": "Foo", "bar": "baz"}})),
            &[],
            &[],
        )
        .unwrap();
        let who = oer.fetch(&Key::new("whoAmI"), RAW_VALUE_SLOT).await.unwrap();
        let who = who.as_object().unwrap();
        assert_eq!(who.type_name(), "Foo");
        assert_eq!(scalar_at(who, &Key::new("bar")).await, json!("baz"));
    }

    #[tokio::test]
    async fn missing_typename_for_abstract_type_fails() {
        let schema = schema();
        let selections = RawSelectionSet::new(
            "Query",
            vec![
                field("whoAmI")
                    .select(vec![inline("Foo", vec![field("bar").into()])])
                    .into(),
            ],
        );
        let error = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "Query",
            &data(json!({"whoAmI": {"bar": "baz"}})),
            &[],
            &[],
        )
        .unwrap_err();
        assert!(error.to_string().contains("__typename"));
    }

    #[tokio::test]
    async fn errors_attach_to_exact_paths_only() {
        let schema = schema();
        let selections = RawSelectionSet::new(
            "User",
            vec![
                field("id").into(),
                field("friends")
                    .select(vec![field("name").into()])
                    .into(),
            ],
        );
        let errors = vec![(
            Path::from("friends.1"),
            shared(Upstream("friend unavailable")),
        )];
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "User",
            &data(json!({"id": "u1", "friends": [{"name": "Ada"}, {"name": "Grace"}]})),
            &errors,
            &[],
        )
        .unwrap();

        assert_eq!(scalar_at(&oer, &Key::new("id")).await, json!("u1"));
        let friends_key = Key::new("friends").with_argument("onlyDirect", json!(false));
        let friends = oer.fetch(&friends_key, RAW_VALUE_SLOT).await.unwrap();
        let elements = friends.as_list().unwrap().to_vec();
        assert_eq!(elements.len(), 2);

        let first = elements[0].fetch(RAW_VALUE_SLOT).await.unwrap();
        let first = first.as_object().unwrap();
        assert_eq!(scalar_at(first, &Key::new("name")).await, json!("Ada"));

        let error = elements[1].fetch(RAW_VALUE_SLOT).await.unwrap_err();
        assert_eq!(error.to_string(), "friend unavailable");
    }

    #[tokio::test]
    async fn checked_keys_settle_access_to_success() {
        let schema = schema();
        let selections =
            RawSelectionSet::new("User", vec![field("id").into(), field("name").into()]);
        let checked = vec![Key::new("id")];
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "User",
            &data(json!({"id": "u1", "name": "Ada"})),
            &[],
            &checked,
        )
        .unwrap();

        assert_eq!(
            observe_field(&oer, &Key::new("id")).await.unwrap(),
            EngineData::Scalar(json!("u1"))
        );
        assert_eq!(
            oer.fetch(&Key::new("name"), ACCESS_CHECK_SLOT).await.unwrap(),
            EngineData::Null
        );
    }

    #[tokio::test]
    async fn checked_keys_do_not_reach_nested_fields() {
        let schema = schema();
        let selections = RawSelectionSet::new(
            "User",
            vec![
                field("id").into(),
                field("bestFriend").select(vec![field("id").into()]).into(),
            ],
        );
        let checked = vec![Key::new("id")];
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "User",
            &data(json!({"id": "u1", "bestFriend": {"id": "u2"}})),
            &[],
            &checked,
        )
        .unwrap();

        assert_eq!(
            oer.fetch(&Key::new("id"), ACCESS_CHECK_SLOT).await.unwrap(),
            EngineData::Checker(CheckerResult::Success)
        );
        // The nested object's `id` shares the key but not the check.
        let best = oer
            .fetch(&Key::new("bestFriend"), RAW_VALUE_SLOT)
            .await
            .unwrap();
        let best = best.as_object().unwrap().clone();
        assert_eq!(
            best.fetch(&Key::new("id"), ACCESS_CHECK_SLOT).await.unwrap(),
            EngineData::Null
        );
    }

    #[tokio::test]
    async fn fragment_spreads_materialize_through_definitions() {
        let schema = schema();
        let fragments = Fragments::new().fragment("UserFields", "User", vec![field("name").into()]);
        let selections = RawSelectionSet::new(
            "User",
            vec![field("id").into(), crate::spec::spread("UserFields")],
        )
        .with_fragments(fragments);
        let oer = ObjectEngineResult::new_from_map(
            &schema,
            &selections,
            "User",
            &data(json!({"id": "u1", "name": "Ada"})),
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(scalar_at(&oer, &Key::new("name")).await, json!("Ada"));
    }
}

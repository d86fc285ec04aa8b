//! Registration of resolvers, checkers and their required selections.
//!
//! A [`DispatcherRegistry`] is built against one [`Schema`] instance and
//! remembers its id; validation refuses to run it against any other
//! instance. Each coordinate takes at most one resolver and one checker,
//! each type at most one type checker and one node resolver.

use std::sync::Arc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::dispatch::Checker;
use crate::dispatch::Coordinate;
use crate::dispatch::ResolverDispatcher;
use crate::spec::RawSelectionSet;
use crate::spec::Schema;

/// Errors raised while building a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A coordinate was given a second field resolver.
    #[error("field resolver for '{type_name}.{field}' is already registered")]
    DuplicateFieldResolver { type_name: String, field: String },

    /// A coordinate was given a second field checker.
    #[error("field checker for '{type_name}.{field}' is already registered")]
    DuplicateFieldChecker { type_name: String, field: String },

    /// A type was given a second type checker.
    #[error("type checker for '{type_name}' is already registered")]
    DuplicateTypeChecker { type_name: String },

    /// A type was given a second node resolver.
    #[error("node resolver for '{type_name}' is already registered")]
    DuplicateNodeResolver { type_name: String },
}

/// Where a required-selection variable gets its value from at execution
/// time. Field-sourced bindings are dependency edges of their own: the
/// fields along the path must be resolved before the selection can run.
#[derive(Clone, Debug)]
pub enum VariableSource {
    /// A value from the resolved field's arguments.
    Argument { path: Vec<String> },
    /// A value read from the enclosing object's own fields.
    ObjectField { path: Vec<String> },
    /// A value read from query-scoped fields.
    QueryField { path: Vec<String> },
}

/// Binds one selection variable to its runtime source.
#[derive(Clone, Debug)]
pub struct VariablesResolver {
    pub name: String,
    pub source: VariableSource,
}

impl VariablesResolver {
    pub fn from_argument(name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source: VariableSource::Argument { path },
        }
    }

    pub fn from_object_field(name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source: VariableSource::ObjectField { path },
        }
    }

    pub fn from_query_field(name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source: VariableSource::QueryField { path },
        }
    }
}

/// Selections a resolver or checker declares it needs before running,
/// together with the variable bindings those selections reference.
///
/// The selection's type condition decides its scope: the component's own
/// type for object-scoped data, the schema's query type for query-scoped
/// data.
#[derive(Clone, Debug)]
pub struct RequiredSelectionSet {
    pub selections: RawSelectionSet,
    pub variables: Vec<VariablesResolver>,
}

impl RequiredSelectionSet {
    pub fn new(selections: RawSelectionSet) -> Self {
        Self {
            selections,
            variables: Vec::new(),
        }
    }

    pub fn bind(mut self, variable: VariablesResolver) -> Self {
        self.variables.push(variable);
        self
    }
}

/// A registered field resolver: its dispatcher and required selections.
/// Validation-only registrations may omit the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct FieldResolverEntry {
    pub dispatcher: Option<ResolverDispatcher>,
    pub required: Vec<RequiredSelectionSet>,
}

impl FieldResolverEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatcher(mut self, dispatcher: ResolverDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn require(mut self, selections: RequiredSelectionSet) -> Self {
        self.required.push(selections);
        self
    }
}

/// A registered field or type checker.
#[derive(Clone, Default)]
pub struct CheckerEntry {
    pub checker: Option<Arc<dyn Checker>>,
    pub required: Vec<RequiredSelectionSet>,
}

impl CheckerEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checker(mut self, checker: impl Checker) -> Self {
        self.checker = Some(Arc::new(checker));
        self
    }

    pub fn require(mut self, selections: RequiredSelectionSet) -> Self {
        self.required.push(selections);
        self
    }
}

impl std::fmt::Debug for CheckerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("CheckerEntry")
            .field("checker", &self.checker.is_some())
            .field("required", &self.required.len())
            .finish()
    }
}

/// Everything registered against one schema instance.
#[derive(Debug)]
pub struct DispatcherRegistry {
    schema_id: Uuid,
    field_resolvers: IndexMap<Coordinate, FieldResolverEntry>,
    field_checkers: IndexMap<Coordinate, CheckerEntry>,
    type_checkers: IndexMap<String, CheckerEntry>,
    node_resolvers: IndexMap<String, ResolverDispatcher>,
}

impl DispatcherRegistry {
    pub fn builder(schema: &Schema) -> DispatcherRegistryBuilder {
        DispatcherRegistryBuilder {
            schema_id: schema.id(),
            field_resolvers: IndexMap::new(),
            field_checkers: IndexMap::new(),
            type_checkers: IndexMap::new(),
            node_resolvers: IndexMap::new(),
        }
    }

    /// The id of the schema instance this registry was built for.
    pub fn schema_id(&self) -> Uuid {
        self.schema_id
    }

    pub fn field_resolver(&self, type_name: &str, field: &str) -> Option<&FieldResolverEntry> {
        self.field_resolvers
            .get(&(type_name.to_string(), field.to_string()))
    }

    pub fn field_checker(&self, type_name: &str, field: &str) -> Option<&CheckerEntry> {
        self.field_checkers
            .get(&(type_name.to_string(), field.to_string()))
    }

    pub fn type_checker(&self, type_name: &str) -> Option<&CheckerEntry> {
        self.type_checkers.get(type_name)
    }

    pub fn node_resolver(&self, type_name: &str) -> Option<&ResolverDispatcher> {
        self.node_resolvers.get(type_name)
    }

    pub fn field_resolvers(
        &self,
    ) -> impl Iterator<Item = (&Coordinate, &FieldResolverEntry)> {
        self.field_resolvers.iter()
    }

    pub fn field_checkers(&self) -> impl Iterator<Item = (&Coordinate, &CheckerEntry)> {
        self.field_checkers.iter()
    }

    pub fn type_checkers(&self) -> impl Iterator<Item = (&String, &CheckerEntry)> {
        self.type_checkers.iter()
    }
}

#[derive(Debug)]
pub struct DispatcherRegistryBuilder {
    schema_id: Uuid,
    field_resolvers: IndexMap<Coordinate, FieldResolverEntry>,
    field_checkers: IndexMap<Coordinate, CheckerEntry>,
    type_checkers: IndexMap<String, CheckerEntry>,
    node_resolvers: IndexMap<String, ResolverDispatcher>,
}

impl DispatcherRegistryBuilder {
    pub fn field_resolver(
        &mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        entry: FieldResolverEntry,
    ) -> Result<&mut Self, RegistryError> {
        let coordinate = (type_name.into(), field.into());
        if self.field_resolvers.contains_key(&coordinate) {
            return Err(RegistryError::DuplicateFieldResolver {
                type_name: coordinate.0,
                field: coordinate.1,
            });
        }
        self.field_resolvers.insert(coordinate, entry);
        Ok(self)
    }

    pub fn field_checker(
        &mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        entry: CheckerEntry,
    ) -> Result<&mut Self, RegistryError> {
        let coordinate = (type_name.into(), field.into());
        if self.field_checkers.contains_key(&coordinate) {
            return Err(RegistryError::DuplicateFieldChecker {
                type_name: coordinate.0,
                field: coordinate.1,
            });
        }
        self.field_checkers.insert(coordinate, entry);
        Ok(self)
    }

    pub fn type_checker(
        &mut self,
        type_name: impl Into<String>,
        entry: CheckerEntry,
    ) -> Result<&mut Self, RegistryError> {
        let type_name = type_name.into();
        if self.type_checkers.contains_key(&type_name) {
            return Err(RegistryError::DuplicateTypeChecker { type_name });
        }
        self.type_checkers.insert(type_name, entry);
        Ok(self)
    }

    pub fn node_resolver(
        &mut self,
        type_name: impl Into<String>,
        dispatcher: ResolverDispatcher,
    ) -> Result<&mut Self, RegistryError> {
        let type_name = type_name.into();
        if self.node_resolvers.contains_key(&type_name) {
            return Err(RegistryError::DuplicateNodeResolver { type_name });
        }
        self.node_resolvers.insert(type_name, dispatcher);
        Ok(self)
    }

    pub fn build(self) -> DispatcherRegistry {
        DispatcherRegistry {
            schema_id: self.schema_id,
            field_resolvers: self.field_resolvers,
            field_checkers: self.field_checkers,
            type_checkers: self.type_checkers,
            node_resolvers: self.node_resolvers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FieldDef;
    use crate::spec::ObjectType;
    use crate::spec::field;

    fn schema() -> Schema {
        Schema::builder()
            .object(
                ObjectType::new("User")
                    .field(FieldDef::new("id", "ID"))
                    .field(FieldDef::new("name", "String")),
            )
            .build()
    }

    #[test]
    fn registers_and_looks_up_entries() {
        let schema = schema();
        let mut builder = DispatcherRegistry::builder(&schema);
        builder
            .field_resolver(
                "User",
                "name",
                FieldResolverEntry::new().require(RequiredSelectionSet::new(
                    RawSelectionSet::new("User", vec![field("id").into()]),
                )),
            )
            .unwrap();
        builder.type_checker("User", CheckerEntry::new()).unwrap();
        let registry = builder.build();

        assert_eq!(registry.schema_id(), schema.id());
        assert_eq!(
            registry.field_resolver("User", "name").unwrap().required.len(),
            1
        );
        assert!(registry.field_resolver("User", "id").is_none());
        assert!(registry.type_checker("User").is_some());
    }

    #[test]
    fn duplicate_registrations_are_rejected() {
        let schema = schema();
        let mut builder = DispatcherRegistry::builder(&schema);
        builder
            .field_resolver("User", "name", FieldResolverEntry::new())
            .unwrap();
        assert!(matches!(
            builder.field_resolver("User", "name", FieldResolverEntry::new()),
            Err(RegistryError::DuplicateFieldResolver { .. })
        ));

        builder.type_checker("User", CheckerEntry::new()).unwrap();
        assert!(matches!(
            builder.type_checker("User", CheckerEntry::new()),
            Err(RegistryError::DuplicateTypeChecker { .. })
        ));
    }

    #[test]
    fn variable_bindings_attach_to_selections() {
        let required = RequiredSelectionSet::new(RawSelectionSet::new(
            "User",
            vec![field("id").into()],
        ))
        .bind(VariablesResolver::from_object_field(
            "userId",
            vec!["id".to_string()],
        ));
        assert_eq!(required.variables.len(), 1);
        assert!(matches!(
            required.variables[0].source,
            VariableSource::ObjectField { .. }
        ));
    }
}

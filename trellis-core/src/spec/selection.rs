use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use super::Schema;
use super::SpecError;
use crate::json_ext::Json;
use crate::json_ext::Object;

/// Fragment expansion bound. Self-referential fragments are skipped on
/// re-entry, so this only guards degenerate nesting depth.
pub(crate) const RECURSION_LIMIT: usize = 512;

/// An argument value in a selection, either inline or bound to a variable.
#[derive(Clone, Debug)]
pub enum ArgumentValue {
    Literal(Json),
    Variable(String),
}

/// A single field selection, with optional alias, arguments and
/// sub-selections.
#[derive(Clone, Debug)]
pub struct FieldSelection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<(String, ArgumentValue)>,
    pub selections: Vec<Selection>,
}

impl FieldSelection {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: ArgumentValue) -> Self {
        self.arguments.push((name.into(), value));
        self
    }

    pub fn literal_argument(self, name: impl Into<String>, value: Json) -> Self {
        self.argument(name, ArgumentValue::Literal(value))
    }

    pub fn variable_argument(self, name: impl Into<String>, variable: impl Into<String>) -> Self {
        self.argument(name, ArgumentValue::Variable(variable.into()))
    }

    pub fn select(mut self, selections: Vec<Selection>) -> Self {
        self.selections = selections;
        self
    }

    /// The key this field appears under in the response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A field selection on `name`.
pub fn field(name: impl Into<String>) -> FieldSelection {
    FieldSelection {
        name: name.into(),
        alias: None,
        arguments: Vec::new(),
        selections: Vec::new(),
    }
}

/// An inline fragment `... on Condition { selections }`.
pub fn inline(type_condition: impl Into<String>, selections: Vec<Selection>) -> Selection {
    Selection::InlineFragment {
        type_condition: type_condition.into(),
        selections,
    }
}

/// A named fragment spread `...name`.
pub fn spread(name: impl Into<String>) -> Selection {
    Selection::FragmentSpread { name: name.into() }
}

#[derive(Clone, Debug)]
pub enum Selection {
    Field(FieldSelection),
    InlineFragment {
        type_condition: String,
        selections: Vec<Selection>,
    },
    FragmentSpread {
        name: String,
    },
}

impl From<FieldSelection> for Selection {
    fn from(field: FieldSelection) -> Self {
        Selection::Field(field)
    }
}

/// A named fragment definition.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

/// The fragment definitions a selection set may spread.
#[derive(Clone, Debug, Default)]
pub struct Fragments {
    fragments: HashMap<String, Fragment>,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragment(
        mut self,
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selections: Vec<Selection>,
    ) -> Self {
        self.fragments.insert(
            name.into(),
            Fragment {
                type_condition: type_condition.into(),
                selections,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }
}

/// A selection set on a type condition, with the variable values and fragment
/// definitions needed to interpret it.
#[derive(Clone, Debug)]
pub struct RawSelectionSet {
    pub type_condition: String,
    pub selections: Vec<Selection>,
    pub variables: Object,
    pub fragments: Arc<Fragments>,
}

impl RawSelectionSet {
    pub fn new(type_condition: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            type_condition: type_condition.into(),
            selections,
            variables: Object::new(),
            fragments: Arc::new(Fragments::default()),
        }
    }

    pub fn with_variables(mut self, variables: Object) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_fragments(mut self, fragments: Fragments) -> Self {
        self.fragments = Arc::new(fragments);
        self
    }

    /// Flattens this selection set for a concrete object type: resolves
    /// fragment spreads and inline fragments whose condition applies, merges
    /// selections that share a response key, and coerces arguments using the
    /// bound variables and schema defaults.
    ///
    /// The returned map preserves first-appearance order of response keys.
    pub fn collect_fields(
        &self,
        schema: &Schema,
        concrete_type: &str,
    ) -> Result<IndexMap<String, CollectedField>, SpecError> {
        if schema.type_def(concrete_type).is_none() {
            return Err(SpecError::UnknownType(concrete_type.to_string()));
        }
        let mut collected = IndexMap::new();
        let mut expanding = Vec::new();
        self.collect_into(
            schema,
            concrete_type,
            &self.selections,
            &mut collected,
            &mut expanding,
            0,
        )?;
        Ok(collected)
    }

    /// Whether `field` is selected (under any alias) for values of
    /// `concrete_type`.
    pub fn contains_field(
        &self,
        schema: &Schema,
        concrete_type: &str,
        field: &str,
    ) -> Result<bool, SpecError> {
        Ok(self
            .collect_fields(schema, concrete_type)?
            .values()
            .any(|collected| collected.name == field))
    }

    fn collect_into(
        &self,
        schema: &Schema,
        concrete_type: &str,
        selections: &[Selection],
        collected: &mut IndexMap<String, CollectedField>,
        expanding: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), SpecError> {
        if depth > RECURSION_LIMIT {
            return Err(SpecError::RecursionLimitExceeded);
        }
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    self.collect_field(schema, concrete_type, field, collected)?;
                }
                Selection::InlineFragment {
                    type_condition,
                    selections,
                } => {
                    if schema.type_def(type_condition).is_none() {
                        return Err(SpecError::UnknownType(type_condition.clone()));
                    }
                    if schema.spread_applies(type_condition, concrete_type) {
                        self.collect_into(
                            schema,
                            concrete_type,
                            selections,
                            collected,
                            expanding,
                            depth + 1,
                        )?;
                    }
                }
                Selection::FragmentSpread { name } => {
                    if expanding.iter().any(|expanded| expanded == name) {
                        continue;
                    }
                    let fragment = self
                        .fragments
                        .get(name)
                        .ok_or_else(|| SpecError::UnknownFragment(name.clone()))?;
                    if schema.type_def(&fragment.type_condition).is_none() {
                        return Err(SpecError::UnknownType(fragment.type_condition.clone()));
                    }
                    if schema.spread_applies(&fragment.type_condition, concrete_type) {
                        expanding.push(name.clone());
                        self.collect_into(
                            schema,
                            concrete_type,
                            &fragment.selections,
                            collected,
                            expanding,
                            depth + 1,
                        )?;
                        expanding.pop();
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_field(
        &self,
        schema: &Schema,
        concrete_type: &str,
        field: &FieldSelection,
        collected: &mut IndexMap<String, CollectedField>,
    ) -> Result<(), SpecError> {
        let response_key = field.response_key().to_string();
        if let Some(existing) = collected.get_mut(&response_key) {
            // Same response key selected twice: sub-selections merge.
            existing.selections.extend_from_slice(&field.selections);
            return Ok(());
        }
        let arguments = if field.name.starts_with("__") {
            Object::new()
        } else {
            let def = schema.field(concrete_type, &field.name).ok_or_else(|| {
                SpecError::UnknownField {
                    type_name: concrete_type.to_string(),
                    field: field.name.clone(),
                }
            })?;
            self.coerce_arguments(field, def.arguments())
        };
        collected.insert(
            response_key,
            CollectedField {
                name: field.name.clone(),
                alias: field.alias.clone(),
                arguments,
                selections: field.selections.clone(),
            },
        );
        Ok(())
    }

    /// Explicit arguments first, variables substituted from the bound
    /// variable values, then schema defaults for anything still missing.
    fn coerce_arguments(
        &self,
        field: &FieldSelection,
        definitions: &[super::ArgumentDef],
    ) -> Object {
        let mut arguments = Object::new();
        for (name, value) in &field.arguments {
            match value {
                ArgumentValue::Literal(json) => {
                    arguments.insert(name.as_str(), json.clone());
                }
                ArgumentValue::Variable(variable) => {
                    if let Some(json) = self.variables.get(variable.as_str()) {
                        arguments.insert(name.as_str(), json.clone());
                    }
                }
            }
        }
        for def in definitions {
            if arguments.get(def.name()).is_none() {
                if let Some(default) = def.default() {
                    arguments.insert(def.name(), default.clone());
                }
            }
        }
        arguments
    }
}

/// A field after flattening: its schema name, alias, coerced arguments and
/// merged sub-selections.
#[derive(Clone, Debug)]
pub struct CollectedField {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Object,
    pub selections: Vec<Selection>,
}

impl CollectedField {
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

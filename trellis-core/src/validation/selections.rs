//! Schematic validation of required selections, and extraction of the
//! object-type coordinates a selection touches.

use indexmap::IndexSet;

use super::ValidationError;
use crate::registry::RequiredSelectionSet;
use crate::registry::VariableSource;
use crate::spec::Fragments;
use crate::spec::Schema;
use crate::spec::Selection;

/// A `(object type, field)` coordinate touched by a selection, or a bare
/// `(object type, None)` entry for a type reached by a composite field.
pub(crate) type ObjectCoordinate = (String, Option<String>);

/// Validates `required` against the schema without building coordinates.
pub fn validate_required_selections(
    schema: &Schema,
    owner_type: &str,
    required: &RequiredSelectionSet,
) -> Result<(), ValidationError> {
    object_coords(schema, owner_type, required).map(|_| ())
}

/// Every `(object type, field)` pair `required` touches, expanded through
/// fragments and abstract types, plus the coordinates implied by its
/// field-sourced variable bindings. `owner_type` roots object-field variable
/// paths.
///
/// Abstract type conditions expand to every possible object type: a
/// selection on an interface touches the coordinate on each implementation.
pub(crate) fn object_coords(
    schema: &Schema,
    owner_type: &str,
    required: &RequiredSelectionSet,
) -> Result<IndexSet<ObjectCoordinate>, ValidationError> {
    let mut coords = IndexSet::new();
    let set = &required.selections;
    collect(
        schema,
        &set.type_condition,
        &set.selections,
        &set.fragments,
        &mut coords,
        &mut Vec::new(),
    )?;
    for binding in &required.variables {
        match &binding.source {
            VariableSource::Argument { .. } => {}
            VariableSource::ObjectField { path } => {
                path_coords(schema, owner_type, &binding.name, path, &mut coords)?;
            }
            VariableSource::QueryField { path } => {
                path_coords(schema, schema.query_type(), &binding.name, path, &mut coords)?;
            }
        }
    }
    Ok(coords)
}

fn collect(
    schema: &Schema,
    condition: &str,
    selections: &[Selection],
    fragments: &Fragments,
    coords: &mut IndexSet<ObjectCoordinate>,
    expanding: &mut Vec<String>,
) -> Result<(), ValidationError> {
    let possible: Vec<String> = schema
        .possible_types(condition)
        .ok_or_else(|| ValidationError::UnknownType {
            name: condition.to_string(),
        })?
        .into_iter()
        .map(str::to_string)
        .collect();
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                if field.name.starts_with("__") {
                    continue;
                }
                let def =
                    schema
                        .field(condition, &field.name)
                        .ok_or_else(|| ValidationError::UnknownField {
                            type_name: condition.to_string(),
                            field: field.name.clone(),
                        })?;
                for object in &possible {
                    coords.insert((object.clone(), Some(field.name.clone())));
                }
                if !field.selections.is_empty() {
                    let nested = def.ty().to_string();
                    let Some(nested_possible) = schema.possible_types(&nested) else {
                        return Err(ValidationError::SubselectionOnLeaf {
                            type_name: condition.to_string(),
                            field: field.name.clone(),
                        });
                    };
                    for object in nested_possible {
                        coords.insert((object.to_string(), None));
                    }
                    collect(
                        schema,
                        &nested,
                        &field.selections,
                        fragments,
                        coords,
                        expanding,
                    )?;
                }
            }
            Selection::InlineFragment {
                type_condition,
                selections,
            } => {
                collect(schema, type_condition, selections, fragments, coords, expanding)?;
            }
            Selection::FragmentSpread { name } => {
                if expanding.iter().any(|expanded| expanded == name) {
                    continue;
                }
                let fragment =
                    fragments
                        .get(name)
                        .ok_or_else(|| ValidationError::UnknownFragment {
                            name: name.clone(),
                        })?;
                expanding.push(name.clone());
                collect(
                    schema,
                    &fragment.type_condition,
                    &fragment.selections,
                    fragments,
                    coords,
                    expanding,
                )?;
                expanding.pop();
            }
        }
    }
    Ok(())
}

/// Walks a variable binding path from `root`, recording the field coordinate
/// of every segment.
fn path_coords(
    schema: &Schema,
    root: &str,
    variable: &str,
    path: &[String],
    coords: &mut IndexSet<ObjectCoordinate>,
) -> Result<(), ValidationError> {
    let mut current = root.to_string();
    for (position, segment) in path.iter().enumerate() {
        if segment.starts_with("__") {
            break;
        }
        let possible: Vec<String> = schema
            .possible_types(&current)
            .ok_or_else(|| ValidationError::InvalidVariablePath {
                variable: variable.to_string(),
                path: path.join("."),
            })?
            .into_iter()
            .map(str::to_string)
            .collect();
        let def = schema
            .field(&current, segment)
            .ok_or_else(|| ValidationError::UnknownField {
                type_name: current.clone(),
                field: segment.clone(),
            })?;
        for object in possible {
            coords.insert((object, Some(segment.clone())));
        }
        let next = def.ty().to_string();
        if schema.is_composite(&next) {
            if let Some(nested_possible) = schema.possible_types(&next) {
                for object in nested_possible {
                    coords.insert((object.to_string(), None));
                }
            }
            current = next;
        } else if position + 1 < path.len() {
            return Err(ValidationError::InvalidVariablePath {
                variable: variable.to_string(),
                path: path.join("."),
            });
        }
    }
    Ok(())
}

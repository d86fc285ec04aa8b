//! Required-selection cycle detection.
//!
//! Nodes are the individual required selection sets of field resolvers,
//! field checkers and type checkers. A resolver selection that touches a
//! coordinate depends on that coordinate's resolver and checker selections;
//! a checker selection reads raw data only, so it depends on resolver
//! selections alone. That asymmetry is what lets a field's own checker
//! require the field it guards.

use std::collections::HashSet;

use super::ValidationError;
use super::selections::object_coords;
use crate::registry::DispatcherRegistry;
use crate::registry::RequiredSelectionSet;
use crate::spec::Schema;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum NodeKind {
    Resolver,
    Checker,
}

/// One required selection set of one registered component.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct Node {
    kind: NodeKind,
    type_name: String,
    field: Option<String>,
    index: usize,
}

impl Node {
    fn label(&self) -> String {
        match &self.field {
            Some(field) => format!("{}.{}", self.type_name, field),
            None => self.type_name.clone(),
        }
    }
}

/// Validates `registry` against `schema`: the registry must have been built
/// for this exact schema instance, every required selection must be
/// schematically valid, and the dependency graph must be acyclic.
pub fn validate_registry(
    schema: &Schema,
    registry: &DispatcherRegistry,
) -> Result<(), ValidationError> {
    if registry.schema_id() != schema.id() {
        return Err(ValidationError::SchemaMismatch {
            registry: registry.schema_id(),
            schema: schema.id(),
        });
    }

    let walker = Walker { schema, registry };
    let mut visited = HashSet::new();
    for ((type_name, field), entry) in registry.field_resolvers() {
        for index in 0..entry.required.len() {
            let node = Node {
                kind: NodeKind::Resolver,
                type_name: type_name.clone(),
                field: Some(field.clone()),
                index,
            };
            walker.detect(node, &mut Vec::new(), &mut HashSet::new(), &mut visited)?;
        }
    }
    for ((type_name, field), entry) in registry.field_checkers() {
        for index in 0..entry.required.len() {
            let node = Node {
                kind: NodeKind::Checker,
                type_name: type_name.clone(),
                field: Some(field.clone()),
                index,
            };
            walker.detect(node, &mut Vec::new(), &mut HashSet::new(), &mut visited)?;
        }
    }
    for (type_name, entry) in registry.type_checkers() {
        for index in 0..entry.required.len() {
            let node = Node {
                kind: NodeKind::Checker,
                type_name: type_name.clone(),
                field: None,
                index,
            };
            walker.detect(node, &mut Vec::new(), &mut HashSet::new(), &mut visited)?;
        }
    }
    Ok(())
}

struct Walker<'a> {
    schema: &'a Schema,
    registry: &'a DispatcherRegistry,
}

impl Walker<'_> {
    fn detect(
        &self,
        node: Node,
        path: &mut Vec<Node>,
        visiting: &mut HashSet<Node>,
        visited: &mut HashSet<Node>,
    ) -> Result<(), ValidationError> {
        if visited.contains(&node) {
            return Ok(());
        }
        if visiting.contains(&node) {
            let start = path.iter().position(|seen| *seen == node).unwrap_or(0);
            let mut labels: Vec<String> = path[start..].iter().map(Node::label).collect();
            labels.push(node.label());
            return Err(ValidationError::RequiredSelectionsCycle { path: labels });
        }
        visiting.insert(node.clone());
        path.push(node.clone());
        for next in self.edges(&node)? {
            self.detect(next, path, visiting, visited)?;
        }
        path.pop();
        visiting.remove(&node);
        visited.insert(node);
        Ok(())
    }

    fn required_of(&self, node: &Node) -> Option<&RequiredSelectionSet> {
        match (node.kind, &node.field) {
            (NodeKind::Resolver, Some(field)) => self
                .registry
                .field_resolver(&node.type_name, field)?
                .required
                .get(node.index),
            (NodeKind::Checker, Some(field)) => self
                .registry
                .field_checker(&node.type_name, field)?
                .required
                .get(node.index),
            (NodeKind::Checker, None) => self
                .registry
                .type_checker(&node.type_name)?
                .required
                .get(node.index),
            (NodeKind::Resolver, None) => None,
        }
    }

    fn edges(&self, node: &Node) -> Result<Vec<Node>, ValidationError> {
        let Some(required) = self.required_of(node) else {
            return Ok(Vec::new());
        };
        let coords = object_coords(self.schema, &node.type_name, required)?;
        let mut edges = Vec::new();
        for (type_name, field) in coords {
            match &field {
                Some(field_name) => {
                    if let Some(entry) = self.registry.field_resolver(&type_name, field_name) {
                        for index in 0..entry.required.len() {
                            edges.push(Node {
                                kind: NodeKind::Resolver,
                                type_name: type_name.clone(),
                                field: field.clone(),
                                index,
                            });
                        }
                    }
                    // Reading a field triggers its checker too, but only for
                    // resolver selections; checkers read raw data.
                    if node.kind == NodeKind::Resolver {
                        if let Some(entry) = self.registry.field_checker(&type_name, field_name) {
                            for index in 0..entry.required.len() {
                                edges.push(Node {
                                    kind: NodeKind::Checker,
                                    type_name: type_name.clone(),
                                    field: field.clone(),
                                    index,
                                });
                            }
                        }
                    }
                }
                None => {
                    if node.kind == NodeKind::Resolver {
                        if let Some(entry) = self.registry.type_checker(&type_name) {
                            for index in 0..entry.required.len() {
                                edges.push(Node {
                                    kind: NodeKind::Checker,
                                    type_name: type_name.clone(),
                                    field: None,
                                    index,
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(edges)
    }
}

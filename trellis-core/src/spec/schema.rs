use indexmap::IndexMap;
use uuid::Uuid;

use crate::json_ext::Json;

/// A GraphQL schema, built programmatically through [`Schema::builder`].
///
/// Every schema instance gets a fresh [`Uuid`]; components built against a
/// schema carry that id so they cannot be used with a different instance.
#[derive(Debug)]
pub struct Schema {
    id: Uuid,
    query_type: String,
    types: IndexMap<String, TypeDef>,
}

#[derive(Debug)]
pub enum TypeDef {
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Scalar(String),
    Enum(String),
}

impl TypeDef {
    fn name(&self) -> &str {
        match self {
            TypeDef::Object(object) => &object.name,
            TypeDef::Interface(interface) => &interface.name,
            TypeDef::Union(union) => &union.name,
            TypeDef::Scalar(name) | TypeDef::Enum(name) => name,
        }
    }
}

#[derive(Debug)]
pub struct ObjectType {
    name: String,
    implements: Vec<String>,
    fields: IndexMap<String, FieldDef>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implements: Vec::new(),
            fields: IndexMap::new(),
        }
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

#[derive(Debug)]
pub struct InterfaceType {
    name: String,
    fields: IndexMap<String, FieldDef>,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

#[derive(Debug)]
pub struct UnionType {
    name: String,
    members: Vec<String>,
}

impl UnionType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, member: impl Into<String>) -> Self {
        self.members.push(member.into());
        self
    }
}

/// A field definition: its name, named result type and argument definitions.
/// List and non-null wrappers are not modeled; response shape follows the
/// data.
#[derive(Debug)]
pub struct FieldDef {
    name: String,
    ty: String,
    arguments: Vec<ArgumentDef>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            arguments: Vec::new(),
        }
    }

    pub fn argument(mut self, argument: ArgumentDef) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn arguments(&self) -> &[ArgumentDef] {
        &self.arguments
    }
}

#[derive(Debug)]
pub struct ArgumentDef {
    name: String,
    default: Option<Json>,
}

impl ArgumentDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn default_value(mut self, value: Json) -> Self {
        self.default = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Json> {
        self.default.as_ref()
    }
}

const BUILT_IN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

#[derive(Debug)]
pub struct SchemaBuilder {
    query_type: String,
    types: IndexMap<String, TypeDef>,
}

impl SchemaBuilder {
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.query_type = name.into();
        self
    }

    pub fn object(self, object: ObjectType) -> Self {
        self.type_def(TypeDef::Object(object))
    }

    pub fn interface(self, interface: InterfaceType) -> Self {
        self.type_def(TypeDef::Interface(interface))
    }

    pub fn union(self, union: UnionType) -> Self {
        self.type_def(TypeDef::Union(union))
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.type_def(TypeDef::Scalar(name.into()))
    }

    pub fn enum_type(self, name: impl Into<String>) -> Self {
        self.type_def(TypeDef::Enum(name.into()))
    }

    pub fn type_def(mut self, def: TypeDef) -> Self {
        self.types.insert(def.name().to_string(), def);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            id: Uuid::new_v4(),
            query_type: self.query_type,
            types: self.types,
        }
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        let mut types = IndexMap::new();
        for scalar in BUILT_IN_SCALARS {
            types.insert(scalar.to_string(), TypeDef::Scalar(scalar.to_string()));
        }
        SchemaBuilder {
            query_type: "Query".to_string(),
            types,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// The field definition for `type_name.field`, looking through object and
    /// interface types.
    pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDef> {
        match self.types.get(type_name)? {
            TypeDef::Object(object) => object.fields.get(field),
            TypeDef::Interface(interface) => interface.fields.get(field),
            _ => None,
        }
    }

    /// The concrete object types a value of `name` can take: the type itself
    /// for objects, every implementation for interfaces, every member for
    /// unions. `None` when the type is unknown or a leaf.
    pub fn possible_types(&self, name: &str) -> Option<Vec<&str>> {
        match self.types.get(name)? {
            TypeDef::Object(object) => Some(vec![object.name.as_str()]),
            TypeDef::Interface(interface) => Some(
                self.types
                    .values()
                    .filter_map(|def| match def {
                        TypeDef::Object(object)
                            if object.implements.contains(&interface.name) =>
                        {
                            Some(object.name.as_str())
                        }
                        _ => None,
                    })
                    .collect(),
            ),
            TypeDef::Union(union) => Some(union.members.iter().map(String::as_str).collect()),
            TypeDef::Scalar(_) | TypeDef::Enum(_) => None,
        }
    }

    /// Whether a fragment with type condition `condition` applies to a value
    /// of concrete object type `concrete`.
    pub fn spread_applies(&self, condition: &str, concrete: &str) -> bool {
        self.possible_types(condition)
            .is_some_and(|types| types.contains(&concrete))
    }

    pub fn is_composite(&self, name: &str) -> bool {
        matches!(
            self.types.get(name),
            Some(TypeDef::Object(_) | TypeDef::Interface(_) | TypeDef::Union(_))
        )
    }

    pub fn is_abstract(&self, name: &str) -> bool {
        matches!(
            self.types.get(name),
            Some(TypeDef::Interface(_) | TypeDef::Union(_))
        )
    }
}

//! Compiled GraphQL schema handle.
//!
//! Only what query analysis needs is kept: root operation types, the
//! fields of every composite type with their named return types, and the
//! per-field complexity weights.

use std::collections::HashMap;
use std::fmt;

use graphql_parser::schema::{self, Definition, TypeDefinition};
use serde::{Deserialize, Serialize};

use crate::error::InitError;

const DEFAULT_FIELD_WEIGHT: u32 = 1;

/// GraphQL operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl OperationType {
    /// Method name used by GraphQL resources.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Query => "QUERY",
            OperationType::Mutation => "MUTATION",
            OperationType::Subscription => "SUBSCRIPTION",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complexity weight of one `Type.field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldComplexity {
    #[serde(rename = "type")]
    pub type_name: String,
    pub field: String,
    pub complexity: u32,
}

#[derive(Debug, Default)]
pub struct GraphQlSchema {
    query_type: Option<String>,
    mutation_type: Option<String>,
    subscription_type: Option<String>,
    /// Composite type -> field -> named return type.
    types: HashMap<String, HashMap<String, String>>,
    weights: HashMap<String, HashMap<String, u32>>,
}

impl GraphQlSchema {
    /// Build the handle from SDL text.
    pub fn from_sdl(sdl: &str) -> Result<Self, InitError> {
        let document = schema::parse_schema::<String>(sdl)
            .map_err(|e| InitError::InvalidSchema(e.to_string()))?;

        let mut out = GraphQlSchema::default();
        let mut explicit_roots = false;

        for definition in document.definitions {
            match definition {
                Definition::SchemaDefinition(def) => {
                    explicit_roots = true;
                    out.query_type = def.query;
                    out.mutation_type = def.mutation;
                    out.subscription_type = def.subscription;
                }
                Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                    let fields = object
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), named_type(&f.field_type).to_string()))
                        .collect();
                    out.types.insert(object.name, fields);
                }
                Definition::TypeDefinition(TypeDefinition::Interface(interface)) => {
                    let fields = interface
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), named_type(&f.field_type).to_string()))
                        .collect();
                    out.types.insert(interface.name, fields);
                }
                Definition::TypeDefinition(TypeDefinition::Union(union)) => {
                    // Unions only expose `__typename`; members are reached via fragments.
                    out.types.entry(union.name).or_default();
                }
                _ => {}
            }
        }

        if !explicit_roots {
            let present = |name: &str| out.types.contains_key(name).then(|| name.to_string());
            let roots = (present("Query"), present("Mutation"), present("Subscription"));
            (out.query_type, out.mutation_type, out.subscription_type) = roots;
        }

        match &out.query_type {
            Some(query) if out.types.contains_key(query) => Ok(out),
            Some(query) => Err(InitError::InvalidSchema(format!(
                "query root type `{}` is not defined",
                query
            ))),
            None => Err(InitError::InvalidSchema("schema defines no query type".into())),
        }
    }

    /// Attach complexity weights. Every weight must reference an existing field.
    pub fn with_complexity<I>(mut self, weights: I) -> Result<Self, InitError>
    where
        I: IntoIterator<Item = FieldComplexity>,
    {
        for weight in weights {
            if self.field_type(&weight.type_name, &weight.field).is_none() {
                return Err(InitError::InvalidSchema(format!(
                    "complexity configured for unknown field `{}.{}`",
                    weight.type_name, weight.field
                )));
            }
            self.weights
                .entry(weight.type_name)
                .or_default()
                .insert(weight.field, weight.complexity);
        }
        Ok(self)
    }

    pub fn root_type(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => self.query_type.as_deref(),
            OperationType::Mutation => self.mutation_type.as_deref(),
            OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Named return type of `parent.field`.
    pub fn field_type(&self, parent: &str, field: &str) -> Option<&str> {
        self.types.get(parent)?.get(field).map(String::as_str)
    }

    /// Whether selections may be made on the type.
    pub fn is_composite(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn field_weight(&self, parent: &str, field: &str) -> u32 {
        self.weights
            .get(parent)
            .and_then(|fields| fields.get(field))
            .copied()
            .unwrap_or(DEFAULT_FIELD_WEIGHT)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

fn named_type<'t>(ty: &'t schema::Type<'_, String>) -> &'t str {
    match ty {
        schema::Type::NamedType(name) => name.as_str(),
        schema::Type::ListType(inner) | schema::Type::NonNullType(inner) => named_type(inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDL: &str = r#"
        type Query {
            hero(episode: String): Character
            books(first: Int): [Book!]!
        }
        type Mutation { addBook(title: String!): Book }
        interface Character { name: String friends: [Character] }
        type Book { title: String author: Character }
    "#;

    #[test]
    fn test_from_sdl_default_roots() {
        let schema = GraphQlSchema::from_sdl(SDL).unwrap();
        assert_eq!(schema.root_type(OperationType::Query), Some("Query"));
        assert_eq!(schema.root_type(OperationType::Mutation), Some("Mutation"));
        assert_eq!(schema.root_type(OperationType::Subscription), None);
        assert_eq!(schema.field_type("Query", "books"), Some("Book"));
        assert_eq!(schema.field_type("Character", "friends"), Some("Character"));
        assert!(schema.is_composite("Book"));
        assert!(!schema.is_composite("String"));
    }

    #[test]
    fn test_explicit_schema_definition() {
        let schema = GraphQlSchema::from_sdl(
            "schema { query: Root } type Root { ping: String }",
        )
        .unwrap();
        assert_eq!(schema.root_type(OperationType::Query), Some("Root"));
    }

    #[test]
    fn test_invalid_sdl() {
        assert!(matches!(
            GraphQlSchema::from_sdl("type Query {"),
            Err(InitError::InvalidSchema(_))
        ));
        assert!(matches!(
            GraphQlSchema::from_sdl("type Book { title: String }"),
            Err(InitError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_complexity_weights() {
        let schema = GraphQlSchema::from_sdl(SDL)
            .unwrap()
            .with_complexity(vec![FieldComplexity {
                type_name: "Query".into(),
                field: "books".into(),
                complexity: 5,
            }])
            .unwrap();
        assert_eq!(schema.field_weight("Query", "books"), 5);
        assert_eq!(schema.field_weight("Query", "hero"), 1);

        let err = GraphQlSchema::from_sdl(SDL).unwrap().with_complexity(vec![FieldComplexity {
            type_name: "Query".into(),
            field: "nope".into(),
            complexity: 5,
        }]);
        assert!(err.is_err());
    }
}

//! Query depth and complexity analysis.
//!
//! # Responsibilities
//! - Parse the operation and pick the one to execute
//! - Validate every selected field against the schema
//! - Compute query depth and weighted complexity
//!
//! # Design Decisions
//! - Field complexity = (weight + children) × slicing multiplier
//! - Fragments are expanded in place; cycles are rejected
//! - A named fragment is costed once and reused on every later spread
//! - With a complexity ceiling the walk stops as soon as a partial cost
//!   exceeds it; costs only grow towards the root, so the total would too
//! - Introspection fields (`__typename`, `__schema`, ...) are not counted

use std::collections::HashMap;

use graphql_parser::query::{
    parse_query, Definition, Document, FragmentDefinition, OperationDefinition, Selection,
    SelectionSet, TypeCondition, Value,
};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::graphql::payload::GraphQlPayload;
use crate::graphql::schema::{GraphQlSchema, OperationType};

/// Depth and complexity of an analyzed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryAnalysis {
    pub operation: OperationType,
    pub depth: u32,
    pub complexity: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("{0}")]
    Payload(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("the document contains no operation")]
    NoOperation,

    #[error("operation `{0}` not found in the document")]
    UnknownOperation(String),

    #[error("operationName is required when the document has several operations")]
    AmbiguousOperation,

    #[error("the schema does not support {0} operations")]
    UnsupportedOperation(OperationType),

    #[error("field `{field}` is not defined on type `{parent}`")]
    UnknownField { parent: String, field: String },

    #[error("type `{0}` is not a composite type")]
    InvalidSelection(String),

    #[error("fragment `{0}` is not defined")]
    UnknownFragment(String),

    #[error("fragment `{0}` spreads itself")]
    FragmentCycle(String),

    #[error("query complexity exceeds the limit of {max}")]
    TooComplex { complexity: u64, max: u64 },
}

/// Operation type and top-level field names of the selected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub operation: OperationType,
    pub root_fields: Vec<String>,
}

/// Identify the operation without walking the whole query.
pub fn summarize(payload: &GraphQlPayload) -> Result<OperationSummary, AnalysisError> {
    let document = parse(&payload.query)?;
    let (operation, selection_set) = select_operation(&document, payload.operation_name.as_deref())?;
    let root_fields = selection_set
        .items
        .iter()
        .filter_map(|item| match item {
            Selection::Field(field) if !field.name.starts_with("__") => Some(field.name.to_string()),
            _ => None,
        })
        .collect();
    Ok(OperationSummary {
        operation,
        root_fields,
    })
}

/// Validate the payload against the schema and compute its cost.
pub fn analyze(schema: &GraphQlSchema, payload: &GraphQlPayload) -> Result<QueryAnalysis, AnalysisError> {
    analyze_within(schema, payload, None)
}

/// Like [`analyze`], but give up with [`AnalysisError::TooComplex`] once the
/// cost is known to exceed `max_complexity`.
pub fn analyze_within(
    schema: &GraphQlSchema,
    payload: &GraphQlPayload,
    max_complexity: Option<u64>,
) -> Result<QueryAnalysis, AnalysisError> {
    let document = parse(&payload.query)?;
    let (operation, selection_set) = select_operation(&document, payload.operation_name.as_deref())?;
    let root = schema
        .root_type(operation)
        .ok_or(AnalysisError::UnsupportedOperation(operation))?;

    let fragments = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::Fragment(fragment) => Some((fragment.name, fragment)),
            Definition::Operation(_) => None,
        })
        .collect();

    let empty = Map::new();
    let mut walker = Walker {
        schema,
        fragments,
        variables: payload.variables.as_ref().unwrap_or(&empty),
        visiting: Vec::new(),
        costed: HashMap::new(),
        max_complexity,
    };
    let cost = walker.walk(root, selection_set)?;

    Ok(QueryAnalysis {
        operation,
        depth: cost.depth,
        complexity: cost.complexity,
    })
}

fn parse(query: &str) -> Result<Document<'_, &str>, AnalysisError> {
    parse_query::<&str>(query).map_err(|e| AnalysisError::Syntax(e.to_string().trim().to_string()))
}

fn select_operation<'d, 'q>(
    document: &'d Document<'q, &'q str>,
    operation_name: Option<&str>,
) -> Result<(OperationType, &'d SelectionSet<'q, &'q str>), AnalysisError> {
    let operations: Vec<&OperationDefinition<'q, &'q str>> = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::Operation(op) => Some(op),
            Definition::Fragment(_) => None,
        })
        .collect();

    let selected = match operation_name {
        Some(wanted) => operations
            .iter()
            .find(|op| operation_name_of(op) == Some(wanted))
            .copied()
            .ok_or_else(|| AnalysisError::UnknownOperation(wanted.to_string()))?,
        None => match operations.as_slice() {
            [] => return Err(AnalysisError::NoOperation),
            [only] => *only,
            _ => return Err(AnalysisError::AmbiguousOperation),
        },
    };

    Ok(match selected {
        OperationDefinition::SelectionSet(set) => (OperationType::Query, set),
        OperationDefinition::Query(q) => (OperationType::Query, &q.selection_set),
        OperationDefinition::Mutation(m) => (OperationType::Mutation, &m.selection_set),
        OperationDefinition::Subscription(s) => (OperationType::Subscription, &s.selection_set),
    })
}

fn operation_name_of<'q>(op: &OperationDefinition<'q, &'q str>) -> Option<&'q str> {
    match op {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(q) => q.name,
        OperationDefinition::Mutation(m) => m.name,
        OperationDefinition::Subscription(s) => s.name,
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Cost {
    depth: u32,
    complexity: u64,
}

struct Walker<'a, 'q> {
    schema: &'a GraphQlSchema,
    fragments: HashMap<&'q str, &'a FragmentDefinition<'q, &'q str>>,
    variables: &'a Map<String, JsonValue>,
    visiting: Vec<&'q str>,
    /// Cost of each named fragment already walked.
    costed: HashMap<&'q str, Cost>,
    max_complexity: Option<u64>,
}

impl<'a, 'q> Walker<'a, 'q> {
    fn walk(&mut self, parent: &str, set: &'a SelectionSet<'q, &'q str>) -> Result<Cost, AnalysisError> {
        let schema = self.schema;
        let mut total = Cost::default();

        for item in &set.items {
            match item {
                Selection::Field(field) => {
                    if field.name.starts_with("__") {
                        continue;
                    }
                    let field_type = schema.field_type(parent, field.name).ok_or_else(|| {
                        AnalysisError::UnknownField {
                            parent: parent.to_string(),
                            field: field.name.to_string(),
                        }
                    })?;

                    let children = if field.selection_set.items.is_empty() {
                        Cost::default()
                    } else if schema.is_composite(field_type) {
                        self.walk(field_type, &field.selection_set)?
                    } else {
                        return Err(AnalysisError::InvalidSelection(field_type.to_string()));
                    };

                    let weight = u64::from(schema.field_weight(parent, field.name));
                    let multiplier = self.slice_multiplier(&field.arguments);
                    let complexity = weight
                        .saturating_add(children.complexity)
                        .saturating_mul(multiplier);

                    total.complexity = total.complexity.saturating_add(complexity);
                    total.depth = total.depth.max(children.depth + 1);
                    self.check(total)?;
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name;
                    if let Some(cost) = self.costed.get(name).copied() {
                        total = self.check(merge(total, cost))?;
                        continue;
                    }
                    if self.visiting.contains(&name) {
                        return Err(AnalysisError::FragmentCycle(name.to_string()));
                    }
                    let fragment = self
                        .fragments
                        .get(name)
                        .copied()
                        .ok_or_else(|| AnalysisError::UnknownFragment(name.to_string()))?;
                    let TypeCondition::On(on) = &fragment.type_condition;

                    self.visiting.push(name);
                    let cost = self.walk_fragment(on, &fragment.selection_set);
                    self.visiting.pop();
                    let cost = cost?;
                    self.costed.insert(name, cost);
                    total = self.check(merge(total, cost))?;
                }
                Selection::InlineFragment(inline) => {
                    let on = match &inline.type_condition {
                        Some(TypeCondition::On(on)) => *on,
                        None => parent,
                    };
                    let cost = self.walk_fragment(on, &inline.selection_set)?;
                    total = self.check(merge(total, cost))?;
                }
            }
        }

        Ok(total)
    }

    fn check(&self, cost: Cost) -> Result<Cost, AnalysisError> {
        match self.max_complexity {
            Some(max) if cost.complexity > max => Err(AnalysisError::TooComplex {
                complexity: cost.complexity,
                max,
            }),
            _ => Ok(cost),
        }
    }

    fn walk_fragment(&mut self, on: &str, set: &'a SelectionSet<'q, &'q str>) -> Result<Cost, AnalysisError> {
        if !self.schema.is_composite(on) {
            return Err(AnalysisError::InvalidSelection(on.to_string()));
        }
        self.walk(on, set)
    }

    /// `first`/`last`/`limit` multiply the cost of the field they page.
    fn slice_multiplier(&self, arguments: &[(&'q str, Value<'q, &'q str>)]) -> u64 {
        for (name, value) in arguments {
            if !matches!(*name, "first" | "last" | "limit") {
                continue;
            }
            let count = match value {
                Value::Int(n) => n.as_i64(),
                Value::Variable(var) => self.variables.get(*var).and_then(JsonValue::as_i64),
                _ => None,
            };
            if let Some(count) = count {
                return count.max(1) as u64;
            }
        }
        1
    }
}

/// Fragment selections sit at the same level as their siblings.
fn merge(total: Cost, fragment: Cost) -> Cost {
    Cost {
        depth: total.depth.max(fragment.depth),
        complexity: total.complexity.saturating_add(fragment.complexity),
    }
}

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::fields::Contract;

/// One declared field: its name, contract, and presence policy.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub contract: Contract,
    pub required: bool,
    pub nullable: bool,
}

/// An ordered set of field declarations for one request shape.
///
/// Built once per shape with [`Schema::builder`]; the declaration order is
/// preserved and drives the deterministic present-field listing used for
/// diagnostic context.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

pub struct SchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: &'static str, contract: Contract, required: bool, nullable: bool) -> Self {
        debug_assert!(
            self.fields.iter().all(|f| f.name != name),
            "duplicate field name: {name}"
        );
        self.fields.push(FieldSpec {
            name,
            contract,
            required,
            nullable,
        });
        self
    }

    pub fn build(self) -> Schema {
        Schema { fields: self.fields }
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Bind a raw key-value map to this schema, running every field's
    /// presence policy and contract exactly once.
    ///
    /// A missing key and an explicit JSON null are both treated as absence.
    pub fn bind(&self, args: &Map<String, Value>) -> Instance {
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut errors = BTreeMap::new();

        for spec in &self.fields {
            let value = args.get(spec.name).filter(|v| !v.is_null()).cloned();
            match &value {
                None => {
                    if spec.required {
                        errors.insert(spec.name.to_string(), "required value not found".to_string());
                    } else if !spec.nullable {
                        errors.insert(spec.name.to_string(), "value must not be empty".to_string());
                    }
                }
                Some(value) => {
                    if let Err(reason) = spec.contract.validate(value) {
                        errors.insert(spec.name.to_string(), reason);
                    }
                }
            }
            fields.push(BoundField {
                name: spec.name,
                value,
            });
        }

        Instance { fields, errors }
    }
}

#[derive(Debug, Clone)]
struct BoundField {
    name: &'static str,
    value: Option<Value>,
}

/// A runtime binding of a [`Schema`] to one raw input map.
///
/// Validity is computed once at bind time; the instance then only reports it.
#[derive(Debug, Clone)]
pub struct Instance {
    fields: Vec<BoundField>,
    errors: BTreeMap<String, String>,
}

impl Instance {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Render the aggregated field→reason map as a JSON object.
    pub fn errors_value(&self) -> Value {
        Value::Object(
            self.errors
                .iter()
                .map(|(name, reason)| (name.clone(), Value::String(reason.clone())))
                .collect(),
        )
    }

    /// Record a shape-level error that no single field owns.
    pub fn add_error(&mut self, name: &str, reason: &str) {
        self.errors.insert(name.to_string(), reason.to_string());
    }

    /// The bound value for `name`, if it was present in the input.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_ref())
    }

    pub fn present(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Names of fields that were present and passed their contract, in
    /// declaration order.
    pub fn present_names(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.value.is_some() && !self.errors.contains_key(f.name))
            .map(|f| f.name)
            .collect()
    }
}

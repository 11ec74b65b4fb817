//! Document-store query builder.
//!
//! Queries are sent to the service as JSON-encoded strings, one per
//! `queries[]` parameter:
//!
//! ```text
//! {"method":"equal","attribute":"client_id","values":["abc"]}
//! {"method":"orderDesc","attribute":"timestamp"}
//! {"method":"limit","values":[100]}
//! ```

use serde_json::{json, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Attribute equals any of the given values.
    Equal {
        attribute: String,
        values: Vec<JsonValue>,
    },
    OrderDesc(String),
    OrderAsc(String),
    Limit(u32),
    Offset(u32),
}

impl Query {
    pub fn equal(attribute: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Equal {
            attribute: attribute.into(),
            values: vec![value.into()],
        }
    }

    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Self::OrderDesc(attribute.into())
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Self::OrderAsc(attribute.into())
    }

    pub fn limit(n: u32) -> Self {
        Self::Limit(n)
    }

    pub fn offset(n: u32) -> Self {
        Self::Offset(n)
    }

    /// JSON form expected by the service.
    pub fn to_wire(&self) -> String {
        let value = match self {
            Self::Equal { attribute, values } => {
                json!({"method": "equal", "attribute": attribute, "values": values})
            }
            Self::OrderDesc(attribute) => json!({"method": "orderDesc", "attribute": attribute}),
            Self::OrderAsc(attribute) => json!({"method": "orderAsc", "attribute": attribute}),
            Self::Limit(n) => json!({"method": "limit", "values": [n]}),
            Self::Offset(n) => json!({"method": "offset", "values": [n]}),
        };
        value.to_string()
    }
}

//! 谓词构建
//!
//! Identifiers are only ever composed through [`quote_identifier`]; values only ever travel as
//! bind parameters.

use batch_domain::{Column, Condition, Filter, Value};

/// Backtick-quote an identifier, doubling any embedded backtick.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `qualifier.name`, both parts quoted.
pub fn qualified(qualifier: Option<&str>, name: &str) -> String {
    match qualifier {
        Some(table) => format!("{}.{}", quote_identifier(table), quote_identifier(name)),
        None => quote_identifier(name),
    }
}

/// A parameterized boolean SQL fragment with its binds in placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conjuncts: Vec<String>,
    binds: Vec<Value>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment whose `?` placeholders correspond to `binds`.
    pub fn push(&mut self, sql: impl Into<String>, binds: impl IntoIterator<Item = Value>) {
        self.conjuncts.push(sql.into());
        self.binds.extend(binds);
    }

    pub fn and(mut self, other: Predicate) -> Self {
        self.conjuncts.extend(other.conjuncts);
        self.binds.extend(other.binds);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conjuncts.is_empty()
    }

    /// An empty predicate matches everything.
    pub fn sql(&self) -> String {
        if self.conjuncts.is_empty() {
            "TRUE".to_string()
        } else {
            self.conjuncts.join(" AND ")
        }
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    pub fn into_binds(self) -> Vec<Value> {
        self.binds
    }
}

/// Render `filter` as a conjunction; column names are prefixed with `qualifier` when given.
pub fn build_predicate<C: Column>(filter: &Filter<C>, qualifier: Option<&str>) -> Predicate {
    let mut predicate = Predicate::new();

    for (column, condition) in filter.iter() {
        let field = qualified(qualifier, column.name());
        match condition {
            Condition::In(values) if values.is_empty() => predicate.push("FALSE", []),
            Condition::In(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                predicate.push(format!("{field} IN ({placeholders})"), values.iter().cloned());
            }
            Condition::IsNull => predicate.push(format!("{field} IS NULL"), []),
            Condition::IsNotNull => predicate.push(format!("{field} IS NOT NULL"), []),
            Condition::Eq(Value::Null) => predicate.push(format!("{field} IS NULL"), []),
            Condition::Eq(value) => predicate.push(format!("{field} = ?"), [value.clone()]),
        }
    }

    predicate
}

//! 查询条件与赋值抽象
//!
//! Tables describe *what* to match and *what* to set with these types; turning them into SQL
//! text and bind parameters is the infrastructure layer's job.

use std::collections::BTreeMap;
use std::fmt;

use batch_core::{BatchError, BatchResult};

/// A scalar that is always sent to the backend as a bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Flag columns are stored as 0/1 integers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// How a single column is matched.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    /// An empty list can never match.
    In(Vec<Value>),
    IsNull,
    IsNotNull,
}

/// A column of a known relation.
pub trait Column: Copy + PartialEq + fmt::Debug {
    fn name(&self) -> &'static str;
}

impl Column for &'static str {
    fn name(&self) -> &'static str {
        self
    }
}

/// Conjunction of per-column conditions, kept in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<C> {
    conditions: Vec<(C, Condition)>,
}

impl<C> Default for Filter<C> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }
}

impl<C: Column> Filter<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`; a null value means `column IS NULL`.
    pub fn eq(self, column: C, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => self.with(column, Condition::IsNull),
            value => self.with(column, Condition::Eq(value)),
        }
    }

    pub fn any_of<I, V>(self, column: C, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.with(column, Condition::In(values))
    }

    pub fn is_null(self, column: C) -> Self {
        self.with(column, Condition::IsNull)
    }

    pub fn is_not_null(self, column: C) -> Self {
        self.with(column, Condition::IsNotNull)
    }

    pub fn with(mut self, column: C, condition: Condition) -> Self {
        self.conditions.push((column, condition));
        self
    }

    pub fn and(mut self, other: Filter<C>) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(C, Condition)> {
        self.conditions.iter()
    }
}

/// Ordered `column = value` assignments for inserts and updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignments<C> {
    values: Vec<(C, Value)>,
}

impl<C> Default for Assignments<C> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<C: Column> Assignments<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setting a column twice keeps the last value.
    pub fn set(mut self, column: C, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.values.iter().position(|(c, _)| *c == column) {
            Some(index) => self.values[index].1 = value,
            None => self.values.push((column, value)),
        }
        self
    }

    pub fn merge(self, other: Assignments<C>) -> Self {
        other
            .values
            .into_iter()
            .fold(self, |acc, (column, value)| acc.set(column, value))
    }

    pub fn contains(&self, column: C) -> bool {
        self.values.iter().any(|(c, _)| *c == column)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(C, Value)> {
        self.values.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = C> + '_ {
        self.values.iter().map(|(c, _)| *c)
    }
}

/// One result row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    fn required(&self, name: &str) -> BatchResult<&Value> {
        self.fields
            .get(name)
            .ok_or_else(|| BatchError::integrity(format!("结果中缺少列: {name}")))
    }

    fn mismatch(name: &str, expected: &str, value: &Value) -> BatchError {
        BatchError::integrity(format!("列 {name} 类型不匹配: 期望{expected}, 实际值 {value}"))
    }

    pub fn i64(&self, name: &str) -> BatchResult<i64> {
        let value = self.required(name)?;
        value
            .as_i64()
            .ok_or_else(|| Self::mismatch(name, "整数", value))
    }

    pub fn opt_i64(&self, name: &str) -> BatchResult<Option<i64>> {
        match self.required(name)? {
            Value::Null => Ok(None),
            value => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| Self::mismatch(name, "整数", value)),
        }
    }

    pub fn bool(&self, name: &str) -> BatchResult<bool> {
        let value = self.required(name)?;
        value
            .as_bool()
            .ok_or_else(|| Self::mismatch(name, "布尔值", value))
    }

    pub fn string(&self, name: &str) -> BatchResult<String> {
        let value = self.required(name)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::mismatch(name, "字符串", value))
    }

    pub fn opt_string(&self, name: &str) -> BatchResult<Option<String>> {
        match self.required(name)? {
            Value::Null => Ok(None),
            value => value
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| Self::mismatch(name, "字符串", value)),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

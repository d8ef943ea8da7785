use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{op, Clause, FilterExpression};

impl Clause {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Clause::Equals { field: field.into(), value: value.into() }
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Clause::In { field: field.into(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Clause::Regex { field: field.into(), pattern: pattern.into(), options: None }
    }

    pub fn regex_ignore_case(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Clause::Regex { field: field.into(), pattern: pattern.into(), options: Some("i".to_string()) }
    }

    /// Document key this clause occupies.
    pub fn key(&self) -> &str {
        match self {
            Clause::Equals { field, .. } | Clause::In { field, .. } | Clause::Regex { field, .. } => field,
            Clause::And(_) => op::AND,
            Clause::Or(_) => op::OR,
            Clause::Raw { key, .. } => key,
        }
    }

    /// JSON value stored under `key()`.
    pub fn value(&self) -> Value {
        match self {
            Clause::Equals { value, .. } => value.clone(),
            Clause::In { values, .. } => single(op::IN, Value::Array(values.clone())),
            Clause::Regex { pattern, options, .. } => {
                let mut map = Map::new();
                map.insert(op::REGEX.to_string(), Value::String(pattern.clone()));
                if let Some(options) = options {
                    map.insert(op::OPTIONS.to_string(), Value::String(options.clone()));
                }
                Value::Object(map)
            }
            Clause::And(docs) | Clause::Or(docs) => {
                Value::Array(docs.iter().map(FilterExpression::to_value).collect())
            }
            Clause::Raw { value, .. } => value.clone(),
        }
    }

    /// Classify a single `key: value` pair. Never fails: unknown shapes become `Raw`.
    pub fn from_pair(key: &str, value: &Value) -> Self {
        if key == op::AND || key == op::OR {
            if let Some(docs) = nested_documents(value) {
                return if key == op::AND { Clause::And(docs) } else { Clause::Or(docs) };
            }
            return Clause::Raw { key: key.to_string(), value: value.clone() };
        }
        if key.starts_with('$') {
            return Clause::Raw { key: key.to_string(), value: value.clone() };
        }

        match value {
            Value::Object(obj) if obj.len() == 1 => {
                if let Some(Value::Array(values)) = obj.get(op::IN) {
                    return Clause::In { field: key.to_string(), values: values.clone() };
                }
                if let Some(Value::String(pattern)) = obj.get(op::REGEX) {
                    return Clause::regex(key, pattern.clone());
                }
                Clause::Raw { key: key.to_string(), value: value.clone() }
            }
            Value::Object(obj) if obj.len() == 2 => match (obj.get(op::REGEX), obj.get(op::OPTIONS)) {
                (Some(Value::String(pattern)), Some(Value::String(options))) => Clause::Regex {
                    field: key.to_string(),
                    pattern: pattern.clone(),
                    options: Some(options.clone()),
                },
                _ => Clause::Raw { key: key.to_string(), value: value.clone() },
            },
            Value::Object(_) => Clause::Raw { key: key.to_string(), value: value.clone() },
            _ => Clause::equals(key, value.clone()),
        }
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn nested_documents(value: &Value) -> Option<Vec<FilterExpression>> {
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| item.as_object().map(FilterExpression::from_map))
        .collect()
}

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse query text typed by a user. Empty or whitespace-only text is the empty filter.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, FilterError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(FilterError::NotAnObject(other.to_string())),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self { clauses: map.iter().map(|(k, v)| Clause::from_pair(k, v)).collect() }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for clause in &self.clauses {
            map.insert(clause.key().to_string(), clause.value());
        }
        Value::Object(map)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn into_clauses(self) -> Vec<Clause> {
        self.clauses
    }

    pub fn get(&self, key: &str) -> Option<&Clause> {
        self.clauses.iter().find(|c| c.key() == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a clause, replacing in place any clause with the same key.
    pub fn insert(&mut self, clause: Clause) {
        match self.clauses.iter_mut().find(|c| c.key() == clause.key()) {
            Some(slot) => *slot = clause,
            None => self.clauses.push(clause),
        }
    }

}

impl From<Clause> for FilterExpression {
    fn from(clause: Clause) -> Self {
        Self { clauses: vec![clause] }
    }
}

impl FromIterator<Clause> for FilterExpression {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        let mut expr = Self::new();
        for clause in iter {
            expr.insert(clause);
        }
        expr
    }
}

impl std::fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for FilterExpression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilterExpression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Self::new());
        }
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

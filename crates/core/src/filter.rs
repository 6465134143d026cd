//! Filter expressions and the document matcher.
//!
//! A `Filter` is a conjunction of per-attribute conditions plus an optional
//! full-text `$search` term. Conditions are kept in a `BTreeMap`, so two
//! filters built in different key orders are structurally equal and hash
//! identically.
//!
//! The `Matcher` evaluates a filter against a single document. It treats
//! `$search` as always true: relevance is decided by the backing store, and the
//! live query engine never trusts a local decision on a search query.

use crate::document::{Document, ID_KEY, SPACE_KEY};
use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;
use crate::ids::{ClassRef, DocId, SpaceRef};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Reserved filter key for full-text search.
pub const SEARCH_KEY: &str = "$search";
/// Prefix of lookup keys, which never take part in matching.
pub const LOOKUP_PREFIX: &str = "$lookup";

/// A single attribute condition.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    Exists(bool),
    /// SQL-style pattern: `%` any run, `_` one character.
    Like(String),
}

/// Shape of the `space` clause, used to route security events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpaceClause {
    /// The filter does not constrain `space`.
    Absent,
    /// `space` is compared for equality with one literal value.
    Literal(SpaceRef),
    /// `space` uses an operator (`$in`, `$ne`, ...) or a non-string literal.
    NonLiteral,
}

/// A filter over document attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Filter {
    conditions: BTreeMap<String, Vec<Condition>>,
    search: Option<String>,
}

impl Filter {
    /// Creates an empty filter that matches every document of the class.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter on `_id`.
    pub fn by_id(id: impl Into<DocId>) -> Self {
        Self::new().eq(ID_KEY, id.into())
    }

    fn push(mut self, key: impl Into<String>, condition: Condition) -> Self {
        let entry = self.conditions.entry(key.into()).or_default();
        entry.push(condition);
        entry.sort();
        entry.dedup();
        self
    }

    /// Adds `key == value`.
    pub fn eq(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, Condition::Eq(value.into()))
    }

    /// Adds `key != value`.
    pub fn ne(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, Condition::Ne(value.into()))
    }

    /// Adds `key in values`.
    pub fn is_in<V: Into<Value>>(self, key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.push(key, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// Adds `key not in values`.
    pub fn nin<V: Into<Value>>(self, key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        self.push(key, Condition::Nin(values.into_iter().map(Into::into).collect()))
    }

    /// Adds `key < value`.
    pub fn lt(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, Condition::Lt(value.into()))
    }

    /// Adds `key <= value`.
    pub fn lte(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, Condition::Lte(value.into()))
    }

    /// Adds `key > value`.
    pub fn gt(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, Condition::Gt(value.into()))
    }

    /// Adds `key >= value`.
    pub fn gte(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, Condition::Gte(value.into()))
    }

    /// Adds an existence check.
    pub fn exists(self, key: impl Into<String>, exists: bool) -> Self {
        self.push(key, Condition::Exists(exists))
    }

    /// Adds a `$like` pattern condition.
    pub fn like(self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.push(key, Condition::Like(pattern.into()))
    }

    /// Sets the full-text search term.
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Parses a filter from a dynamic object such as
    /// `{ "space": { "$in": [...] }, "private": false }`.
    pub fn parse(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_filter(format!("expected object, got {}", value.kind())))?;

        let mut filter = Filter::new();
        for (key, operand) in object {
            if key == SEARCH_KEY {
                let text = operand
                    .as_str()
                    .ok_or_else(|| Error::invalid_filter("$search expects a string"))?;
                filter = filter.search(text);
                continue;
            }
            if key.starts_with('$') {
                return Err(Error::unsupported_operator(key.clone()));
            }
            match operand.as_object() {
                Some(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                    for (op, arg) in ops {
                        filter = filter.push(key.clone(), parse_condition(op, arg)?);
                    }
                }
                _ => filter = filter.push(key.clone(), Condition::Eq(operand.clone())),
            }
        }
        Ok(filter)
    }

    /// Returns true if the filter carries a `$search` term.
    #[inline]
    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    /// Returns the `$search` term.
    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Returns true if the filter has no conditions and no search term.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.search.is_none()
    }

    /// Iterates over the filtered attribute keys.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(|k| k.as_str())
    }

    /// Iterates over `(key, conditions)` pairs.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &[Condition])> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns true if `key` (or a dotted path below it) is constrained.
    pub fn references(&self, key: &str) -> bool {
        self.conditions.keys().any(|k| {
            k == key
                || k.strip_prefix(key).map(|r| r.starts_with('.')).unwrap_or(false)
                || key.strip_prefix(k.as_str()).map(|r| r.starts_with('.')).unwrap_or(false)
        })
    }

    /// Classifies the `space` clause.
    pub fn space_clause(&self) -> SpaceClause {
        match self.conditions.get(SPACE_KEY).map(|c| c.as_slice()) {
            None => SpaceClause::Absent,
            Some([Condition::Eq(Value::String(s))]) => SpaceClause::Literal(SpaceRef::from(s.as_str())),
            Some(_) => SpaceClause::NonLiteral,
        }
    }

    /// Returns the id when the filter is exactly `{ _id: <literal> }`.
    pub fn id_literal(&self) -> Option<DocId> {
        if self.conditions.len() != 1 || self.search.is_some() {
            return None;
        }
        match self.conditions.get(ID_KEY).map(|c| c.as_slice()) {
            Some([Condition::Eq(Value::String(s))]) => Some(DocId::from(s.as_str())),
            _ => None,
        }
    }
}

fn parse_condition(op: &str, arg: &Value) -> Result<Condition> {
    let list = |arg: &Value| -> Result<Vec<Value>> {
        arg.as_array()
            .map(|a| a.to_vec())
            .ok_or_else(|| Error::invalid_filter(format!("{} expects an array", op)))
    };
    Ok(match op {
        "$ne" => Condition::Ne(arg.clone()),
        "$in" => Condition::In(list(arg)?),
        "$nin" => Condition::Nin(list(arg)?),
        "$lt" => Condition::Lt(arg.clone()),
        "$lte" => Condition::Lte(arg.clone()),
        "$gt" => Condition::Gt(arg.clone()),
        "$gte" => Condition::Gte(arg.clone()),
        "$exists" => Condition::Exists(
            arg.as_bool()
                .ok_or_else(|| Error::invalid_filter("$exists expects a boolean"))?,
        ),
        "$like" => Condition::Like(
            arg.as_str()
                .ok_or_else(|| Error::invalid_filter("$like expects a string"))?
                .to_string(),
        ),
        other => return Err(Error::unsupported_operator(other)),
    })
}

/// Evaluates filters against documents.
#[derive(Clone, Copy)]
pub struct Matcher<'a> {
    hierarchy: &'a Hierarchy,
}

impl<'a> Matcher<'a> {
    /// Creates a matcher over the given hierarchy.
    pub fn new(hierarchy: &'a Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Returns true if `doc` belongs to `class` and satisfies `filter`.
    ///
    /// `$search` is not evaluated and `$lookup` keys are skipped.
    pub fn matches(&self, doc: &Document, class: &ClassRef, filter: &Filter) -> bool {
        self.is_member(doc, class) && self.matches_conditions(doc, class, filter)
    }

    /// Returns true if `doc` is an instance of `class`, either by derivation or
    /// by carrying the `class` mixin.
    pub fn is_member(&self, doc: &Document, class: &ClassRef) -> bool {
        if self.hierarchy.is_derived(&doc.class, class) {
            return true;
        }
        self.hierarchy.is_mixin(class)
            && self.hierarchy.is_compatible(&doc.class, class)
            && doc.mixins.keys().any(|m| self.hierarchy.is_derived(m, class))
    }

    /// Evaluates the attribute conditions only.
    pub fn matches_conditions(&self, doc: &Document, class: &ClassRef, filter: &Filter) -> bool {
        filter.conditions().all(|(key, conditions)| {
            if key.starts_with(LOOKUP_PREFIX) {
                return true;
            }
            let value = doc.resolve_attribute(self.hierarchy, class, key);
            conditions
                .iter()
                .all(|c| eval_condition(value.as_deref(), c))
        })
    }
}

fn eval_condition(value: Option<&Value>, condition: &Condition) -> bool {
    match condition {
        Condition::Eq(expected) => equals(value, expected),
        Condition::Ne(expected) => !equals(value, expected),
        Condition::In(list) => list.iter().any(|e| equals(value, e)),
        Condition::Nin(list) => !list.iter().any(|e| equals(value, e)),
        Condition::Lt(bound) => compares(value, bound, |o| o == Ordering::Less),
        Condition::Lte(bound) => compares(value, bound, |o| o != Ordering::Greater),
        Condition::Gt(bound) => compares(value, bound, |o| o == Ordering::Greater),
        Condition::Gte(bound) => compares(value, bound, |o| o != Ordering::Less),
        Condition::Exists(expected) => {
            let present = value.map(|v| !v.is_null()).unwrap_or(false);
            present == *expected
        }
        Condition::Like(pattern) => value
            .and_then(|v| v.as_str())
            .map(|s| like(s, pattern))
            .unwrap_or(false),
    }
}

/// Equality with array membership semantics: an array attribute equals a
/// scalar if it contains it.
fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(Value::Array(items)) if !matches!(expected, Value::Array(_)) => {
            items.iter().any(|i| i.loose_eq(expected))
        }
        Some(v) => v.loose_eq(expected),
    }
}

fn compares(value: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items.iter().any(|i| accept(i.loose_cmp(bound))),
        Some(v) => accept(v.loose_cmp(bound)),
    }
}

/// Case-sensitive `%`/`_` pattern matching over Unicode scalar values.
pub fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            pi = star_p + 1;
            ti = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}

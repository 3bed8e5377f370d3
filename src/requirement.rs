//! Requirement expressions (spec.md §3 "Requirement expression", §4.6).
//!
//! A tagged tree, evaluated by a shared visitor so that "what failed" and
//! "what does it say" stay consistent (Design Notes §9).

use serde_json::Value as Json;

use crate::value::ValueMap;

/// A required value in a [`Requirement::ValMap`] entry. `Present` means
/// "must be specified with any value" (spec's `undefined` form), `Absent`
/// means "must be absent" (spec's `null` form), `Equals` means "must be
/// specified with this exact value".
#[derive(Debug, Clone, PartialEq)]
pub enum RequiredValue {
    Present,
    Absent,
    Equals(Json),
}

/// A boolean predicate tree over the value mapping and the specified-set.
#[derive(Clone)]
pub enum Requirement {
    /// The named option must be present (spec's bare `Key(name)`).
    Key(String),
    Not(Box<Requirement>),
    All(Vec<Requirement>),
    One(Vec<Requirement>),
    ValMap(Vec<(String, RequiredValue)>),
    Callback(std::rc::Rc<dyn Fn(&ValueMap) -> bool>),
}

impl std::fmt::Debug for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requirement::Key(k) => write!(f, "Key({k:?})"),
            Requirement::Not(r) => write!(f, "Not({r:?})"),
            Requirement::All(rs) => write!(f, "All({rs:?})"),
            Requirement::One(rs) => write!(f, "One({rs:?})"),
            Requirement::ValMap(m) => write!(f, "ValMap({m:?})"),
            Requirement::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

impl Requirement {
    pub fn key(name: impl Into<String>) -> Self {
        Requirement::Key(name.into())
    }

    pub fn not(r: Requirement) -> Self {
        Requirement::Not(Box::new(r))
    }

    /// Every `Key(name)` referenced anywhere in this tree, for the
    /// validator's per-name checks.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Requirement::Key(name) => out.push(name.as_str()),
            Requirement::Not(r) => r.collect_names(out),
            Requirement::All(rs) | Requirement::One(rs) => {
                for r in rs {
                    r.collect_names(out);
                }
            }
            Requirement::ValMap(entries) => {
                for (name, _) in entries {
                    out.push(name.as_str());
                }
            }
            Requirement::Callback(_) => {}
        }
    }
}

/// Renders a requirement the way a "did you mean"-less diagnostic would,
/// propagating the negate-flag down the tree (spec.md §4.6, `Not`).
pub fn render(req: &Requirement, negate: bool) -> String {
    match req {
        Requirement::Key(name) => {
            if negate {
                format!("!{name}")
            } else {
                name.clone()
            }
        }
        Requirement::Not(inner) => render(inner, !negate),
        Requirement::All(items) => {
            let rendered: Vec<String> = items.iter().map(|r| render(r, negate)).collect();
            let joiner = if negate { " or " } else { " and " };
            parenthesize_if_many(&rendered, joiner)
        }
        Requirement::One(items) => {
            let rendered: Vec<String> = items.iter().map(|r| render(r, negate)).collect();
            let joiner = if negate { " and " } else { " or " };
            parenthesize_if_many(&rendered, joiner)
        }
        Requirement::ValMap(entries) => {
            let rendered: Vec<String> = entries
                .iter()
                .map(|(name, rv)| render_valmap_entry(name, rv, negate))
                .collect();
            parenthesize_if_many(&rendered, " and ")
        }
        Requirement::Callback(_) => "<callback>".to_string(),
    }
}

fn render_valmap_entry(name: &str, rv: &RequiredValue, negate: bool) -> String {
    match (rv, negate) {
        (RequiredValue::Present, false) => name.to_string(),
        (RequiredValue::Present, true) => format!("!{name}"),
        (RequiredValue::Absent, false) => format!("!{name}"),
        (RequiredValue::Absent, true) => name.to_string(),
        (RequiredValue::Equals(v), false) => format!("{name} == {}", render_json(v)),
        (RequiredValue::Equals(v), true) => format!("{name} != {}", render_json(v)),
    }
}

fn render_json(v: &Json) -> String {
    match v {
        Json::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

fn parenthesize_if_many(rendered: &[String], joiner: &str) -> String {
    let joined = rendered.join(joiner);
    if rendered.len() > 1 {
        format!("({joined})")
    } else {
        joined
    }
}

/// Parser-time evaluation (spec.md §4.6, "Parser-time").
///
/// `specified` is the specified-set: names the parser actually received a
/// value for, from the argument vector, environment, or stdin. `get_value`
/// resolves a declared *name* to its value in the value mapping — the
/// mapping itself is keyed by schema key, not by declared name, so every
/// lookup goes through this indirection rather than indexing `values`
/// directly (see `parser::specified_lookup`/`value_lookup`).
pub fn evaluate(
    req: &Requirement,
    values: &ValueMap,
    specified: &dyn Fn(&str) -> bool,
    get_value: &dyn Fn(&str) -> Option<crate::value::Value>,
) -> bool {
    eval_inner(req, values, specified, get_value, false)
}

fn eval_inner(
    req: &Requirement,
    values: &ValueMap,
    specified: &dyn Fn(&str) -> bool,
    get_value: &dyn Fn(&str) -> Option<crate::value::Value>,
    negate: bool,
) -> bool {
    let result = match req {
        Requirement::Key(name) => {
            specified(name) && !matches!(get_value(name), Some(v) if v.is_null_sentinel())
        }
        Requirement::Not(inner) => return eval_inner(inner, values, specified, get_value, !negate),
        Requirement::All(items) => {
            items.iter().all(|r| eval_inner(r, values, specified, get_value, false))
        }
        Requirement::One(items) => {
            items.iter().any(|r| eval_inner(r, values, specified, get_value, false))
        }
        Requirement::ValMap(entries) => entries.iter().all(|(name, rv)| match rv {
            RequiredValue::Present => specified(name),
            RequiredValue::Absent => !specified(name),
            RequiredValue::Equals(expected) => {
                specified(name) && get_value(name).map(|v| value_equals(&v, expected)).unwrap_or(false)
            }
        }),
        Requirement::Callback(f) => f(values),
    };
    if negate {
        !result
    } else {
        result
    }
}

fn value_equals(v: &crate::value::Value, expected: &Json) -> bool {
    match v {
        crate::value::Value::Str(s) => matches!(expected, Json::String(e) if e == s),
        crate::value::Value::Bool(b) => matches!(expected, Json::Bool(e) if e == b),
        crate::value::Value::Json(j) => j == expected,
        crate::value::Value::Array(a) => matches!(expected, Json::Array(e) if e == a),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn specified_set(keys: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |k| keys.contains(&k)
    }

    fn identity_lookup(values: &ValueMap) -> impl Fn(&str) -> Option<Value> + '_ {
        move |name| values.get(name).cloned()
    }

    #[test]
    fn not_not_is_identity() {
        let r = Requirement::not(Requirement::not(Requirement::key("a")));
        let values = ValueMap::new();
        assert_eq!(
            eval_inner(&r, &values, &specified_set(&["a"]), &identity_lookup(&values), false),
            eval_inner(
                &Requirement::key("a"),
                &values,
                &specified_set(&["a"]),
                &identity_lookup(&values),
                false
            )
        );
        assert_eq!(
            eval_inner(&r, &values, &specified_set(&[]), &identity_lookup(&values), false),
            eval_inner(
                &Requirement::key("a"),
                &values,
                &specified_set(&[]),
                &identity_lookup(&values),
                false
            )
        );
    }

    #[test]
    fn all_short_circuits_on_first_failure() {
        let r = Requirement::All(vec![Requirement::key("a"), Requirement::key("b")]);
        let values = ValueMap::new();
        assert!(!eval_inner(&r, &values, &specified_set(&["a"]), &identity_lookup(&values), false));
        assert!(eval_inner(&r, &values, &specified_set(&["a", "b"]), &identity_lookup(&values), false));
    }

    #[test]
    fn one_of_empty_is_false() {
        let r = Requirement::One(vec![]);
        let values = ValueMap::new();
        assert!(!eval_inner(&r, &values, &specified_set(&[]), &identity_lookup(&values), false));
    }

    #[test]
    fn all_of_empty_is_true() {
        let r = Requirement::All(vec![]);
        let values = ValueMap::new();
        assert!(eval_inner(&r, &values, &specified_set(&[]), &identity_lookup(&values), false));
    }

    #[test]
    fn valmap_equals_checks_deep_equality() {
        let mut values = ValueMap::new();
        values.insert("b", Value::Str("x".into()));
        let r = Requirement::ValMap(vec![("b".to_string(), RequiredValue::Equals(Json::String("x".into())))]);
        assert!(eval_inner(&r, &values, &specified_set(&["b"]), &identity_lookup(&values), false));

        let mut values2 = ValueMap::new();
        values2.insert("b", Value::Str("y".into()));
        assert!(!eval_inner(
            &r,
            &values2,
            &specified_set(&["b"]),
            &identity_lookup(&values2),
            false
        ));
    }

    #[test]
    fn render_negates_key() {
        assert_eq!(render(&Requirement::key("a"), false), "a");
        assert_eq!(render(&Requirement::key("a"), true), "!a");
    }

    #[test]
    fn render_valmap_equals() {
        let r = Requirement::ValMap(vec![("b".to_string(), RequiredValue::Equals(Json::String("x".into())))]);
        assert_eq!(render(&r, false), "b == 'x'");
    }
}

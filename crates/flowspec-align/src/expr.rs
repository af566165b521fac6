// SPDX-License-Identifier: MIT OR Apache-2.0
//! The declarative assertion language.
//!
//! Assertion bodies are JSON expressions over `span.attributes.<path>`
//! variables. They are materialized once into a tagged-variant [`Expr`] tree
//! and then evaluated against a read-only [`Scope`] — never interpreted via
//! host-language eval.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// Structural equality (numeric values compare by magnitude).
    Eq,
    /// Structural inequality.
    Ne,
    /// Less-than.
    Lt,
    /// Less-than-or-equal.
    Le,
    /// Greater-than.
    Gt,
    /// Greater-than-or-equal.
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A materialized assertion expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal JSON value.
    Literal(Value),
    /// A variable reference, resolved through the [`Scope`].
    Var(String),
    /// Logical negation of the operand's truthiness.
    Not(Box<Expr>),
    /// True when every operand is truthy.
    And(Vec<Expr>),
    /// True when at least one operand is truthy.
    Or(Vec<Expr>),
    /// A binary comparison.
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    /// Membership: needle in array, or substring for two strings.
    In(Box<Expr>, Box<Expr>),
    /// Conditional: `if cond then a else b`.
    If(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Errors raised while materializing an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// The operator key is not part of the language.
    #[error("unknown operator {0:?}")]
    UnknownOperator(String),
    /// The expression shape is wrong (arity, operand types).
    #[error("malformed expression: {0}")]
    Malformed(String),
}

/// Errors raised during evaluation. Recorded as the assertion's failure
/// reason; evaluation of other assertions continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// Operands cannot be compared under the given operator.
    #[error("type mismatch: cannot apply {op} to {left} and {right}")]
    TypeMismatch {
        /// Operator symbol.
        op: String,
        /// Rendered left operand.
        left: String,
        /// Rendered right operand.
        right: String,
    },
}

/// Variable resolution for one evaluation.
pub trait Scope {
    /// Resolve a dotted variable path; absent paths yield `Value::Null`.
    fn resolve(&self, path: &str) -> Value;
}

impl Expr {
    /// Materialize an expression from its JSON form.
    pub fn parse(value: &Value) -> Result<Self, ExprError> {
        let Some(obj) = value.as_object() else {
            return Ok(Self::Literal(value.clone()));
        };
        if obj.len() != 1 {
            // Plain data objects are legal literals only when they do not
            // pretend to be an operator application.
            return Err(ExprError::Malformed(format!(
                "expected a single-operator object, found {} keys",
                obj.len()
            )));
        }
        let (op, args) = obj.iter().next().expect("len checked above");
        match op.as_str() {
            "var" => parse_var(args),
            "!" => Ok(Self::Not(Box::new(parse_unary(args)?))),
            "and" => Ok(Self::And(parse_list(op, args)?)),
            "or" => Ok(Self::Or(parse_list(op, args)?)),
            "==" => parse_binary(CmpOp::Eq, args),
            "!=" => parse_binary(CmpOp::Ne, args),
            "<" => parse_binary(CmpOp::Lt, args),
            "<=" => parse_binary(CmpOp::Le, args),
            ">" => parse_binary(CmpOp::Gt, args),
            ">=" => parse_binary(CmpOp::Ge, args),
            "in" => {
                let [needle, haystack] = parse_exactly::<2>(op, args)?;
                Ok(Self::In(Box::new(needle), Box::new(haystack)))
            }
            "if" => {
                let [cond, then, otherwise] = parse_exactly::<3>(op, args)?;
                Ok(Self::If(
                    Box::new(cond),
                    Box::new(then),
                    Box::new(otherwise),
                ))
            }
            other => Err(ExprError::UnknownOperator(other.to_string())),
        }
    }

    /// Evaluate against a scope.
    pub fn eval(&self, scope: &dyn Scope) -> Result<Value, EvalError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Var(path) => Ok(scope.resolve(path)),
            Self::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(scope)?))),
            Self::And(parts) => {
                let mut result = true;
                for part in parts {
                    result &= truthy(&part.eval(scope)?);
                }
                Ok(Value::Bool(result))
            }
            Self::Or(parts) => {
                let mut result = false;
                for part in parts {
                    result |= truthy(&part.eval(scope)?);
                }
                Ok(Value::Bool(result))
            }
            Self::Compare(op, left, right) => {
                let left = left.eval(scope)?;
                let right = right.eval(scope)?;
                compare(*op, &left, &right).map(Value::Bool)
            }
            Self::In(needle, haystack) => {
                let needle = needle.eval(scope)?;
                let haystack = haystack.eval(scope)?;
                contains(&needle, &haystack).map(Value::Bool)
            }
            Self::If(cond, then, otherwise) => {
                if truthy(&cond.eval(scope)?) {
                    then.eval(scope)
                } else {
                    otherwise.eval(scope)
                }
            }
        }
    }

    /// Collect every variable path referenced by this expression.
    pub fn variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Literal(_) => {}
            Self::Var(path) => {
                out.insert(path.clone());
            }
            Self::Not(inner) => inner.variables(out),
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.variables(out);
                }
            }
            Self::Compare(_, a, b) | Self::In(a, b) => {
                a.variables(out);
                b.variables(out);
            }
            Self::If(a, b, c) => {
                a.variables(out);
                b.variables(out);
                c.variables(out);
            }
        }
    }
}

fn parse_var(args: &Value) -> Result<Expr, ExprError> {
    match args {
        Value::String(path) => Ok(Expr::Var(path.clone())),
        Value::Array(items) => match items.first() {
            Some(Value::String(path)) => Ok(Expr::Var(path.clone())),
            _ => Err(ExprError::Malformed("var expects a string path".into())),
        },
        _ => Err(ExprError::Malformed("var expects a string path".into())),
    }
}

fn parse_unary(args: &Value) -> Result<Expr, ExprError> {
    match args {
        Value::Array(items) if items.len() == 1 => Expr::parse(&items[0]),
        Value::Array(_) => Err(ExprError::Malformed("! expects one operand".into())),
        other => Expr::parse(other),
    }
}

fn parse_list(op: &str, args: &Value) -> Result<Vec<Expr>, ExprError> {
    let items = args
        .as_array()
        .ok_or_else(|| ExprError::Malformed(format!("{op} expects an operand list")))?;
    if items.is_empty() {
        return Err(ExprError::Malformed(format!(
            "{op} expects at least one operand"
        )));
    }
    items.iter().map(Expr::parse).collect()
}

fn parse_binary(op: CmpOp, args: &Value) -> Result<Expr, ExprError> {
    let [left, right] = parse_exactly::<2>(op.symbol(), args)?;
    Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
}

fn parse_exactly<const N: usize>(op: &str, args: &Value) -> Result<[Expr; N], ExprError> {
    let items = args
        .as_array()
        .ok_or_else(|| ExprError::Malformed(format!("{op} expects an operand list")))?;
    if items.len() != N {
        return Err(ExprError::Malformed(format!(
            "{op} expects exactly {N} operands, found {}",
            items.len()
        )));
    }
    let parsed: Vec<Expr> = items.iter().map(Expr::parse).collect::<Result<_, _>>()?;
    Ok(parsed.try_into().expect("length checked above"))
}

/// JS-style truthiness for evaluation results.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Numeric view of a value, for coercing comparisons.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Structural equality with numeric coercion: `201 == 201.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b)
        && let (Some(x), Some(y)) = (x.as_f64(), y.as_f64())
    {
        return x == y;
    }
    a == b
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => return Ok(values_equal(left, right)),
        CmpOp::Ne => return Ok(!values_equal(left, right)),
        _ => {}
    }

    // Ordered comparison: coerce to double when either side is numeric.
    if left.is_number() || right.is_number() {
        if let (Some(l), Some(r)) = (as_number(left), as_number(right)) {
            return Ok(match op {
                CmpOp::Lt => l < r,
                CmpOp::Le => l <= r,
                CmpOp::Gt => l > r,
                CmpOp::Ge => l >= r,
                CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
            });
        }
    } else if let (Value::String(l), Value::String(r)) = (left, right) {
        return Ok(match op {
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
            CmpOp::Eq | CmpOp::Ne => unreachable!("handled above"),
        });
    }

    Err(EvalError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.to_string(),
        right: right.to_string(),
    })
}

fn contains(needle: &Value, haystack: &Value) -> Result<bool, EvalError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
        Value::String(text) => match needle {
            Value::String(sub) => Ok(text.contains(sub.as_str())),
            _ => Err(EvalError::TypeMismatch {
                op: "in".into(),
                left: needle.to_string(),
                right: haystack.to_string(),
            }),
        },
        _ => Err(EvalError::TypeMismatch {
            op: "in".into(),
            left: needle.to_string(),
            right: haystack.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct MapScope(BTreeMap<String, Value>);

    impl Scope for MapScope {
        fn resolve(&self, path: &str) -> Value {
            self.0.get(path).cloned().unwrap_or(Value::Null)
        }
    }

    fn scope(entries: &[(&str, Value)]) -> MapScope {
        MapScope(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn eval(expr: &Value, scope: &MapScope) -> Result<Value, EvalError> {
        Expr::parse(expr).unwrap().eval(scope)
    }

    #[test]
    fn literals_evaluate_to_themselves() {
        let s = scope(&[]);
        assert_eq!(eval(&json!(42), &s).unwrap(), json!(42));
        assert_eq!(eval(&json!("x"), &s).unwrap(), json!("x"));
        assert_eq!(eval(&json!([1, 2]), &s).unwrap(), json!([1, 2]));
    }

    #[test]
    fn var_resolves_through_scope_and_absent_is_null() {
        let s = scope(&[("span.attributes.http.method", json!("POST"))]);
        assert_eq!(
            eval(&json!({"var": "span.attributes.http.method"}), &s).unwrap(),
            json!("POST")
        );
        assert_eq!(eval(&json!({"var": "span.attributes.nope"}), &s).unwrap(), Value::Null);
    }

    #[test]
    fn equality_coerces_numeric_representations() {
        let s = scope(&[("n", json!(201))]);
        assert_eq!(eval(&json!({"==": [{"var": "n"}, 201.0]}), &s).unwrap(), json!(true));
        assert_eq!(eval(&json!({"!=": [{"var": "n"}, 200]}), &s).unwrap(), json!(true));
    }

    #[test]
    fn equality_with_null_is_explicit_matching() {
        let s = scope(&[]);
        assert_eq!(eval(&json!({"==": [{"var": "gone"}, null]}), &s).unwrap(), json!(true));
        assert_eq!(eval(&json!({"==": [{"var": "gone"}, 1]}), &s).unwrap(), json!(false));
    }

    #[test]
    fn ordered_comparison_coerces_numeric_strings() {
        let s = scope(&[("lat", json!("12.5"))]);
        assert_eq!(eval(&json!({"<": [{"var": "lat"}, 20]}), &s).unwrap(), json!(true));
        assert_eq!(eval(&json!({">=": [{"var": "lat"}, 12.5]}), &s).unwrap(), json!(true));
    }

    #[test]
    fn ordered_comparison_with_null_fails() {
        let s = scope(&[]);
        let err = eval(&json!({"<": [{"var": "gone"}, 5]}), &s).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn string_comparison_is_lexicographic() {
        let s = scope(&[]);
        assert_eq!(eval(&json!({"<": ["apple", "banana"]}), &s).unwrap(), json!(true));
    }

    #[test]
    fn in_array_and_in_string() {
        let s = scope(&[("code", json!(201))]);
        assert_eq!(
            eval(&json!({"in": [{"var": "code"}, [200, 201, 204]]}), &s).unwrap(),
            json!(true)
        );
        assert_eq!(
            eval(&json!({"in": [{"var": "code"}, [500]]}), &s).unwrap(),
            json!(false)
        );
        assert_eq!(eval(&json!({"in": ["err", "an error here"]}), &s).unwrap(), json!(true));
    }

    #[test]
    fn and_or_not_follow_truthiness() {
        let s = scope(&[("flag", json!(true))]);
        assert_eq!(
            eval(&json!({"and": [{"var": "flag"}, 1, "yes"]}), &s).unwrap(),
            json!(true)
        );
        assert_eq!(
            eval(&json!({"and": [{"var": "flag"}, 0]}), &s).unwrap(),
            json!(false)
        );
        assert_eq!(
            eval(&json!({"or": [0, "", {"var": "flag"}]}), &s).unwrap(),
            json!(true)
        );
        assert_eq!(eval(&json!({"!": [{"var": "flag"}]}), &s).unwrap(), json!(false));
        assert_eq!(eval(&json!({"!": {"var": "missing"}}), &s).unwrap(), json!(true));
    }

    #[test]
    fn if_selects_branches() {
        let s = scope(&[("n", json!(7))]);
        let expr = json!({"if": [{">": [{"var": "n"}, 5]}, "big", "small"]});
        assert_eq!(eval(&expr, &s).unwrap(), json!("big"));
    }

    #[test]
    fn unknown_operator_is_rejected_at_parse_time() {
        let err = Expr::parse(&json!({"xor": [1, 2]})).unwrap_err();
        assert_eq!(err, ExprError::UnknownOperator("xor".into()));
    }

    #[test]
    fn wrong_arity_is_rejected_at_parse_time() {
        assert!(Expr::parse(&json!({"==": [1]})).is_err());
        assert!(Expr::parse(&json!({"if": [true, 1]})).is_err());
        assert!(Expr::parse(&json!({"and": []})).is_err());
    }

    #[test]
    fn multi_key_objects_are_malformed() {
        let err = Expr::parse(&json!({"==": [1, 1], "!=": [1, 2]})).unwrap_err();
        assert!(matches!(err, ExprError::Malformed(_)));
    }

    #[test]
    fn variables_are_collected() {
        let expr = Expr::parse(&json!({
            "and": [
                {"==": [{"var": "a"}, 1]},
                {"if": [{"var": "b"}, {"var": "c"}, 2]},
            ]
        }))
        .unwrap();
        let mut vars = BTreeSet::new();
        expr.variables(&mut vars);
        let names: Vec<&str> = vars.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}

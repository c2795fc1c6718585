//! Policy expressions.
//!
//! [`Expr`] is the evaluable every part of a document is made of: targets,
//! body conditions, value definitions, obligations, advice and transforms.
//! Evaluating an expression yields a [`ValStream`], since any attribute
//! reference underneath it may push new values over time.
//!
//! `&&`, `||` and `!` are the only boolean connectives. The formula index
//! expands a target along these and treats every other node as an opaque
//! predicate.

use std::cmp::Ordering;
use std::fmt;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vigil_core::reactive::{combine_latest, just, ReactiveExt, ValStream};
use vigil_core::{EvaluationContext, EvaluationError, Val};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Less => "<",
            CompareOp::LessEq => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEq => ">=",
        }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// A JSON constant
    Value(Value),

    /// A variable reference; unbound variables are an error
    Variable(String),

    /// Key step into an object; missing keys are undefined
    Key { base: Box<Expr>, key: String },

    /// Attribute of an entity, resolved through the attribute resolver
    Attribute { entity: Box<Expr>, name: String },

    /// Function call
    Function { name: String, args: Vec<Expr> },

    Not(Box<Expr>),

    /// Lazy conjunction
    And(Box<Expr>, Box<Expr>),

    /// Lazy disjunction
    Or(Box<Expr>, Box<Expr>),

    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Array(Vec<Expr>),

    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn value(value: impl Into<Value>) -> Self {
        Expr::Value(value.into())
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Value(Value::Bool(value))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    /// `variable.key`, e.g. `subject.role`.
    pub fn path(variable: impl Into<String>, key: impl Into<String>) -> Self {
        Expr::Variable(variable.into()).key(key)
    }

    pub fn key(self, key: impl Into<String>) -> Self {
        Expr::Key {
            base: Box::new(self),
            key: key.into(),
        }
    }

    pub fn attribute(self, name: impl Into<String>) -> Self {
        Expr::Attribute {
            entity: Box::new(self),
            name: name.into(),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    pub fn negation(operand: Expr) -> Self {
        Expr::Not(Box::new(operand))
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(self, other: Expr) -> Self {
        Expr::compare(CompareOp::Eq, self, other)
    }

    /// Whether the expression references no variable, attribute or function.
    pub fn is_immutable(&self) -> bool {
        match self {
            Expr::Value(_) => true,
            Expr::Variable(_) | Expr::Attribute { .. } | Expr::Function { .. } => false,
            Expr::Key { base, .. } => base.is_immutable(),
            Expr::Not(e) => e.is_immutable(),
            Expr::And(l, r) | Expr::Or(l, r) => l.is_immutable() && r.is_immutable(),
            Expr::Compare { left, right, .. } => left.is_immutable() && right.is_immutable(),
            Expr::Array(items) => items.iter().all(Expr::is_immutable),
            Expr::Object(fields) => fields.iter().all(|(_, e)| e.is_immutable()),
        }
    }

    /// Fold an immutable expression to its value without a context.
    pub fn evaluate_constant(&self) -> Option<Val> {
        if !self.is_immutable() {
            return None;
        }
        Some(self.fold())
    }

    fn fold(&self) -> Val {
        match self {
            Expr::Value(v) => Val::Defined(v.clone()),
            Expr::Key { base, key } => step_key(base.fold(), key),
            Expr::Not(e) => negate(e.fold()),
            Expr::And(l, r) => match require_bool(l.fold()) {
                Val::Defined(Value::Bool(true)) => require_bool(r.fold()),
                other => other,
            },
            Expr::Or(l, r) => match require_bool(l.fold()) {
                Val::Defined(Value::Bool(false)) => require_bool(r.fold()),
                other => other,
            },
            Expr::Compare { op, left, right } => compare(*op, &left.fold(), &right.fold()),
            Expr::Array(items) => build_array(items.iter().map(Expr::fold).collect()),
            Expr::Object(fields) => build_object(
                fields.iter().map(|(k, _)| k.clone()).collect(),
                fields.iter().map(|(_, e)| e.fold()).collect(),
            ),
            Expr::Variable(_) | Expr::Attribute { .. } | Expr::Function { .. } => {
                Val::error("expression is not constant")
            }
        }
    }

    /// Evaluate the expression against a context.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> ValStream {
        match self {
            Expr::Value(v) => just(Val::Defined(v.clone())),
            Expr::Variable(name) => just(match ctx.variable(name) {
                Some(v) => Val::Defined(v.clone()),
                None => EvaluationError::UndefinedVariable(name.clone()).into(),
            }),
            Expr::Key { base, key } => {
                let key = key.clone();
                base.evaluate(ctx).map(move |v| step_key(v, &key)).boxed()
            }
            Expr::Attribute { entity, name } => {
                let ctx = ctx.clone();
                let name = name.clone();
                entity
                    .evaluate(&ctx)
                    .switch_map(move |entity| match entity {
                        Val::Error(_) => just(entity),
                        _ => ctx.attribute(&name, &entity),
                    })
                    .boxed()
            }
            Expr::Function { name, args } => {
                let ctx = ctx.clone();
                let name = name.clone();
                let args = args.iter().map(|a| a.evaluate(&ctx)).collect();
                combine_latest(args)
                    .map(move |vals| match vals.iter().find(|v| v.is_error()) {
                        Some(err) => err.clone(),
                        None => ctx.call(&name, &vals),
                    })
                    .boxed()
            }
            Expr::Not(e) => e.evaluate(ctx).map(negate).boxed(),
            Expr::And(l, r) => lazy_connective(l, r, false, ctx),
            Expr::Or(l, r) => lazy_connective(l, r, true, ctx),
            Expr::Compare { op, left, right } => {
                let op = *op;
                combine_latest(vec![left.evaluate(ctx), right.evaluate(ctx)])
                    .map(move |vals| compare(op, &vals[0], &vals[1]))
                    .boxed()
            }
            Expr::Array(items) => combine_latest(items.iter().map(|e| e.evaluate(ctx)).collect())
                .map(build_array)
                .boxed(),
            Expr::Object(fields) => {
                let keys: Vec<String> = fields.iter().map(|(k, _)| k.clone()).collect();
                combine_latest(fields.iter().map(|(_, e)| e.evaluate(ctx)).collect())
                    .map(move |vals| build_object(keys.clone(), vals))
                    .boxed()
            }
        }
    }
}

/// `&&` (`short_on = false`) or `||` (`short_on = true`), evaluating the
/// right operand only while the left one does not decide the result.
fn lazy_connective(left: &Expr, right: &Expr, short_on: bool, ctx: &EvaluationContext) -> ValStream {
    let ctx = ctx.clone();
    let right = right.clone();
    left.evaluate(&ctx)
        .switch_map(move |l| match require_bool(l) {
            Val::Defined(Value::Bool(b)) if b == short_on => just(Val::boolean(b)),
            Val::Defined(Value::Bool(_)) => right.evaluate(&ctx).map(require_bool).boxed(),
            other => just(other),
        })
        .boxed()
}

fn require_bool(v: Val) -> Val {
    match v {
        Val::Defined(Value::Bool(_)) | Val::Error(_) => v,
        other => EvaluationError::TypeMismatch {
            expected: "boolean".to_string(),
            actual: other.type_name().to_string(),
        }
        .into(),
    }
}

fn negate(v: Val) -> Val {
    match require_bool(v) {
        Val::Defined(Value::Bool(b)) => Val::boolean(!b),
        other => other,
    }
}

fn step_key(v: Val, key: &str) -> Val {
    match v {
        Val::Defined(Value::Object(map)) => match map.get(key) {
            Some(field) => Val::Defined(field.clone()),
            None => Val::Undefined,
        },
        Val::Error(_) => v,
        _ => Val::Undefined,
    }
}

fn compare(op: CompareOp, left: &Val, right: &Val) -> Val {
    if let Val::Error(_) = left {
        return left.clone();
    }
    if let Val::Error(_) = right {
        return right.clone();
    }
    match op {
        CompareOp::Eq => Val::boolean(values_equal(left, right)),
        CompareOp::NotEq => Val::boolean(!values_equal(left, right)),
        _ => {
            let (l, r) = match (as_number(left), as_number(right)) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    let actual = if as_number(left).is_none() { left } else { right };
                    return EvaluationError::TypeMismatch {
                        expected: "number".to_string(),
                        actual: actual.type_name().to_string(),
                    }
                    .into();
                }
            };
            let ordering = l.partial_cmp(&r);
            let result = match op {
                CompareOp::Less => ordering == Some(Ordering::Less),
                CompareOp::LessEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                CompareOp::Greater => ordering == Some(Ordering::Greater),
                CompareOp::GreaterEq => {
                    matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                }
                CompareOp::Eq | CompareOp::NotEq => false,
            };
            Val::boolean(result)
        }
    }
}

fn as_number(v: &Val) -> Option<f64> {
    match v {
        Val::Defined(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
}

fn values_equal(left: &Val, right: &Val) -> bool {
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn build_array(items: Vec<Val>) -> Val {
    let mut array = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Val::Defined(v) => array.push(v),
            Val::Undefined => {}
            Val::Error(_) => return item,
        }
    }
    Val::Defined(Value::Array(array))
}

fn build_object(keys: Vec<String>, values: Vec<Val>) -> Val {
    let mut object = Map::new();
    for (key, value) in keys.into_iter().zip(values) {
        match value {
            Val::Defined(v) => {
                object.insert(key, v);
            }
            Val::Undefined => {}
            Val::Error(_) => return value,
        }
    }
    Val::Defined(Value::Object(object))
}

/// Canonical rendering. Two expressions render identically iff they are
/// structurally equal, which the formula index relies on to identify
/// predicates.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value(v) => write!(f, "{}", v),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Key { base, key } => write!(f, "{}[{}]", base, Value::String(key.clone())),
            Expr::Attribute { entity, name } => write!(f, "{}.<{}>", entity, name),
            Expr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Not(e) => write!(f, "!({})", e),
            Expr::And(l, r) => write!(f, "({} && {})", l, r),
            Expr::Or(l, r) => write!(f, "({} || {})", l, r),
            Expr::Compare { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expr::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", Value::String(key.clone()), value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// First value of an expression, or an error if it never emits.
pub async fn evaluate_once(expr: &Expr, ctx: &EvaluationContext) -> Val {
    expr.evaluate(ctx)
        .next()
        .await
        .unwrap_or_else(|| Val::error(format!("'{}' produced no value", expr)))
}

/// First truth value of a target expression.
///
/// Targets use three-valued logic along `&&`, `||` and `!`: a failing
/// operand is unknown, so `unknown || true` holds and `unknown && false`
/// does not, whichever side fails. The result is therefore independent of
/// operand order, and equals the value of the target's disjunctive normal
/// form. Every other node must produce a boolean; one that completes
/// without a value is `false`.
pub fn evaluate_target<'a>(expr: &'a Expr, ctx: &'a EvaluationContext) -> BoxFuture<'a, Val> {
    async move {
        match expr {
            Expr::Not(inner) => negate(evaluate_target(inner, ctx).await),
            Expr::And(l, r) => three_valued(l, r, false, ctx).await,
            Expr::Or(l, r) => three_valued(l, r, true, ctx).await,
            leaf => match leaf.evaluate(ctx).next().await {
                None => Val::FALSE,
                Some(value @ (Val::Defined(Value::Bool(_)) | Val::Error(_))) => value,
                Some(other) => EvaluationError::NonBooleanTarget(other.type_name().to_string()).into(),
            },
        }
    }
    .boxed()
}

/// `&&` (`short_on = false`) or `||` (`short_on = true`) over unknowns.
async fn three_valued(left: &Expr, right: &Expr, short_on: bool, ctx: &EvaluationContext) -> Val {
    let l = evaluate_target(left, ctx).await;
    if l.as_bool() == Some(short_on) {
        return l;
    }
    let r = evaluate_target(right, ctx).await;
    match (l.as_bool(), r.as_bool()) {
        (_, Some(b)) if b == short_on => r,
        (Some(_), _) => r,
        _ => l,
    }
}

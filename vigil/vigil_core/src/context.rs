//! Evaluation context.
//!
//! An [`EvaluationContext`] bundles the attribute and function resolvers
//! with the variables visible at one point of an evaluation. Contexts are
//! immutable: binding a variable returns a new context and leaves the
//! parent untouched, so bindings made while evaluating one policy are never
//! visible to its siblings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::EvaluationError;
use crate::reactive::{just, ValStream};
use crate::subscription::AuthorizationSubscription;
use crate::value::Val;

/// Source of attribute streams (a policy information point).
pub trait AttributeResolver: Send + Sync {
    /// Subscribe to the attribute `name` of `entity`.
    fn attribute(&self, name: &str, entity: &Val) -> ValStream;
}

/// Library of functions callable from expressions.
pub trait FunctionResolver: Send + Sync {
    fn call(&self, name: &str, args: &[Val]) -> Val;
}

/// Attribute resolver that knows no attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttributes;

impl AttributeResolver for NoAttributes {
    fn attribute(&self, name: &str, _entity: &Val) -> ValStream {
        just(EvaluationError::UnknownAttribute(name.to_string()).into())
    }
}

type Function = Arc<dyn Fn(&[Val]) -> Val + Send + Sync>;

/// A name-indexed set of plain functions.
#[derive(Clone, Default)]
pub struct FunctionLibrary {
    functions: HashMap<String, Function>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `name`, replacing any previous one.
    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Val]) -> Val + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl FunctionResolver for FunctionLibrary {
    fn call(&self, name: &str, args: &[Val]) -> Val {
        match self.functions.get(name) {
            Some(f) => f(args),
            None => EvaluationError::UnknownFunction(name.to_string()).into(),
        }
    }
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionLibrary")
            .field("functions", &names)
            .finish()
    }
}

/// Everything an expression can see while it is evaluated.
#[derive(Clone)]
pub struct EvaluationContext {
    attributes: Arc<dyn AttributeResolver>,
    functions: Arc<dyn FunctionResolver>,
    variables: Arc<HashMap<String, Value>>,
}

impl EvaluationContext {
    pub fn new(
        attributes: Arc<dyn AttributeResolver>,
        functions: Arc<dyn FunctionResolver>,
    ) -> Self {
        Self {
            attributes,
            functions,
            variables: Arc::new(HashMap::new()),
        }
    }

    /// A new context with `name` bound to `value`, shadowing any outer
    /// binding of the same name.
    pub fn with_variable(&self, name: impl Into<String>, value: Value) -> Self {
        let mut variables = (*self.variables).clone();
        variables.insert(name.into(), value);
        Self {
            attributes: Arc::clone(&self.attributes),
            functions: Arc::clone(&self.functions),
            variables: Arc::new(variables),
        }
    }

    /// A new context with all of `bindings` added.
    pub fn with_variables<I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut variables = (*self.variables).clone();
        variables.extend(bindings);
        Self {
            attributes: Arc::clone(&self.attributes),
            functions: Arc::clone(&self.functions),
            variables: Arc::new(variables),
        }
    }

    /// A new context with the four subscription fields bound as variables.
    pub fn with_subscription(&self, subscription: &AuthorizationSubscription) -> Self {
        self.with_variables([
            ("subject".to_string(), subscription.subject.clone()),
            ("action".to_string(), subscription.action.clone()),
            ("resource".to_string(), subscription.resource.clone()),
            ("environment".to_string(), subscription.environment.clone()),
        ])
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn attribute(&self, name: &str, entity: &Val) -> ValStream {
        self.attributes.attribute(name, entity)
    }

    pub fn call(&self, name: &str, args: &[Val]) -> Val {
        self.functions.call(name, args)
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new(Arc::new(NoAttributes), Arc::new(FunctionLibrary::new()))
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.variables.keys().collect();
        names.sort();
        f.debug_struct("EvaluationContext")
            .field("variables", &names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_child_bindings_do_not_leak_to_parent() {
        let parent = EvaluationContext::default().with_variable("a", json!(1));
        let child = parent.with_variable("b", json!(2));
        let sibling = parent.with_variable("a", json!(3));

        assert_eq!(child.variable("a"), Some(&json!(1)));
        assert_eq!(child.variable("b"), Some(&json!(2)));
        assert!(!parent.has_variable("b"));
        assert!(!sibling.has_variable("b"));
        assert_eq!(sibling.variable("a"), Some(&json!(3)));
        assert_eq!(parent.variable("a"), Some(&json!(1)));
    }

    #[test]
    fn test_subscription_binding() {
        let sub = AuthorizationSubscription::new(json!("alice"), json!("read"), json!("doc"));
        let ctx = EvaluationContext::default().with_subscription(&sub);
        assert_eq!(ctx.variable("subject"), Some(&json!("alice")));
        assert_eq!(ctx.variable("environment"), Some(&json!(null)));
    }

    #[test]
    fn test_function_library() {
        let library = FunctionLibrary::new().register("len", |args: &[Val]| match args.first() {
            Some(Val::Defined(Value::String(s))) => Val::of(s.len()),
            _ => Val::error("len expects a string"),
        });
        let ctx = EvaluationContext::new(Arc::new(NoAttributes), Arc::new(library));

        assert_eq!(ctx.call("len", &[Val::of("abc")]), Val::of(3));
        assert!(ctx.call("len", &[Val::of(1)]).is_error());
        assert!(ctx.call("missing", &[]).is_error());
    }

    #[tokio::test]
    async fn test_unknown_attribute_is_an_error_value() {
        let ctx = EvaluationContext::default();
        let first = ctx.attribute("time.now", &Val::Undefined).next().await;
        assert!(matches!(first, Some(Val::Error(_))));
    }
}

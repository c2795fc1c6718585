//! Opaque boolean predicates.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use vigil_core::{EvaluationContext, Val};
use vigil_policy::expression::evaluate_target;
use vigil_policy::Expr;

/// A boolean-valued leaf of a target expression.
///
/// Two predicates are equal iff their expressions are structurally equal.
/// The canonical rendering and its hash are computed once on construction.
#[derive(Clone)]
pub struct Bool {
    expr: Expr,
    key: String,
    hash: u64,
    constant: Option<bool>,
}

impl Bool {
    pub fn new(expr: Expr) -> Self {
        let key = expr.to_string();
        let constant = expr.evaluate_constant().and_then(|v| v.as_bool());
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        Self {
            expr,
            key,
            hash: hasher.finish(),
            constant,
        }
    }

    pub fn constant(value: bool) -> Self {
        Self::new(Expr::boolean(value))
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Canonical rendering identifying this predicate.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the predicate folds to a boolean without a context.
    pub fn is_immutable(&self) -> bool {
        self.constant.is_some()
    }

    pub fn evaluate_constant(&self) -> Option<bool> {
        self.constant
    }

    /// Evaluate to a boolean or an error value, the same way a target leaf
    /// evaluates.
    pub async fn evaluate(&self, ctx: &EvaluationContext) -> Val {
        if let Some(value) = self.constant {
            return Val::boolean(value);
        }
        evaluate_target(&self.expr, ctx).await
    }
}

impl PartialEq for Bool {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.key == other.key
    }
}

impl Eq for Bool {}

impl Hash for Bool {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bool({})", self.key)
    }
}

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vigil_core::AuthorizationSubscription;

    #[test]
    fn test_structural_identity() {
        let a = Bool::new(Expr::path("subject", "role").equals(Expr::value("admin")));
        let b = Bool::new(Expr::path("subject", "role").equals(Expr::value("admin")));
        let c = Bool::new(Expr::path("subject", "role").equals(Expr::value("user")));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_constants() {
        assert_eq!(Bool::constant(true).evaluate_constant(), Some(true));
        assert!(Bool::new(Expr::value(1).equals(Expr::value(2))).is_immutable());
        assert!(!Bool::new(Expr::value(5)).is_immutable());
        assert!(!Bool::new(Expr::path("subject", "admin")).is_immutable());
    }

    #[tokio::test]
    async fn test_evaluate() {
        let sub = AuthorizationSubscription::new(json!({"admin": true}), json!("read"), json!(1));
        let ctx = EvaluationContext::default().with_subscription(&sub);

        assert_eq!(Bool::new(Expr::path("subject", "admin")).evaluate(&ctx).await, Val::TRUE);
        assert!(Bool::new(Expr::variable("action")).evaluate(&ctx).await.is_error());
        assert!(Bool::new(Expr::variable("nope")).evaluate(&ctx).await.is_error());
    }
}

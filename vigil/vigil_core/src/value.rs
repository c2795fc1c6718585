//! Evaluation values.
//!
//! A [`Val`] is what every evaluable produces: a JSON value, the absence of
//! a value, or an error marker. Errors are data, not control flow.

use std::fmt;

use serde_json::Value;

use crate::error::EvaluationError;

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    /// A defined JSON value
    Defined(Value),

    /// No value, e.g. a missing key
    Undefined,

    /// An evaluation error with its message
    Error(String),
}

impl Val {
    /// The boolean `true`.
    pub const TRUE: Val = Val::Defined(Value::Bool(true));

    /// The boolean `false`.
    pub const FALSE: Val = Val::Defined(Value::Bool(false));

    /// Create a defined value.
    pub fn of(value: impl Into<Value>) -> Self {
        Val::Defined(value.into())
    }

    /// Create an error value.
    pub fn error(message: impl fmt::Display) -> Self {
        Val::Error(message.to_string())
    }

    /// Create a boolean value.
    pub fn boolean(value: bool) -> Self {
        if value {
            Val::TRUE
        } else {
            Val::FALSE
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Val::Error(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Val::Undefined)
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Val::Defined(_))
    }

    /// The boolean this value holds, if it holds one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Defined(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// The JSON value, if defined.
    pub fn get(&self) -> Option<&Value> {
        match self {
            Val::Defined(v) => Some(v),
            _ => None,
        }
    }

    /// Consume into the JSON value, if defined.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Val::Defined(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret this value as a boolean, failing on anything else.
    pub fn require_bool(&self) -> Result<bool, EvaluationError> {
        match self {
            Val::Defined(Value::Bool(b)) => Ok(*b),
            Val::Error(msg) => Err(EvaluationError::Failed(msg.clone())),
            other => Err(EvaluationError::TypeMismatch {
                expected: "boolean".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Defined(Value::Null) => "null",
            Val::Defined(Value::Bool(_)) => "boolean",
            Val::Defined(Value::Number(_)) => "number",
            Val::Defined(Value::String(_)) => "string",
            Val::Defined(Value::Array(_)) => "array",
            Val::Defined(Value::Object(_)) => "object",
            Val::Undefined => "undefined",
            Val::Error(_) => "error",
        }
    }
}

impl From<Value> for Val {
    fn from(value: Value) -> Self {
        Val::Defined(value)
    }
}

impl From<EvaluationError> for Val {
    fn from(err: EvaluationError) -> Self {
        Val::Error(err.to_string())
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Defined(v) => write!(f, "{}", v),
            Val::Undefined => write!(f, "undefined"),
            Val::Error(msg) => write!(f, "ERROR[{}]", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_helpers() {
        assert_eq!(Val::boolean(true), Val::TRUE);
        assert_eq!(Val::TRUE.as_bool(), Some(true));
        assert_eq!(Val::of(json!(1)).as_bool(), None);
        assert!(Val::FALSE.require_bool().is_ok());
    }

    #[test]
    fn test_require_bool_on_non_boolean() {
        let err = Val::of(json!("yes")).require_bool().unwrap_err();
        assert_eq!(
            err,
            EvaluationError::TypeMismatch {
                expected: "boolean".to_string(),
                actual: "string".to_string()
            }
        );
        assert!(Val::Undefined.require_bool().is_err());
        assert!(Val::error("boom").require_bool().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Val::of(json!({"a": 1})).to_string(), r#"{"a":1}"#);
        assert_eq!(Val::Undefined.to_string(), "undefined");
        assert_eq!(Val::error("bad").to_string(), "ERROR[bad]");
    }
}

//! Check-item evaluation.

use thiserror::Error;

use crate::dictionary::{ValueError, ValueType};
use crate::request::Request;
use crate::users::{Item, Operand, Operator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("Cannot compare {left} with {right}")]
    TypeMismatch { left: ValueType, right: ValueType },

    #[error("Operator {0} is not a comparison")]
    NotComparison(Operator),

    #[error("Unsupported right-hand side: {0}")]
    Unsupported(&'static str),

    #[error("{0} is not an attribute")]
    NotAttribute(String),

    #[error("Operator {0} needs a right-hand side")]
    MissingOperand(Operator),
}

/// Decides whether one check item holds for a request.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, item: &Item, request: &Request) -> Result<bool, EvalError>;
}

/// Comparison semantics of classic users files: the first instance of the
/// left attribute is compared with the right side.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyEvaluator;

impl ConditionEvaluator for LegacyEvaluator {
    fn evaluate(&self, item: &Item, request: &Request) -> Result<bool, EvalError> {
        let lhs = item
            .attr()
            .ok_or_else(|| EvalError::NotAttribute(item.lhs.to_string()))?;
        let present = request.list(lhs.list).first(&lhs.def);

        match item.op {
            Operator::CmpTrue => return Ok(present.is_some()),
            Operator::CmpFalse => return Ok(present.is_none()),
            op if !op.is_comparison() => return Err(EvalError::NotComparison(op)),
            _ => {}
        }

        let Some(left) = present else {
            return Ok(false);
        };
        let rhs = item
            .rhs
            .as_ref()
            .ok_or(EvalError::MissingOperand(item.op))?;

        if item.op.is_regex() {
            let Operand::Regex(pattern) = rhs else {
                return Err(EvalError::Unsupported("non-regex operand for regex operator"));
            };
            let text = left.def.format_value(&left.value);
            let matched = pattern.is_match(&text);
            return Ok(if item.op == Operator::RegEq { matched } else { !matched });
        }

        let right = match rhs {
            Operand::Literal(text) => lhs.def.parse_value(text)?,
            Operand::Attr(r) => match request.list(r.list).first(&r.def) {
                Some(attr) if attr.value.value_type() == left.value.value_type() => attr.value.clone(),
                Some(attr) => lhs.def.parse_value(&attr.def.format_value(&attr.value))?,
                None => return Ok(false),
            },
            Operand::Regex(_) => return Err(EvalError::Unsupported("regex")),
            Operand::Exec(_) => return Err(EvalError::Unsupported("exec")),
        };

        let ordering = left
            .value
            .compare(&right)
            .ok_or(EvalError::TypeMismatch {
                left: left.value.value_type(),
                right: right.value_type(),
            })?;

        Ok(match item.op {
            Operator::CmpEq => ordering.is_eq(),
            Operator::Ne => ordering.is_ne(),
            Operator::Lt => ordering.is_lt(),
            Operator::Le => ordering.is_le(),
            Operator::Gt => ordering.is_gt(),
            Operator::Ge => ordering.is_ge(),
            op => return Err(EvalError::NotComparison(op)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{Dictionary, Value};
    use crate::users::Parser;

    fn check_items(dict: &Dictionary, checks: &str) -> Vec<Item> {
        let text = format!("alice {}\n", checks);
        Parser::new(dict)
            .parse_str("users", &text)
            .unwrap()
            .remove(0)
            .check
    }

    fn eval(checks: &str, request: &Request) -> Result<bool, EvalError> {
        let dict = Dictionary::builtin();
        let mut all = true;
        for item in check_items(&dict, checks) {
            all &= LegacyEvaluator.evaluate(&item, request)?;
        }
        Ok(all)
    }

    fn request() -> Request {
        let d = Dictionary::builtin();
        Request::new()
            .with_attr(d.require("User-Name").unwrap(), Value::String("alice".into()))
            .with_attr(d.require("NAS-Port").unwrap(), Value::Integer(7))
            .with_attr(
                d.require("NAS-IP-Address").unwrap(),
                Value::IpAddr("192.0.2.1".parse().unwrap()),
            )
    }

    #[test]
    fn test_comparisons() {
        let req = request();
        assert!(eval("User-Name == \"alice\"", &req).unwrap());
        assert!(!eval("User-Name != \"alice\"", &req).unwrap());
        assert!(eval("NAS-Port < 8, NAS-Port >= 7, NAS-Port > 1", &req).unwrap());
        assert!(!eval("NAS-Port <= 6", &req).unwrap());
        assert!(eval("NAS-IP-Address == 192.0.2.1", &req).unwrap());
    }

    #[test]
    fn test_presence_and_absence() {
        let req = request();
        assert!(eval("User-Name =* ANY", &req).unwrap());
        assert!(eval("Filter-Id !* ANY", &req).unwrap());
        assert!(!eval("Filter-Id =* ANY", &req).unwrap());
        // Absent attributes fail ordinary comparisons, including !=.
        assert!(!eval("Filter-Id != \"x\"", &req).unwrap());
    }

    #[test]
    fn test_regex() {
        let req = request();
        assert!(eval("User-Name =~ /^al/", &req).unwrap());
        assert!(eval("User-Name !~ /^bob/", &req).unwrap());
        assert!(eval("User-Name =~ /ALICE/i", &req).unwrap());
        assert!(eval("NAS-Port =~ /^7$/", &req).unwrap());
    }

    #[test]
    fn test_attribute_reference_rhs() {
        let d = Dictionary::builtin();
        let req = request().with_attr(d.require("Filter-Id").unwrap(), Value::String("alice".into()));
        assert!(eval("User-Name == &Filter-Id", &req).unwrap());
        assert!(!eval("User-Name == &Reply-Message", &req).unwrap());
    }

    #[test]
    fn test_errors() {
        let req = request();
        assert!(matches!(
            eval("NAS-Port == seven", &req),
            Err(EvalError::Value(_))
        ));
        assert!(matches!(
            eval("User-Name == `echo hi`", &req),
            Err(EvalError::Unsupported("exec"))
        ));
        assert!(matches!(
            eval("NAS-Port -= 7", &req),
            Err(EvalError::NotComparison(Operator::SubEq))
        ));
        assert!(matches!(
            eval("NAS-IP-Address == 2001:db8::1", &req),
            Err(EvalError::TypeMismatch { .. })
        ));
    }
}

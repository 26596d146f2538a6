//! Tree-walking evaluator.
//!
//! The evaluator only sees the engine through [`FormulaScope`], which is
//! built fresh for every call so reads are always live.

use super::value::{format_number, Builtin, Namespace, Value};
use super::{BinaryOp, Expr, ExprError, UnaryOp};

/// Live view of the selection state exposed to formulas.
pub trait FormulaScope {
    /// Selected quantity of an item, 0 if absent.
    fn quantity(&self, item_id: &str) -> i64;

    /// Whether the item has a stored selection entry.
    fn is_selected(&self, item_id: &str) -> bool {
        self.quantity(item_id) != 0
    }

    /// Number of distinct selected items.
    fn selected_len(&self) -> usize;

    /// Current balance of a currency.
    fn currency(&self, currency_id: &str) -> Option<f64>;

    /// Summed selected quantity of a group's members, `None` for unknown groups.
    fn group_count(&self, group_id: &str) -> Option<i64>;

    /// Summed selected quantity of items carrying a tag.
    fn tag_count(&self, tag: &str) -> i64;

    /// Summed selected quantity of the group being evaluated for.
    fn this_group(&self) -> Option<i64>;
}

#[allow(clippy::cast_precision_loss)]
fn number(n: i64) -> Value {
    Value::Number(n as f64)
}

/// Evaluates a compiled expression against a scope.
///
/// # Errors
///
/// Returns an [`ExprError`] for names outside the context, calls on
/// non-functions, or property reads on `undefined`.
pub fn evaluate(expr: &Expr, scope: &dyn FormulaScope) -> Result<Value, ExprError> {
    Ok(match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Str(text) => Value::Str(text.clone()),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Null => Value::Null,
        Expr::Undefined => Value::Undefined,
        Expr::Ident(name) => resolve_name(name, scope)?,
        Expr::Member(object, name) => {
            let object = evaluate(object, scope)?;
            property(&object, name, scope)?
        }
        Expr::Index(object, key) => {
            let object = evaluate(object, scope)?;
            let key = evaluate(key, scope)?;
            property(&object, &key.to_string(), scope)?
        }
        Expr::Call(callee, args) => {
            let target = evaluate(callee, scope)?;
            let Value::Builtin(builtin) = target else {
                return Err(ExprError::NotCallable(describe(callee)));
            };
            let args = args
                .iter()
                .map(|arg| evaluate(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(builtin, &args, scope)
        }
        Expr::Unary(op, operand) => {
            let value = evaluate(operand, scope)?;
            match op {
                UnaryOp::Not => Value::Bool(!value.truthy()),
                UnaryOp::Neg => Value::Number(-value.to_number()),
                UnaryOp::Plus => Value::Number(value.to_number()),
            }
        }
        Expr::Logical(is_and, left, right) => {
            let left = evaluate(left, scope)?;
            if left.truthy() == *is_and {
                evaluate(right, scope)?
            } else {
                left
            }
        }
        Expr::Conditional(test, then, otherwise) => {
            if evaluate(test, scope)?.truthy() {
                evaluate(then, scope)?
            } else {
                evaluate(otherwise, scope)?
            }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            binary(*op, &left, &right)
        }
    })
}

fn resolve_name(name: &str, scope: &dyn FormulaScope) -> Result<Value, ExprError> {
    Ok(match name {
        "has" => Value::Builtin(Builtin::Has),
        "qty" => Value::Builtin(Builtin::Qty),
        "selected" => Value::Namespace(Namespace::Selected),
        "currency" => Value::Namespace(Namespace::Currency),
        "count" => Value::Namespace(Namespace::Count),
        "Math" => Value::Namespace(Namespace::Math),
        "this_group" => number(scope.this_group().unwrap_or(0)),
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        other => return Err(ExprError::UnknownName(other.to_string())),
    })
}

fn property(object: &Value, name: &str, scope: &dyn FormulaScope) -> Result<Value, ExprError> {
    Ok(match object {
        Value::Undefined | Value::Null => {
            return Err(ExprError::PropertyOfUndefined(name.to_string()));
        }
        Value::Namespace(Namespace::Selected) => match name {
            "has" => Value::Builtin(Builtin::Has),
            "get" => Value::Builtin(Builtin::Qty),
            #[allow(clippy::cast_precision_loss)]
            "length" => Value::Number(scope.selected_len() as f64),
            _ => Value::Undefined,
        },
        Value::Namespace(Namespace::Currency) => {
            scope.currency(name).map_or(Value::Undefined, Value::Number)
        }
        Value::Namespace(Namespace::Count) => match name {
            "tag" => Value::Builtin(Builtin::CountTag),
            "this_group" => scope.this_group().map_or(Value::Undefined, number),
            group => scope.group_count(group).map_or(Value::Undefined, number),
        },
        Value::Namespace(Namespace::Math) => match name {
            "PI" => Value::Number(std::f64::consts::PI),
            "E" => Value::Number(std::f64::consts::E),
            function => Builtin::math(function).map_or(Value::Undefined, Value::Builtin),
        },
        #[allow(clippy::cast_precision_loss)]
        Value::Str(text) if name == "length" => Value::Number(text.chars().count() as f64),
        Value::Bool(_) | Value::Number(_) | Value::Str(_) | Value::Builtin(_) => Value::Undefined,
    })
}

fn call(builtin: Builtin, args: &[Value], scope: &dyn FormulaScope) -> Value {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    let num = |i: usize| arg(i).to_number();

    match builtin {
        Builtin::Has => Value::Bool(scope.is_selected(&arg(0).to_string())),
        Builtin::Qty => number(scope.quantity(&arg(0).to_string())),
        Builtin::CountTag => number(scope.tag_count(&arg(0).to_string())),
        Builtin::Abs => Value::Number(num(0).abs()),
        Builtin::Floor => Value::Number(num(0).floor()),
        Builtin::Ceil => Value::Number(num(0).ceil()),
        Builtin::Round => Value::Number((num(0) + 0.5).floor()),
        Builtin::Trunc => Value::Number(num(0).trunc()),
        Builtin::Sign => {
            let n = num(0);
            Value::Number(if n.is_nan() || n == 0.0 { n } else { n.signum() })
        }
        Builtin::Sqrt => Value::Number(num(0).sqrt()),
        Builtin::Pow => Value::Number(num(0).powf(num(1))),
        Builtin::Min => Value::Number(fold_numbers(args, f64::INFINITY, f64::min)),
        Builtin::Max => Value::Number(fold_numbers(args, f64::NEG_INFINITY, f64::max)),
    }
}

fn fold_numbers(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add if left.is_str() || right.is_str() => Value::Str(format!("{left}{right}")),
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            Value::Bool(compare(op, left, right))
        }
        BinaryOp::LooseEq => Value::Bool(left.loose_eq(right)),
        BinaryOp::LooseNe => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(right)),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member(object, name) => format!("{}.{name}", describe(object)),
        Expr::Number(n) => format_number(*n),
        Expr::Str(text) => format!("'{text}'"),
        _ => "expression".to_string(),
    }
}

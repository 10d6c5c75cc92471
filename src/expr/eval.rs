use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::CodeError;
use crate::model::format_number;

/// Variable resolver for the `var()` builtin, mapping a host variable name to
/// its current value.
pub type VarResolver<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Evaluation environment: named bindings plus an optional host variable
/// resolver. Programs can only reach what the scope exposes.
#[derive(Default)]
pub struct Scope<'a> {
    vars: IndexMap<String, JsonValue>,
    resolver: Option<VarResolver<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn with_resolver(mut self, resolver: VarResolver<'a>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: JsonValue) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.vars.get(name)
    }
}

fn eval_err(message: impl Into<String>) -> CodeError {
    CodeError::Eval {
        message: message.into(),
    }
}

/// Loose truthiness: null, false, 0, and "" are falsy; everything else,
/// including empty arrays and objects, is truthy.
pub fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

/// Structural equality with numbers compared by numeric value, so `1 == 1.0`.
fn value_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| value_eq(a, b))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|o| value_eq(v, o)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn as_number(value: &JsonValue, context: &str) -> Result<f64, CodeError> {
    value
        .as_f64()
        .ok_or_else(|| eval_err(format!("{context} requires a number")))
}

fn json_num(n: f64) -> Result<JsonValue, CodeError> {
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .ok_or_else(|| eval_err("arithmetic produced a non-finite number"))
}

fn display(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.as_f64().map(format_number).unwrap_or_default(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<JsonValue, CodeError> {
    match expr {
        Expr::Number(n) => json_num(*n),
        Expr::Str(s) => Ok(JsonValue::String(s.clone())),
        Expr::Bool(b) => Ok(JsonValue::Bool(*b)),
        Expr::Null => Ok(JsonValue::Null),
        Expr::Ident(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| eval_err(format!("unknown identifier '{name}'"))),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, scope)?);
            }
            Ok(JsonValue::Array(out))
        }
        Expr::Object(fields) => {
            let mut out = Map::new();
            for (key, value) in fields {
                out.insert(key.clone(), eval(value, scope)?);
            }
            Ok(JsonValue::Object(out))
        }
        Expr::Unary(op, inner) => {
            let value = eval(inner, scope)?;
            match op {
                UnaryOp::Not => Ok(JsonValue::Bool(!truthy(&value))),
                UnaryOp::Neg => json_num(-as_number(&value, "negation")?),
            }
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, scope),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if truthy(&eval(cond, scope)?) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
        Expr::Member { target, field } => {
            let value = eval(target, scope)?;
            match value {
                JsonValue::Object(map) => Ok(map.get(field).cloned().unwrap_or(JsonValue::Null)),
                other => Err(eval_err(format!(
                    "cannot read field '{field}' of {}",
                    type_name(&other)
                ))),
            }
        }
        Expr::Index { target, index } => {
            let value = eval(target, scope)?;
            let index = eval(index, scope)?;
            match (value, index) {
                (JsonValue::Array(items), JsonValue::Number(n)) => {
                    let idx = n
                        .as_f64()
                        .filter(|v| v.fract() == 0.0 && *v >= 0.0)
                        .map(|v| v as usize)
                        .ok_or_else(|| eval_err("array index must be a non-negative integer"))?;
                    Ok(items.get(idx).cloned().unwrap_or(JsonValue::Null))
                }
                (JsonValue::Object(map), JsonValue::String(key)) => {
                    Ok(map.get(&key).cloned().unwrap_or(JsonValue::Null))
                }
                (target, _) => Err(eval_err(format!("cannot index {}", type_name(&target)))),
            }
        }
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, scope)?);
            }
            call_builtin(name, values, scope)
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    scope: &Scope<'_>,
) -> Result<JsonValue, CodeError> {
    // Logical operators short-circuit and yield the deciding operand.
    if op == BinaryOp::And {
        let left = eval(lhs, scope)?;
        return if truthy(&left) { eval(rhs, scope) } else { Ok(left) };
    }
    if op == BinaryOp::Or {
        let left = eval(lhs, scope)?;
        return if truthy(&left) { Ok(left) } else { eval(rhs, scope) };
    }

    let left = eval(lhs, scope)?;
    let right = eval(rhs, scope)?;
    match op {
        BinaryOp::Add => match (&left, &right) {
            (JsonValue::String(_), _) | (_, JsonValue::String(_)) => Ok(JsonValue::String(
                format!("{}{}", display(&left), display(&right)),
            )),
            _ => json_num(as_number(&left, "'+'")? + as_number(&right, "'+'")?),
        },
        BinaryOp::Sub => json_num(as_number(&left, "'-'")? - as_number(&right, "'-'")?),
        BinaryOp::Mul => json_num(as_number(&left, "'*'")? * as_number(&right, "'*'")?),
        BinaryOp::Div => {
            let divisor = as_number(&right, "'/'")?;
            if divisor == 0.0 {
                return Err(eval_err("division by zero"));
            }
            json_num(as_number(&left, "'/'")? / divisor)
        }
        BinaryOp::Rem => {
            let divisor = as_number(&right, "'%'")?;
            if divisor == 0.0 {
                return Err(eval_err("division by zero"));
            }
            json_num(as_number(&left, "'%'")? % divisor)
        }
        BinaryOp::Eq => Ok(JsonValue::Bool(value_eq(&left, &right))),
        BinaryOp::NotEq => Ok(JsonValue::Bool(!value_eq(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (JsonValue::String(a), JsonValue::String(b)) => a.cmp(b),
                _ => {
                    let a = as_number(&left, "comparison")?;
                    let b = as_number(&right, "comparison")?;
                    a.partial_cmp(&b)
                        .ok_or_else(|| eval_err("comparison of non-finite numbers"))?
                }
            };
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(JsonValue::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn expect_arity(name: &str, args: &[JsonValue], expected: usize) -> Result<(), CodeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(eval_err(format!(
            "{name}() takes {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn call_builtin(
    name: &str,
    args: Vec<JsonValue>,
    scope: &Scope<'_>,
) -> Result<JsonValue, CodeError> {
    match name {
        // values(elements): collapse the element descriptor list into an
        // id-to-value object, keeping element order.
        "values" => {
            expect_arity("values", &args, 1)?;
            let JsonValue::Array(items) = &args[0] else {
                return Err(eval_err("values() requires an array of elements"));
            };
            let mut out = Map::new();
            for item in items {
                let JsonValue::Object(element) = item else {
                    return Err(eval_err("values() requires element objects"));
                };
                let Some(JsonValue::String(id)) = element.get("id") else {
                    return Err(eval_err("values() element is missing its id"));
                };
                out.insert(
                    id.clone(),
                    element.get("value").cloned().unwrap_or(JsonValue::Null),
                );
            }
            Ok(JsonValue::Object(out))
        }
        // merge(a, b, ...): shallow object merge, later arguments win.
        "merge" => {
            if args.is_empty() {
                return Err(eval_err("merge() takes at least one argument"));
            }
            let mut out = Map::new();
            for arg in args {
                match arg {
                    JsonValue::Object(map) => {
                        for (key, value) in map {
                            out.insert(key, value);
                        }
                    }
                    JsonValue::Null => {}
                    other => {
                        return Err(eval_err(format!(
                            "merge() requires objects, got {}",
                            type_name(&other)
                        )))
                    }
                }
            }
            Ok(JsonValue::Object(out))
        }
        "len" => {
            expect_arity("len", &args, 1)?;
            let len = match &args[0] {
                JsonValue::Array(items) => items.len(),
                JsonValue::String(s) => s.chars().count(),
                JsonValue::Object(map) => map.len(),
                other => {
                    return Err(eval_err(format!("len() cannot measure {}", type_name(other))))
                }
            };
            json_num(len as f64)
        }
        "str" => {
            expect_arity("str", &args, 1)?;
            Ok(JsonValue::String(display(&args[0])))
        }
        "num" => {
            expect_arity("num", &args, 1)?;
            match &args[0] {
                JsonValue::Number(n) => Ok(JsonValue::Number(n.clone())),
                JsonValue::Bool(b) => json_num(if *b { 1.0 } else { 0.0 }),
                JsonValue::Null => json_num(0.0),
                JsonValue::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return json_num(0.0);
                    }
                    let parsed: f64 = trimmed
                        .parse()
                        .map_err(|_| eval_err(format!("num() cannot parse '{s}'")))?;
                    json_num(parsed)
                }
                other => Err(eval_err(format!(
                    "num() cannot convert {}",
                    type_name(other)
                ))),
            }
        }
        "has" => {
            expect_arity("has", &args, 2)?;
            match (&args[0], &args[1]) {
                (JsonValue::Object(map), JsonValue::String(key)) => {
                    Ok(JsonValue::Bool(map.contains_key(key)))
                }
                _ => Err(eval_err("has() requires an object and a string key")),
            }
        }
        "contains" => {
            expect_arity("contains", &args, 2)?;
            match (&args[0], &args[1]) {
                (JsonValue::Array(items), needle) => {
                    Ok(JsonValue::Bool(items.iter().any(|v| value_eq(v, needle))))
                }
                (JsonValue::String(haystack), JsonValue::String(needle)) => {
                    Ok(JsonValue::Bool(haystack.contains(needle.as_str())))
                }
                _ => Err(eval_err(
                    "contains() requires an array, or a string and a substring",
                )),
            }
        }
        // var(name): host variable lookup, unresolved names yield "".
        "var" => {
            expect_arity("var", &args, 1)?;
            let JsonValue::String(name) = &args[0] else {
                return Err(eval_err("var() requires a variable name"));
            };
            let resolved = scope
                .resolver
                .and_then(|resolve| resolve(name))
                .unwrap_or_default();
            Ok(JsonValue::String(resolved))
        }
        other => Err(eval_err(format!("unknown function '{other}'"))),
    }
}

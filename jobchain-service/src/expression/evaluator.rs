// Expression Engine Evaluator
// Evaluates argument ASTs against placeholder bindings

use crate::expression::parser::{BinaryOp, Expr, ExprParser, UnaryOp};
use crate::parser::models::{Mapping, Value};

use std::cmp::Ordering;
use std::fmt;

/// Evaluation error
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evaluation error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse and evaluate `input` with `bindings` as the only visible names
pub fn evaluate(input: &str, bindings: &Mapping) -> Result<Value, EvalError> {
    let ast = ExprParser::parse_str(input)
        .map_err(|e| EvalError::new(format!("cannot parse '{}': {}", input, e)))?;

    Evaluator::new(bindings).eval(&ast)
}

/// Expression evaluator
pub struct Evaluator<'a> {
    bindings: &'a Mapping,
}

impl<'a> Evaluator<'a> {
    pub fn new(bindings: &'a Mapping) -> Self {
        Self { bindings }
    }

    /// Evaluate an expression
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),

            Expr::Variable(name) => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::new(format!("name '{}' is not defined", name))),

            Expr::Index { object, index } => {
                let obj = self.eval(object)?;
                let idx = self.eval(index)?;
                self.eval_index(&obj, &idx)
            }

            Expr::Unary { op, expr } => {
                let val = self.eval(expr)?;
                self.eval_unary(*op, &val)
            }

            Expr::Binary { op, left, right } => {
                // Short-circuit evaluation for && and ||; the deciding operand is returned
                match op {
                    BinaryOp::And => {
                        let left_val = self.eval(left)?;
                        if !left_val.is_truthy() {
                            return Ok(left_val);
                        }
                        self.eval(right)
                    }
                    BinaryOp::Or => {
                        let left_val = self.eval(left)?;
                        if left_val.is_truthy() {
                            return Ok(left_val);
                        }
                        self.eval(right)
                    }
                    _ => {
                        let left_val = self.eval(left)?;
                        let right_val = self.eval(right)?;
                        self.eval_binary(*op, &left_val, &right_val)
                    }
                }
            }

            Expr::List(items) => {
                let values: Result<Vec<Value>, EvalError> =
                    items.iter().map(|e| self.eval(e)).collect();
                Ok(Value::Array(values?))
            }

            Expr::Object(pairs) => {
                let mut map = Mapping::new();
                for (key_expr, value_expr) in pairs {
                    let key = self.eval(key_expr)?.as_string();
                    map.insert(key, self.eval(value_expr)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn eval_index(&self, object: &Value, index: &Value) -> Result<Value, EvalError> {
        match (object, index) {
            (Value::Array(items), Value::Number(n)) => {
                let position = self.position(*n, items.len())?;
                Ok(items[position].clone())
            }
            (Value::String(s), Value::Number(n)) => {
                let chars: Vec<char> = s.chars().collect();
                let position = self.position(*n, chars.len())?;
                Ok(Value::String(chars[position].to_string()))
            }
            (Value::Object(map), key) => map
                .get(&key.as_string())
                .cloned()
                .ok_or_else(|| EvalError::new(format!("key '{}' not found", key))),
            _ => Err(EvalError::new("value is not indexable with this key")),
        }
    }

    /// Position of `index` in a sequence of `len` items; negative counts from the end
    fn position(&self, index: f64, len: usize) -> Result<usize, EvalError> {
        if index.fract() != 0.0 {
            return Err(EvalError::new("index must be an integer"));
        }
        let resolved = if index < 0.0 {
            len as f64 + index
        } else {
            index
        };
        if resolved < 0.0 || resolved >= len as f64 {
            return Err(EvalError::new(format!("index {} out of range", index)));
        }
        Ok(resolved as usize)
    }

    fn eval_unary(&self, op: UnaryOp, value: &Value) -> Result<Value, EvalError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnaryOp::Neg => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(EvalError::new("cannot negate non-number")),
            },
        }
    }

    fn eval_binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
        match op {
            // Arithmetic
            BinaryOp::Add => self.eval_add(left, right),
            BinaryOp::Sub => self.eval_numeric_op(left, right, |a, b| a - b),
            BinaryOp::Mul => self.eval_numeric_op(left, right, |a, b| a * b),
            BinaryOp::Div => {
                if right.as_number() == Some(0.0) {
                    return Err(EvalError::new("division by zero"));
                }
                self.eval_numeric_op(left, right, |a, b| a / b)
            }
            BinaryOp::Mod => {
                if right.as_number() == Some(0.0) {
                    return Err(EvalError::new("modulo by zero"));
                }
                self.eval_numeric_op(left, right, |a, b| a % b)
            }

            // Comparison
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Ne => Ok(Value::Bool(left != right)),
            BinaryOp::Lt => self.eval_comparison(left, right, |a, b| a < b),
            BinaryOp::Le => self.eval_comparison(left, right, |a, b| a <= b),
            BinaryOp::Gt => self.eval_comparison(left, right, |a, b| a > b),
            BinaryOp::Ge => self.eval_comparison(left, right, |a, b| a >= b),

            // Logical (handled in eval() for short-circuit)
            BinaryOp::And | BinaryOp::Or => unreachable!("handled in eval()"),
        }
    }

    fn eval_add(&self, left: &Value, right: &Value) -> Result<Value, EvalError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b.as_string()))),
            (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a.as_string(), b))),
            _ => Err(EvalError::new("cannot add these types")),
        }
    }

    fn eval_numeric_op<F>(&self, left: &Value, right: &Value, op: F) -> Result<Value, EvalError>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let a = left
            .as_number()
            .ok_or_else(|| EvalError::new("left operand is not a number"))?;
        let b = right
            .as_number()
            .ok_or_else(|| EvalError::new("right operand is not a number"))?;
        Ok(Value::Number(op(a, b)))
    }

    fn eval_comparison<F>(&self, left: &Value, right: &Value, op: F) -> Result<Value, EvalError>
    where
        F: FnOnce(Ordering, Ordering) -> bool,
    {
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => {
                let a = left
                    .as_number()
                    .ok_or_else(|| EvalError::new("left operand is not comparable"))?;
                let b = right
                    .as_number()
                    .ok_or_else(|| EvalError::new("right operand is not comparable"))?;
                a.partial_cmp(&b)
                    .ok_or_else(|| EvalError::new("operands are not comparable"))?
            }
        };
        Ok(Value::Bool(op(ordering, Ordering::Equal)))
    }
}

//! Tree-walking interpreter for compute blocks

use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::ast::{BinOp, Expr, Stmt, UnaryOp};
use crate::nodes::data::NodeData;

/// Name bound to the full ordered input tuple inside compute blocks
pub const INPUTS_NAME: &str = "inputs";

type Builtin = fn(&[NodeData]) -> Result<NodeData, String>;

static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Builtin> = HashMap::new();
    table.insert("sum", builtin_sum);
    table.insert("len", builtin_len);
    table.insert("min", builtin_min);
    table.insert("max", builtin_max);
    table.insert("abs", builtin_abs);
    table.insert("str", builtin_str);
    table.insert("int", builtin_int);
    table.insert("float", builtin_float);
    table.insert("tuple", builtin_tuple);
    table
});

/// Whether `name` is a builtin function
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains_key(name)
}

/// Evaluate an expression that may not reference any name
pub fn eval_const(expr: &Expr) -> Result<NodeData, String> {
    eval(expr, &HashMap::new())
}

/// Run a compute body; falling off the end yields `NodeData::None`
pub fn run(body: &[Stmt], mut env: HashMap<String, NodeData>) -> Result<NodeData, String> {
    for stmt in body {
        match stmt {
            Stmt::Let(name, expr) => {
                let value = eval(expr, &env)?;
                env.insert(name.clone(), value);
            }
            Stmt::Return(Some(expr)) => return eval(expr, &env),
            Stmt::Return(None) => return Ok(NodeData::None),
        }
    }
    Ok(NodeData::None)
}

fn eval(expr: &Expr, env: &HashMap<String, NodeData>) -> Result<NodeData, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| format!("name '{}' is not defined", name)),
        Expr::Tuple(items) => items
            .iter()
            .map(|item| eval(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(NodeData::Tuple),
        Expr::Index(target, index) => {
            let target = eval(target, env)?;
            let index = eval(index, env)?;
            index_value(&target, &index)
        }
        Expr::Unary(op, operand) => {
            let value = eval(operand, env)?;
            match op {
                UnaryOp::Not => Ok(NodeData::Boolean(!value.truthy())),
                UnaryOp::Neg => match value {
                    NodeData::Int(i) => i
                        .checked_neg()
                        .map(NodeData::Int)
                        .ok_or_else(|| "integer overflow".to_string()),
                    NodeData::Float(f) => Ok(NodeData::Float(-f)),
                    other => Err(format!("cannot negate {}", other.type_name())),
                },
            }
        }
        Expr::Binary(BinOp::And, lhs, rhs) => {
            let lhs = eval(lhs, env)?;
            if !lhs.truthy() {
                return Ok(NodeData::Boolean(false));
            }
            Ok(NodeData::Boolean(eval(rhs, env)?.truthy()))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            let lhs = eval(lhs, env)?;
            if lhs.truthy() {
                return Ok(NodeData::Boolean(true));
            }
            Ok(NodeData::Boolean(eval(rhs, env)?.truthy()))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, env)?;
            let rhs = eval(rhs, env)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Call(name, args) => {
            let function = BUILTINS
                .get(name.as_str())
                .ok_or_else(|| format!("unknown function '{}'", name))?;
            let args = args
                .iter()
                .map(|arg| eval(arg, env))
                .collect::<Result<Vec<_>, _>>()?;
            function(&args).map_err(|e| format!("{}(): {}", name, e))
        }
    }
}

fn index_value(target: &NodeData, index: &NodeData) -> Result<NodeData, String> {
    let i = index
        .as_int()
        .ok_or_else(|| format!("index must be int, not {}", index.type_name()))?;
    let resolve = |len: usize| -> Result<usize, String> {
        let position = if i < 0 { len as i64 + i } else { i };
        if position < 0 || position >= len as i64 {
            Err(format!("index {} out of range (len {})", i, len))
        } else {
            Ok(position as usize)
        }
    };
    match target {
        NodeData::Tuple(items) => Ok(items[resolve(items.len())?].clone()),
        NodeData::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(NodeData::String(chars[resolve(chars.len())?].to_string()))
        }
        other => Err(format!("{} is not indexable", other.type_name())),
    }
}

fn binary(op: BinOp, lhs: &NodeData, rhs: &NodeData) -> Result<NodeData, String> {
    use NodeData::*;
    match op {
        BinOp::Eq => return Ok(Boolean(values_equal(lhs, rhs))),
        BinOp::NotEq => return Ok(Boolean(!values_equal(lhs, rhs))),
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let ordering = compare(lhs, rhs)?;
            let result = match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::LtEq => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Boolean(result));
        }
        _ => {}
    }

    match (op, lhs, rhs) {
        (BinOp::Add, String(a), String(b)) => Ok(String(format!("{}{}", a, b))),
        (BinOp::Add, Tuple(a), Tuple(b)) => Ok(Tuple(a.iter().chain(b).cloned().collect())),
        (_, Int(a), Int(b)) => int_arithmetic(op, *a, *b),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => float_arithmetic(op, a, b),
            _ => Err(format!(
                "unsupported operand types for {:?}: {} and {}",
                op,
                lhs.type_name(),
                rhs.type_name()
            )),
        },
    }
}

fn int_arithmetic(op: BinOp, a: i64, b: i64) -> Result<NodeData, String> {
    let overflow = || "integer overflow".to_string();
    match op {
        BinOp::Add => a.checked_add(b).map(NodeData::Int).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).map(NodeData::Int).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).map(NodeData::Int).ok_or_else(overflow),
        BinOp::Div => float_arithmetic(op, a as f64, b as f64),
        BinOp::Rem if b == 0 => Err("modulo by zero".to_string()),
        BinOp::Rem => Ok(NodeData::Int(a.rem_euclid(b))),
        _ => Err(format!("unsupported integer operator {:?}", op)),
    }
}

fn float_arithmetic(op: BinOp, a: f64, b: f64) -> Result<NodeData, String> {
    match op {
        BinOp::Add => Ok(NodeData::Float(a + b)),
        BinOp::Sub => Ok(NodeData::Float(a - b)),
        BinOp::Mul => Ok(NodeData::Float(a * b)),
        BinOp::Div if b == 0.0 => Err("division by zero".to_string()),
        BinOp::Div => Ok(NodeData::Float(a / b)),
        BinOp::Rem if b == 0.0 => Err("modulo by zero".to_string()),
        BinOp::Rem => Ok(NodeData::Float(a.rem_euclid(b))),
        _ => Err(format!("unsupported float operator {:?}", op)),
    }
}

/// Numeric values compare by value across int/float
fn values_equal(lhs: &NodeData, rhs: &NodeData) -> bool {
    match (lhs, rhs) {
        (NodeData::Int(a), NodeData::Float(b)) | (NodeData::Float(b), NodeData::Int(a)) => {
            *a as f64 == *b
        }
        _ => lhs == rhs,
    }
}

fn compare(lhs: &NodeData, rhs: &NodeData) -> Result<Ordering, String> {
    match (lhs, rhs) {
        (NodeData::Int(a), NodeData::Int(b)) => Ok(a.cmp(b)),
        (NodeData::String(a), NodeData::String(b)) => Ok(a.cmp(b)),
        (NodeData::Tuple(a), NodeData::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| "cannot order NaN".to_string()),
            _ => Err(format!(
                "cannot order {} and {}",
                lhs.type_name(),
                rhs.type_name()
            )),
        },
    }
}

/// Single tuple argument means "iterate over it", otherwise the arguments
fn items_of(args: &[NodeData]) -> &[NodeData] {
    match args {
        [NodeData::Tuple(items)] => items,
        _ => args,
    }
}

fn builtin_sum(args: &[NodeData]) -> Result<NodeData, String> {
    items_of(args)
        .iter()
        .try_fold(NodeData::Int(0), |acc, item| binary(BinOp::Add, &acc, item))
}

fn builtin_len(args: &[NodeData]) -> Result<NodeData, String> {
    match args {
        [NodeData::Tuple(items)] => Ok(NodeData::Int(items.len() as i64)),
        [NodeData::String(s)] => Ok(NodeData::Int(s.chars().count() as i64)),
        [other] => Err(format!("{} has no length", other.type_name())),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn extreme(args: &[NodeData], wanted: Ordering) -> Result<NodeData, String> {
    let mut items = items_of(args).iter();
    let mut best = items.next().ok_or("empty sequence")?;
    for item in items {
        if compare(item, best)? == wanted {
            best = item;
        }
    }
    Ok(best.clone())
}

fn builtin_min(args: &[NodeData]) -> Result<NodeData, String> {
    extreme(args, Ordering::Less)
}

fn builtin_max(args: &[NodeData]) -> Result<NodeData, String> {
    extreme(args, Ordering::Greater)
}

fn builtin_abs(args: &[NodeData]) -> Result<NodeData, String> {
    match args {
        [NodeData::Int(i)] => i
            .checked_abs()
            .map(NodeData::Int)
            .ok_or_else(|| "integer overflow".to_string()),
        [NodeData::Float(f)] => Ok(NodeData::Float(f.abs())),
        [other] => Err(format!("bad operand type {}", other.type_name())),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn builtin_str(args: &[NodeData]) -> Result<NodeData, String> {
    match args {
        [NodeData::String(s)] => Ok(NodeData::String(s.clone())),
        [other] => Ok(NodeData::String(other.to_string())),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn builtin_int(args: &[NodeData]) -> Result<NodeData, String> {
    match args {
        [NodeData::Int(i)] => Ok(NodeData::Int(*i)),
        [NodeData::Boolean(b)] => Ok(NodeData::Int(*b as i64)),
        [NodeData::Float(f)] if f.is_finite() => Ok(NodeData::Int(f.trunc() as i64)),
        [NodeData::String(s)] => s
            .trim()
            .parse()
            .map(NodeData::Int)
            .map_err(|e| format!("invalid literal '{}': {}", s, e)),
        [other] => Err(format!("cannot convert {} to int", other.type_name())),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn builtin_float(args: &[NodeData]) -> Result<NodeData, String> {
    match args {
        [NodeData::String(s)] => s
            .trim()
            .parse()
            .map(NodeData::Float)
            .map_err(|e| format!("invalid literal '{}': {}", s, e)),
        [other] => other
            .as_float()
            .map(NodeData::Float)
            .ok_or_else(|| format!("cannot convert {} to float", other.type_name())),
        _ => Err(format!("expected 1 argument, got {}", args.len())),
    }
}

fn builtin_tuple(args: &[NodeData]) -> Result<NodeData, String> {
    Ok(NodeData::Tuple(items_of(args).to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_module;

    fn run_body(body: &str, inputs: Vec<NodeData>) -> Result<NodeData, String> {
        let source = format!("node T {{ compute {{ {} }} }}", body);
        let classes = parse_module(&source).unwrap();
        let mut env = HashMap::new();
        env.insert(INPUTS_NAME.to_string(), NodeData::Tuple(inputs));
        run(classes[0].body.as_ref().unwrap(), env)
    }

    fn ints(values: &[i64]) -> Vec<NodeData> {
        values.iter().map(|v| NodeData::Int(*v)).collect()
    }

    #[test]
    fn test_sum_of_inputs() {
        assert_eq!(run_body("return sum(inputs)", ints(&[1, 2, 3])), Ok(NodeData::Int(6)));
        assert_eq!(
            run_body("return sum(inputs)", vec![NodeData::Int(1), NodeData::Float(0.5)]),
            Ok(NodeData::Float(1.5))
        );
        assert_eq!(run_body("return sum(inputs)", vec![]), Ok(NodeData::Int(0)));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run_body("return 7 / 2", vec![]), Ok(NodeData::Float(3.5)));
        assert_eq!(run_body("return -7 % 3", vec![]), Ok(NodeData::Int(2)));
        assert_eq!(run_body("return \"a\" + \"b\"", vec![]), Ok(NodeData::String("ab".into())));
        assert!(run_body("return 1 / 0", vec![]).is_err());
        assert!(run_body("return 1 + \"a\"", vec![]).is_err());
    }

    #[test]
    fn test_let_and_indexing() {
        assert_eq!(
            run_body("let first = inputs[0]; let last = inputs[-1]; return (last, first)", ints(&[4, 5, 6])),
            Ok(NodeData::Tuple(ints(&[6, 4])))
        );
        assert!(run_body("return inputs[3]", ints(&[1])).is_err());
    }

    #[test]
    fn test_builtins() {
        assert_eq!(run_body("return max(inputs)", ints(&[3, 9, 2])), Ok(NodeData::Int(9)));
        assert_eq!(run_body("return min(4, 1.5)", vec![]), Ok(NodeData::Float(1.5)));
        assert_eq!(run_body("return len(inputs)", ints(&[3, 9])), Ok(NodeData::Int(2)));
        assert_eq!(run_body("return int(\" 42 \")", vec![]), Ok(NodeData::Int(42)));
        assert_eq!(run_body("return str(1.5)", vec![]), Ok(NodeData::String("1.5".into())));
        let call = vec![Stmt::Return(Some(Expr::Call("nope".into(), vec![])))];
        assert_eq!(
            run(&call, HashMap::new()),
            Err("unknown function 'nope'".to_string())
        );
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(run_body("return 1 == 1.0", vec![]), Ok(NodeData::Boolean(true)));
        assert_eq!(run_body("return 2 < 1 or not none", vec![]), Ok(NodeData::Boolean(true)));
        assert_eq!(run_body("return (1, 2) < (1, 3)", vec![]), Ok(NodeData::Boolean(true)));
    }

    #[test]
    fn test_missing_return_is_none() {
        assert_eq!(run_body("let x = 1", vec![]), Ok(NodeData::None));
        assert_eq!(run_body("return", vec![]), Ok(NodeData::None));
    }

    #[test]
    fn test_undefined_name() {
        let err = run_body("return y", vec![]).unwrap_err();
        assert!(err.contains("'y'"));
    }
}

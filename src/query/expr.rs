//! Expression tree and evaluator. Per spec §4.9.

use std::cmp::Ordering;

use crate::bson::{BsonDocument, BsonValue};
use crate::common::{Collation, Error, Result};

use super::function::Function;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A compiled expression, evaluated against one document and a parameter
/// document (for bound query parameters).
#[derive(Debug, Clone)]
pub enum Expr {
    Path(Vec<String>),
    Const(BsonValue),
    Parameter(String),
    BinaryOp(BinaryOp, Box<Expr>, Box<Expr>),
    UnaryOp(UnaryOp, Box<Expr>),
    Call(Function, Vec<Expr>),
}

fn as_f64(v: &BsonValue) -> Result<f64> {
    v.as_f64().ok_or_else(|| Error::InvalidCast(format!("{v} is not numeric")))
}

fn as_bool(v: &BsonValue) -> bool {
    match v {
        BsonValue::Boolean(b) => *b,
        BsonValue::Null => false,
        _ => true,
    }
}

fn arithmetic(op: BinaryOp, a: &BsonValue, b: &BsonValue) -> Result<BsonValue> {
    if let (BsonValue::Int32(x), BsonValue::Int32(y)) = (a, b) {
        let result = match op {
            BinaryOp::Add => x.checked_add(*y),
            BinaryOp::Sub => x.checked_sub(*y),
            BinaryOp::Mul => x.checked_mul(*y),
            BinaryOp::Div => x.checked_div(*y),
            BinaryOp::Mod => x.checked_rem(*y),
            _ => unreachable!(),
        };
        if let Some(v) = result {
            return Ok(BsonValue::Int32(v));
        }
    }

    let x = as_f64(a)?;
    let y = as_f64(b)?;
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Mod => x % y,
        _ => unreachable!(),
    };
    Ok(BsonValue::Double(result))
}

impl Expr {
    pub fn eval(&self, doc: &BsonDocument, params: &BsonDocument, collation: &Collation) -> Result<BsonValue> {
        match self {
            Expr::Path(segments) => Ok(doc.get_path(segments).cloned().unwrap_or(BsonValue::Null)),
            Expr::Const(v) => Ok(v.clone()),
            Expr::Parameter(name) => Ok(params.get(name).cloned().unwrap_or(BsonValue::Null)),
            Expr::UnaryOp(UnaryOp::Not, inner) => {
                Ok(BsonValue::Boolean(!as_bool(&inner.eval(doc, params, collation)?)))
            }
            Expr::UnaryOp(UnaryOp::Neg, inner) => {
                let v = inner.eval(doc, params, collation)?;
                match v {
                    BsonValue::Int32(n) => Ok(BsonValue::Int32(-n)),
                    BsonValue::Int64(n) => Ok(BsonValue::Int64(-n)),
                    other => Ok(BsonValue::Double(-as_f64(&other)?)),
                }
            }
            Expr::BinaryOp(op, left, right) => {
                let l = left.eval(doc, params, collation)?;
                match op {
                    BinaryOp::And => {
                        if !as_bool(&l) {
                            return Ok(BsonValue::Boolean(false));
                        }
                        Ok(BsonValue::Boolean(as_bool(&right.eval(doc, params, collation)?)))
                    }
                    BinaryOp::Or => {
                        if as_bool(&l) {
                            return Ok(BsonValue::Boolean(true));
                        }
                        Ok(BsonValue::Boolean(as_bool(&right.eval(doc, params, collation)?)))
                    }
                    _ => {
                        let r = right.eval(doc, params, collation)?;
                        match op {
                            BinaryOp::Eq => Ok(BsonValue::Boolean(l.compare(&r, collation) == Ordering::Equal)),
                            BinaryOp::Ne => Ok(BsonValue::Boolean(l.compare(&r, collation) != Ordering::Equal)),
                            BinaryOp::Lt => Ok(BsonValue::Boolean(l.compare(&r, collation) == Ordering::Less)),
                            BinaryOp::Lte => Ok(BsonValue::Boolean(l.compare(&r, collation) != Ordering::Greater)),
                            BinaryOp::Gt => Ok(BsonValue::Boolean(l.compare(&r, collation) == Ordering::Greater)),
                            BinaryOp::Gte => Ok(BsonValue::Boolean(l.compare(&r, collation) != Ordering::Less)),
                            BinaryOp::Concat => match (&l, &r) {
                                (BsonValue::String(a), BsonValue::String(b)) => {
                                    Ok(BsonValue::String(format!("{a}{b}")))
                                }
                                _ => Err(Error::InvalidCast("Concat requires two strings".into())),
                            },
                            _ => arithmetic(*op, &l, &r),
                        }
                    }
                }
            }
            Expr::Call(func, args) => {
                let values: Result<Vec<BsonValue>> =
                    args.iter().map(|a| a.eval(doc, params, collation)).collect();
                func.apply(&values?)
            }
        }
    }
}

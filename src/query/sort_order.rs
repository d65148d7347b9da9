//! One key of an `ORDER BY` clause: an expression plus direction.

use crate::sort::SortDirection;

use super::expr::Expr;

#[derive(Debug, Clone)]
pub struct SortOrder {
    pub expr: Expr,
    pub direction: SortDirection,
}

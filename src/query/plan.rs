//! Query plan tree and the planner that builds one from a filter
//! expression. Per spec §4.9: index scan when the predicate is a
//! conjunction containing an indexed equality/range on a leading indexed
//! field, full scan otherwise.

use crate::bson::BsonValue;

use super::expr::{BinaryOp, Expr};
use super::function::Function;
use super::sort_order::SortOrder;

/// One stage of a query execution pipeline.
#[derive(Debug, Clone)]
pub enum PlanNode {
    FullScan,
    IndexScan {
        index_name: String,
        from: BsonValue,
        to: BsonValue,
        inclusive: (bool, bool),
    },
    Filter(Expr),
    Map(Expr),
    Sort(Vec<SortOrder>),
    GroupBy(Expr),
    Aggregate(Function, Expr),
    /// Resolve a DbRef-shaped sub-document (`{"$id": ..., "$ref": ...}`) at
    /// `path` into the full referenced document, the way `Query::include`
    /// embeds a related document in place of its reference stub.
    Join(Vec<String>),
    Limit(usize),
    Offset(usize),
}

/// Describes one field this collection has a skip-list index over, so the
/// planner can recognize an indexable predicate.
#[derive(Debug, Clone)]
pub struct IndexedField {
    pub name: String,
    pub path: Vec<String>,
}

/// Walk a top-level `AND` conjunction looking for `path OP const` against
/// an indexed field; everything else becomes a residual `Filter`.
fn find_index_opportunity<'a>(
    expr: &'a Expr,
    indexes: &'a [IndexedField],
) -> Option<(&'a IndexedField, BsonValue, BsonValue, (bool, bool))> {
    match expr {
        Expr::BinaryOp(BinaryOp::Eq, left, right) => {
            extract_index_term(left, right, indexes).map(|(idx, v)| (idx, v.clone(), v, (true, true)))
        }
        Expr::BinaryOp(BinaryOp::And, left, right) => {
            find_index_opportunity(left, indexes).or_else(|| find_index_opportunity(right, indexes))
        }
        _ => None,
    }
}

fn extract_index_term<'a>(
    left: &'a Expr,
    right: &'a Expr,
    indexes: &'a [IndexedField],
) -> Option<(&'a IndexedField, &'a BsonValue)> {
    match (left, right) {
        (Expr::Path(path), Expr::Const(v)) | (Expr::Const(v), Expr::Path(path)) => {
            indexes.iter().find(|idx| &idx.path == path).map(|idx| (idx, v))
        }
        _ => None,
    }
}

/// Build a plan: `IndexScan` when the filter contains a recognizable
/// equality on an indexed field, else `FullScan` piped through `Filter`.
pub fn plan(filter: Option<&Expr>, indexes: &[IndexedField]) -> Vec<PlanNode> {
    let mut nodes = Vec::new();

    match filter {
        Some(expr) => {
            if let Some((field, from, to, inclusive)) = find_index_opportunity(expr, indexes) {
                nodes.push(PlanNode::IndexScan {
                    index_name: field.name.clone(),
                    from,
                    to,
                    inclusive,
                });
            } else {
                nodes.push(PlanNode::FullScan);
            }
            nodes.push(PlanNode::Filter(expr.clone()));
        }
        None => nodes.push(PlanNode::FullScan),
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::BsonValue;

    #[test]
    fn test_no_filter_is_full_scan() {
        let p = plan(None, &[]);
        assert!(matches!(p[0], PlanNode::FullScan));
    }

    #[test]
    fn test_filter_without_index_is_full_scan_plus_filter() {
        let expr = Expr::BinaryOp(
            BinaryOp::Gt,
            Box::new(Expr::Path(vec!["age".into()])),
            Box::new(Expr::Const(BsonValue::Int32(18))),
        );
        let p = plan(Some(&expr), &[]);
        assert!(matches!(p[0], PlanNode::FullScan));
        assert!(matches!(p[1], PlanNode::Filter(_)));
    }
}

//! Pipeline executor: runs a `PlanNode` sequence over an in-memory document
//! set. Index-backed scans resolve through a caller-supplied lookup so this
//! stage stays independent of how the collection stores its skip lists.

use std::cmp::Ordering;

use crate::bson::{BsonDocument, BsonValue};
use crate::common::{Collation, Result};

use super::plan::PlanNode;

/// Run every stage of `plan` over `docs` in order.
///
/// `index_lookup` resolves an `IndexScan` node (by index name and key
/// range) to the matching documents; callers without a live collection can
/// pass a closure that always returns `docs` unchanged, falling back to a
/// scan-then-filter.
///
/// `join_resolve` resolves a `Join` node's DbRef stub (collection name, id
/// value) to the referenced document. It must be a pure read over data the
/// caller already prefetched — this function never re-enters collection or
/// transaction locks itself.
pub fn execute(
    plan: &[PlanNode],
    mut docs: Vec<BsonDocument>,
    params: &BsonDocument,
    collation: &Collation,
    index_lookup: impl Fn(&str, &BsonValue, &BsonValue, (bool, bool)) -> Option<Vec<BsonDocument>>,
    join_resolve: impl Fn(&str, &BsonValue) -> Option<BsonDocument>,
) -> Result<Vec<BsonDocument>> {
    for node in plan {
        docs = match node {
            PlanNode::FullScan => docs,
            PlanNode::IndexScan { index_name, from, to, inclusive } => {
                index_lookup(index_name, from, to, *inclusive).unwrap_or(docs)
            }
            PlanNode::Filter(expr) => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    let matched = expr.eval(&doc, params, collation)?;
                    if matches!(matched, BsonValue::Boolean(true)) {
                        kept.push(doc);
                    }
                }
                kept
            }
            PlanNode::Map(expr) => {
                let mut mapped = Vec::with_capacity(docs.len());
                for doc in &docs {
                    let value = expr.eval(doc, params, collation)?;
                    let mut wrapper = BsonDocument::new();
                    wrapper.set("value", value);
                    mapped.push(wrapper);
                }
                mapped
            }
            PlanNode::Sort(orders) => {
                let mut keyed: Vec<(Vec<BsonValue>, BsonDocument)> = Vec::with_capacity(docs.len());
                for doc in docs {
                    let mut keys = Vec::with_capacity(orders.len());
                    for order in orders {
                        keys.push(order.expr.eval(&doc, params, collation)?);
                    }
                    keyed.push((keys, doc));
                }
                keyed.sort_by(|a, b| {
                    for (i, order) in orders.iter().enumerate() {
                        let cmp = a.0[i].compare(&b.0[i], collation);
                        let cmp = match order.direction {
                            crate::sort::SortDirection::Ascending => cmp,
                            crate::sort::SortDirection::Descending => cmp.reverse(),
                        };
                        if cmp != Ordering::Equal {
                            return cmp;
                        }
                    }
                    Ordering::Equal
                });
                keyed.into_iter().map(|(_, doc)| doc).collect()
            }
            PlanNode::GroupBy(expr) => {
                let mut groups: Vec<(BsonValue, Vec<BsonDocument>)> = Vec::new();
                for doc in docs {
                    let key = expr.eval(&doc, params, collation)?;
                    match groups.iter_mut().find(|(k, _)| k.compare(&key, collation) == Ordering::Equal) {
                        Some((_, items)) => items.push(doc),
                        None => groups.push((key, vec![doc])),
                    }
                }
                groups
                    .into_iter()
                    .map(|(key, items)| {
                        let mut group = BsonDocument::new();
                        group.set("key", key);
                        group.set("items", BsonValue::Array(items.into_iter().map(BsonValue::Document).collect()));
                        group
                    })
                    .collect()
            }
            PlanNode::Aggregate(function, expr) => {
                let mut values = Vec::with_capacity(docs.len());
                for doc in &docs {
                    values.push(expr.eval(doc, params, collation)?);
                }
                let result = function.apply(&[BsonValue::Array(values)])?;
                let mut wrapper = BsonDocument::new();
                wrapper.set("value", result);
                vec![wrapper]
            }
            PlanNode::Join(path) => {
                let mut joined = Vec::with_capacity(docs.len());
                for mut doc in docs {
                    if let Some(BsonValue::Document(stub)) = doc.get_path(path) {
                        let reference = match (stub.get("$ref"), stub.get("$id")) {
                            (Some(BsonValue::String(name)), Some(id)) => Some((name.clone(), id.clone())),
                            _ => None,
                        };
                        if let Some((name, id)) = reference {
                            if let Some(resolved) = join_resolve(&name, &id) {
                                doc.set_path(path, BsonValue::Document(resolved));
                            }
                        }
                    }
                    joined.push(doc);
                }
                joined
            }
            PlanNode::Limit(n) => {
                docs.truncate(*n);
                docs
            }
            PlanNode::Offset(n) => docs.into_iter().skip(*n).collect(),
        };
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expr::{BinaryOp, Expr};

    fn doc(age: i32) -> BsonDocument {
        let mut d = BsonDocument::new();
        d.set("age", BsonValue::Int32(age));
        d
    }

    #[test]
    fn test_full_scan_filter_limit() {
        let docs = vec![doc(10), doc(20), doc(30)];
        let filter = Expr::BinaryOp(
            BinaryOp::Gt,
            Box::new(Expr::Path(vec!["age".into()])),
            Box::new(Expr::Const(BsonValue::Int32(15))),
        );
        let plan = vec![PlanNode::FullScan, PlanNode::Filter(filter), PlanNode::Limit(1)];
        let params = BsonDocument::new();
        let result = execute(&plan, docs, &params, &Collation::Binary, |_, _, _, _| None, |_, _| None).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].get("age"), Some(&BsonValue::Int32(20)));
    }

    #[test]
    fn test_sort_descending() {
        let docs = vec![doc(10), doc(30), doc(20)];
        let orders = vec![super::super::sort_order::SortOrder {
            expr: Expr::Path(vec!["age".into()]),
            direction: crate::sort::SortDirection::Descending,
        }];
        let plan = vec![PlanNode::Sort(orders)];
        let params = BsonDocument::new();
        let result = execute(&plan, docs, &params, &Collation::Binary, |_, _, _, _| None, |_, _| None).unwrap();
        let ages: Vec<i32> = result
            .iter()
            .map(|d| match d.get("age") {
                Some(BsonValue::Int32(v)) => *v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(ages, vec![30, 20, 10]);
    }

    #[test]
    fn test_group_by() {
        let mut a = doc(10);
        a.set("team", BsonValue::String("x".into()));
        let mut b = doc(20);
        b.set("team", BsonValue::String("x".into()));
        let mut c = doc(30);
        c.set("team", BsonValue::String("y".into()));

        let plan = vec![PlanNode::GroupBy(Expr::Path(vec!["team".into()]))];
        let params = BsonDocument::new();
        let result = execute(&plan, vec![a, b, c], &params, &Collation::Binary, |_, _, _, _| None, |_, _| None).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_join_resolves_dbref_stub() {
        let mut stub = BsonDocument::new();
        stub.set("$ref", BsonValue::String("authors".into()));
        stub.set("$id", BsonValue::Int32(1));
        let mut book = BsonDocument::new();
        book.set("title", BsonValue::String("ada".into()));
        book.set("author", BsonValue::Document(stub));

        let plan = vec![PlanNode::Join(vec!["author".into()])];
        let params = BsonDocument::new();
        let result = execute(&plan, vec![book], &params, &Collation::Binary, |_, _, _, _| None, |name, id| {
            assert_eq!(name, "authors");
            assert_eq!(id, &BsonValue::Int32(1));
            let mut resolved = BsonDocument::new();
            resolved.set("name", BsonValue::String("Ada Lovelace".into()));
            Some(resolved)
        })
        .unwrap();

        match result[0].get("author") {
            Some(BsonValue::Document(resolved)) => {
                assert!(matches!(resolved.get("name"), Some(BsonValue::String(s)) if s == "Ada Lovelace"));
            }
            other => panic!("expected resolved document, got {other:?}"),
        }
    }

    #[test]
    fn test_join_leaves_unresolved_stub_untouched() {
        let mut stub = BsonDocument::new();
        stub.set("$ref", BsonValue::String("authors".into()));
        stub.set("$id", BsonValue::Int32(404));
        let mut book = BsonDocument::new();
        book.set("author", BsonValue::Document(stub.clone()));

        let plan = vec![PlanNode::Join(vec!["author".into()])];
        let params = BsonDocument::new();
        let result =
            execute(&plan, vec![book], &params, &Collation::Binary, |_, _, _, _| None, |_, _| None).unwrap();
        assert_eq!(result[0].get("author"), Some(&BsonValue::Document(stub)));
    }
}

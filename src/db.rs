//! Public API surface. Per SPEC_FULL.md §13: `Database` wraps a
//! `TransactionManager` and a process-wide cache of open
//! `CollectionService`s; `Collection` and `Query` are thin builders over
//! the query planner/executor, the way the teacher's `lib.rs` re-exports
//! its buffer/storage types at the crate root instead of hiding them
//! behind a facade.

use std::path::Path;

use parking_lot::Mutex;
use rand::RngCore;
use std::collections::HashMap;

use crate::bson::{BsonDocument, BsonValue};
use crate::collection::{CollectionService, IndexOptions};
use crate::common::config::DEFAULT_CHECKPOINT_PAGES;
use crate::common::{Collation, Error, PageAddress, PageId, Result};
use crate::connection::{ConnectionMode, ConnectionString};
use crate::index::spatial::Mbb;
use crate::pager::Snapshot;
use crate::query::expr::Expr;
use crate::query::sort_order::SortOrder;
use crate::query::{self, IndexedField};
use crate::shared::{ProcessLock, SharedMutexName};
use crate::sort::SortDirection;
use crate::storage::page::Page;
use crate::storage::{AesCbcCodec, DiskService, HeaderPage, PageOrigin, Pragmas};
use crate::txn::{upgrade_v4_to_v5, TransactionManager};

/// An open database file: the transaction manager driving every operation,
/// plus every collection touched so far, kept warm across transactions.
pub struct Database {
    txn: TransactionManager,
    collation: Collation,
    readonly: bool,
    collections: Mutex<HashMap<String, CollectionService>>,
    _shared_lock: Option<ProcessLock>,
}

impl Database {
    /// Open (or create) the database named by `connection_string`. See
    /// `ConnectionString::parse` for the recognized keys.
    pub fn open(connection_string: &str) -> Result<Self> {
        let conn = ConnectionString::parse(connection_string)?;
        let path = Path::new(&conn.filename);

        let shared_lock = if conn.connection == ConnectionMode::Shared {
            let name = SharedMutexName::derive(path);
            Some(ProcessLock::try_acquire(&name)?)
        } else {
            None
        };

        if path.exists() {
            upgrade_v4_to_v5(path, conn.upgrade)?;
        }

        let mut disk = if path.exists() {
            tracing::debug!(filename = %conn.filename, "opening existing database");
            let mut disk = DiskService::open(&conn.filename)?;
            if let Some(password) = &conn.password {
                let header_page = disk.read_page(PageId::new(0), PageOrigin::Data)?;
                let header = HeaderPage::read_from_page(&header_page)?;
                disk.set_encryption(AesCbcCodec::derive(password, &header.salt));
            }
            disk
        } else {
            tracing::info!(filename = %conn.filename, "creating new database file");
            let mut disk = DiskService::create(&conn.filename)?;
            let mut header = HeaderPage {
                pragmas: Pragmas {
                    collation: conn.collation,
                    timeout_seconds: conn.timeout_seconds,
                    ..Pragmas::default()
                },
                ..HeaderPage::default()
            };
            if let Some(password) = &conn.password {
                rand::thread_rng().fill_bytes(&mut header.salt);
                disk.set_encryption(AesCbcCodec::derive(password, &header.salt));
            }
            let mut page = Page::new();
            header.write_to_page(&mut page)?;
            disk.write_data_page(PageId::new(0), &page)?;
            disk.finish_checkpoint()?;
            disk
        };

        let header_page = disk.read_page(PageId::new(0), PageOrigin::Data)?;
        let header = HeaderPage::read_from_page(&header_page)?;

        let txn = TransactionManager::new(disk, conn.timeout_seconds, DEFAULT_CHECKPOINT_PAGES);

        Ok(Self {
            txn,
            collation: header.pragmas.collation,
            readonly: conn.readonly,
            collections: Mutex::new(HashMap::new()),
            _shared_lock: shared_lock,
        })
    }

    /// Read (and, for a runtime-overridable set, apply) one pragma. Only
    /// `TIMEOUT` can currently be changed after open; the rest report the
    /// value fixed at open time.
    pub fn pragma(&self, name: &str) -> Result<String> {
        match name.to_ascii_uppercase().as_str() {
            "COLLATION" => Ok(format!("{:?}", self.collation)),
            other => Err(Error::InvalidConnectionString(format!("unknown pragma: {other}"))),
        }
    }

    pub fn get_collection(&self, name: &str) -> Collection<'_> {
        Collection { db: self, name: name.to_string() }
    }

    fn load_head(snap: &mut Snapshot, name: &str) -> Result<Option<PageId>> {
        let page = snap.get_page(PageId::new(0))?;
        let header = HeaderPage::read_from_page(&page)?;
        Ok(header.collection_page_id(name).map(PageId::new))
    }

    fn register_head(snap: &mut Snapshot, name: &str, head: PageId) -> Result<()> {
        let page = snap.get_page(PageId::new(0))?;
        let mut header = HeaderPage::read_from_page(&page)?;
        header.add_collection(name, head.0);
        let page_mut = snap.get_page_mut(PageId::new(0))?;
        header.write_to_page(page_mut)?;
        Ok(())
    }

    fn with_collection_read<F, T>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot, &mut CollectionService) -> Result<T>,
    {
        self.txn.read(|snap| {
            let mut collections = self.collections.lock();
            if !collections.contains_key(name) {
                let head = Self::load_head(snap, name)?;
                collections.insert(name.to_string(), CollectionService::with_head_page(name, head));
            }
            let coll = collections.get_mut(name).unwrap();
            f(snap, coll)
        })
    }

    fn with_collection_write<F, T>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Snapshot, &mut CollectionService) -> Result<T>,
    {
        if self.readonly {
            tracing::warn!(collection = name, "write rejected: database opened read-only");
            return Err(Error::ReadOnlyDatabase);
        }
        self.txn.write(|snap| {
            let mut collections = self.collections.lock();
            if !collections.contains_key(name) {
                let head = Self::load_head(snap, name)?;
                collections.insert(name.to_string(), CollectionService::with_head_page(name, head));
            }
            let coll = collections.get_mut(name).unwrap();
            let had_head = coll.head_data_page();
            let result = f(snap, coll)?;
            if had_head.is_none() {
                if let Some(new_head) = coll.head_data_page() {
                    Self::register_head(snap, name, new_head)?;
                }
            }
            Ok(result)
        })
    }
}

/// A handle to one named collection within a `Database`.
pub struct Collection<'db> {
    db: &'db Database,
    name: String,
}

impl<'db> Collection<'db> {
    pub fn insert(&self, doc: BsonDocument) -> Result<PageAddress> {
        self.db.with_collection_write(&self.name, |snap, coll| coll.insert(snap, doc))
    }

    pub fn update(&self, id: &BsonValue, doc: BsonDocument) -> Result<PageAddress> {
        self.db.with_collection_write(&self.name, |snap, coll| coll.update(snap, id, doc))
    }

    /// Insert if `_id` isn't present in the collection yet, otherwise
    /// update the existing document.
    pub fn upsert(&self, mut doc: BsonDocument) -> Result<PageAddress> {
        match doc.get("_id").cloned() {
            Some(id) => {
                let exists = self.db.with_collection_read(&self.name, |snap, coll| {
                    Ok(coll.find_by_id(snap, &id)?.is_some())
                })?;
                if exists {
                    self.update(&id, doc)
                } else {
                    self.insert(doc)
                }
            }
            None => {
                doc.set("_id", BsonValue::ObjectId(crate::bson::ObjectId::new()));
                self.insert(doc)
            }
        }
    }

    pub fn delete(&self, id: &BsonValue) -> Result<()> {
        self.db.with_collection_write(&self.name, |snap, coll| coll.delete(snap, id))
    }

    pub fn find_by_id(&self, id: &BsonValue) -> Result<Option<BsonDocument>> {
        self.db
            .with_collection_read(&self.name, |snap, coll| Ok(coll.find_by_id(snap, id)?.map(|(doc, _)| doc)))
    }

    /// Every document matching `filter`, with no defined order.
    pub fn find(&self, filter: Expr) -> Result<Vec<BsonDocument>> {
        self.query().where_(filter).to_vec()
    }

    pub fn ensure_index(&self, name: &str, path: Vec<&str>, options: IndexOptions) -> Result<()> {
        let path: Vec<String> = path.into_iter().map(String::from).collect();
        self.db
            .with_collection_write(&self.name, |snap, coll| coll.ensure_index(snap, name, path, options))
    }

    pub fn query(&self) -> Query<'db> {
        Query {
            db: self.db,
            collection: self.name.clone(),
            filter: None,
            orders: Vec::new(),
            group_by: None,
            limit: None,
            offset: None,
            near: None,
            select: None,
            includes: Vec::new(),
        }
    }
}

enum NearQuery {
    Radius { index: String, target: Vec<f32>, max_distance: f32 },
    TopK { index: String, target: Vec<f32>, k: usize },
    SpatialWithin { index: String, mbb: Mbb },
    SpatialIntersects { index: String, mbb: Mbb },
}

/// A composable query over one collection. Terminal methods (`to_vec`,
/// `count`, `first`, `single`) run the pipeline; every other method
/// returns `self` for chaining.
pub struct Query<'db> {
    db: &'db Database,
    collection: String,
    filter: Option<Expr>,
    orders: Vec<SortOrder>,
    group_by: Option<Expr>,
    limit: Option<usize>,
    offset: Option<usize>,
    near: Option<NearQuery>,
    select: Option<Expr>,
    includes: Vec<Vec<String>>,
}

impl<'db> Query<'db> {
    pub fn where_(mut self, filter: Expr) -> Self {
        self.filter = match self.filter.take() {
            Some(existing) => Some(Expr::BinaryOp(
                crate::query::BinaryOp::And,
                Box::new(existing),
                Box::new(filter),
            )),
            None => Some(filter),
        };
        self
    }

    /// Select/project one expression per result document. Pushed as a
    /// trailing `Map` stage the executor already understands, matching
    /// how `plan::plan` composes filter/map/sort into one pipeline.
    pub fn select(mut self, expr: Expr) -> Self {
        self.select = Some(expr);
        self
    }

    pub fn order_by(mut self, expr: Expr, direction: SortDirection) -> Self {
        self.orders.push(SortOrder { expr, direction });
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by = Some(expr);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// Eagerly resolve a DbRef-shaped field (`{"$id": ..., "$ref": ...}`)
    /// at the dotted `path` into the full referenced document, LiteDB's
    /// `Include` behavior. Resolution happens in `to_vec` via a separate,
    /// non-nested read of the referenced collection.
    pub fn include(mut self, path: &str) -> Self {
        self.includes.push(path.split('.').map(String::from).collect());
        self
    }

    pub fn where_near(mut self, index: &str, target: Vec<f32>, max_distance: f32) -> Self {
        self.near = Some(NearQuery::Radius { index: index.to_string(), target, max_distance });
        self
    }

    pub fn top_k_near(mut self, index: &str, target: Vec<f32>, k: usize) -> Self {
        self.near = Some(NearQuery::TopK { index: index.to_string(), target, k });
        self
    }

    pub fn spatial_within(mut self, index: &str, mbb: Mbb) -> Self {
        self.near = Some(NearQuery::SpatialWithin { index: index.to_string(), mbb });
        self
    }

    pub fn spatial_intersects(mut self, index: &str, mbb: Mbb) -> Self {
        self.near = Some(NearQuery::SpatialIntersects { index: index.to_string(), mbb });
        self
    }

    pub fn to_vec(self) -> Result<Vec<BsonDocument>> {
        let Query { db, collection, filter, orders, group_by, limit, offset, near, select, includes } = self;

        let mut docs = db.with_collection_read(&collection, |snap, coll| {
            // Index-backed scans (both the vector/spatial `near` family and
            // the planner's skip-list `IndexScan`) need `&mut Snapshot` to
            // resolve addresses into documents, which doesn't fit the
            // executor's `Fn` index-lookup hook. So every index lookup
            // happens up front here instead, and `execute` always gets a
            // no-op lookup closure plus an already-resolved document set.
            let indexed: Vec<IndexedField> = coll
                .indexes()
                .iter()
                .map(|idx| IndexedField { name: idx.name.clone(), path: idx.path.clone() })
                .collect();

            let (docs, mut nodes) = match &near {
                Some(NearQuery::Radius { index, target, max_distance }) => {
                    let addresses = resolve_vector(coll, index, |v| v.where_near(target, *max_distance))?;
                    let docs = resolve_addresses(coll, snap, addresses)?;
                    let nodes = filter.as_ref().map(|e| vec![query::plan::PlanNode::Filter(e.clone())]).unwrap_or_default();
                    (docs, nodes)
                }
                Some(NearQuery::TopK { index, target, k }) => {
                    let addresses = resolve_vector(coll, index, |v| {
                        v.top_k_near(target, *k).map(|r| r.into_iter().map(|(a, _)| a).collect())
                    })?;
                    let docs = resolve_addresses(coll, snap, addresses)?;
                    let nodes = filter.as_ref().map(|e| vec![query::plan::PlanNode::Filter(e.clone())]).unwrap_or_default();
                    (docs, nodes)
                }
                Some(NearQuery::SpatialWithin { index, mbb }) | Some(NearQuery::SpatialIntersects { index, mbb }) => {
                    let addresses = resolve_spatial(coll, index, mbb)?;
                    let docs = resolve_addresses(coll, snap, addresses)?;
                    let nodes = filter.as_ref().map(|e| vec![query::plan::PlanNode::Filter(e.clone())]).unwrap_or_default();
                    (docs, nodes)
                }
                None => {
                    let mut nodes = query::plan(filter.as_ref(), &indexed);
                    let docs = match nodes.first() {
                        Some(query::plan::PlanNode::IndexScan { index_name, from, to, inclusive }) => {
                            let resolved = resolve_index_scan(coll, snap, index_name, from, to, *inclusive)?;
                            nodes.remove(0);
                            resolved
                        }
                        _ => coll.scan(snap)?.into_iter().map(|(doc, _)| doc).collect(),
                    };
                    (docs, nodes)
                }
            };

            if let Some(expr) = group_by {
                nodes.push(query::plan::PlanNode::GroupBy(expr));
            }
            if !orders.is_empty() {
                nodes.push(query::plan::PlanNode::Sort(orders.clone()));
            }
            if let Some(n) = offset {
                nodes.push(query::plan::PlanNode::Offset(n));
            }
            if let Some(n) = limit {
                nodes.push(query::plan::PlanNode::Limit(n));
            }

            let params = BsonDocument::new();
            query::execute(&nodes, docs, &params, &db.collation, |_, _, _, _| None, |_, _| None)
        })?;

        // `Join`/`Include` resolution reads a different collection than the
        // one locked above, so it can't run inside that closure without
        // re-entering `db.collections`'s lock. Prefetch every referenced
        // document first, with the outer lock already released, then run
        // the resolution (and any `select` projection) as a second,
        // lock-free execute pass over the already-materialized documents.
        if !includes.is_empty() {
            let prefetched = prefetch_includes(db, &docs, &includes)?;
            let mut nodes = Vec::with_capacity(includes.len());
            for path in &includes {
                nodes.push(query::plan::PlanNode::Join(path.clone()));
            }
            let params = BsonDocument::new();
            docs = query::execute(&nodes, docs, &params, &db.collation, |_, _, _, _| None, |name, id| {
                prefetched
                    .iter()
                    .find(|((n, i), _)| n == name && i == id)
                    .map(|(_, doc)| doc.clone())
            })?;
        }

        if let Some(expr) = select {
            let params = BsonDocument::new();
            docs = query::execute(&[query::plan::PlanNode::Map(expr)], docs, &params, &db.collation, |_, _, _, _| None, |_, _| None)?;
        }

        Ok(docs)
    }

    pub fn count(self) -> Result<usize> {
        Ok(self.to_vec()?.len())
    }

    pub fn first(self) -> Result<Option<BsonDocument>> {
        Ok(self.to_vec()?.into_iter().next())
    }

    /// Exactly one result, or `Error::InvalidExpression` if zero or more
    /// than one document matched.
    pub fn single(self) -> Result<BsonDocument> {
        let mut results = self.to_vec()?;
        if results.len() != 1 {
            return Err(Error::InvalidExpression(format!(
                "expected exactly one result, found {}",
                results.len()
            )));
        }
        Ok(results.remove(0))
    }
}

fn resolve_vector(
    coll: &CollectionService,
    index: &str,
    f: impl FnOnce(&crate::index::vector::VectorIndex) -> Result<Vec<PageAddress>>,
) -> Result<Vec<PageAddress>> {
    match coll.index(index).map(|idx| &idx.structure) {
        Some(crate::collection::IndexStructure::Vector(v)) => f(v),
        Some(_) => Err(Error::InvalidExpression(format!("{index} is not a vector index"))),
        None => Err(Error::InvalidExpression(format!("no such index: {index}"))),
    }
}

fn resolve_spatial(coll: &CollectionService, index: &str, mbb: &Mbb) -> Result<Vec<PageAddress>> {
    match coll.index(index).map(|idx| &idx.structure) {
        Some(crate::collection::IndexStructure::SpatialShape(shapes)) => Ok(shapes.candidates(mbb)),
        Some(crate::collection::IndexStructure::SpatialPoint(points)) => {
            let min_code = crate::index::spatial::Morton::encode(mbb[0], mbb[1]);
            let max_code = crate::index::spatial::Morton::encode(mbb[2], mbb[3]);
            Ok(points.range_query(min_code.min(max_code), min_code.max(max_code)))
        }
        Some(_) => Err(Error::InvalidExpression(format!("{index} is not a spatial index"))),
        None => Err(Error::InvalidExpression(format!("no such index: {index}"))),
    }
}

fn resolve_addresses(coll: &CollectionService, snap: &mut Snapshot, addresses: Vec<PageAddress>) -> Result<Vec<BsonDocument>> {
    addresses.into_iter().map(|addr| coll.read_by_address(snap, addr)).collect()
}

/// Collect every distinct `($ref, $id)` DbRef stub found at any of `paths`
/// across `docs` and fetch the referenced document for each, one separate
/// `with_collection_read` call per distinct reference. Called with the
/// query's own collection lock already released, so each fetch is free to
/// take its own lock without nesting.
fn prefetch_includes(
    db: &Database,
    docs: &[BsonDocument],
    paths: &[Vec<String>],
) -> Result<Vec<((String, BsonValue), BsonDocument)>> {
    let mut refs: Vec<(String, BsonValue)> = Vec::new();
    for doc in docs {
        for path in paths {
            if let Some(BsonValue::Document(stub)) = doc.get_path(path) {
                if let (Some(BsonValue::String(name)), Some(id)) = (stub.get("$ref"), stub.get("$id")) {
                    if !refs.iter().any(|(n, i)| n == name && i == id) {
                        refs.push((name.clone(), id.clone()));
                    }
                }
            }
        }
    }

    let mut resolved = Vec::with_capacity(refs.len());
    for (name, id) in refs {
        if let Some(found) = db.with_collection_read(&name, |snap, coll| Ok(coll.find_by_id(snap, &id)?.map(|(d, _)| d)))? {
            resolved.push(((name, id), found));
        }
    }
    Ok(resolved)
}

fn resolve_index_scan(
    coll: &CollectionService,
    snap: &mut Snapshot,
    index_name: &str,
    from: &BsonValue,
    to: &BsonValue,
    inclusive: (bool, bool),
) -> Result<Vec<BsonDocument>> {
    let addresses: Option<Vec<PageAddress>> = coll.index(index_name).and_then(|idx| match &idx.structure {
        crate::collection::IndexStructure::SkipList(list) => {
            Some(list.range(from, to, inclusive).into_iter().map(|n| n.data).collect())
        }
        _ => None,
    });
    match addresses {
        Some(addrs) => resolve_addresses(coll, snap, addrs),
        None => Ok(coll.scan(snap)?.into_iter().map(|(doc, _)| doc).collect()),
    }
}

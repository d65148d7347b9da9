//! InterchangeDB - a single-file embedded document database.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         InterchangeDB                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │         Public API (db.rs): Database / Collection /      │   │
//! │  │         Query, connection strings, shared-mode locking    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │   Query Layer (query/): expr → planner → executor        │   │
//! │  │   Sort Layer (sort/): in-memory + external-memory sort    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │   Collection Layer (collection/): document chains,       │   │
//! │  │   index maintenance                                       │   │
//! │  │   Index Layer (index/): skip list, vector, spatial        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │   Transaction Layer (txn/): snapshots, WAL, checkpoint,   │   │
//! │  │   v4→v5 upgrade                                           │   │
//! │  │   Pager (pager/): page-level view over a snapshot         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │   Storage Layer (storage/): DiskService, page formats,    │   │
//! │  │   header page, AES-256-CBC encryption                     │   │
//! │  │   I/O (io/) · BSON (bson/) · Shared-mode lock (shared/)   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - shared primitives (`PageId`, `PageAddress`, `Error`, `config`, collation)
//! - [`bson`] - the document value model and binary encoding
//! - [`io`] - low-level page read/write helpers
//! - [`storage`] - disk I/O, page formats, the header page, encryption
//! - [`pager`] - snapshot-scoped page access on top of storage + the WAL
//! - [`txn`] - transaction manager, WAL, checkpointing, file-format upgrade
//! - [`collection`] - document chains and index bookkeeping per collection
//! - [`index`] - skip-list, vector, and spatial index structures
//! - [`sort`] - in-memory and external-memory sorting
//! - [`query`] - expression evaluation, planning, and execution
//! - [`connection`] - connection-string parsing
//! - [`shared`] - cross-process shared-mode coordination
//! - [`db`] - the public `Database` / `Collection` / `Query` API
//!
//! # Quick Start
//! ```no_run
//! use interchangedb::db::Database;
//! use interchangedb::bson::{BsonDocument, BsonValue};
//!
//! let db = Database::open("my_database.db").unwrap();
//! let people = db.get_collection("people");
//! let mut person = BsonDocument::new();
//! person.set("name", BsonValue::String("Ada".into()));
//! person.set("age", BsonValue::Int32(30));
//! people.insert(person).unwrap();
//! ```

pub mod bson;
pub mod collection;
pub mod common;
pub mod connection;
pub mod db;
pub mod index;
pub mod io;
pub mod pager;
pub mod query;
pub mod shared;
pub mod sort;
pub mod storage;
pub mod txn;

pub use common::config::PAGE_SIZE;
pub use common::{Error, PageAddress, PageId, Result};
pub use db::{Collection, Database, Query};
pub use storage::page::Page;

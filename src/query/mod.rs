//! Query compilation and execution: expression tree, built-in functions,
//! a simple index-aware planner, and the pipeline executor that runs a
//! plan over an in-memory document set.

pub mod executor;
pub mod expr;
pub mod function;
pub mod plan;
pub mod sort_order;

pub use executor::execute;
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use function::Function;
pub use plan::{plan, IndexedField, PlanNode};
pub use sort_order::SortOrder;

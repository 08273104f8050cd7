//! Vectorize Core: the data model shared by every stage of the expression
//! compiler.
//!
//! This crate is deliberately inert: it has no notion of validation,
//! decomposition, code generation, or caching. It gives the rest of the
//! workspace a common vocabulary to build on.
//!
//! # Modules
//!
//! - `kind`: the closed [`kind::ValueKind`] enumeration (§3)
//! - `schema`: [`schema::FieldDescriptor`] and [`schema::Schema`] (§3)
//! - `expr`: the expression tree (§3 Expression node variants)
//! - `buffer`: validity bitmaps, the slot plan, and the per-batch buffer
//!   array (§3 Buffer slot plan, §3 Batch)
//! - `selection`: selection vectors (§3 Selection vector)
//! - `status`: the structured error surface (§4.11, §7)
//! - `context`: the per-call execution context (§3 Lifecycle)
//! - `holder`: function holders for stateful intrinsics (§4.9)

pub mod buffer;
pub mod context;
pub mod expr;
pub mod holder;
pub mod kind;
pub mod schema;
pub mod selection;
pub mod status;

pub use buffer::{Batch, SlotTriple};
pub use context::ExecutionContext;
pub use expr::{BooleanOp, Condition, Expression, LiteralValue, Node};
pub use holder::{DateHolder, FunctionHolder, PatternHolder};
pub use kind::{TimeUnit, ValueKind};
pub use schema::{FieldDescriptor, Schema};
pub use selection::{SelectionVector, SelectionWidth};
pub use status::{Status, StatusCode, VResult};

//! Vectorize Compiler
//!
//! Validates, decomposes, and JIT-compiles value expressions and filter
//! conditions over a fixed schema (§4), producing LLVM IR that is handed to
//! clang and dlopened, then evaluated batch by batch through the
//! [`projector::Projector`]/[`filter::Filter`] entry points.
//!
//! # Pipeline
//!
//! 1. [`validator::validate`] checks an expression's field references,
//!    call signatures, and if-else/boolean shape against a [`registry::Registry`]
//!    (§4.2).
//! 2. [`annotator::annotate`] assigns buffer slots to every field reference
//!    and output (§4.3).
//! 3. [`decomposer::Decomposer`] lowers the expression tree into value and
//!    validity sub-trees, resolving each node's null-handling strategy
//!    (§4.4).
//! 4. [`emitter::Emitter`] walks the decomposed tree and writes LLVM IR
//!    text (§4.5).
//! 5. [`engine::CompiledModule`] invokes clang and `dlopen`s the result
//!    (§4.6).
//! 6. [`projector::Projector`]/[`filter::Filter`] tie the above together
//!    behind a `make`/`evaluate` API, backed by a process-wide
//!    [`cache::Cache`] (§4.10).
//!
//! [`wire`] converts between this in-memory model and the protobuf wire
//! format used to ship a schema and expression batch across a process
//! boundary (§6.6 SUPPLEMENT).

pub mod annotator;
pub mod cache;
pub mod config;
pub mod decomposer;
pub mod emitter;
pub mod engine;
pub mod filter;
pub mod holder_factory;
pub mod projector;
pub mod registry;
pub mod validator;
pub mod wire;

pub use cache::{Cache, CacheKey};
pub use config::Config;
pub use engine::{CompiledModule, EvalArgs, LeafFn, StopWatch};
pub use filter::Filter;
pub use projector::Projector;
pub use registry::Registry;

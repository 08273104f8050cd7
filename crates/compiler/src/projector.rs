//! The projector (§4.6, §4.7): validates and compiles a batch of value
//! expressions sharing one schema into a single dlopen-able module, then
//! evaluates rows through it batch by batch.
//!
//! Mirrors the teacher's own split between pure IR generation
//! (`compile_to_ir`, tested without ever invoking clang) and the
//! clang-invoking `compile_file` path — `emit` below is this crate's
//! `compile_to_ir` counterpart, and is what the unit tests below exercise.

use crate::annotator::{self, SlotPlan};
use crate::cache::{Cache, CacheKey};
use crate::config::Config;
use crate::decomposer::{Decomposed, Decomposer};
use crate::emitter::Emitter;
use crate::engine::{CompiledModule, EvalArgs};
use crate::holder_factory;
use crate::registry::Registry;
use crate::validator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use vectorize_core::{
    Batch, ExecutionContext, Expression, FunctionHolder, Schema, SelectionVector, SelectionWidth, Status, ValueKind,
    VResult,
};

static PROJECTOR_CACHE: OnceLock<Cache<Projector>> = OnceLock::new();

/// A per-process counter mixed into the cache key of any expression that
/// mentions `like(` (§4.10), so two textually-identical `LIKE` expressions
/// registered through separate `make` calls never alias the same cached
/// pattern holder. The spec calls this "a per-thread value"; a single
/// atomic counter gives every call a distinct value regardless of which
/// thread it runs on, which satisfies the same uniqueness requirement.
static LIKE_SALT: AtomicU64 = AtomicU64::new(0);

fn next_like_salt() -> u64 {
    LIKE_SALT.fetch_add(1, Ordering::Relaxed)
}

/// The pure, clang-free half of compilation: validate, annotate, decompose,
/// emit IR, and build function holders. Kept separate from
/// [`CompiledModule::compile`] so it can be unit-tested without a clang
/// installation, the same split the teacher's `compile_to_ir` draws.
struct Emitted {
    ir: String,
    plan: SlotPlan,
    output_kinds: Vec<ValueKind>,
    holders: Vec<FunctionHolder>,
    num_local_bitmaps: usize,
}

fn emit(schema: &Schema, expressions: &[Expression], registry: &Registry) -> VResult<Emitted> {
    for expr in expressions {
        validator::validate(expr, schema, registry)?;
    }

    let plan = annotator::annotate(expressions);
    let mut decomposer = Decomposer::new(&plan, registry);
    let mut decomposed: Vec<Decomposed> = Vec::with_capacity(expressions.len());
    let mut output_kinds: Vec<ValueKind> = Vec::with_capacity(expressions.len());
    for expr in expressions {
        output_kinds.push(expr.output().kind());
        decomposed.push(decomposer.decompose(expr.root()));
    }

    let holders = holder_factory::build_holders(decomposer.holder_requests())?;

    // Every decomposed tree already carries absolute local-bitmap indices;
    // the count the emitter receives alongside each tree is scratch-space
    // sizing information for the caller's `Batch`, not something the leaf
    // routines themselves branch on (see `emit_leaf`'s unused parameter).
    let num_local_bitmaps = decomposer.local_bitmap_count();
    let emit_input: Vec<(Decomposed, ValueKind, usize)> = decomposed
        .into_iter()
        .zip(output_kinds.iter().copied())
        .map(|(d, k)| (d, k, num_local_bitmaps))
        .collect();

    let emitter = Emitter::new(&plan, holders.len());
    let ir = emitter.emit_module(&emit_input)?;

    Ok(Emitted {
        ir,
        plan,
        output_kinds,
        holders,
        num_local_bitmaps,
    })
}

/// Validates and emits the LLVM IR a batch of expressions would compile
/// to, without invoking clang — the CLI's `emit-ir` dry run.
pub fn emit_ir(schema: &Schema, expressions: &[Expression]) -> VResult<String> {
    let registry = Registry::with_builtins();
    emit(schema, expressions, &registry).map(|e| e.ir)
}

/// A compiled batch of expressions sharing a schema (§4.6). `evaluate`
/// writes results directly into the caller's [`Batch`] buffers rather than
/// allocating and returning new arrays — §9's resolved Open Question on
/// variable-width output applies equally here: the caller already owns and
/// sizes the output buffers, so there is nothing for the projector itself
/// to allocate.
pub struct Projector {
    module: CompiledModule,
    plan: SlotPlan,
    output_kinds: Vec<ValueKind>,
    holders: Vec<FunctionHolder>,
    num_local_bitmaps: usize,
}

impl Projector {
    /// Validates `expressions` against `schema`, then compiles them,
    /// reusing a cached module when an earlier call built a
    /// structurally-identical one (§4.10).
    pub fn make(schema: &Schema, expressions: &[Expression], config: &Config) -> VResult<Arc<Projector>> {
        let registry = Registry::with_builtins();
        let mentions_like = expressions.iter().any(Expression::mentions_like);
        let expression_strings: Vec<String> = expressions.iter().map(Expression::canonical_string).collect();
        let key = CacheKey::new(schema, expression_strings, config, mentions_like, next_like_salt());

        let cache = PROJECTOR_CACHE.get_or_init(|| Cache::new(config.cache_capacity));
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let emitted = emit(schema, expressions, &registry)?;
        let unique = std::process::id() as u64 ^ next_like_salt();
        let artifact_dir = config.artifact_dir();
        let ir_path = artifact_dir.join(format!("vectorize_projector_{unique}.ll"));
        let so_path = artifact_dir.join(format!("vectorize_projector_{unique}.so"));
        let module = CompiledModule::compile(&emitted.ir, &ir_path, &so_path)?;
        std::fs::remove_file(&ir_path).ok();
        std::fs::remove_file(&so_path).ok();

        let projector = Projector {
            module,
            plan: emitted.plan,
            output_kinds: emitted.output_kinds,
            holders: emitted.holders,
            num_local_bitmaps: emitted.num_local_bitmaps,
        };
        Ok(cache.insert(key, projector))
    }

    /// Total buffer-pointer slots the caller's `Batch` must be sized to
    /// (§3 Batch) — the annotator's slot count over every field reference
    /// plus one output triple per expression.
    pub fn total_slots(&self) -> usize {
        self.plan.total_slots()
    }

    pub fn output_kind(&self, expression_index: usize) -> ValueKind {
        self.output_kinds[expression_index]
    }

    pub fn num_expressions(&self) -> usize {
        self.output_kinds.len()
    }

    /// Where a referenced field's validity/data/offsets buffers belong in
    /// the `Batch` passed to `evaluate` (§3 Buffer slot plan). Callers need
    /// this to populate input buffers before evaluation.
    pub fn field_slot(&self, name: &str) -> Option<vectorize_core::SlotTriple> {
        self.plan.field_slot(name)
    }

    /// Where expression `expression_index`'s result buffers land in the
    /// `Batch` after evaluation.
    pub fn output_slot(&self, expression_index: usize) -> vectorize_core::SlotTriple {
        self.plan.output_slot(expression_index)
    }

    /// Number of scratch local-bitmap slots `Batch::new`'s `num_local_bitmaps`
    /// argument must be given when evaluating through this projector.
    pub fn num_local_bitmaps(&self) -> usize {
        self.num_local_bitmaps
    }

    /// Evaluates every row of `batch` (§4.6's unfiltered leaf variant).
    pub fn evaluate(&self, batch: &mut Batch) -> VResult<()> {
        self.run(batch, None)
    }

    /// Evaluates only the rows named by `selection` (§4.7's filtered leaf
    /// variants), chosen by the selection vector's declared width.
    pub fn evaluate_selected(&self, batch: &mut Batch, selection: &SelectionVector) -> VResult<()> {
        self.run(batch, Some(selection))
    }

    fn run(&self, batch: &mut Batch, selection: Option<&SelectionVector>) -> VResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let holder_ptrs: Vec<*const u8> = self.holders.iter().map(FunctionHolder::as_ptr).collect();
        let local_bitmap_ptrs = batch.local_bitmap_ptrs();
        let buffers: Vec<*mut u8> = batch.buffers().to_vec();
        let row_count = batch.row_count() as u64;

        let sel_bytes;
        let (sel_ptr, num_selected, leaf_suffix) = match selection {
            None => (std::ptr::null(), 0u64, "unfiltered"),
            Some(sv) => {
                sel_bytes = sv.to_bytes();
                let suffix = match sv.width() {
                    SelectionWidth::U16 => "filtered16",
                    SelectionWidth::U32 => "filtered32",
                };
                (sel_bytes.as_ptr(), sv.num_slots() as u64, suffix)
            }
        };

        let args = EvalArgs {
            buffers: buffers.as_ptr(),
            local_bitmaps: local_bitmap_ptrs.as_ptr(),
            holders: holder_ptrs.as_ptr(),
            context: batch.context_mut() as *mut ExecutionContext,
            row_count,
            selection: sel_ptr,
            num_selected,
        };

        for index in 0..self.output_kinds.len() {
            let symbol = format!("vz_leaf_{index}_{leaf_suffix}");
            let leaf = self.module.leaf(&symbol)?;
            let status = unsafe { leaf(&args as *const EvalArgs) };
            if status != 0 {
                let message = batch
                    .context_mut()
                    .take_error()
                    .unwrap_or_else(|| "leaf routine reported an error without a message".to_string());
                return Err(Status::execution_error(message));
            }
        }
        Ok(())
    }
}

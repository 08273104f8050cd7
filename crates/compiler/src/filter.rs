//! The filter (§4.8): compiles a single boolean-result [`Condition`] into a
//! module exactly like [`crate::projector::Projector`] does, but evaluation
//! populates a [`SelectionVector`] from the computed value+validity bitmaps
//! rather than writing a data buffer.
//!
//! A condition's "value" output slot is the filter's result bitmap; §4.8
//! ties a filtered-out row to either a false result or a null result, so
//! the selection scan ANDs those two bitmaps before populating the vector.

use crate::annotator::{self, SlotPlan};
use crate::cache::{Cache, CacheKey};
use crate::config::Config;
use crate::decomposer::Decomposer;
use crate::emitter::Emitter;
use crate::engine::{CompiledModule, EvalArgs};
use crate::holder_factory;
use crate::registry::Registry;
use crate::validator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use vectorize_core::buffer::{and_reduce_bitmaps, bitmap_bytes_for};
use vectorize_core::{
    Batch, Condition, ExecutionContext, FunctionHolder, Schema, SelectionVector, SelectionWidth, Status, ValueKind,
    VResult,
};

static FILTER_CACHE: OnceLock<Cache<Filter>> = OnceLock::new();
static LIKE_SALT: AtomicU64 = AtomicU64::new(0);

fn next_like_salt() -> u64 {
    LIKE_SALT.fetch_add(1, Ordering::Relaxed)
}

/// A compiled condition (§4.8). `output_slot` names where in the `Batch`
/// the condition's value and validity bitmaps land, since a filter has no
/// output-kind-dependent data buffer to write — only the two bitmaps the
/// scan below reduces.
pub struct Filter {
    module: CompiledModule,
    plan: SlotPlan,
    holders: Vec<FunctionHolder>,
    num_local_bitmaps: usize,
}

impl Filter {
    /// Validates and compiles `condition` against `schema`, reusing a
    /// cached module for a structurally-identical condition (§4.10).
    pub fn make(schema: &Schema, condition: &Condition, config: &Config) -> VResult<Arc<Filter>> {
        let registry = Registry::with_builtins();
        let expression = condition.expression().clone();
        let mentions_like = expression.mentions_like();
        let key = CacheKey::new(
            schema,
            vec![expression.canonical_string()],
            config,
            mentions_like,
            next_like_salt(),
        );

        let cache = FILTER_CACHE.get_or_init(|| Cache::new(config.cache_capacity));
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        validator::validate(&expression, schema, &registry)?;

        let plan = annotator::annotate(std::slice::from_ref(&expression));
        let mut decomposer = Decomposer::new(&plan, &registry);
        let decomposed = decomposer.decompose(expression.root());
        let holders = holder_factory::build_holders(decomposer.holder_requests())?;
        let num_local_bitmaps = decomposer.local_bitmap_count();

        let emitter = Emitter::new(&plan, holders.len());
        let ir = emitter.emit_module(&[(decomposed, ValueKind::Boolean, num_local_bitmaps)])?;

        let unique = std::process::id() as u64 ^ next_like_salt();
        let artifact_dir = config.artifact_dir();
        let ir_path = artifact_dir.join(format!("vectorize_filter_{unique}.ll"));
        let so_path = artifact_dir.join(format!("vectorize_filter_{unique}.so"));
        let module = CompiledModule::compile(&ir, &ir_path, &so_path)?;
        std::fs::remove_file(&ir_path).ok();
        std::fs::remove_file(&so_path).ok();

        let filter = Filter {
            module,
            plan,
            holders,
            num_local_bitmaps,
        };
        Ok(cache.insert(key, filter))
    }

    pub fn total_slots(&self) -> usize {
        self.plan.total_slots()
    }

    /// Where a referenced field's validity/data/offsets buffers belong in
    /// the `Batch` passed to `evaluate` (§3 Buffer slot plan).
    pub fn field_slot(&self, name: &str) -> Option<vectorize_core::SlotTriple> {
        self.plan.field_slot(name)
    }

    /// Number of scratch local-bitmap slots `Batch::new`'s `num_local_bitmaps`
    /// argument must be given when evaluating through this filter.
    pub fn num_local_bitmaps(&self) -> usize {
        self.num_local_bitmaps
    }

    /// Evaluates the condition over every row of `batch` into `selection`
    /// (§4.8). `selection`'s capacity must be at least `batch.row_count()`;
    /// the vector is cleared and repopulated on every call.
    pub fn evaluate(&self, batch: &mut Batch, selection: &mut SelectionVector) -> VResult<()> {
        if batch.is_empty() {
            selection.populate_from_bitmap(&[], 0)?;
            return Ok(());
        }

        let holder_ptrs: Vec<*const u8> = self.holders.iter().map(FunctionHolder::as_ptr).collect();
        let local_bitmap_ptrs = batch.local_bitmap_ptrs();
        let buffers: Vec<*mut u8> = batch.buffers().to_vec();
        let row_count = batch.row_count() as u64;

        let args = EvalArgs {
            buffers: buffers.as_ptr(),
            local_bitmaps: local_bitmap_ptrs.as_ptr(),
            holders: holder_ptrs.as_ptr(),
            context: batch.context_mut() as *mut ExecutionContext,
            row_count,
            selection: std::ptr::null(),
            num_selected: 0,
        };

        let leaf = self.module.leaf("vz_leaf_0_unfiltered")?;
        let status = unsafe { leaf(&args as *const EvalArgs) };
        if status != 0 {
            let message = batch
                .context_mut()
                .take_error()
                .unwrap_or_else(|| "leaf routine reported an error without a message".to_string());
            return Err(Status::execution_error(message));
        }

        let output = self.plan.output_slot(0);
        let row_count = batch.row_count();
        let len_bytes = bitmap_bytes_for(row_count);
        let value_bitmap = unsafe { std::slice::from_raw_parts(batch.buffer(output.data), len_bytes) };
        let validity_bitmap = unsafe { std::slice::from_raw_parts(batch.buffer(output.validity), len_bytes) };

        let mut matched = vec![0u8; len_bytes];
        and_reduce_bitmaps(&[value_bitmap, validity_bitmap], &mut matched);
        selection.populate_from_bitmap(&matched, row_count)
    }
}

/// The maximum row count a given selection-vector width can index (§4.8's
/// width-selection rule: pick the narrowest width that fits every row).
pub fn selection_width_for(row_count: usize) -> SelectionWidth {
    if (row_count as u64).saturating_sub(1) <= SelectionWidth::U16.max_index() {
        SelectionWidth::U16
    } else {
        SelectionWidth::U32
    }
}

//! The code emitter (§4.5): walks a [`Decomposed`] tree and a [`SlotPlan`]
//! and assembles LLVM IR text, the same `writeln!`-into-`String` style the
//! teacher's `codegen/program.rs` uses for whole-module assembly.
//!
//! Three leaf routines are emitted per expression: an unfiltered row-loop
//! and two filtered row-loops (16-bit and 32-bit selection vectors), all
//! sharing one `%EvalArgs` calling convention so the engine (§4.6) can
//! `dlsym` whichever one a call needs without relinking.

use crate::annotator::SlotPlan;
use crate::decomposer::{Decomposed, ValiditySource, ValueNode};
use std::fmt::Write as _;
use vectorize_core::{BooleanOp, LiteralValue, SlotTriple, Status, ValueKind, VResult};

/// `%EvalArgs`'s field order, fixed once here and mirrored by the engine's
/// `#[repr(C)]` struct — the single contract between generated IR and the
/// Rust side that calls into it (§4.6 Pointer graph).
const EVAL_ARGS_TYPE: &str = "{ ptr, ptr, ptr, ptr, i64, ptr, i64 }";

fn llvm_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Boolean | ValueKind::Int8 => "i8",
        ValueKind::Int16 => "i16",
        ValueKind::Int32 | ValueKind::Date32 | ValueKind::Time32 => "i32",
        ValueKind::Int64 | ValueKind::Timestamp(_) => "i64",
        ValueKind::Float32 => "float",
        ValueKind::Float64 => "double",
        ValueKind::Utf8 | ValueKind::Binary => "ptr",
    }
}

/// The SSA register(s) holding one computed value. Variable-width values
/// carry a pointer register and a byte-length register instead of a single
/// scalar register.
enum EmittedValue {
    Scalar { reg: String, kind: ValueKind },
    VarWidth { ptr_reg: String, len_reg: String },
}

pub struct Emitter<'a> {
    plan: &'a SlotPlan,
    num_holders: usize,
    output: String,
    temp_counter: usize,
    block_counter: usize,
}

impl<'a> Emitter<'a> {
    pub fn new(plan: &'a SlotPlan, num_holders: usize) -> Self {
        Emitter {
            plan,
            num_holders,
            output: String::new(),
            temp_counter: 0,
            block_counter: 0,
        }
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn fresh_block(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.block_counter);
        self.block_counter += 1;
        name
    }

    /// Emits the whole module: declarations plus one set of leaf routines
    /// per expression in `expressions` (index order, matching
    /// `plan.output_slot(index)`).
    pub fn emit_module(
        mut self,
        expressions: &[(Decomposed, ValueKind, usize)],
    ) -> VResult<String> {
        writeln!(&mut self.output, "; ModuleID = 'vectorize'")?;
        writeln!(&mut self.output, "%EvalArgs = type {EVAL_ARGS_TYPE}")?;
        writeln!(&mut self.output)?;
        self.emit_runtime_support_declarations()?;
        self.emit_intrinsic_declarations(expressions)?;

        for (index, (decomposed, output_kind, num_local_bitmaps)) in
            expressions.iter().enumerate()
        {
            self.emit_leaf_set(index, decomposed, *output_kind, *num_local_bitmaps)?;
        }

        Ok(self.output)
    }

    /// Declares the `vz_*` buffer/bitmap/holder accessors every leaf
    /// routine calls, regardless of which expression it evaluates.
    /// Implemented in `vectorize-intrinsics`' `runtime_support` module.
    fn emit_runtime_support_declarations(&mut self) -> VResult<()> {
        writeln!(&mut self.output, "; runtime support declarations")?;
        writeln!(&mut self.output, "declare ptr @vz_slot_ptr(ptr, i64)")?;
        writeln!(&mut self.output, "declare i1 @vz_get_bit(ptr, i64)")?;
        writeln!(&mut self.output, "declare void @vz_set_bit(ptr, i64, i8)")?;
        writeln!(&mut self.output, "declare ptr @vz_local_bitmap_ptr(ptr, i64)")?;
        writeln!(&mut self.output, "declare ptr @vz_holder_ptr(ptr, i64)")?;
        writeln!(&mut self.output, "declare ptr @vz_varwidth_ptr(ptr, ptr, i64)")?;
        writeln!(&mut self.output, "declare i64 @vz_varwidth_len(ptr, i64)")?;
        writeln!(&mut self.output, "declare i32 @vz_context_has_error(ptr)")?;
        writeln!(&mut self.output, "declare i1 @vz_take_internal_validity(ptr)")?;
        writeln!(&mut self.output)?;
        Ok(())
    }

    fn emit_intrinsic_declarations(
        &mut self,
        expressions: &[(Decomposed, ValueKind, usize)],
    ) -> VResult<()> {
        let mut symbols = std::collections::BTreeSet::new();
        for (decomposed, _, _) in expressions {
            collect_symbols(decomposed, &mut symbols);
        }
        if !symbols.is_empty() {
            writeln!(&mut self.output, "; intrinsic declarations")?;
            for symbol in symbols {
                writeln!(&mut self.output, "declare i64 @{symbol}(...)")?;
            }
            writeln!(&mut self.output)?;
        }
        Ok(())
    }

    /// Emits the unfiltered, 16-bit-filtered, and 32-bit-filtered variants
    /// of one expression's leaf routine (§4.5 leaf routine signatures).
    fn emit_leaf_set(
        &mut self,
        index: usize,
        decomposed: &Decomposed,
        output_kind: ValueKind,
        num_local_bitmaps: usize,
    ) -> VResult<()> {
        let output_slot = self.plan.output_slot(index);
        self.emit_leaf(
            &format!("vz_leaf_{index}_unfiltered"),
            decomposed,
            output_kind,
            output_slot,
            num_local_bitmaps,
            RowSource::Unfiltered,
        )?;
        self.emit_leaf(
            &format!("vz_leaf_{index}_filtered16"),
            decomposed,
            output_kind,
            output_slot,
            num_local_bitmaps,
            RowSource::Selection { width_bits: 16 },
        )?;
        self.emit_leaf(
            &format!("vz_leaf_{index}_filtered32"),
            decomposed,
            output_kind,
            output_slot,
            num_local_bitmaps,
            RowSource::Selection { width_bits: 32 },
        )?;
        Ok(())
    }

    fn emit_leaf(
        &mut self,
        name: &str,
        decomposed: &Decomposed,
        output_kind: ValueKind,
        output_slot: SlotTriple,
        num_local_bitmaps: usize,
        source: RowSource,
    ) -> VResult<()> {
        let _ = num_local_bitmaps; // scratch space is caller-allocated (Batch::new)
        writeln!(
            &mut self.output,
            "define i32 @{name}(ptr %args) {{"
        )?;
        writeln!(&mut self.output, "entry:")?;

        let buffers = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{buffers} = load ptr, ptr %args"
        )?;
        let local_bitmaps = self.fresh_temp();
        let local_bitmaps_ptr_addr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{local_bitmaps_ptr_addr} = getelementptr %EvalArgs, ptr %args, i32 0, i32 1"
        )?;
        writeln!(
            &mut self.output,
            "  %{local_bitmaps} = load ptr, ptr %{local_bitmaps_ptr_addr}"
        )?;
        let holders = self.fresh_temp();
        let holders_ptr_addr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{holders_ptr_addr} = getelementptr %EvalArgs, ptr %args, i32 0, i32 2"
        )?;
        writeln!(
            &mut self.output,
            "  %{holders} = load ptr, ptr %{holders_ptr_addr}"
        )?;
        let context = self.fresh_temp();
        let context_ptr_addr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{context_ptr_addr} = getelementptr %EvalArgs, ptr %args, i32 0, i32 3"
        )?;
        writeln!(
            &mut self.output,
            "  %{context} = load ptr, ptr %{context_ptr_addr}"
        )?;

        let regs = EnvRegs {
            buffers,
            local_bitmaps,
            holders,
            context,
        };

        let loop_header = self.fresh_block("loop_header");
        let loop_body = self.fresh_block("loop_body");
        let loop_latch = self.fresh_block("loop_latch");
        let loop_exit = self.fresh_block("loop_exit");

        let (induction_reg, limit_reg, row_reg_block) = match source {
            RowSource::Unfiltered => {
                let limit_addr = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{limit_addr} = getelementptr %EvalArgs, ptr %args, i32 0, i32 4"
                )?;
                let limit = self.fresh_temp();
                writeln!(&mut self.output, "  %{limit} = load i64, ptr %{limit_addr}")?;
                (None, limit, None)
            }
            RowSource::Selection { width_bits } => {
                let count_addr = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{count_addr} = getelementptr %EvalArgs, ptr %args, i32 0, i32 6"
                )?;
                let count = self.fresh_temp();
                writeln!(&mut self.output, "  %{count} = load i64, ptr %{count_addr}")?;
                let sel_ptr_addr = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{sel_ptr_addr} = getelementptr %EvalArgs, ptr %args, i32 0, i32 5"
                )?;
                let sel_ptr = self.fresh_temp();
                writeln!(&mut self.output, "  %{sel_ptr} = load ptr, ptr %{sel_ptr_addr}")?;
                (Some((sel_ptr, width_bits)), count, None)
            }
        };
        let _: Option<()> = row_reg_block;

        writeln!(&mut self.output, "  br label %{loop_header}")?;

        writeln!(&mut self.output, "{loop_header}:")?;
        let induction = self.fresh_temp();
        let induction_next = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{induction} = phi i64 [ 0, %entry ], [ %{induction_next}, %{loop_latch} ]"
        )?;
        let continue_cmp = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{continue_cmp} = icmp slt i64 %{induction}, %{limit_reg}",
        )?;
        writeln!(
            &mut self.output,
            "  br i1 %{continue_cmp}, label %{loop_body}, label %{loop_exit}"
        )?;

        writeln!(&mut self.output, "{loop_body}:")?;
        let row_reg = match induction_reg {
            None => induction.clone(),
            Some((ref sel_ptr, width_bits)) => {
                let elem_ty = if width_bits == 16 { "i16" } else { "i32" };
                let elem_addr = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{elem_addr} = getelementptr {elem_ty}, ptr %{sel_ptr}, i64 %{induction}"
                )?;
                let elem = self.fresh_temp();
                writeln!(&mut self.output, "  %{elem} = load {elem_ty}, ptr %{elem_addr}")?;
                let widened = self.fresh_temp();
                writeln!(&mut self.output, "  %{widened} = zext {elem_ty} %{elem} to i64")?;
                widened
            }
        };

        let value = self.emit_value(decomposed, &regs, &row_reg)?;
        let valid = self.emit_validity(decomposed, &regs, &row_reg)?;

        self.emit_store_result(&regs, &row_reg, output_slot, output_kind, &value, &valid)?;

        writeln!(&mut self.output, "  br label %{loop_latch}")?;

        writeln!(&mut self.output, "{loop_latch}:")?;
        writeln!(
            &mut self.output,
            "  %{induction_next} = add i64 %{induction}, 1"
        )?;
        writeln!(&mut self.output, "  br label %{loop_header}")?;

        writeln!(&mut self.output, "{loop_exit}:")?;
        let has_error = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{has_error} = call i32 @vz_context_has_error(ptr %{})",
            regs.context
        )?;
        writeln!(&mut self.output, "  ret i32 %{has_error}")?;
        writeln!(&mut self.output, "}}")?;
        writeln!(&mut self.output)?;
        Ok(())
    }

    fn emit_store_result(
        &mut self,
        regs: &EnvRegs,
        row_reg: &str,
        output_slot: SlotTriple,
        output_kind: ValueKind,
        value: &EmittedValue,
        valid: &str,
    ) -> VResult<()> {
        let valid_byte_addr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{valid_byte_addr} = call ptr @vz_slot_ptr(ptr %{}, i64 {})",
            regs.buffers, output_slot.validity
        )?;
        let valid_ext = self.fresh_temp();
        writeln!(&mut self.output, "  %{valid_ext} = zext i1 %{valid} to i8")?;
        writeln!(
            &mut self.output,
            "  call void @vz_set_bit(ptr %{valid_byte_addr}, i64 %{row_reg}, i8 %{valid_ext})"
        )?;

        let data_ptr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{data_ptr} = call ptr @vz_slot_ptr(ptr %{}, i64 {})",
            regs.buffers, output_slot.data
        )?;

        match value {
            EmittedValue::Scalar { reg, kind } => {
                let ty = llvm_type(*kind);
                let elem_addr = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{elem_addr} = getelementptr {ty}, ptr %{data_ptr}, i64 %{row_reg}"
                )?;
                writeln!(&mut self.output, "  store {ty} %{reg}, ptr %{elem_addr}")?;
            }
            EmittedValue::VarWidth { .. } => {
                // validator::validate rejects a variable-width output kind
                // before the emitter ever runs (§4.5: "unsupported in this
                // core, caller must pre-size"), so a value node reaching
                // here would mean the decomposer lowered a variable-width
                // root past that check.
                return Err(Status::code_gen_error(
                    "variable-width output reached the emitter; validator should have rejected it",
                ));
            }
        }
        let _ = output_kind;
        Ok(())
    }

    fn field_load(&mut self, regs: &EnvRegs, row_reg: &str, slot: SlotTriple, kind: ValueKind) -> VResult<EmittedValue> {
        let data_ptr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{data_ptr} = call ptr @vz_slot_ptr(ptr %{}, i64 {})",
            regs.buffers, slot.data
        )?;
        if kind.is_variable_width() {
            let offsets_slot = slot
                .offsets
                .expect("variable-width field must have an offsets slot");
            let offsets_ptr = self.fresh_temp();
            writeln!(
                &mut self.output,
                "  %{offsets_ptr} = call ptr @vz_slot_ptr(ptr %{}, i64 {offsets_slot})",
                regs.buffers
            )?;
            let ptr_reg = self.fresh_temp();
            let len_reg = self.fresh_temp();
            writeln!(
                &mut self.output,
                "  %{ptr_reg} = call ptr @vz_varwidth_ptr(ptr %{data_ptr}, ptr %{offsets_ptr}, i64 %{row_reg})"
            )?;
            writeln!(
                &mut self.output,
                "  %{len_reg} = call i64 @vz_varwidth_len(ptr %{offsets_ptr}, i64 %{row_reg})"
            )?;
            Ok(EmittedValue::VarWidth { ptr_reg, len_reg })
        } else {
            let ty = llvm_type(kind);
            let elem_addr = self.fresh_temp();
            writeln!(
                &mut self.output,
                "  %{elem_addr} = getelementptr {ty}, ptr %{data_ptr}, i64 %{row_reg}"
            )?;
            let reg = self.fresh_temp();
            writeln!(&mut self.output, "  %{reg} = load {ty}, ptr %{elem_addr}")?;
            Ok(EmittedValue::Scalar { reg, kind })
        }
    }

    fn field_validity(&mut self, regs: &EnvRegs, row_reg: &str, validity_slot: usize) -> VResult<String> {
        let bitmap_ptr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{bitmap_ptr} = call ptr @vz_slot_ptr(ptr %{}, i64 {validity_slot})",
            regs.buffers
        )?;
        let bit = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{bit} = call i1 @vz_get_bit(ptr %{bitmap_ptr}, i64 %{row_reg})"
        )?;
        Ok(bit)
    }

    fn local_bitmap_bit(&mut self, regs: &EnvRegs, row_reg: &str, index: usize) -> VResult<String> {
        let bitmap_ptr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{bitmap_ptr} = call ptr @vz_local_bitmap_ptr(ptr %{}, i64 {index})",
            regs.local_bitmaps
        )?;
        let bit = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{bit} = call i1 @vz_get_bit(ptr %{bitmap_ptr}, i64 %{row_reg})"
        )?;
        Ok(bit)
    }

    fn set_local_bitmap_bit(&mut self, regs: &EnvRegs, row_reg: &str, index: usize, value: &str) -> VResult<()> {
        let bitmap_ptr = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{bitmap_ptr} = call ptr @vz_local_bitmap_ptr(ptr %{}, i64 {index})",
            regs.local_bitmaps
        )?;
        let byte = self.fresh_temp();
        writeln!(&mut self.output, "  %{byte} = zext i1 %{value} to i8")?;
        writeln!(
            &mut self.output,
            "  call void @vz_set_bit(ptr %{bitmap_ptr}, i64 %{row_reg}, i8 %{byte})"
        )?;
        Ok(())
    }

    /// Emits the value half of `node` (§4.5 value-block).
    fn emit_value(&mut self, node: &Decomposed, regs: &EnvRegs, row_reg: &str) -> VResult<EmittedValue> {
        match &node.value {
            ValueNode::FieldLoad { slot, kind } => self.field_load(regs, row_reg, *slot, *kind),
            ValueNode::Literal { value, kind } => Ok(EmittedValue::Scalar {
                reg: self.emit_literal(value, *kind)?,
                kind: *kind,
            }),
            ValueNode::Call {
                symbol,
                args,
                needs_execution_context,
                holder_slot,
                internal_validity_bitmap,
                validity_arg,
                result_kind,
            } => {
                let mut arg_regs = Vec::new();
                for arg in args {
                    let emitted = self.emit_value(arg, regs, row_reg)?;
                    match emitted {
                        EmittedValue::Scalar { reg, kind } => {
                            arg_regs.push(format!("{} %{reg}", llvm_type(kind)))
                        }
                        EmittedValue::VarWidth { ptr_reg, len_reg } => {
                            arg_regs.push(format!("ptr %{ptr_reg}"));
                            arg_regs.push(format!("i64 %{len_reg}"));
                        }
                    }
                }
                if let Some(sources) = validity_arg {
                    let bit = self.validity_sources_bit(regs, row_reg, sources)?;
                    let byte = self.fresh_temp();
                    writeln!(&mut self.output, "  %{byte} = zext i1 %{bit} to i8")?;
                    arg_regs.push(format!("i8 %{byte}"));
                }
                if let Some(slot) = holder_slot {
                    let holder_ptr = self.fresh_temp();
                    writeln!(
                        &mut self.output,
                        "  %{holder_ptr} = call ptr @vz_holder_ptr(ptr %{}, i64 {slot})",
                        regs.holders
                    )?;
                    arg_regs.push(format!("ptr %{holder_ptr}"));
                }
                if *needs_execution_context {
                    arg_regs.push(format!("ptr %{}", regs.context));
                }
                let ty = llvm_type(*result_kind);
                let result = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{result} = call {ty} @{symbol}({})",
                    arg_regs.join(", ")
                )?;
                if let Some(bitmap) = internal_validity_bitmap {
                    let flag = self.fresh_temp();
                    writeln!(
                        &mut self.output,
                        "  %{flag} = call i1 @vz_take_internal_validity(ptr %{})",
                        regs.context
                    )?;
                    self.set_local_bitmap_bit(regs, row_reg, *bitmap, &flag)?;
                }
                Ok(EmittedValue::Scalar {
                    reg: result,
                    kind: *result_kind,
                })
            }
            ValueNode::IfElse {
                condition,
                then_branch,
                else_branch,
                terminal_else,
                result_bitmap,
            } => self.emit_if_else(
                condition,
                then_branch,
                else_branch,
                *terminal_else,
                *result_bitmap,
                regs,
                row_reg,
            ),
            ValueNode::Boolean {
                op,
                children,
                result_bitmap,
            } => self.emit_boolean(*op, children, *result_bitmap, regs, row_reg),
        }
    }

    fn emit_literal(&mut self, value: &LiteralValue, kind: ValueKind) -> VResult<String> {
        let ty = llvm_type(kind);
        let text = match value {
            LiteralValue::Boolean(b) => (*b as i64).to_string(),
            LiteralValue::Int(i) => i.to_string(),
            LiteralValue::Float(f) => format!("{f:e}"),
            LiteralValue::Bytes(_) => {
                return Err(Status::code_gen_error(
                    "string/binary literals must be materialised through a global constant, not an inline scalar",
                ));
            }
            LiteralValue::Null => "0".to_string(),
        };
        let reg = self.fresh_temp();
        writeln!(&mut self.output, "  %{reg} = add {ty} 0, {text}")?;
        Ok(reg)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_if_else(
        &mut self,
        condition: &Decomposed,
        then_branch: &Decomposed,
        else_branch: &Decomposed,
        terminal_else: bool,
        result_bitmap: usize,
        regs: &EnvRegs,
        row_reg: &str,
    ) -> VResult<EmittedValue> {
        let cond_value = self.emit_value(condition, regs, row_reg)?;
        let cond_valid = self.emit_validity(condition, regs, row_reg)?;
        let cond_reg = match cond_value {
            EmittedValue::Scalar { reg, .. } => reg,
            EmittedValue::VarWidth { .. } => {
                return Err(Status::code_gen_error("if condition must be boolean-kinded, not variable-width"));
            }
        };
        let cond_bit = self.fresh_temp();
        writeln!(&mut self.output, "  %{cond_bit} = icmp ne i8 %{cond_reg}, 0")?;
        let cond_true = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{cond_true} = and i1 %{cond_valid}, %{cond_bit}"
        )?;

        let then_block = self.fresh_block("if_then");
        let else_block = self.fresh_block("if_else");
        let merge_block = self.fresh_block("if_merge");

        writeln!(
            &mut self.output,
            "  br i1 %{cond_true}, label %{then_block}, label %{else_block}"
        )?;

        writeln!(&mut self.output, "{then_block}:")?;
        let then_value = self.emit_value(then_branch, regs, row_reg)?;
        let then_valid = self.emit_validity(then_branch, regs, row_reg)?;
        writeln!(&mut self.output, "  br label %{merge_block}")?;
        let then_exit_block = self.current_block_name(&then_block);

        writeln!(&mut self.output, "{else_block}:")?;
        let else_value = self.emit_value(else_branch, regs, row_reg)?;
        let else_valid = if terminal_else {
            "true".to_string()
        } else {
            self.emit_validity(else_branch, regs, row_reg)?
        };
        writeln!(&mut self.output, "  br label %{merge_block}")?;
        let else_exit_block = self.current_block_name(&else_block);

        writeln!(&mut self.output, "{merge_block}:")?;
        let result = self.phi_merge(&then_value, &then_exit_block, &else_value, &else_exit_block)?;

        // (cond_valid && cond && then_valid) || (cond_valid && !cond && else_valid)
        let not_cond_bit = self.fresh_temp();
        writeln!(&mut self.output, "  %{not_cond_bit} = xor i1 %{cond_bit}, true")?;
        let left = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{left} = and i1 %{cond_true}, %{then_valid}"
        )?;
        let right_guard = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{right_guard} = and i1 %{cond_valid}, %{not_cond_bit}"
        )?;
        let else_valid_parsed = if else_valid == "true" {
            let t = self.fresh_temp();
            writeln!(&mut self.output, "  %{t} = or i1 true, false")?;
            t
        } else {
            else_valid
        };
        let right = self.fresh_temp();
        writeln!(
            &mut self.output,
            "  %{right} = and i1 %{right_guard}, %{else_valid_parsed}"
        )?;
        let combined_valid = self.fresh_temp();
        writeln!(&mut self.output, "  %{combined_valid} = or i1 %{left}, %{right}")?;
        self.set_local_bitmap_bit(regs, row_reg, result_bitmap, &combined_valid)?;

        Ok(result)
    }

    /// Tracks which block a branch's emitted code actually falls through to
    /// (always the block it started in here, since branches never split
    /// further) — kept as its own hook so a future nested-if optimisation
    /// can return a different predecessor without touching callers.
    fn current_block_name(&self, entered_as: &str) -> String {
        entered_as.to_string()
    }

    fn phi_merge(
        &mut self,
        then_value: &EmittedValue,
        then_block: &str,
        else_value: &EmittedValue,
        else_block: &str,
    ) -> VResult<EmittedValue> {
        match (then_value, else_value) {
            (
                EmittedValue::Scalar { reg: t, kind },
                EmittedValue::Scalar { reg: e, .. },
            ) => {
                let ty = llvm_type(*kind);
                let result = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{result} = phi {ty} [ %{t}, %{then_block} ], [ %{e}, %{else_block} ]"
                )?;
                Ok(EmittedValue::Scalar { reg: result, kind: *kind })
            }
            (
                EmittedValue::VarWidth { ptr_reg: tp, len_reg: tl },
                EmittedValue::VarWidth { ptr_reg: ep, len_reg: el },
            ) => {
                let ptr_reg = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{ptr_reg} = phi ptr [ %{tp}, %{then_block} ], [ %{ep}, %{else_block} ]"
                )?;
                let len_reg = self.fresh_temp();
                writeln!(
                    &mut self.output,
                    "  %{len_reg} = phi i64 [ %{tl}, %{then_block} ], [ %{el}, %{else_block} ]"
                )?;
                Ok(EmittedValue::VarWidth { ptr_reg, len_reg })
            }
            _ => Err(Status::code_gen_error(
                "if-then-else branches must agree on fixed-width vs variable-width representation",
            )),
        }
    }

    /// Emits an n-ary Kleene AND/OR short-circuit chain (§4.4, §4.5).
    fn emit_boolean(
        &mut self,
        op: BooleanOp,
        children: &[Decomposed],
        result_bitmap: usize,
        regs: &EnvRegs,
        row_reg: &str,
    ) -> VResult<EmittedValue> {
        // Kleene semantics: a short-circuit value (false for AND, true for
        // OR) wins regardless of nullity; otherwise a null in any operand
        // makes the result null.
        let short_circuit_bit = matches!(op, BooleanOp::Or);
        let mut result_value: Option<String> = None;
        let mut result_valid: Option<String> = None;
        // Once a short-circuit value has appeared anywhere in the chain the
        // result stays valid regardless of any later null operand; this
        // must survive across iterations, not just the current child's own
        // short_circuit_hit.
        let mut result_locked: Option<String> = None;

        for child in children {
            let child_value = self.emit_value(child, regs, row_reg)?;
            let child_valid = self.emit_validity(child, regs, row_reg)?;
            let child_bit = match child_value {
                EmittedValue::Scalar { reg, .. } => reg,
                EmittedValue::VarWidth { .. } => {
                    return Err(Status::code_gen_error("boolean operand must be boolean-kinded"));
                }
            };
            let is_short_circuit = self.fresh_temp();
            writeln!(
                &mut self.output,
                "  %{is_short_circuit} = icmp eq i8 %{child_bit}, {}",
                short_circuit_bit as i64
            )?;
            let short_circuit_hit = self.fresh_temp();
            writeln!(
                &mut self.output,
                "  %{short_circuit_hit} = and i1 %{child_valid}, %{is_short_circuit}"
            )?;

            result_value = Some(match result_value {
                None => child_bit.clone(),
                Some(prev) => {
                    let merged = self.fresh_temp();
                    let llvm_op = match op {
                        BooleanOp::And => "and",
                        BooleanOp::Or => "or",
                    };
                    writeln!(
                        &mut self.output,
                        "  %{merged} = {llvm_op} i8 %{prev}, %{child_bit}"
                    )?;
                    merged
                }
            });

            match (result_valid.take(), result_locked.take()) {
                (None, None) => {
                    result_valid = Some(child_valid.clone());
                    result_locked = Some(short_circuit_hit);
                }
                (Some(prev_valid), Some(prev_locked)) => {
                    let locked = self.fresh_temp();
                    writeln!(
                        &mut self.output,
                        "  %{locked} = or i1 %{prev_locked}, %{short_circuit_hit}"
                    )?;
                    let combined_null_absorb = self.fresh_temp();
                    writeln!(
                        &mut self.output,
                        "  %{combined_null_absorb} = and i1 %{prev_valid}, %{child_valid}"
                    )?;
                    let final_valid = self.fresh_temp();
                    writeln!(
                        &mut self.output,
                        "  %{final_valid} = or i1 %{locked}, %{combined_null_absorb}"
                    )?;
                    result_valid = Some(final_valid);
                    result_locked = Some(locked);
                }
                _ => unreachable!("result_valid and result_locked are always set together"),
            }
        }

        let result_value = result_value.expect("boolean node has at least two children");
        let result_valid = result_valid.expect("boolean node has at least two children");
        self.set_local_bitmap_bit(regs, row_reg, result_bitmap, &result_valid)?;
        Ok(EmittedValue::Scalar {
            reg: result_value,
            kind: ValueKind::Boolean,
        })
    }

    /// Emits the validity half of `node`: the AND-reduction of its
    /// [`ValiditySource`] list (§4.4).
    fn emit_validity(&mut self, node: &Decomposed, regs: &EnvRegs, row_reg: &str) -> VResult<String> {
        self.validity_sources_bit(regs, row_reg, &node.validity)
    }

    fn validity_sources_bit(&mut self, regs: &EnvRegs, row_reg: &str, sources: &[ValiditySource]) -> VResult<String> {
        let mut bits = Vec::with_capacity(sources.len());
        for source in sources {
            let bit = match source {
                ValiditySource::FieldSlot(slot) => self.field_validity(regs, row_reg, *slot)?,
                ValiditySource::LocalBitmap(index) => self.local_bitmap_bit(regs, row_reg, *index)?,
                ValiditySource::AlwaysValid => {
                    let reg = self.fresh_temp();
                    writeln!(&mut self.output, "  %{reg} = or i1 true, false")?;
                    reg
                }
            };
            bits.push(bit);
        }
        match bits.as_slice() {
            [] => {
                let reg = self.fresh_temp();
                writeln!(&mut self.output, "  %{reg} = or i1 true, false")?;
                Ok(reg)
            }
            [only] => Ok(only.clone()),
            [first, rest @ ..] => {
                let mut acc = first.clone();
                for bit in rest {
                    let next = self.fresh_temp();
                    writeln!(&mut self.output, "  %{next} = and i1 %{acc}, %{bit}")?;
                    acc = next;
                }
                Ok(acc)
            }
        }
    }
}

struct EnvRegs {
    buffers: String,
    local_bitmaps: String,
    holders: String,
    context: String,
}

#[derive(Clone, Copy)]
enum RowSource {
    Unfiltered,
    Selection { width_bits: u8 },
}

fn collect_symbols(node: &Decomposed, symbols: &mut std::collections::BTreeSet<String>) {
    match &node.value {
        ValueNode::FieldLoad { .. } | ValueNode::Literal { .. } => {}
        ValueNode::Call { symbol, args, .. } => {
            symbols.insert(symbol.clone());
            for arg in args {
                collect_symbols(arg, symbols);
            }
        }
        ValueNode::IfElse {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            collect_symbols(condition, symbols);
            collect_symbols(then_branch, symbols);
            collect_symbols(else_branch, symbols);
        }
        ValueNode::Boolean { children, .. } => {
            for child in children {
                collect_symbols(child, symbols);
            }
        }
    }
}

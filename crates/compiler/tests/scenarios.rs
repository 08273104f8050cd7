//! Whole-pipeline scenarios (§8): each test drives `Projector`/`Filter`
//! through the real `validate -> decompose -> emit -> clang -> dlopen`
//! pipeline against literal inputs, matching the numbered scenarios in the
//! specification this crate implements. Requires a clang 15+ toolchain on
//! PATH, which is why these live here rather than as inline unit tests
//! (see the teacher's own split between `compile_to_ir`-only unit tests
//! and a top-level `tests/` directory for whole-pipeline behaviour).

use serial_test::serial;
use vectorize_compiler::config::Config;
use vectorize_compiler::filter::Filter;
use vectorize_compiler::projector::Projector;
use vectorize_core::buffer::{bitmap_bytes_for, set_bit};
use vectorize_core::{
    Batch, BooleanOp, Condition, Expression, FieldDescriptor, Node, Schema, SelectionVector, SelectionWidth,
    TimeUnit, ValueKind,
};

/// Builds a validity bitmap from a slice of bools, padded to the 64-bit
/// boundary `Batch`/`SelectionVector` expect.
fn validity_bitmap(bits: &[bool]) -> Vec<u8> {
    let mut bitmap = vec![0u8; bitmap_bytes_for(bits.len())];
    for (row, &valid) in bits.iter().enumerate() {
        unsafe { set_bit(bitmap.as_mut_ptr(), row, valid) };
    }
    bitmap
}

/// Owns every buffer a test needs so their pointers stay valid for the
/// `Batch`'s lifetime, and exposes a `set` to place a buffer at a given
/// slot index once the projector/filter's slot plan is known.
struct Buffers {
    slots: Vec<*mut u8>,
    // Keeps every backing allocation alive until the struct drops.
    _owned: Vec<Box<dyn std::any::Any>>,
}

impl Buffers {
    fn new(total_slots: usize) -> Self {
        Buffers {
            slots: vec![std::ptr::null_mut(); total_slots],
            _owned: Vec::new(),
        }
    }

    fn set_validity(&mut self, slot: usize, bits: &[bool]) {
        let mut bitmap = validity_bitmap(bits);
        self.slots[slot] = bitmap.as_mut_ptr();
        self._owned.push(Box::new(bitmap));
    }

    fn set_data_i32(&mut self, slot: usize, values: &[i32]) {
        let mut data = values.to_vec();
        self.slots[slot] = data.as_mut_ptr() as *mut u8;
        self._owned.push(Box::new(data));
    }

    fn set_data_i64(&mut self, slot: usize, values: &[i64]) {
        let mut data = values.to_vec();
        self.slots[slot] = data.as_mut_ptr() as *mut u8;
        self._owned.push(Box::new(data));
    }

    /// Boolean fields/outputs are one byte per row (`llvm_type(Boolean)` is
    /// `i8`), not bit-packed — only the validity buffer is a bitmap.
    fn set_data_bool(&mut self, slot: usize, values: &[bool]) {
        let mut data: Vec<u8> = values.iter().map(|&b| b as u8).collect();
        self.slots[slot] = data.as_mut_ptr();
        self._owned.push(Box::new(data));
    }

    fn alloc_output_i32(&mut self, slot: usize, row_count: usize) {
        let mut data = vec![0i32; row_count];
        self.slots[slot] = data.as_mut_ptr() as *mut u8;
        self._owned.push(Box::new(data));
    }

    fn alloc_output_bool(&mut self, slot: usize, row_count: usize) {
        let mut data = vec![0u8; row_count];
        self.slots[slot] = data.as_mut_ptr();
        self._owned.push(Box::new(data));
    }

    fn read_data_i32(&self, slot: usize, row_count: usize) -> Vec<i32> {
        let ptr = self.slots[slot] as *const i32;
        unsafe { std::slice::from_raw_parts(ptr, row_count).to_vec() }
    }

    fn read_data_bool(&self, slot: usize, row_count: usize) -> Vec<bool> {
        let ptr = self.slots[slot] as *const u8;
        unsafe { std::slice::from_raw_parts(ptr, row_count).iter().map(|&b| b != 0).collect() }
    }

    fn read_validity(&self, slot: usize, row_count: usize) -> Vec<bool> {
        let ptr = self.slots[slot] as *const u8;
        (0..row_count)
            .map(|row| unsafe { vectorize_core::buffer::get_bit(ptr, row) })
            .collect()
    }
}

fn int32_schema(names: &[&str]) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|n| FieldDescriptor::new(*n, ValueKind::Int32, true))
            .collect(),
    )
}

#[test]
#[serial]
fn scenario_1_simple_arithmetic_projection_propagates_validity() {
    let schema = int32_schema(&["f0", "f1"]);
    let expr = Expression::new(
        Node::call(
            "add",
            vec![Node::field("f0", ValueKind::Int32), Node::field("f1", ValueKind::Int32)],
            ValueKind::Int32,
        ),
        FieldDescriptor::new("sum", ValueKind::Int32, true),
    );
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    let f0 = projector.field_slot("f0").unwrap();
    let f1 = projector.field_slot("f1").unwrap();
    let out = projector.output_slot(0);

    let mut buffers = Buffers::new(projector.total_slots());
    buffers.set_validity(f0.validity, &[true, true, true, false]);
    buffers.set_data_i32(f0.data, &[1, 2, 3, 4]);
    buffers.set_validity(f1.validity, &[true, true, false, true]);
    buffers.set_data_i32(f1.data, &[11, 13, 15, 17]);
    buffers.alloc_output_i32(out.data, 4);
    buffers.set_validity(out.validity, &[false; 4]);

    let mut batch = Batch::new(4, buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate(&mut batch).unwrap();

    assert_eq!(buffers.read_validity(out.validity, 4), vec![true, true, false, false]);
    let data = buffers.read_data_i32(out.data, 4);
    assert_eq!(&data[0..2], &[12, 15]);
}

#[test]
#[serial]
fn scenario_2_filter_on_a_sum() {
    let schema = int32_schema(&["f0", "f1"]);
    let condition = Condition::new(Node::call(
        "less_than",
        vec![
            Node::call(
                "add",
                vec![Node::field("f0", ValueKind::Int32), Node::field("f1", ValueKind::Int32)],
                ValueKind::Int32,
            ),
            Node::literal(vectorize_core::LiteralValue::Int(10), ValueKind::Int32),
        ],
        ValueKind::Boolean,
    ));
    let filter = Filter::make(&schema, &condition, &Config::default()).unwrap();

    let f0 = filter.field_slot("f0").unwrap();
    let f1 = filter.field_slot("f1").unwrap();

    let mut buffers = Buffers::new(filter.total_slots());
    buffers.set_validity(f0.validity, &[true, true, true, false, true]);
    buffers.set_data_i32(f0.data, &[1, 2, 3, 4, 6]);
    buffers.set_validity(f1.validity, &[true, true, false, true, true]);
    buffers.set_data_i32(f1.data, &[5, 9, 6, 17, 3]);

    let mut batch = Batch::new(5, buffers.slots.clone(), filter.num_local_bitmaps());
    let mut selection = SelectionVector::with_capacity(SelectionWidth::U16, 5);
    filter.evaluate(&mut batch, &mut selection).unwrap();

    assert_eq!(selection.indices(), &[0, 4]);
}

#[test]
#[serial]
fn scenario_3_nested_if_then_else() {
    let schema = int32_schema(&["a"]);
    fn threshold(limit: i32, then: i32, else_branch: Node) -> Node {
        Node::if_else(
            Node::call(
                "less_than",
                vec![Node::field("a", ValueKind::Int32), Node::literal(vectorize_core::LiteralValue::Int(limit as i64), ValueKind::Int32)],
                ValueKind::Boolean,
            ),
            Node::literal(vectorize_core::LiteralValue::Int(then as i64), ValueKind::Int32),
            else_branch,
            ValueKind::Int32,
        )
    }
    // if a<10 -> 10 else if a<20 -> 20 else 200
    let tree = threshold(
        10,
        10,
        threshold(20, 20, Node::literal(vectorize_core::LiteralValue::Int(200), ValueKind::Int32)),
    );
    let expr = Expression::new(tree, FieldDescriptor::new("out", ValueKind::Int32, true));
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    let a = projector.field_slot("a").unwrap();
    let out = projector.output_slot(0);
    let mut buffers = Buffers::new(projector.total_slots());
    buffers.set_validity(a.validity, &[true; 4]);
    buffers.set_data_i32(a.data, &[10, 102, 158, 302]);
    buffers.alloc_output_i32(out.data, 4);
    buffers.set_validity(out.validity, &[false; 4]);

    let mut batch = Batch::new(4, buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate(&mut batch).unwrap();

    assert_eq!(buffers.read_data_i32(out.data, 4), vec![20, 110, 160, 200]);
}

#[test]
#[serial]
fn scenario_4_terminal_else_validity_shortcut() {
    let schema = int32_schema(&["a", "b"]);
    let expr = Expression::new(
        Node::if_else(
            Node::call(
                "greater_than",
                vec![Node::field("a", ValueKind::Int32), Node::field("b", ValueKind::Int32)],
                ValueKind::Boolean,
            ),
            Node::field("a", ValueKind::Int32),
            Node::field("b", ValueKind::Int32),
            ValueKind::Int32,
        ),
        FieldDescriptor::new("out", ValueKind::Int32, true),
    );
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    let a = projector.field_slot("a").unwrap();
    let b = projector.field_slot("b").unwrap();
    let out = projector.output_slot(0);
    let mut buffers = Buffers::new(projector.total_slots());
    buffers.set_validity(a.validity, &[true, true, true, false]);
    buffers.set_data_i32(a.data, &[10, 12, -20, 5]);
    buffers.set_validity(b.validity, &[true, true, true, true]);
    buffers.set_data_i32(b.data, &[5, 15, 15, 17]);
    buffers.alloc_output_i32(out.data, 4);
    buffers.set_validity(out.validity, &[false; 4]);

    let mut batch = Batch::new(4, buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate(&mut batch).unwrap();

    assert_eq!(buffers.read_validity(out.validity, 4), vec![true; 4]);
    assert_eq!(buffers.read_data_i32(out.data, 4), vec![10, 15, 15, 17]);
}

#[test]
#[serial]
fn scenario_5_selection_vector_projection() {
    let schema = int32_schema(&["f0", "f1"]);
    let condition = Condition::new(Node::call(
        "less_than",
        vec![
            Node::call(
                "add",
                vec![Node::field("f0", ValueKind::Int32), Node::field("f1", ValueKind::Int32)],
                ValueKind::Int32,
            ),
            Node::literal(vectorize_core::LiteralValue::Int(10), ValueKind::Int32),
        ],
        ValueKind::Boolean,
    ));
    let filter = Filter::make(&schema, &condition, &Config::default()).unwrap();
    let expr = Expression::new(
        Node::call(
            "add",
            vec![Node::field("f0", ValueKind::Int32), Node::field("f1", ValueKind::Int32)],
            ValueKind::Int32,
        ),
        FieldDescriptor::new("sum", ValueKind::Int32, true),
    );
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    // Build one buffer set shared by field slots (both filter and
    // projector allocate independent slot plans, so fetch each slot from
    // its own compiled object).
    let f0f = filter.field_slot("f0").unwrap();
    let f1f = filter.field_slot("f1").unwrap();
    let mut filter_buffers = Buffers::new(filter.total_slots());
    filter_buffers.set_validity(f0f.validity, &[true, true, true, false, true]);
    filter_buffers.set_data_i32(f0f.data, &[1, 2, 3, 4, 6]);
    filter_buffers.set_validity(f1f.validity, &[true, true, false, true, true]);
    filter_buffers.set_data_i32(f1f.data, &[5, 9, 6, 17, 3]);
    let mut filter_batch = Batch::new(5, filter_buffers.slots.clone(), filter.num_local_bitmaps());
    let mut selection = SelectionVector::with_capacity(SelectionWidth::U16, 5);
    filter.evaluate(&mut filter_batch, &mut selection).unwrap();
    assert_eq!(selection.indices(), &[0, 4]);

    let f0p = projector.field_slot("f0").unwrap();
    let f1p = projector.field_slot("f1").unwrap();
    let out = projector.output_slot(0);
    let mut proj_buffers = Buffers::new(projector.total_slots());
    proj_buffers.set_validity(f0p.validity, &[true, true, true, false, true]);
    proj_buffers.set_data_i32(f0p.data, &[1, 2, 3, 4, 6]);
    proj_buffers.set_validity(f1p.validity, &[true, true, false, true, true]);
    proj_buffers.set_data_i32(f1p.data, &[5, 9, 6, 17, 3]);
    proj_buffers.alloc_output_i32(out.data, 5);
    proj_buffers.set_validity(out.validity, &[false; 5]);

    let mut proj_batch = Batch::new(5, proj_buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate_selected(&mut proj_batch, &selection).unwrap();

    let data = proj_buffers.read_data_i32(out.data, 5);
    let selected: Vec<i32> = selection.indices().iter().map(|&i| data[i as usize]).collect();
    assert_eq!(selected, vec![6, 9]);
    assert_eq!(selection.num_slots(), 2);
}

#[test]
#[serial]
fn scenario_6_iso_week_boundary() {
    let schema = Schema::new(vec![FieldDescriptor::new(
        "ts",
        ValueKind::Timestamp(TimeUnit::Millisecond),
        true,
    )]);
    let expr = Expression::new(
        Node::call(
            "extract_week_of_year",
            vec![Node::field("ts", ValueKind::Timestamp(TimeUnit::Millisecond))],
            ValueKind::Int32,
        ),
        FieldDescriptor::new("week", ValueKind::Int32, true),
    );
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    let ts = projector.field_slot("ts").unwrap();
    let out = projector.output_slot(0);
    let mut buffers = Buffers::new(projector.total_slots());
    buffers.set_validity(ts.validity, &[true, true, true]);
    // 2016-01-01T00:00:00Z (week 53 of 2015), 2020-12-31T00:00:00Z (week
    // 53), 2019-12-30T00:00:00Z (week 1 of 2020) — the same boundary dates
    // `vz_extract_week_of_year`'s own unit tests cover.
    buffers.set_data_i64(ts.data, &[1_451_606_400_000, 1_609_372_800_000, 1_577_664_000_000]);
    buffers.alloc_output_i32(out.data, 3);
    buffers.set_validity(out.validity, &[false; 3]);

    let mut batch = Batch::new(3, buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate(&mut batch).unwrap();

    assert_eq!(buffers.read_validity(out.validity, 3), vec![true; 3]);
    assert_eq!(buffers.read_data_i32(out.data, 3), vec![53, 53, 1]);
}

/// Regression test for the Kleene AND/OR "locked" short-circuit state: an
/// earlier short-circuit hit anywhere in the chain must keep the result
/// valid even once a later operand is null, not just when the *current*
/// operand happens to be the short-circuit hit (§8, §4.5 "Boolean AND
/// (Kleene)"). A literal `Null` can't stand in for the null operand here —
/// the decomposer always marks `Node::Literal` `AlwaysValid` regardless of
/// the literal's value — so the null operand is a field with its validity
/// bit cleared, matching every other scenario in this file.
#[test]
#[serial]
fn kleene_and_short_circuit_survives_a_later_null_operand() {
    let schema = Schema::new(vec![
        FieldDescriptor::new("p", ValueKind::Boolean, true),
        FieldDescriptor::new("q", ValueKind::Boolean, true),
    ]);
    let expr = Expression::new(
        Node::boolean(
            BooleanOp::And,
            vec![
                Node::field("p", ValueKind::Boolean),
                Node::field("q", ValueKind::Boolean),
            ],
        ),
        FieldDescriptor::new("out", ValueKind::Boolean, true),
    );
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    let p = projector.field_slot("p").unwrap();
    let q = projector.field_slot("q").unwrap();
    let out = projector.output_slot(0);
    let mut buffers = Buffers::new(projector.total_slots());
    // row 0: p = false (valid), q = null -> AND short-circuits to false/valid.
    // row 1: p = true (valid), q = null -> AND is genuinely null/invalid.
    buffers.set_validity(p.validity, &[true, true]);
    buffers.set_data_bool(p.data, &[false, true]);
    buffers.set_validity(q.validity, &[false, false]);
    buffers.set_data_bool(q.data, &[false, false]);
    buffers.alloc_output_bool(out.data, 2);
    buffers.set_validity(out.validity, &[false; 2]);

    let mut batch = Batch::new(2, buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate(&mut batch).unwrap();

    assert_eq!(buffers.read_validity(out.validity, 2), vec![true, false]);
    assert_eq!(buffers.read_data_bool(out.data, 2), vec![false, false]);
}

/// Symmetric case for `OR`: an earlier `true` operand locks the result
/// valid/true even when a later operand is null.
#[test]
#[serial]
fn kleene_or_short_circuit_survives_a_later_null_operand() {
    let schema = Schema::new(vec![
        FieldDescriptor::new("p", ValueKind::Boolean, true),
        FieldDescriptor::new("q", ValueKind::Boolean, true),
    ]);
    let expr = Expression::new(
        Node::boolean(
            BooleanOp::Or,
            vec![
                Node::field("p", ValueKind::Boolean),
                Node::field("q", ValueKind::Boolean),
            ],
        ),
        FieldDescriptor::new("out", ValueKind::Boolean, true),
    );
    let projector = Projector::make(&schema, std::slice::from_ref(&expr), &Config::default()).unwrap();

    let p = projector.field_slot("p").unwrap();
    let q = projector.field_slot("q").unwrap();
    let out = projector.output_slot(0);
    let mut buffers = Buffers::new(projector.total_slots());
    // row 0: p = true (valid), q = null -> OR short-circuits to true/valid.
    // row 1: p = false (valid), q = null -> OR is genuinely null/invalid.
    buffers.set_validity(p.validity, &[true, true]);
    buffers.set_data_bool(p.data, &[true, false]);
    buffers.set_validity(q.validity, &[false, false]);
    buffers.set_data_bool(q.data, &[false, false]);
    buffers.alloc_output_bool(out.data, 2);
    buffers.set_validity(out.validity, &[false; 2]);

    let mut batch = Batch::new(2, buffers.slots.clone(), projector.num_local_bitmaps());
    projector.evaluate(&mut batch).unwrap();

    assert_eq!(buffers.read_validity(out.validity, 2), vec![true, false]);
    assert_eq!(buffers.read_data_bool(out.data, 2), vec![true, false]);
}

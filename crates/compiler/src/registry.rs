//! The function registry (§4.1): named intrinsic signatures bound to a
//! precompiled implementation and a null-behaviour tag.

use std::collections::HashMap;
use vectorize_core::{TimeUnit, ValueKind};

const TIMESTAMP_MILLIS: ValueKind = ValueKind::Timestamp(TimeUnit::Millisecond);

/// How a function's output validity relates to its inputs' validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullBehavior {
    /// Output is null iff any input is null; the emitter computes output
    /// validity itself and only calls the intrinsic on valid rows.
    NullIfAnyNull,
    /// The intrinsic reads validity bits as ordinary value arguments and
    /// always produces a valid result (e.g. `is_null`).
    NullNever,
    /// The intrinsic decides per-row validity itself and reports it back
    /// through the execution context; the emitter records that decision in
    /// a fresh local bitmap rather than computing it from child validity
    /// (e.g. `to_date`: a suppressed parse failure is a null row, not a
    /// propagated one).
    NullInternal,
}

/// A single entry: one name+signature combination bound to a linkable
/// symbol in `vectorize-intrinsics` (§4.1).
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<ValueKind>,
    pub result: ValueKind,
    pub null_behavior: NullBehavior,
    pub needs_execution_context: bool,
    pub needs_function_holder: bool,
    /// Set for signatures that need to see the AND-reduced validity of
    /// their declared arguments as an extra trailing `i8` argument (e.g.
    /// `hash32`/`hash64` return 0 for a null input instead of propagating
    /// validity the usual way).
    pub needs_validity_arg: bool,
    /// The `#[no_mangle]` symbol in `vectorize-intrinsics` the emitter
    /// declares and calls.
    pub symbol: String,
}

/// Signature lookup key: function name plus parameter kinds. Two entries
/// with the same name but different parameter kinds (e.g. `add` over
/// `int32` vs `float64`) are distinct registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SignatureKey {
    name: String,
    params: Vec<ValueKind>,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<SignatureKey, FunctionSignature>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, sig: FunctionSignature) {
        let key = SignatureKey {
            name: sig.name.clone(),
            params: sig.params.clone(),
        };
        self.entries.insert(key, sig);
    }

    pub fn lookup(&self, name: &str, params: &[ValueKind]) -> Option<&FunctionSignature> {
        let key = SignatureKey {
            name: name.to_string(),
            params: params.to_vec(),
        };
        self.entries.get(&key)
    }

    pub fn is_known_name(&self, name: &str) -> bool {
        self.entries.keys().any(|k| k.name == name)
    }

    /// Builds the catalogue of built-in intrinsics (§6.4), registering
    /// both the canonical snake_case name and, for date/time extraction
    /// functions, the original's camelCase `extract*` alias (§4.1
    /// supplement).
    pub fn with_builtins() -> Self {
        let mut reg = Registry::new();
        register_arithmetic(&mut reg);
        register_comparison(&mut reg);
        register_logical(&mut reg);
        register_cast(&mut reg);
        register_datetime(&mut reg);
        register_string(&mut reg);
        register_like_and_to_date(&mut reg);
        register_hash(&mut reg);
        reg
    }
}

use ValueKind::{Binary, Boolean, Float32, Float64, Int8, Int16, Int32, Int64, Utf8};

fn simple(
    name: &str,
    params: &[ValueKind],
    result: ValueKind,
    symbol: &str,
    behavior: NullBehavior,
) -> FunctionSignature {
    FunctionSignature {
        name: name.to_string(),
        params: params.to_vec(),
        result,
        null_behavior: behavior,
        needs_execution_context: false,
        needs_function_holder: false,
        needs_validity_arg: false,
        symbol: symbol.to_string(),
    }
}

fn register_arithmetic(reg: &mut Registry) {
    const INT_KINDS: &[(ValueKind, &str)] = &[
        (Int8, "int8"),
        (Int16, "int16"),
        (Int32, "int32"),
        (Int64, "int64"),
    ];
    const FLOAT_KINDS: &[(ValueKind, &str)] = &[(Float32, "float32"), (Float64, "float64")];

    for &(kind, suffix) in INT_KINDS.iter().chain(FLOAT_KINDS) {
        for (op, verb) in [
            ("add", "add"),
            ("subtract", "subtract"),
            ("multiply", "multiply"),
        ] {
            reg.register(simple(
                op,
                &[kind, kind],
                kind,
                &format!("vz_{verb}_{suffix}"),
                NullBehavior::NullIfAnyNull,
            ));
        }
        reg.register(FunctionSignature {
            name: "divide".to_string(),
            params: vec![kind, kind],
            result: kind,
            null_behavior: NullBehavior::NullIfAnyNull,
            needs_execution_context: true,
            needs_function_holder: false,
            needs_validity_arg: false,
            symbol: format!("vz_divide_{suffix}"),
        });
    }
    for &(kind, suffix) in INT_KINDS {
        reg.register(FunctionSignature {
            name: "modulo".to_string(),
            params: vec![kind, kind],
            result: kind,
            null_behavior: NullBehavior::NullIfAnyNull,
            needs_execution_context: true,
            needs_function_holder: false,
            needs_validity_arg: false,
            symbol: format!("vz_modulo_{suffix}"),
        });
    }
}

fn register_comparison(reg: &mut Registry) {
    const KINDS: &[(ValueKind, &str)] = &[
        (Int8, "int8"),
        (Int16, "int16"),
        (Int32, "int32"),
        (Int64, "int64"),
        (Float32, "float32"),
        (Float64, "float64"),
    ];
    for &(kind, suffix) in KINDS {
        for (op, verb) in [
            ("equal", "equal"),
            ("not_equal", "not_equal"),
            ("less_than", "less_than"),
            ("less_than_or_equal_to", "less_than_or_equal_to"),
            ("greater_than", "greater_than"),
            ("greater_than_or_equal_to", "greater_than_or_equal_to"),
        ] {
            reg.register(simple(
                op,
                &[kind, kind],
                Boolean,
                &format!("vz_{verb}_{suffix}"),
                NullBehavior::NullIfAnyNull,
            ));
        }
    }
}

fn register_logical(reg: &mut Registry) {
    reg.register(simple(
        "not",
        &[Boolean],
        Boolean,
        "vz_not",
        NullBehavior::NullIfAnyNull,
    ));
    for kind in [
        Boolean, Int8, Int16, Int32, Int64, Float32, Float64, Utf8, Binary,
    ] {
        reg.register(simple(
            "is_null",
            &[kind, Boolean],
            Boolean,
            "vz_is_null",
            NullBehavior::NullNever,
        ));
        reg.register(simple(
            "is_not_null",
            &[kind, Boolean],
            Boolean,
            "vz_is_not_null",
            NullBehavior::NullNever,
        ));
    }
    for kind in [Int8, Int16, Int32, Int64, Float32, Float64] {
        reg.register(simple(
            "is_numeric",
            &[kind, Boolean],
            Boolean,
            "vz_is_numeric_float64",
            NullBehavior::NullNever,
        ));
    }
}

fn register_cast(reg: &mut Registry) {
    let widening: &[(ValueKind, ValueKind, &str)] = &[
        (Int8, Int16, "vz_cast_int8_to_int16"),
        (Int8, Int32, "vz_cast_int8_to_int32"),
        (Int8, Int64, "vz_cast_int8_to_int64"),
        (Int16, Int32, "vz_cast_int16_to_int32"),
        (Int16, Int64, "vz_cast_int16_to_int64"),
        (Int32, Int64, "vz_cast_int32_to_int64"),
        (Float32, Float64, "vz_cast_float32_to_float64"),
        (Int32, Float64, "vz_cast_int32_to_float64"),
        (Int64, Float64, "vz_cast_int64_to_float64"),
    ];
    let narrowing: &[(ValueKind, ValueKind, &str)] = &[
        (Int16, Int8, "vz_cast_int16_to_int8"),
        (Int32, Int16, "vz_cast_int32_to_int16"),
        (Int64, Int32, "vz_cast_int64_to_int32"),
        (Float64, Float32, "vz_cast_float64_to_float32"),
        (Float64, Int32, "vz_cast_float64_to_int32"),
        (Float64, Int64, "vz_cast_float64_to_int64"),
    ];
    for &(from, to, symbol) in widening.iter().chain(narrowing) {
        reg.register(simple(
            "cast",
            &[from],
            to,
            symbol,
            NullBehavior::NullIfAnyNull,
        ));
    }
}

fn register_datetime(reg: &mut Registry) {
    const EXTRACTORS: &[(&str, &str, &str)] = &[
        ("extract_year", "extractYear", "vz_extract_year"),
        ("extract_month", "extractMonth", "vz_extract_month"),
        ("extract_day", "extractDay", "vz_extract_day"),
        ("extract_hour", "extractHour", "vz_extract_hour"),
        ("extract_minute", "extractMinute", "vz_extract_minute"),
        ("extract_second", "extractSecond", "vz_extract_second"),
        (
            "extract_day_of_year",
            "extractDayOfYear",
            "vz_extract_day_of_year",
        ),
        (
            "extract_day_of_week",
            "extractDayOfWeek",
            "vz_extract_day_of_week",
        ),
        (
            "extract_week_of_year",
            "extractWeekOfYear",
            "vz_extract_week_of_year",
        ),
    ];
    for &(snake, camel, symbol) in EXTRACTORS {
        for name in [snake, camel] {
            reg.register(simple(
                name,
                &[TIMESTAMP_MILLIS],
                Int32,
                symbol,
                NullBehavior::NullIfAnyNull,
            ));
        }
    }
}

fn register_string(reg: &mut Registry) {
    reg.register(FunctionSignature {
        name: "char_length".to_string(),
        params: vec![Utf8],
        result: Int32,
        null_behavior: NullBehavior::NullIfAnyNull,
        needs_execution_context: true,
        needs_function_holder: false,
        needs_validity_arg: false,
        symbol: "vz_char_length".to_string(),
    });
    reg.register(simple(
        "byte_length",
        &[Utf8],
        Int32,
        "vz_byte_length",
        NullBehavior::NullIfAnyNull,
    ));
    reg.register(simple(
        "starts_with",
        &[Utf8, Utf8],
        Boolean,
        "vz_starts_with",
        NullBehavior::NullIfAnyNull,
    ));
    reg.register(simple(
        "ends_with",
        &[Utf8, Utf8],
        Boolean,
        "vz_ends_with",
        NullBehavior::NullIfAnyNull,
    ));
}

fn register_like_and_to_date(reg: &mut Registry) {
    reg.register(FunctionSignature {
        name: "like".to_string(),
        params: vec![Utf8, Utf8],
        result: Boolean,
        null_behavior: NullBehavior::NullIfAnyNull,
        needs_execution_context: false,
        needs_function_holder: true,
        needs_validity_arg: false,
        symbol: "vz_like".to_string(),
    });
    reg.register(FunctionSignature {
        name: "to_date".to_string(),
        // (value, date-format literal, suppress-errors literal) — the last
        // two are holder-only config (§4.9) and never reach the native
        // call as runtime arguments.
        params: vec![Utf8, Utf8, Boolean],
        result: TIMESTAMP_MILLIS,
        null_behavior: NullBehavior::NullInternal,
        needs_execution_context: true,
        needs_function_holder: true,
        needs_validity_arg: false,
        symbol: "vz_to_date".to_string(),
    });
}

/// `hash32`/`hash64` take the seed as an explicit second argument (same
/// convention as `is_null`'s explicit validity argument) and additionally
/// get an auto-injected trailing validity byte via `needs_validity_arg`,
/// since a null input must hash to 0 (§6.4) rather than the emitter
/// skipping the call the way `NullIfAnyNull` functions do. `NullNever`
/// rather than `NullInternal`: hashing a null input is still a defined,
/// always-valid output (the sentinel `0`), unlike `to_date`'s genuine
/// per-row nullity decision.
fn hash_signature(name: &str, param: ValueKind, result: ValueKind, symbol: &str) -> FunctionSignature {
    FunctionSignature {
        name: name.to_string(),
        params: vec![param, Int64],
        result,
        null_behavior: NullBehavior::NullNever,
        needs_execution_context: false,
        needs_function_holder: false,
        needs_validity_arg: true,
        symbol: symbol.to_string(),
    }
}

fn register_hash(reg: &mut Registry) {
    const NUMERIC: &[(ValueKind, &str)] = &[
        (Int8, "int8"),
        (Int16, "int16"),
        (Int32, "int32"),
        (Int64, "int64"),
        (Float32, "float32"),
        (Float64, "float64"),
    ];
    for &(kind, suffix) in NUMERIC {
        reg.register(hash_signature("hash32", kind, Int32, &format!("vz_hash32_{suffix}")));
        reg.register(hash_signature("hash64", kind, Int64, &format!("vz_hash64_{suffix}")));
    }
    reg.register(hash_signature("hash32", Utf8, Int32, "vz_hash32_utf8"));
    reg.register(hash_signature("hash64", Utf8, Int64, "vz_hash64_utf8"));
}

//! The holder factory (§4.9): turns the decomposer's [`HolderRequest`]s
//! into owned [`FunctionHolder`]s, built once at `make` time from each
//! call's literal arguments. Grounded on the original's
//! `cpp/src/codegen/function_holder_registry.h` ("look up or build" table
//! keyed by the call site) reimplemented as a flat `Vec` indexed by the
//! decomposer's `holder_slot`, since this repository never shares a holder
//! across call sites the way the original's registry dedupes by signature.

use crate::decomposer::HolderRequest;
use vectorize_core::{DateHolder, FunctionHolder, LiteralValue, Status, VResult};

/// Builds one [`FunctionHolder`] per request, in `holder_slot` order, so
/// the result can be indexed directly by slot.
pub fn build_holders(requests: &[HolderRequest]) -> VResult<Vec<FunctionHolder>> {
    let mut holders: Vec<Option<FunctionHolder>> = (0..requests.len()).map(|_| None).collect();
    for request in requests {
        let holder = build_one(request)?;
        holders[request.holder_slot] = Some(holder);
    }
    holders
        .into_iter()
        .enumerate()
        .map(|(slot, h)| {
            h.ok_or_else(|| Status::code_gen_error(format!("holder slot {slot} was never populated")))
        })
        .collect()
}

fn build_one(request: &HolderRequest) -> VResult<FunctionHolder> {
    match request.function_name.as_str() {
        "like" => {
            let pattern = literal_string(request, 0)?;
            let pattern_holder = vectorize_core::PatternHolder::make(&pattern, None)
                .map_err(Status::code_gen_error)?;
            Ok(FunctionHolder::Pattern(pattern_holder))
        }
        "to_date" => {
            let format = literal_string(request, 0)?;
            let suppress_errors = literal_bool(request, 1)?;
            Ok(FunctionHolder::Date(DateHolder::make(&format, suppress_errors)))
        }
        other => Err(Status::code_gen_error(format!(
            "no holder factory registered for function '{other}'"
        ))),
    }
}

fn literal_string(request: &HolderRequest, index: usize) -> VResult<String> {
    match request.literal_args.get(index) {
        Some(LiteralValue::Bytes(bytes)) => String::from_utf8(bytes.clone())
            .map_err(|e| Status::code_gen_error(format!("holder literal argument is not valid UTF-8: {e}"))),
        Some(other) => Err(Status::code_gen_error(format!(
            "holder literal argument must be a string, found {other:?}"
        ))),
        None => Err(Status::code_gen_error(format!(
            "function '{}' needs a literal argument at position {index} to build its holder",
            request.function_name
        ))),
    }
}

fn literal_bool(request: &HolderRequest, index: usize) -> VResult<bool> {
    match request.literal_args.get(index) {
        Some(LiteralValue::Boolean(b)) => Ok(*b),
        Some(other) => Err(Status::code_gen_error(format!(
            "holder literal argument must be a boolean, found {other:?}"
        ))),
        None => Err(Status::code_gen_error(format!(
            "function '{}' needs a literal argument at position {index} to build its holder",
            request.function_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_like_holder_from_its_literal_pattern() {
        let requests = vec![HolderRequest {
            holder_slot: 0,
            function_name: "like".to_string(),
            literal_args: vec![LiteralValue::Bytes(b"a%".to_vec())],
        }];
        let holders = build_holders(&requests).unwrap();
        match &holders[0] {
            FunctionHolder::Pattern(p) => assert!(p.is_match("apple")),
            _ => panic!("expected a pattern holder"),
        }
    }

    #[test]
    fn builds_holders_in_slot_order_regardless_of_request_order() {
        let requests = vec![
            HolderRequest {
                holder_slot: 1,
                function_name: "like".to_string(),
                literal_args: vec![LiteralValue::Bytes(b"b%".to_vec())],
            },
            HolderRequest {
                holder_slot: 0,
                function_name: "like".to_string(),
                literal_args: vec![LiteralValue::Bytes(b"a%".to_vec())],
            },
        ];
        let holders = build_holders(&requests).unwrap();
        match (&holders[0], &holders[1]) {
            (FunctionHolder::Pattern(a), FunctionHolder::Pattern(b)) => {
                assert!(a.is_match("apple"));
                assert!(b.is_match("banana"));
            }
            _ => panic!("expected pattern holders"),
        }
    }

    #[test]
    fn builds_a_to_date_holder_with_the_suppress_errors_flag_set() {
        let requests = vec![HolderRequest {
            holder_slot: 0,
            function_name: "to_date".to_string(),
            literal_args: vec![
                LiteralValue::Bytes(b"YYYY-MM-DD".to_vec()),
                LiteralValue::Boolean(true),
            ],
        }];
        let holders = build_holders(&requests).unwrap();
        match &holders[0] {
            FunctionHolder::Date(d) => {
                let mut ctx = vectorize_core::ExecutionContext::new();
                assert_eq!(d.parse("not a date", &mut ctx), None);
                assert!(!ctx.has_error());
            }
            _ => panic!("expected a date holder"),
        }
    }

    #[test]
    fn unknown_function_name_is_an_error() {
        let requests = vec![HolderRequest {
            holder_slot: 0,
            function_name: "frobnicate".to_string(),
            literal_args: vec![],
        }];
        assert!(build_holders(&requests).is_err());
    }
}

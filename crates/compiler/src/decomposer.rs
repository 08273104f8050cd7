//! The decomposer (§4.4): rewrites a validated expression tree into a
//! value/validity pair. This is a pure rewrite — no IR is emitted here,
//! only the plan the emitter (§4.5) later walks.

use crate::annotator::SlotPlan;
use crate::registry::{NullBehavior, Registry};
use vectorize_core::{BooleanOp, LiteralValue, Node, SlotTriple, ValueKind};

/// Where a validity bit comes from at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValiditySource {
    /// Read the validity bit out of a field's own validity buffer.
    FieldSlot(usize),
    /// Read a scratch bitmap a `NULL_INTERNAL` function or an if/boolean
    /// node wrote during value evaluation.
    LocalBitmap(usize),
    /// The node can never be null (literals, `NULL_NEVER` functions).
    AlwaysValid,
}

/// A request the holder factory (§4.9) must satisfy before the emitted
/// module can run: build a [`vectorize_core::FunctionHolder`] from a
/// call's literal arguments and make it available at `holder_slot`.
#[derive(Debug, Clone)]
pub struct HolderRequest {
    pub holder_slot: usize,
    pub function_name: String,
    pub literal_args: Vec<LiteralValue>,
}

/// The value half of a decomposed node (§4.4).
#[derive(Debug, Clone)]
pub enum ValueNode {
    FieldLoad {
        slot: SlotTriple,
        kind: ValueKind,
    },
    Literal {
        value: LiteralValue,
        kind: ValueKind,
    },
    Call {
        symbol: String,
        args: Vec<Decomposed>,
        needs_execution_context: bool,
        holder_slot: Option<usize>,
        /// Set only for `NULL_INTERNAL` calls: the local bitmap index the
        /// intrinsic itself decides the validity of.
        internal_validity_bitmap: Option<usize>,
        /// Set when the registry marks this signature `needs_validity_arg`:
        /// the AND-reduced validity of the declared arguments, passed as a
        /// trailing `i8` so the intrinsic can see nullity it isn't
        /// otherwise shielded from (e.g. `hash32`/`hash64` returning 0 for
        /// a null input).
        validity_arg: Option<Vec<ValiditySource>>,
        result_kind: ValueKind,
    },
    IfElse {
        condition: Box<Decomposed>,
        then_branch: Box<Decomposed>,
        else_branch: Box<Decomposed>,
        /// True when the else arm is a literal that can never be null,
        /// letting the emitter skip computing its validity (§4.5
        /// "terminal else" optimisation).
        terminal_else: bool,
        result_bitmap: usize,
    },
    Boolean {
        op: BooleanOp,
        children: Vec<Decomposed>,
        result_bitmap: usize,
    },
}

/// A value node paired with the validity sources that AND-reduce to its
/// output-valid bit (§4.4).
#[derive(Debug, Clone)]
pub struct Decomposed {
    pub value: ValueNode,
    pub validity: Vec<ValiditySource>,
}

pub struct Decomposer<'a> {
    plan: &'a SlotPlan,
    registry: &'a Registry,
    next_local_bitmap: usize,
    next_holder_slot: usize,
    holder_requests: Vec<HolderRequest>,
}

impl<'a> Decomposer<'a> {
    pub fn new(plan: &'a SlotPlan, registry: &'a Registry) -> Self {
        Decomposer {
            plan,
            registry,
            next_local_bitmap: 0,
            next_holder_slot: 0,
            holder_requests: Vec::new(),
        }
    }

    pub fn local_bitmap_count(&self) -> usize {
        self.next_local_bitmap
    }

    pub fn holder_requests(&self) -> &[HolderRequest] {
        &self.holder_requests
    }

    fn alloc_bitmap(&mut self) -> usize {
        let idx = self.next_local_bitmap;
        self.next_local_bitmap += 1;
        idx
    }

    /// Decomposes `node`, assumed already validated against `plan`'s
    /// schema and `registry` (§4.2 ran first).
    pub fn decompose(&mut self, node: &Node) -> Decomposed {
        match node {
            Node::Field { name, kind } => {
                let slot = self
                    .plan
                    .field_slot(name)
                    .expect("annotator must allocate a slot for every referenced field");
                Decomposed {
                    value: ValueNode::FieldLoad { slot, kind: *kind },
                    validity: vec![ValiditySource::FieldSlot(slot.validity)],
                }
            }
            Node::Literal { value, kind } => Decomposed {
                value: ValueNode::Literal {
                    value: value.clone(),
                    kind: *kind,
                },
                validity: vec![ValiditySource::AlwaysValid],
            },
            Node::Call { name, args, kind } => self.decompose_call(name, args, *kind),
            Node::IfElse {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let condition = Box::new(self.decompose(condition));
                let then_branch = Box::new(self.decompose(then_branch));
                let terminal_else = matches!(**else_branch, Node::Literal { .. });
                let else_branch = Box::new(self.decompose(else_branch));
                let result_bitmap = self.alloc_bitmap();
                Decomposed {
                    value: ValueNode::IfElse {
                        condition,
                        then_branch,
                        else_branch,
                        terminal_else,
                        result_bitmap,
                    },
                    validity: vec![ValiditySource::LocalBitmap(result_bitmap)],
                }
            }
            Node::Boolean { op, children } => {
                let children: Vec<Decomposed> =
                    children.iter().map(|c| self.decompose(c)).collect();
                let result_bitmap = self.alloc_bitmap();
                Decomposed {
                    value: ValueNode::Boolean {
                        op: *op,
                        children,
                        result_bitmap,
                    },
                    validity: vec![ValiditySource::LocalBitmap(result_bitmap)],
                }
            }
        }
    }

    fn decompose_call(&mut self, name: &str, args: &[Node], result_kind: ValueKind) -> Decomposed {
        let param_kinds: Vec<ValueKind> = args.iter().map(Node::kind).collect();
        let sig = self
            .registry
            .lookup(name, &param_kinds)
            .expect("validator must have already confirmed this signature resolves")
            .clone();

        // Holder-backed functions (`like`, `to_date`) take their literal
        // arguments (pattern, date format, suppress-errors flag) purely to
        // build compile-time state; those literals never reach the native
        // call as runtime value arguments, only the non-literal args do.
        let holder_slot = if sig.needs_function_holder {
            let slot = self.next_holder_slot;
            self.next_holder_slot += 1;
            let literal_args = args
                .iter()
                .filter_map(|a| match a {
                    Node::Literal { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect();
            self.holder_requests.push(HolderRequest {
                holder_slot: slot,
                function_name: name.to_string(),
                literal_args,
            });
            Some(slot)
        } else {
            None
        };

        let value_args: Vec<&Node> = if sig.needs_function_holder {
            args.iter().filter(|a| !matches!(a, Node::Literal { .. })).collect()
        } else {
            args.iter().collect()
        };
        let decomposed_args: Vec<Decomposed> =
            value_args.into_iter().map(|a| self.decompose(a)).collect();

        let arg_validity_union: Vec<ValiditySource> = decomposed_args
            .iter()
            .flat_map(|a| a.validity.iter().copied())
            .collect();

        let (validity, internal_validity_bitmap) = match sig.null_behavior {
            NullBehavior::NullIfAnyNull => (arg_validity_union.clone(), None),
            NullBehavior::NullNever => (vec![ValiditySource::AlwaysValid], None),
            NullBehavior::NullInternal => {
                let bitmap = self.alloc_bitmap();
                (vec![ValiditySource::LocalBitmap(bitmap)], Some(bitmap))
            }
        };

        let validity_arg = sig.needs_validity_arg.then_some(arg_validity_union);

        Decomposed {
            value: ValueNode::Call {
                symbol: sig.symbol.clone(),
                args: decomposed_args,
                needs_execution_context: sig.needs_execution_context,
                holder_slot,
                internal_validity_bitmap,
                validity_arg,
                result_kind,
            },
            validity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::annotate;
    use vectorize_core::{Expression, FieldDescriptor};

    #[test]
    fn null_if_any_null_unions_child_validity() {
        let expr = Expression::new(
            Node::call(
                "add",
                vec![
                    Node::field("a", ValueKind::Int32),
                    Node::field("b", ValueKind::Int32),
                ],
                ValueKind::Int32,
            ),
            FieldDescriptor::new("sum", ValueKind::Int32, true),
        );
        let plan = annotate(std::slice::from_ref(&expr));
        let registry = Registry::with_builtins();
        let mut decomposer = Decomposer::new(&plan, &registry);
        let decomposed = decomposer.decompose(expr.root());
        assert_eq!(decomposed.validity.len(), 2);
    }

    #[test]
    fn null_internal_allocates_a_local_bitmap() {
        let timestamp_millis = ValueKind::Timestamp(vectorize_core::TimeUnit::Millisecond);
        let expr = Expression::new(
            Node::call(
                "to_date",
                vec![
                    Node::field("s", ValueKind::Utf8),
                    Node::literal(LiteralValue::Bytes(b"YYYY-MM-DD".to_vec()), ValueKind::Utf8),
                    Node::literal(LiteralValue::Boolean(false), ValueKind::Boolean),
                ],
                timestamp_millis,
            ),
            FieldDescriptor::new("d", timestamp_millis, true),
        );
        let plan = annotate(std::slice::from_ref(&expr));
        let registry = Registry::with_builtins();
        let mut decomposer = Decomposer::new(&plan, &registry);
        let decomposed = decomposer.decompose(expr.root());
        assert_eq!(decomposed.validity, vec![ValiditySource::LocalBitmap(0)]);
        assert_eq!(decomposer.local_bitmap_count(), 1);
        match decomposed.value {
            ValueNode::Call { args, .. } => assert_eq!(args.len(), 1),
            _ => panic!("expected a call node"),
        }
    }

    #[test]
    fn hash_is_null_never_with_an_injected_validity_argument() {
        let expr = Expression::new(
            Node::call(
                "hash64",
                vec![
                    Node::field("a", ValueKind::Int32),
                    Node::literal(LiteralValue::Int(7), ValueKind::Int64),
                ],
                ValueKind::Int64,
            ),
            FieldDescriptor::new("h", ValueKind::Int64, true),
        );
        let plan = annotate(std::slice::from_ref(&expr));
        let registry = Registry::with_builtins();
        let mut decomposer = Decomposer::new(&plan, &registry);
        let decomposed = decomposer.decompose(expr.root());
        assert_eq!(decomposed.validity, vec![ValiditySource::AlwaysValid]);
        match decomposed.value {
            ValueNode::Call { validity_arg, .. } => assert!(validity_arg.is_some()),
            _ => panic!("expected a call node"),
        }
    }

    #[test]
    fn like_call_registers_a_holder_request() {
        let expr = Expression::new(
            Node::call(
                "like",
                vec![
                    Node::field("s", ValueKind::Utf8),
                    Node::literal(LiteralValue::Bytes(b"a%".to_vec()), ValueKind::Utf8),
                ],
                ValueKind::Boolean,
            ),
            FieldDescriptor::new("matched", ValueKind::Boolean, true),
        );
        let plan = annotate(std::slice::from_ref(&expr));
        let registry = Registry::with_builtins();
        let mut decomposer = Decomposer::new(&plan, &registry);
        decomposer.decompose(expr.root());
        assert_eq!(decomposer.holder_requests().len(), 1);
        assert_eq!(decomposer.holder_requests()[0].function_name, "like");
    }

    #[test]
    fn holder_literal_arguments_are_not_passed_as_call_value_args() {
        let expr = Expression::new(
            Node::call(
                "like",
                vec![
                    Node::field("s", ValueKind::Utf8),
                    Node::literal(LiteralValue::Bytes(b"a%".to_vec()), ValueKind::Utf8),
                ],
                ValueKind::Boolean,
            ),
            FieldDescriptor::new("matched", ValueKind::Boolean, true),
        );
        let plan = annotate(std::slice::from_ref(&expr));
        let registry = Registry::with_builtins();
        let mut decomposer = Decomposer::new(&plan, &registry);
        let decomposed = decomposer.decompose(expr.root());
        match decomposed.value {
            ValueNode::Call { args, .. } => assert_eq!(args.len(), 1),
            _ => panic!("expected a call node"),
        }
    }

    #[test]
    fn if_else_with_literal_else_is_terminal() {
        let expr = Expression::new(
            Node::if_else(
                Node::call(
                    "greater_than",
                    vec![
                        Node::field("a", ValueKind::Int32),
                        Node::field("b", ValueKind::Int32),
                    ],
                    ValueKind::Boolean,
                ),
                Node::field("a", ValueKind::Int32),
                Node::literal(LiteralValue::Int(0), ValueKind::Int32),
                ValueKind::Int32,
            ),
            FieldDescriptor::new("out", ValueKind::Int32, true),
        );
        let plan = annotate(std::slice::from_ref(&expr));
        let registry = Registry::with_builtins();
        let mut decomposer = Decomposer::new(&plan, &registry);
        let decomposed = decomposer.decompose(expr.root());
        match decomposed.value {
            ValueNode::IfElse { terminal_else, .. } => assert!(terminal_else),
            _ => panic!("expected an if-else value node"),
        }
    }
}

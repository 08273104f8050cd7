//! Expression trees (§3 Expression node variants, §3 Expression, §3
//! Condition).
//!
//! A tagged-enum representation with an exhaustive match at every
//! traversal site is used rather than virtual dispatch — the set of node
//! variants is closed, and a new variant should force every visitor
//! (validator, annotator, decomposer, emitter) to fail to compile until
//! handled (§9 Visitor dispatch).

use crate::kind::ValueKind;
use crate::schema::FieldDescriptor;
use std::sync::Arc;

/// A typed literal value. String/binary literals carry an owned byte
/// buffer; all other kinds are represented as their widest native Rust
/// type and narrowed by the decomposer/emitter to the declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Boolean(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    Null,
}

/// Boolean n-ary operator kind (§3 Boolean n-ary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    And,
    Or,
}

/// One node of an expression tree. Every variant carries its declared
/// result kind so a caller can read a node's type without re-deriving it
/// from its children.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A reference to a schema field, resolved by name at validation time.
    Field { name: String, kind: ValueKind },

    /// A typed constant.
    Literal { value: LiteralValue, kind: ValueKind },

    /// A call to a registered intrinsic function.
    Call {
        name: String,
        args: Vec<Node>,
        kind: ValueKind,
    },

    /// `if condition then then_branch else else_branch`. `condition` must
    /// be boolean-kinded; `then_branch` and `else_branch` must share
    /// `kind`.
    IfElse {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
        kind: ValueKind,
    },

    /// An n-ary boolean AND/OR over at least two boolean-kinded children.
    Boolean { op: BooleanOp, children: Vec<Node> },
}

impl Node {
    pub fn field(name: impl Into<String>, kind: ValueKind) -> Self {
        Node::Field {
            name: name.into(),
            kind,
        }
    }

    pub fn literal(value: LiteralValue, kind: ValueKind) -> Self {
        Node::Literal { value, kind }
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>, kind: ValueKind) -> Self {
        Node::Call {
            name: name.into(),
            args,
            kind,
        }
    }

    pub fn if_else(condition: Node, then_branch: Node, else_branch: Node, kind: ValueKind) -> Self {
        Node::IfElse {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            kind,
        }
    }

    pub fn boolean(op: BooleanOp, children: Vec<Node>) -> Self {
        Node::Boolean { op, children }
    }

    /// The node's declared result kind. Always available without
    /// consulting a schema or registry, per §3's "each carries its
    /// declared result kind" invariant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Node::Field { kind, .. }
            | Node::Literal { kind, .. }
            | Node::Call { kind, .. }
            | Node::IfElse { kind, .. } => *kind,
            Node::Boolean { .. } => ValueKind::Boolean,
        }
    }

    /// A short, stable label naming this node's syntactic construct, used
    /// to build validator error messages (SPEC_FULL §4.2 message format)
    /// and as part of the cache key's canonical expression string.
    pub fn label(&self) -> String {
        match self {
            Node::Field { name, .. } => format!("field '{name}'"),
            Node::Literal { .. } => "literal".to_string(),
            Node::Call { name, .. } => format!("function '{name}'"),
            Node::IfElse { .. } => "if-then-else".to_string(),
            Node::Boolean { op, .. } => match op {
                BooleanOp::And => "boolean and".to_string(),
                BooleanOp::Or => "boolean or".to_string(),
            },
        }
    }

    /// A canonical string form used as a cache-key component (§4.10). Two
    /// structurally-identical trees (same node shapes, field names,
    /// literal values, function names, and kinds) produce identical
    /// strings regardless of how they were built.
    pub fn canonical_string(&self) -> String {
        match self {
            Node::Field { name, kind } => format!("field({name}:{kind})"),
            Node::Literal { value, kind } => format!("lit({value:?}:{kind})"),
            Node::Call { name, args, kind } => {
                let args: Vec<String> = args.iter().map(Node::canonical_string).collect();
                format!("call({name}({}) -> {kind})", args.join(","))
            }
            Node::IfElse {
                condition,
                then_branch,
                else_branch,
                kind,
            } => format!(
                "if({}, {}, {}) -> {kind}",
                condition.canonical_string(),
                then_branch.canonical_string(),
                else_branch.canonical_string()
            ),
            Node::Boolean { op, children } => {
                let op = match op {
                    BooleanOp::And => "and",
                    BooleanOp::Or => "or",
                };
                let children: Vec<String> = children.iter().map(Node::canonical_string).collect();
                format!("{op}({})", children.join(","))
            }
        }
    }
}

/// A root node plus an output-field descriptor. Invariant: `root.kind() ==
/// output.kind()`, checked by the validator, not by construction, so that
/// an invalid expression can still be built and handed to `validate` for a
/// structured diagnostic rather than a panic.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Arc<Node>,
    output: FieldDescriptor,
}

impl Expression {
    pub fn new(root: Node, output: FieldDescriptor) -> Self {
        Expression {
            root: Arc::new(root),
            output,
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn output(&self) -> &FieldDescriptor {
        &self.output
    }

    pub fn canonical_string(&self) -> String {
        format!(
            "{} = {}",
            self.output,
            self.root.canonical_string()
        )
    }

    /// True when this expression's string representation mentions `like(`,
    /// the signal the cache uses to decide whether to mix in a salt
    /// (§4.10).
    pub fn mentions_like(&self) -> bool {
        self.canonical_string().contains("like(")
    }
}

/// A boolean-kinded expression named `"cond"` (§3 Condition), used by
/// [`crate::Filter`]-style consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expression: Expression,
}

impl Condition {
    /// Wraps `root` as a condition. Panics if `root`'s declared kind is not
    /// boolean — conditions are always boolean by construction, unlike
    /// general expressions which defer that check to the validator,
    /// because a `Filter` has no other field to declare the output kind
    /// against.
    pub fn new(root: Node) -> Self {
        assert_eq!(
            root.kind(),
            ValueKind::Boolean,
            "condition root must be boolean-kinded, got {:?}",
            root.kind()
        );
        let output = FieldDescriptor::new("cond", ValueKind::Boolean, true);
        Condition {
            expression: Expression::new(root, output),
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn root(&self) -> &Node {
        self.expression.root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_is_self_describing() {
        let n = Node::field("f0", ValueKind::Int32);
        assert_eq!(n.kind(), ValueKind::Int32);
        let b = Node::boolean(BooleanOp::And, vec![n.clone(), n]);
        assert_eq!(b.kind(), ValueKind::Boolean);
    }

    #[test]
    fn canonical_string_is_structural() {
        let a = Node::call(
            "add",
            vec![
                Node::field("f0", ValueKind::Int32),
                Node::field("f1", ValueKind::Int32),
            ],
            ValueKind::Int32,
        );
        let b = Node::call(
            "add",
            vec![
                Node::field("f0", ValueKind::Int32),
                Node::field("f1", ValueKind::Int32),
            ],
            ValueKind::Int32,
        );
        assert_eq!(a.canonical_string(), b.canonical_string());
    }

    #[test]
    fn condition_requires_boolean_root() {
        let cond = Condition::new(Node::literal(LiteralValue::Boolean(true), ValueKind::Boolean));
        assert_eq!(cond.expression().output().name(), "cond");
    }

    #[test]
    #[should_panic(expected = "condition root must be boolean-kinded")]
    fn condition_rejects_non_boolean_root() {
        Condition::new(Node::literal(LiteralValue::Int(1), ValueKind::Int32));
    }
}

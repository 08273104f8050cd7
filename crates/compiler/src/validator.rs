//! The validator (§4.2): checks an [`Expression`] against a [`Schema`] and
//! the function [`Registry`], in the order the specification fixes so the
//! first failure is reported and later checks are skipped.
//!
//! Every [`Node`] already carries its own declared result kind (§3); the
//! validator's job is not to derive kinds but to check that those
//! declarations are consistent with the schema, the registry, and each
//! other.

use crate::registry::Registry;
use vectorize_core::{BooleanOp, Expression, Node, Schema, Status, ValueKind, VResult};

/// Validates `expression` against `schema` and `registry` (§4.2). Checks
/// run in order and the first failure is returned; later checks are
/// skipped:
///
/// 1. every field reference resolves in the schema with matching kind;
/// 2. every function call's declared signature exists in the registry;
/// 3. `if`/`else` arms have identical kinds and the condition is boolean;
/// 4. boolean n-ary nodes have at least two children, all boolean;
/// 5. the root kind equals the expression's declared output kind;
/// 6. the output kind is not variable-width (§4.5: unsupported in this
///    core — the caller must pre-size a fixed-width destination).
pub fn validate(expression: &Expression, schema: &Schema, registry: &Registry) -> VResult<()> {
    check_node(expression.root(), schema, registry)?;
    let root_kind = expression.root().kind();
    if root_kind != expression.output().kind() {
        return Err(Status::expression_validation_error(format!(
            "expression root: declared output kind {} does not match root kind {root_kind}",
            expression.output().kind()
        )));
    }
    if expression.output().kind().is_variable_width() {
        return Err(Status::expression_validation_error(format!(
            "expression root: output kind {} is variable-width, which this core does not support as an expression result",
            expression.output().kind()
        )));
    }
    Ok(())
}

fn check_node(node: &Node, schema: &Schema, registry: &Registry) -> VResult<()> {
    match node {
        Node::Field { name, kind } => match schema.field_by_name(name) {
            None => Err(Status::expression_validation_error(format!(
                "field '{name}': does not resolve in the schema"
            ))),
            Some(field) if field.kind() != *kind => Err(Status::expression_validation_error(
                format!(
                    "field '{name}': declared kind {kind} does not match schema kind {}",
                    field.kind()
                ),
            )),
            Some(_) => Ok(()),
        },
        Node::Literal { .. } => Ok(()),
        Node::Call { name, args, kind } => {
            for arg in args {
                check_node(arg, schema, registry)?;
            }
            let param_kinds: Vec<ValueKind> = args.iter().map(Node::kind).collect();
            match registry.lookup(name, &param_kinds) {
                None => Err(Status::expression_validation_error(format!(
                    "function '{name}': no registry entry for signature {name}({})",
                    param_kinds
                        .iter()
                        .map(ValueKind::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))),
                Some(sig) if sig.result != *kind => Err(Status::expression_validation_error(
                    format!(
                        "function '{name}': declared result kind {kind} does not match registry result kind {}",
                        sig.result
                    ),
                )),
                Some(_) => Ok(()),
            }
        }
        Node::IfElse {
            condition,
            then_branch,
            else_branch,
            kind,
        } => {
            check_node(condition, schema, registry)?;
            check_node(then_branch, schema, registry)?;
            check_node(else_branch, schema, registry)?;
            if condition.kind() != ValueKind::Boolean {
                return Err(Status::expression_validation_error(format!(
                    "if-then-else: condition must be boolean, found {}",
                    condition.kind()
                )));
            }
            if then_branch.kind() != else_branch.kind() {
                return Err(Status::expression_validation_error(format!(
                    "if-then-else: then-branch kind {} does not match else-branch kind {}",
                    then_branch.kind(),
                    else_branch.kind()
                )));
            }
            if then_branch.kind() != *kind {
                return Err(Status::expression_validation_error(format!(
                    "if-then-else: declared kind {kind} does not match branch kind {}",
                    then_branch.kind()
                )));
            }
            Ok(())
        }
        Node::Boolean { op, children } => {
            if children.len() < 2 {
                let op_name = match op {
                    BooleanOp::And => "and",
                    BooleanOp::Or => "or",
                };
                return Err(Status::expression_validation_error(format!(
                    "boolean '{op_name}': requires at least 2 children, found {}",
                    children.len()
                )));
            }
            for child in children {
                check_node(child, schema, registry)?;
                if child.kind() != ValueKind::Boolean {
                    return Err(Status::expression_validation_error(format!(
                        "boolean node: all children must be boolean, found {}",
                        child.kind()
                    )));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vectorize_core::{FieldDescriptor, LiteralValue};

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("a", ValueKind::Int32, true),
            FieldDescriptor::new("b", ValueKind::Int32, true),
        ])
    }

    #[test]
    fn accepts_simple_arithmetic_expression() {
        let reg = Registry::with_builtins();
        let s = schema();
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
        assert!(validate(&expr, &s, &reg).is_ok());
    }

    #[test]
    fn rejects_unresolved_field() {
        let reg = Registry::with_builtins();
        let s = schema();
        let expr = Expression::new(
            Node::field("missing", ValueKind::Int32),
            FieldDescriptor::new("out", ValueKind::Int32, true),
        );
        let err = validate(&expr, &s, &reg).unwrap_err();
        assert!(err.message().contains("missing"));
    }

    #[test]
    fn rejects_field_kind_mismatch() {
        let reg = Registry::with_builtins();
        let s = schema();
        let expr = Expression::new(
            Node::field("a", ValueKind::Float64),
            FieldDescriptor::new("out", ValueKind::Float64, true),
        );
        assert!(validate(&expr, &s, &reg).is_err());
    }

    #[test]
    fn rejects_unknown_function_signature() {
        let reg = Registry::with_builtins();
        let s = schema();
        let expr = Expression::new(
            Node::call(
                "frobnicate",
                vec![Node::field("a", ValueKind::Int32)],
                ValueKind::Int32,
            ),
            FieldDescriptor::new("out", ValueKind::Int32, true),
        );
        assert!(validate(&expr, &s, &reg).is_err());
    }

    #[test]
    fn rejects_if_else_kind_mismatch() {
        let reg = Registry::with_builtins();
        let s = schema();
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
                Node::literal(LiteralValue::Bytes(b"x".to_vec()), ValueKind::Utf8),
                ValueKind::Int32,
            ),
            FieldDescriptor::new("out", ValueKind::Int32, true),
        );
        assert!(validate(&expr, &s, &reg).is_err());
    }

    #[test]
    fn rejects_boolean_node_with_one_child() {
        let reg = Registry::with_builtins();
        let s = schema();
        let expr = Expression::new(
            Node::boolean(
                BooleanOp::And,
                vec![Node::call(
                    "greater_than",
                    vec![
                        Node::field("a", ValueKind::Int32),
                        Node::field("b", ValueKind::Int32),
                    ],
                    ValueKind::Boolean,
                )],
            ),
            FieldDescriptor::new("out", ValueKind::Boolean, true),
        );
        assert!(validate(&expr, &s, &reg).is_err());
    }

    #[test]
    fn rejects_variable_width_output_kind() {
        let reg = Registry::with_builtins();
        let s = schema();
        let expr = Expression::new(
            Node::field("a", ValueKind::Int32),
            FieldDescriptor::new("out", ValueKind::Int32, true),
        );
        // sanity: a fixed-width output of the same shape is accepted.
        assert!(validate(&expr, &s, &reg).is_ok());

        let varwidth_schema = Schema::new(vec![FieldDescriptor::new("name", ValueKind::Utf8, true)]);
        let varwidth_expr = Expression::new(
            Node::field("name", ValueKind::Utf8),
            FieldDescriptor::new("out", ValueKind::Utf8, true),
        );
        let err = validate(&varwidth_expr, &varwidth_schema, &reg).unwrap_err();
        assert!(err.message().contains("variable-width"));
    }

    #[test]
    fn rejects_root_kind_mismatch() {
        let reg = Registry::with_builtins();
        let s = schema();
        let expr = Expression::new(
            Node::field("a", ValueKind::Int32),
            FieldDescriptor::new("out", ValueKind::Float64, true),
        );
        assert!(validate(&expr, &s, &reg).is_err());
    }
}

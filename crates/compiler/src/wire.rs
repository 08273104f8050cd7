//! Wire protocol codec (§6.6 SUPPLEMENT): converts between the protobuf
//! `ExpressionTree` message (`proto/expression.proto`) and the in-memory
//! expression model in `vectorize_core`, so a schema plus a batch of
//! expressions can be shipped to `vectorizec` (or any other host process)
//! without hand-building `Node` trees in Rust.
//!
//! Field references carry no kind on the wire — it is resolved against the
//! accompanying `Schema` at decode time, the same lookup the validator
//! would perform anyway. Literal values do carry an explicit `kind` field,
//! since a literal has no schema entry to resolve it against.

use prost::Message;
use vectorize_core::{
    BooleanOp, Expression, FieldDescriptor, LiteralValue, Node, Schema, Status, TimeUnit, ValueKind, VResult,
};

pub mod proto {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/vectorize.wire.rs"));
}

/// Encodes a schema plus its expressions into the wire format (§6.6).
pub fn encode(schema: &Schema, expressions: &[Expression]) -> Vec<u8> {
    let message = proto::ExpressionTree {
        schema: Some(encode_schema(schema)),
        expressions: expressions.iter().map(encode_expression).collect(),
    };
    message.encode_to_vec()
}

/// Decodes a wire-format expression tree back into a schema plus
/// expressions. Rejects a message missing its schema or any node whose
/// oneof is unset, rather than guessing a default.
pub fn decode(bytes: &[u8]) -> VResult<(Schema, Vec<Expression>)> {
    let message =
        proto::ExpressionTree::decode(bytes).map_err(|e| Status::invalid(format!("malformed expression tree: {e}")))?;
    let schema_msg = message
        .schema
        .ok_or_else(|| Status::invalid("expression tree has no schema"))?;
    let schema = decode_schema(&schema_msg)?;
    let expressions = message
        .expressions
        .iter()
        .map(|e| decode_expression(e, &schema))
        .collect::<VResult<Vec<_>>>()?;
    Ok((schema, expressions))
}

fn encode_schema(schema: &Schema) -> proto::Schema {
    proto::Schema {
        fields: schema.fields().iter().map(encode_field).collect(),
    }
}

fn decode_schema(msg: &proto::Schema) -> VResult<Schema> {
    let fields = msg.fields.iter().map(decode_field).collect::<VResult<Vec<_>>>()?;
    Ok(Schema::new(fields))
}

fn encode_field(field: &FieldDescriptor) -> proto::Field {
    proto::Field {
        name: field.name().to_string(),
        kind: kind_to_wire(field.kind()) as i32,
        nullable: field.nullable(),
    }
}

fn decode_field(msg: &proto::Field) -> VResult<FieldDescriptor> {
    let kind = kind_from_wire(msg.kind)?;
    Ok(FieldDescriptor::new(msg.name.clone(), kind, msg.nullable))
}

fn encode_expression(expr: &Expression) -> proto::Expression {
    proto::Expression {
        root: Some(encode_node(expr.root())),
        output: Some(encode_field(expr.output())),
    }
}

fn decode_expression(msg: &proto::Expression, schema: &Schema) -> VResult<Expression> {
    let root_msg = msg
        .root
        .as_ref()
        .ok_or_else(|| Status::invalid("expression has no root node"))?;
    let output_msg = msg
        .output
        .as_ref()
        .ok_or_else(|| Status::invalid("expression has no output descriptor"))?;
    let root = decode_node(root_msg, schema)?;
    let output = decode_field(output_msg)?;
    Ok(Expression::new(root, output))
}

fn encode_node(node: &Node) -> proto::TreeNode {
    use proto::tree_node::Node as Wire;
    let inner = match node {
        Node::Field { name, .. } => Wire::FieldRef(proto::FieldRef { name: name.clone() }),
        Node::Literal { value, kind } => Wire::Literal(encode_literal(value, *kind)),
        Node::Call { name, args, kind } => Wire::Call(proto::FunctionCall {
            name: name.clone(),
            args: args.iter().map(encode_node).collect(),
            result_kind: kind_to_wire(*kind) as i32,
        }),
        Node::IfElse {
            condition,
            then_branch,
            else_branch,
            kind,
        } => Wire::IfElse(Box::new(proto::IfElse {
            condition: Some(Box::new(encode_node(condition))),
            then_branch: Some(Box::new(encode_node(then_branch))),
            else_branch: Some(Box::new(encode_node(else_branch))),
            result_kind: kind_to_wire(*kind) as i32,
        })),
        Node::Boolean { op, children } => Wire::Boolean(proto::BooleanNode {
            op: boolean_op_to_wire(*op) as i32,
            args: children.iter().map(encode_node).collect(),
        }),
    };
    proto::TreeNode { node: Some(inner) }
}

fn decode_node(msg: &proto::TreeNode, schema: &Schema) -> VResult<Node> {
    use proto::tree_node::Node as Wire;
    match &msg.node {
        Some(Wire::FieldRef(field_ref)) => {
            let field = schema.field_by_name(&field_ref.name).ok_or_else(|| {
                Status::invalid(format!("unknown field '{}' referenced on the wire", field_ref.name))
            })?;
            Ok(Node::field(field_ref.name.clone(), field.kind()))
        }
        Some(Wire::Literal(lit)) => {
            let (value, kind) = decode_literal(lit)?;
            Ok(Node::literal(value, kind))
        }
        Some(Wire::Call(call)) => {
            let kind = kind_from_wire(call.result_kind)?;
            let args = call.args.iter().map(|a| decode_node(a, schema)).collect::<VResult<Vec<_>>>()?;
            Ok(Node::call(call.name.clone(), args, kind))
        }
        Some(Wire::IfElse(if_else)) => {
            let kind = kind_from_wire(if_else.result_kind)?;
            let condition = decode_node(
                if_else
                    .condition
                    .as_deref()
                    .ok_or_else(|| Status::invalid("if-else node has no condition"))?,
                schema,
            )?;
            let then_branch = decode_node(
                if_else
                    .then_branch
                    .as_deref()
                    .ok_or_else(|| Status::invalid("if-else node has no then-branch"))?,
                schema,
            )?;
            let else_branch = decode_node(
                if_else
                    .else_branch
                    .as_deref()
                    .ok_or_else(|| Status::invalid("if-else node has no else-branch"))?,
                schema,
            )?;
            Ok(Node::if_else(condition, then_branch, else_branch, kind))
        }
        Some(Wire::Boolean(boolean)) => {
            let op = boolean_op_from_wire(boolean.op)?;
            let children = boolean.args.iter().map(|a| decode_node(a, schema)).collect::<VResult<Vec<_>>>()?;
            Ok(Node::boolean(op, children))
        }
        None => Err(Status::invalid("tree node has no variant set")),
    }
}

fn encode_literal(value: &LiteralValue, kind: ValueKind) -> proto::LiteralValue {
    use proto::literal_value::Value;
    let wire_value = match value {
        LiteralValue::Null => Value::IsNull(true),
        LiteralValue::Boolean(b) => Value::BoolValue(*b),
        LiteralValue::Int(i) => Value::IntValue(*i),
        LiteralValue::Float(f) => Value::FloatValue(*f),
        LiteralValue::Bytes(bytes) if kind == ValueKind::Utf8 => {
            Value::StringValue(String::from_utf8_lossy(bytes).into_owned())
        }
        LiteralValue::Bytes(bytes) => Value::BinaryValue(bytes.clone()),
    };
    proto::LiteralValue {
        value: Some(wire_value),
        kind: kind_to_wire(kind) as i32,
    }
}

fn decode_literal(msg: &proto::LiteralValue) -> VResult<(LiteralValue, ValueKind)> {
    use proto::literal_value::Value;
    let kind = kind_from_wire(msg.kind)?;
    let value = match &msg.value {
        Some(Value::IsNull(_)) => LiteralValue::Null,
        Some(Value::BoolValue(b)) => LiteralValue::Boolean(*b),
        Some(Value::IntValue(i)) => LiteralValue::Int(*i),
        Some(Value::FloatValue(f)) => LiteralValue::Float(*f),
        Some(Value::StringValue(s)) => LiteralValue::Bytes(s.clone().into_bytes()),
        Some(Value::BinaryValue(b)) => LiteralValue::Bytes(b.clone()),
        None => return Err(Status::invalid("literal value has no oneof set")),
    };
    Ok((value, kind))
}

fn kind_to_wire(kind: ValueKind) -> proto::ValueKind {
    match kind {
        ValueKind::Boolean => proto::ValueKind::Boolean,
        ValueKind::Int8 => proto::ValueKind::Int8,
        ValueKind::Int16 => proto::ValueKind::Int16,
        ValueKind::Int32 => proto::ValueKind::Int32,
        ValueKind::Int64 => proto::ValueKind::Int64,
        ValueKind::Float32 => proto::ValueKind::Float32,
        ValueKind::Float64 => proto::ValueKind::Float64,
        ValueKind::Utf8 => proto::ValueKind::Utf8,
        ValueKind::Binary => proto::ValueKind::Binary,
        ValueKind::Date32 => proto::ValueKind::DateMillis,
        ValueKind::Time32 => proto::ValueKind::TimeMillis,
        ValueKind::Timestamp(TimeUnit::Millisecond) => proto::ValueKind::TimestampMillis,
    }
}

fn kind_from_wire(raw: i32) -> VResult<ValueKind> {
    match proto::ValueKind::try_from(raw) {
        Ok(proto::ValueKind::Boolean) => Ok(ValueKind::Boolean),
        Ok(proto::ValueKind::Int8) => Ok(ValueKind::Int8),
        Ok(proto::ValueKind::Int16) => Ok(ValueKind::Int16),
        Ok(proto::ValueKind::Int32) => Ok(ValueKind::Int32),
        Ok(proto::ValueKind::Int64) => Ok(ValueKind::Int64),
        Ok(proto::ValueKind::Float32) => Ok(ValueKind::Float32),
        Ok(proto::ValueKind::Float64) => Ok(ValueKind::Float64),
        Ok(proto::ValueKind::Utf8) => Ok(ValueKind::Utf8),
        Ok(proto::ValueKind::Binary) => Ok(ValueKind::Binary),
        Ok(proto::ValueKind::DateMillis) => Ok(ValueKind::Date32),
        Ok(proto::ValueKind::TimeMillis) => Ok(ValueKind::Time32),
        Ok(proto::ValueKind::TimestampMillis) => Ok(ValueKind::Timestamp(TimeUnit::Millisecond)),
        _ => Err(Status::invalid(format!("unrecognised or unspecified value kind ({raw}) on the wire"))),
    }
}

fn boolean_op_to_wire(op: BooleanOp) -> proto::BooleanOp {
    match op {
        BooleanOp::And => proto::BooleanOp::And,
        BooleanOp::Or => proto::BooleanOp::Or,
    }
}

fn boolean_op_from_wire(raw: i32) -> VResult<BooleanOp> {
    match proto::BooleanOp::try_from(raw) {
        Ok(proto::BooleanOp::And) => Ok(BooleanOp::And),
        Ok(proto::BooleanOp::Or) => Ok(BooleanOp::Or),
        _ => Err(Status::invalid("boolean node has an unspecified operator on the wire")),
    }
}

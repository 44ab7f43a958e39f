use crate::core::value::Value;

/// A positional row: value `i` belongs to field `i` of the descriptor.
pub type Row = Vec<Value>;

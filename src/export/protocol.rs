//! Structured binary encoding for export records.
//!
//! `Protocol` is the abstract writer surface records render through;
//! `BinaryProtocol` is the concrete Thrift strict-binary implementation
//! the tracing backend consumes. Writers are framed (struct/field/
//! list/map/set begin and end) so record code reads like the schema.

use crate::core::error::{Result, TracekitError};
use bytes::BufMut;

/// Nesting depth the encoder accepts before failing fast.
pub const DEFAULT_RECURSION_LIMIT: usize = 64;

/// Thrift wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Field terminator
    Stop,
    /// Boolean
    Bool,
    /// Signed 8-bit integer
    I8,
    /// 64-bit float
    Double,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Length-prefixed UTF-8 string or raw binary
    String,
    /// Nested struct
    Struct,
    /// Map
    Map,
    /// Set
    Set,
    /// List
    List,
}

impl FieldType {
    /// The wire byte for this type.
    pub fn code(self) -> i8 {
        match self {
            FieldType::Stop => 0,
            FieldType::Bool => 2,
            FieldType::I8 => 3,
            FieldType::Double => 4,
            FieldType::I16 => 6,
            FieldType::I32 => 8,
            FieldType::I64 => 10,
            FieldType::String => 11,
            FieldType::Struct => 12,
            FieldType::Map => 13,
            FieldType::Set => 14,
            FieldType::List => 15,
        }
    }
}

/// Abstract structured writer over a byte sink.
///
/// Struct writes must be bracketed by `enter_recursion`/`exit_recursion`
/// so adversarially nested input fails fast instead of overflowing the
/// call stack. Callers pair the two around the whole write so the
/// counter unwinds to its pre-call value on every path, including errors.
pub trait Protocol {
    /// Claims one level of nesting; fails at the configured limit.
    fn enter_recursion(&mut self) -> Result<()>;

    /// Releases one level of nesting.
    fn exit_recursion(&mut self);

    /// Begins a struct frame.
    fn write_struct_begin(&mut self, name: &str) -> Result<()>;

    /// Ends the current struct frame.
    fn write_struct_end(&mut self) -> Result<()>;

    /// Begins a numbered field.
    fn write_field_begin(&mut self, name: &str, field_type: FieldType, id: i16) -> Result<()>;

    /// Ends the current field.
    fn write_field_end(&mut self) -> Result<()>;

    /// Terminates the field sequence of the current struct.
    fn write_field_stop(&mut self) -> Result<()>;

    /// Begins a list of `size` elements.
    fn write_list_begin(&mut self, element_type: FieldType, size: usize) -> Result<()>;

    /// Ends the current list.
    fn write_list_end(&mut self) -> Result<()>;

    /// Begins a set of `size` elements.
    fn write_set_begin(&mut self, element_type: FieldType, size: usize) -> Result<()>;

    /// Ends the current set.
    fn write_set_end(&mut self) -> Result<()>;

    /// Begins a map of `size` entries.
    fn write_map_begin(
        &mut self,
        key_type: FieldType,
        value_type: FieldType,
        size: usize,
    ) -> Result<()>;

    /// Ends the current map.
    fn write_map_end(&mut self) -> Result<()>;

    /// Writes a boolean.
    fn write_bool(&mut self, value: bool) -> Result<()>;

    /// Writes a signed 8-bit integer.
    fn write_i8(&mut self, value: i8) -> Result<()>;

    /// Writes a signed 16-bit integer.
    fn write_i16(&mut self, value: i16) -> Result<()>;

    /// Writes a signed 32-bit integer.
    fn write_i32(&mut self, value: i32) -> Result<()>;

    /// Writes a signed 64-bit integer.
    fn write_i64(&mut self, value: i64) -> Result<()>;

    /// Writes a 64-bit float.
    fn write_double(&mut self, value: f64) -> Result<()>;

    /// Writes length-prefixed raw bytes.
    fn write_binary(&mut self, bytes: &[u8]) -> Result<()>;

    /// Writes a string as length-prefixed UTF-8 binary.
    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_binary(value.as_bytes())
    }
}

#[derive(Debug)]
struct RecursionTracker {
    depth: usize,
    limit: usize,
}

impl RecursionTracker {
    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.limit {
            return Err(TracekitError::DepthLimitExceeded { limit: self.limit });
        }
        self.depth += 1;
        Ok(())
    }

    fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Thrift strict binary writer: big-endian integers, f64 bit patterns,
/// field header = type byte + i16 id, i32 length prefixes, struct
/// framing carries no bytes of its own.
pub struct BinaryProtocol<B> {
    sink: B,
    recursion: RecursionTracker,
}

impl<B: BufMut> BinaryProtocol<B> {
    /// Creates a writer with the default recursion limit.
    pub fn new(sink: B) -> Self {
        Self::with_recursion_limit(sink, DEFAULT_RECURSION_LIMIT)
    }

    /// Creates a writer with an explicit recursion limit.
    pub fn with_recursion_limit(sink: B, limit: usize) -> Self {
        Self {
            sink,
            recursion: RecursionTracker { depth: 0, limit },
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.recursion.depth
    }

    /// The underlying sink.
    pub fn get_ref(&self) -> &B {
        &self.sink
    }

    /// Consumes the writer, returning the sink.
    pub fn into_inner(self) -> B {
        self.sink
    }

    fn write_size(&mut self, size: usize) -> Result<()> {
        let size = i32::try_from(size)
            .map_err(|_| TracekitError::encode(format!("collection too large: {} elements", size)))?;
        self.sink.put_i32(size);
        Ok(())
    }
}

impl<B: BufMut> Protocol for BinaryProtocol<B> {
    fn enter_recursion(&mut self) -> Result<()> {
        self.recursion.enter()
    }

    fn exit_recursion(&mut self) {
        self.recursion.exit();
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, _name: &str, field_type: FieldType, id: i16) -> Result<()> {
        self.sink.put_i8(field_type.code());
        self.sink.put_i16(id);
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<()> {
        self.sink.put_i8(FieldType::Stop.code());
        Ok(())
    }

    fn write_list_begin(&mut self, element_type: FieldType, size: usize) -> Result<()> {
        self.sink.put_i8(element_type.code());
        self.write_size(size)
    }

    fn write_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, element_type: FieldType, size: usize) -> Result<()> {
        self.sink.put_i8(element_type.code());
        self.write_size(size)
    }

    fn write_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_begin(
        &mut self,
        key_type: FieldType,
        value_type: FieldType,
        size: usize,
    ) -> Result<()> {
        self.sink.put_i8(key_type.code());
        self.sink.put_i8(value_type.code());
        self.write_size(size)
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.sink.put_u8(u8::from(value));
        Ok(())
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.sink.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.sink.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.sink.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.sink.put_i64(value);
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.sink.put_f64(value);
        Ok(())
    }

    fn write_binary(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_size(bytes.len())?;
        self.sink.put_slice(bytes);
        Ok(())
    }
}

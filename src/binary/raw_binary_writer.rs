use std::io::Write;
use std::mem;
use std::sync::Arc;

use arrayvec::ArrayVec;
use smallvec::SmallVec;

use crate::binary::block::{pooled_block_allocator_provider, BlockAllocatorProvider};
use crate::binary::constants::v1_0::{
    length_codes, type_descriptors, IVM, MAX_ANNOTATIONS_LENGTH, MAX_INLINE_LENGTH,
};
use crate::binary::type_code::IonTypeCode;
use crate::binary::var_uint::VarUInt;
use crate::binary::write_buffer::WriteBuffer;
use crate::constants::v1_0::system_symbol_ids;
use crate::raw_symbol_token_ref::{AsRawSymbolTokenRef, RawSymbolTokenRef};
use crate::result::{encoding_error, illegal_operation, illegal_operation_raw, IonResult};
use crate::types::{Decimal, Int, IonType, Precision, Sign, SymbolId, Timestamp};
use crate::writer::IonWriter;

/// The block size used by writers that do not configure one.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

const INITIAL_CONTAINERS_CAPACITY: usize = 16;

/// How many bytes a container or annotation wrapper reserves for its length when it is opened.
///
/// Reserving more bytes means fewer containers need a side patch when they are closed, at the
/// cost of padding in small containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreallocationMode {
    /// Reserve nothing. Lengths up to 13 are folded into the type descriptor; longer ones are
    /// always side-patched.
    Preallocate0,
    /// Reserve a single VarUInt byte, enough for lengths up to 127.
    Preallocate1,
    /// Reserve two VarUInt bytes, enough for lengths up to 16383.
    #[default]
    Preallocate2,
}

impl PreallocationMode {
    pub fn with_pad_size(pad: usize) -> IonResult<Self> {
        match pad {
            0 => Ok(PreallocationMode::Preallocate0),
            1 => Ok(PreallocationMode::Preallocate1),
            2 => Ok(PreallocationMode::Preallocate2),
            _ => illegal_operation(format!("no preallocation mode for a pad size of {pad}")),
        }
    }

    /// The longest content whose length fits in the reserved bytes.
    pub const fn content_max_length(self) -> usize {
        match self {
            PreallocationMode::Preallocate0 => 0,
            PreallocationMode::Preallocate1 => 0x7F,
            PreallocationMode::Preallocate2 => 0x3FFF,
        }
    }

    /// The size of the type descriptor plus the reserved length bytes.
    pub const fn typed_length(self) -> usize {
        match self {
            PreallocationMode::Preallocate0 => 1,
            PreallocationMode::Preallocate1 => 2,
            PreallocationMode::Preallocate2 => 3,
        }
    }

    // A type descriptor with a VarUInt length code followed by a zero-valued, padded VarUInt.
    fn typed_preallocated_bytes(self, type_code: IonTypeCode) -> ArrayVec<u8, 3> {
        let mut bytes = ArrayVec::new();
        bytes.push(type_code.type_descriptor(length_codes::VAR_UINT));
        for _ in 1..self.typed_length() {
            bytes.push(0x00);
        }
        if self.typed_length() > 1 {
            bytes[self.typed_length() - 1] = 0x80;
        }
        bytes
    }

    fn patch_length(self, buffer: &mut WriteBuffer, position: usize, length: usize) -> IonResult<()> {
        match self {
            PreallocationMode::Preallocate0 => {
                illegal_operation("cannot patch a length in place without preallocated bytes")
            }
            PreallocationMode::Preallocate1 => {
                buffer.write_var_uint_direct1_at(position, length as u64);
                Ok(())
            }
            PreallocationMode::Preallocate2 => {
                buffer.write_var_uint_direct2_at(position, length as u64);
                Ok(())
            }
        }
    }
}

/// Whether closing a writer also closes (flushes and drops) its output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamCloseMode {
    #[default]
    NoClose,
    Close,
}

/// Whether finishing a writer also flushes its output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFlushMode {
    #[default]
    NoFlush,
    Flush,
}

pub struct RawBinaryWriterBuilder {
    block_size: usize,
    allocator_provider: Option<Arc<dyn BlockAllocatorProvider>>,
    preallocation_mode: PreallocationMode,
    is_float_binary32_enabled: bool,
    stream_flush_mode: StreamFlushMode,
    stream_close_mode: StreamCloseMode,
}

impl RawBinaryWriterBuilder {
    pub fn new() -> Self {
        RawBinaryWriterBuilder {
            block_size: DEFAULT_BLOCK_SIZE,
            allocator_provider: None,
            preallocation_mode: PreallocationMode::default(),
            is_float_binary32_enabled: false,
            stream_flush_mode: StreamFlushMode::default(),
            stream_close_mode: StreamCloseMode::default(),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_block_allocator_provider(
        mut self,
        provider: Arc<dyn BlockAllocatorProvider>,
    ) -> Self {
        self.allocator_provider = Some(provider);
        self
    }

    pub fn with_preallocation_mode(mut self, mode: PreallocationMode) -> Self {
        self.preallocation_mode = mode;
        self
    }

    pub fn with_float_binary32_enabled(mut self, enabled: bool) -> Self {
        self.is_float_binary32_enabled = enabled;
        self
    }

    pub fn with_stream_flush_mode(mut self, mode: StreamFlushMode) -> Self {
        self.stream_flush_mode = mode;
        self
    }

    pub fn with_stream_close_mode(mut self, mode: StreamCloseMode) -> Self {
        self.stream_close_mode = mode;
        self
    }

    /// Creates a new RawBinaryWriter that will write its encoded output to the provided
    /// io::Write sink.
    pub fn build<W: Write>(self, out: W) -> IonResult<RawBinaryWriter<W>> {
        if self.block_size == 0 {
            return illegal_operation("block size must be at least 1 byte");
        }
        let provider = self
            .allocator_provider
            .unwrap_or_else(pooled_block_allocator_provider);
        Ok(RawBinaryWriter {
            out: Some(out),
            stream_close_mode: self.stream_close_mode,
            stream_flush_mode: self.stream_flush_mode,
            preallocation_mode: self.preallocation_mode,
            is_float_binary32_enabled: self.is_float_binary32_enabled,
            buffer: WriteBuffer::new(provider.vend_allocator(self.block_size)),
            patch_buffer: WriteBuffer::new(provider.vend_allocator(self.block_size)),
            patch_points: Vec::new(),
            containers: Vec::with_capacity(INITIAL_CONTAINERS_CAPACITY),
            depth: 0,
            has_written_values_since_finished: false,
            has_written_values_since_constructed: false,
            field_id: None,
            annotations: SmallVec::new(),
            has_top_level_symbol_table_annotation: false,
            closed: false,
        })
    }
}

impl Default for RawBinaryWriterBuilder {
    fn default() -> Self {
        RawBinaryWriterBuilder::new()
    }
}

// Ion's length prefixing requires that a container's length be known before its contents can be
// written out. Rather than encoding containers out of order, the writer encodes every value in
// stream order into a single buffer, reserving a few bytes for each container's length when it
// is opened:
//
//     [offset] 0    1    2    3      6
//     buffer : de | 00 | 80 | 8a 21 01 ...
//              ^    ^^^^^^^   ^-- first field of the struct
//              |    +-------- two reserved VarUInt bytes (Preallocate2)
//              +------------- struct type descriptor with a VarUInt length code
//
// When the container is closed its length is known. If it fits in the reserved bytes, they are
// overwritten in place. If it does not, the real length is written to a separate patch buffer and
// a PatchPoint records which reserved bytes it replaces. `finish()` then makes a single pass over
// the buffer, splicing each patch in as it goes.

/// A span of reserved bytes in the main buffer that must be replaced by bytes from the patch
/// buffer when the stream is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PatchPoint {
    // Position and size of the reserved bytes in the main buffer.
    old_position: usize,
    old_length: usize,
    // Position and size of the replacement bytes in the patch buffer.
    patch_position: usize,
    patch_length: usize,
}

// Patch points are always recorded in increasing `old_position` order.
type PatchList = Vec<PatchPoint>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerType {
    List,
    SExp,
    Struct,
    // Accounting only: tracks the length of a variable-size scalar (decimal, timestamp).
    Value,
    // The wrapper around an annotated value. Closed automatically when the value is finished.
    Annotation,
}

impl ContainerType {
    fn allowed_in_step_out(self) -> bool {
        matches!(
            self,
            ContainerType::List | ContainerType::SExp | ContainerType::Struct
        )
    }

    fn ion_type(self) -> Option<IonType> {
        match self {
            ContainerType::List => Some(IonType::List),
            ContainerType::SExp => Some(IonType::SExp),
            ContainerType::Struct => Some(IonType::Struct),
            ContainerType::Value | ContainerType::Annotation => None,
        }
    }
}

// One entry per open container, annotation wrapper, or variable-size scalar.
#[derive(Debug)]
struct ContainerInfo {
    container_type: ContainerType,
    // The position just past the type descriptor, where the length bytes begin.
    position: usize,
    // The number of content bytes written so far.
    length: usize,
    // Patches for values nested in this container.
    patches: PatchList,
}

/// A system-level streaming binary Ion writer. This writer does not provide symbol table
/// management; symbol-related operations (e.g. setting field IDs and annotations or writing symbol
/// values) require a valid symbol ID to be provided by the caller.
///
/// Nothing reaches the output sink until [RawBinaryWriter::finish] is called. To produce a valid
/// binary Ion stream, the writer MUST call [IonWriter::write_ion_version_marker] before writing any
/// data.
pub struct RawBinaryWriter<W: Write> {
    // An io::Write implementation to be used as a sink for encoded data. Released by `close()`
    // in StreamCloseMode::Close.
    out: Option<W>,
    stream_close_mode: StreamCloseMode,
    stream_flush_mode: StreamFlushMode,
    preallocation_mode: PreallocationMode,
    is_float_binary32_enabled: bool,
    buffer: WriteBuffer,
    // Holds the real lengths of containers that outgrew their reserved bytes.
    patch_buffer: WriteBuffer,
    // Patches for top-level values.
    patch_points: PatchList,
    containers: Vec<ContainerInfo>,
    depth: usize,
    has_written_values_since_finished: bool,
    has_written_values_since_constructed: bool,
    field_id: Option<SymbolId>,
    annotations: SmallVec<[SymbolId; 4]>,
    has_top_level_symbol_table_annotation: bool,
    closed: bool,
}

impl<W: Write> RawBinaryWriter<W> {
    #[inline]
    fn update_length(&mut self, length: usize) {
        if let Some(container) = self.containers.last_mut() {
            container.length += length;
        }
    }

    fn push_container(&mut self, container_type: ContainerType) {
        self.containers.push(ContainerInfo {
            container_type,
            position: self.buffer.position() + 1,
            length: 0,
            patches: PatchList::new(),
        });
    }

    fn add_patch_point(&mut self, position: usize, old_length: usize, value: usize) {
        let patch_position = self.patch_buffer.position();
        let patch_length = self.patch_buffer.write_var_uint(value as u64);
        let patch = PatchPoint {
            old_position: position,
            old_length,
            patch_position,
            patch_length,
        };
        log::trace!("side-patching a length of {value} at position {position}");
        match self.containers.last_mut() {
            Some(container) => container.patches.push(patch),
            None => self.patch_points.push(patch),
        }
        debug_assert!(patch_length >= old_length);
        self.update_length(patch_length - old_length);
    }

    fn extend_patch_points(&mut self, patches: &mut PatchList) {
        match self.containers.last_mut() {
            Some(container) => container.patches.append(patches),
            None => self.patch_points.append(patches),
        }
    }

    fn pop_container(&mut self) -> IonResult<ContainerInfo> {
        let mut current = self
            .containers
            .pop()
            .ok_or_else(|| illegal_operation_raw("tried to pop a container that was never opened"))?;
        let length = current.length;
        if current.container_type != ContainerType::Value {
            let position = current.position;
            let mode = self.preallocation_mode;
            if length <= mode.content_max_length() && mode != PreallocationMode::Preallocate0 {
                mode.patch_length(&mut self.buffer, position, length)?;
            } else if length <= MAX_INLINE_LENGTH && mode == PreallocationMode::Preallocate0 {
                let type_position = position - 1;
                let type_descriptor =
                    (self.buffer.get_u8_at(type_position) & 0xF0) | length as u8;
                self.buffer.write_u8_at(type_position, type_descriptor);
            } else {
                self.add_patch_point(position, mode.typed_length() - 1, length);
            }
        }
        let mut patches = mem::take(&mut current.patches);
        if !patches.is_empty() {
            self.extend_patch_points(&mut patches);
        }
        self.update_length(length);
        Ok(current)
    }

    fn write_var_uint(&mut self, value: u64) {
        let length = self.buffer.write_var_uint(value);
        self.update_length(length);
    }

    fn write_var_int(&mut self, value: i64) {
        let length = self.buffer.write_var_int(value);
        self.update_length(length);
    }

    fn current_container_type(&self) -> Option<ContainerType> {
        self.containers.last().map(|c| c.container_type)
    }

    // Writes the pending field name and opens the pending annotation wrapper, if any. Callers
    // must not fail after this returns `Ok`; everything that can be rejected is checked first.
    fn prepare_value(&mut self) -> IonResult<()> {
        if self.current_container_type() == Some(ContainerType::Struct) && self.field_id.is_none()
        {
            return illegal_operation(
                "set_field_name() must be called before writing a value into a struct",
            );
        }

        if let Some(field_id) = self.field_id.take() {
            self.write_var_uint(field_id as u64);
        }

        if !self.annotations.is_empty() {
            let mode = self.preallocation_mode;
            self.update_length(mode.typed_length());
            self.push_container(ContainerType::Annotation);
            self.buffer
                .write_bytes(&mode.typed_preallocated_bytes(IonTypeCode::AnnotationOrIvm));
            let annotations_length_position = self.buffer.position();
            self.buffer.write_var_uint(0);
            let mut annotations_length = 0;
            for sid in &self.annotations {
                annotations_length += self.buffer.write_var_uint(*sid as u64);
            }
            self.update_length(1 + annotations_length);
            self.buffer
                .write_var_uint_direct1_at(annotations_length_position, annotations_length as u64);
            self.annotations.clear();
            self.has_top_level_symbol_table_annotation = false;
        }
        Ok(())
    }

    // Closes the annotation wrapper, if any.
    fn finish_value(&mut self) -> IonResult<()> {
        if self.current_container_type() == Some(ContainerType::Annotation) {
            self.pop_container()?;
        }
        self.has_written_values_since_finished = true;
        self.has_written_values_since_constructed = true;
        Ok(())
    }

    // Writes a type descriptor followed by the minimal big-endian bytes of `value`. Does not
    // prepare or finish the value.
    fn write_typed_uint(&mut self, type_code: IonTypeCode, value: u64) {
        let octets = (8 - (value.leading_zeros() / 8) as usize).max(1);
        self.update_length(1 + octets);
        self.buffer.write_byte(type_code.type_descriptor(octets as u8));
        self.buffer.write_uint(value, octets);
    }

    // Writes a type descriptor, a length, and then `data`. Does not prepare or finish the value.
    fn write_typed_bytes(&mut self, type_code: IonTypeCode, data: &[u8]) {
        let mut total_length = 1 + data.len();
        if data.len() <= MAX_INLINE_LENGTH {
            self.buffer.write_byte(type_code.type_descriptor(data.len() as u8));
        } else {
            self.buffer
                .write_byte(type_code.type_descriptor(length_codes::VAR_UINT));
            total_length += self.buffer.write_var_uint(data.len() as u64);
        }
        self.update_length(total_length);
        self.buffer.write_bytes(data);
    }

    // Encodes the exponent and coefficient of a decimal into the current (value) container.
    fn write_decimal_value(&mut self, value: &Decimal) {
        self.write_var_int(value.exponent());
        let coefficient = value.coefficient();
        if coefficient.is_negative_zero() {
            // Negative zero has to be spelled out as a signed zero.
            self.update_length(1);
            self.buffer.write_byte(0x80);
            return;
        }
        if coefficient.is_zero() {
            // Positive zero needs no coefficient bytes at all.
            return;
        }
        match coefficient.as_i64() {
            Some(i64::MIN) => {
                // The magnitude needs all 64 bits, so the sign gets a byte of its own.
                self.update_length(9);
                self.buffer.write_byte(0x80);
                self.buffer.write_uint(i64::MIN as u64, 8);
            }
            Some(mantissa) => {
                let magnitude_bits = u64::BITS - mantissa.unsigned_abs().leading_zeros();
                let octets = (magnitude_bits as usize + 1).div_ceil(8);
                self.update_length(octets);
                self.buffer.write_int(mantissa, octets);
            }
            None => {
                let mut bytes = coefficient.magnitude().to_be_bytes_minimal();
                let sign_bit = if coefficient.sign() == Sign::Negative {
                    0x80
                } else {
                    0x00
                };
                if bytes[0] & 0x80 == 0 {
                    bytes[0] |= sign_bit;
                } else {
                    // No room in the leading byte for the sign.
                    self.update_length(1);
                    self.buffer.write_byte(sign_bit);
                }
                self.update_length(bytes.len());
                self.buffer.write_bytes(&bytes);
            }
        }
    }

    // Sets the length nibble of a decimal or timestamp whose content has been written, falling
    // back to a side patch if it does not fit.
    fn patch_single_byte_typed_optimistic_value(
        &mut self,
        type_code: IonTypeCode,
        info: &ContainerInfo,
    ) {
        if info.length <= MAX_INLINE_LENGTH {
            self.buffer.write_u8_at(
                info.position - 1,
                type_code.type_descriptor(info.length as u8),
            );
        } else {
            self.buffer.write_u8_at(
                info.position - 1,
                type_code.type_descriptor(length_codes::VAR_UINT),
            );
            self.add_patch_point(info.position, 0, info.length);
        }
    }

    fn write_optimistic_value(
        &mut self,
        type_code: IonTypeCode,
        write_content: impl FnOnce(&mut Self),
    ) -> IonResult<()> {
        // Most decimals and timestamps are short enough to keep their length in the type nibble.
        self.update_length(1);
        self.push_container(ContainerType::Value);
        self.buffer.write_byte(type_code.type_descriptor(0));
        write_content(self);
        let info = self.pop_container()?;
        self.patch_single_byte_typed_optimistic_value(type_code, &info);
        Ok(())
    }

    fn expect_symbol_id(token: RawSymbolTokenRef, usage: &str) -> IonResult<SymbolId> {
        match token {
            RawSymbolTokenRef::SymbolId(0) => {
                illegal_operation(format!("symbol ID 0 cannot be used as {usage}"))
            }
            RawSymbolTokenRef::SymbolId(sid) => Ok(sid),
            RawSymbolTokenRef::Text(text) => illegal_operation(format!(
                "the raw binary writer cannot write text ('{text}') as {usage}; a symbol ID is required"
            )),
        }
    }

    /// Returns the number of bytes currently buffered. Positions are only meaningful until the
    /// next [finish](Self::finish).
    pub fn position(&self) -> usize {
        self.buffer.position()
    }

    /// Discards everything written since `position`, including any side patches recorded for it.
    /// Only top-level values can be discarded.
    pub fn truncate(&mut self, position: usize) -> IonResult<()> {
        if !self.containers.is_empty() {
            return illegal_operation("cannot truncate while inside of a container");
        }
        if position > self.buffer.position() {
            return illegal_operation(format!(
                "cannot truncate to {position}; only {} bytes have been written",
                self.buffer.position()
            ));
        }
        self.buffer.truncate(position);
        if let Some(index) = self
            .patch_points
            .iter()
            .position(|patch| patch.old_position >= position)
        {
            self.patch_buffer
                .truncate(self.patch_points[index].patch_position);
            self.patch_points.truncate(index);
        }
        if position == 0 {
            // Nothing written since the last finish() survives.
            self.has_written_values_since_finished = false;
        }
        Ok(())
    }

    /// Returns `true` if a value has been written since construction or the last `finish()`.
    pub fn has_written_values_since_finished(&self) -> bool {
        self.has_written_values_since_finished
    }

    /// Returns `true` if a value has been written since the writer was constructed.
    pub fn has_written_values_since_constructed(&self) -> bool {
        self.has_written_values_since_constructed
    }

    /// Returns `true` if the pending annotations are on a top-level value and include
    /// `$ion_symbol_table`.
    pub fn has_top_level_symbol_table_annotation(&self) -> bool {
        self.has_top_level_symbol_table_annotation
    }

    /// Returns the symbol ID of the pending field name, if one is set.
    pub fn field_id(&self) -> Option<SymbolId> {
        self.field_id
    }

    /// Writes pre-encoded Ion bytes as the next value. The bytes are trusted to be a single,
    /// complete value that is valid in the current context.
    pub fn write_bytes(&mut self, data: &[u8]) -> IonResult<()> {
        self.prepare_value()?;
        self.update_length(data.len());
        self.buffer.write_bytes(data);
        self.finish_value()
    }

    // Writes the buffered stream to `out`, splicing in side patches.
    fn write_patched<O: Write>(
        buffer: &WriteBuffer,
        patch_buffer: &WriteBuffer,
        patch_points: &[PatchPoint],
        out: &mut O,
    ) -> IonResult<()> {
        if patch_points.is_empty() {
            return buffer.write_to(out);
        }
        let mut buffer_position = 0;
        for patch in patch_points {
            buffer.write_range_to(out, buffer_position, patch.old_position - buffer_position)?;
            patch_buffer.write_range_to(out, patch.patch_position, patch.patch_length)?;
            buffer_position = patch.old_position + patch.old_length;
        }
        buffer.write_range_to(out, buffer_position, buffer.position() - buffer_position)
    }

    fn check_finishable(&self) -> IonResult<()> {
        if !self.containers.is_empty() {
            return illegal_operation(format!(
                "cannot finish within a container (depth {})",
                self.depth
            ));
        }
        Ok(())
    }

    fn reset_buffers(&mut self) {
        self.patch_points.clear();
        self.patch_buffer.reset();
        self.buffer.reset();
        self.has_written_values_since_finished = false;
    }

    /// Like `finish()`, but writes the buffered stream to `out` instead of this writer's own sink.
    /// The writer's sink is neither written nor flushed.
    pub fn finish_to<O: Write>(&mut self, out: &mut O) -> IonResult<()> {
        self.check_finishable()?;
        Self::write_patched(&self.buffer, &self.patch_buffer, &self.patch_points, out)?;
        self.reset_buffers();
        Ok(())
    }

    fn sink(&mut self) -> IonResult<&mut W> {
        self.out
            .as_mut()
            .ok_or_else(|| illegal_operation_raw("the writer's output has already been closed"))
    }

    /// Flushes the buffered stream (if any) and releases all buffer memory. Calling `close()`
    /// more than once has no further effect. A writer that is closed while inside of a container
    /// discards its unfinished content.
    ///
    /// In [StreamCloseMode::Close], the output sink is flushed and dropped.
    pub fn close(&mut self) -> IonResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = match IonWriter::finish(self) {
            Err(e) if e.is_illegal_operation() => Ok(()),
            other => other,
        };
        // Release all of our blocks, even if finishing failed.
        self.containers.clear();
        self.patch_points.clear();
        self.buffer.close();
        self.patch_buffer.close();
        log::debug!("closed raw binary writer");
        if self.stream_close_mode == StreamCloseMode::Close {
            if let Some(mut out) = self.out.take() {
                let flushed = out.flush();
                drop(out);
                return result.and(flushed.map_err(Into::into));
            }
        }
        result
    }

    /// Returns `true` once `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Consumes the writer, returning its output sink if it still holds one. Buffered data that
    /// has not been finished is discarded.
    pub fn into_output(self) -> Option<W> {
        self.out
    }
}

impl<W: Write> IonWriter for RawBinaryWriter<W> {
    type Output = W;

    fn ion_version(&self) -> (u8, u8) {
        (1, 0)
    }

    fn write_ion_version_marker(&mut self, major: u8, minor: u8) -> IonResult<()> {
        if self.depth() > 0 {
            return illegal_operation("can only write an IVM at the top level");
        }
        if major == 1 && minor == 0 {
            self.buffer.write_bytes(&IVM);
            return Ok(());
        }
        illegal_operation("Only Ion 1.0 is supported.")
    }

    fn supports_text_symbol_tokens(&self) -> bool {
        // In Ion 1.0, the binary format requires that field names, annotations, and symbol values
        // be encoded as symbol IDs. The raw writer does not have a symbol table and so cannot
        // convert a String to a symbol ID.
        false
    }

    fn set_annotations<I, A>(&mut self, annotations: I) -> IonResult<()>
    where
        A: AsRawSymbolTokenRef,
        I: IntoIterator<Item = A>,
    {
        self.annotations.clear();
        self.has_top_level_symbol_table_annotation = false;
        for annotation in annotations {
            if let Err(e) = self.add_annotation(annotation) {
                self.annotations.clear();
                self.has_top_level_symbol_table_annotation = false;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Adds an annotation to the next value. Fails without changing the pending annotations if
    /// their encoding would no longer fit the wrapper's one-byte length.
    fn add_annotation<A: AsRawSymbolTokenRef>(&mut self, annotation: A) -> IonResult<()> {
        let sid = Self::expect_symbol_id(annotation.as_raw_symbol_token_ref(), "an annotation")?;
        let annotations_length: usize = self
            .annotations
            .iter()
            .chain([&sid])
            .map(|sid| VarUInt::encoded_size(*sid as u64))
            .sum();
        if annotations_length > MAX_ANNOTATIONS_LENGTH {
            return illegal_operation(format!(
                "annotations too large: adding ${sid} to {:?} needs {annotations_length} bytes",
                self.annotations
            ));
        }
        if self.depth == 0 && sid == system_symbol_ids::ION_SYMBOL_TABLE {
            self.has_top_level_symbol_table_annotation = true;
        }
        self.annotations.push(sid);
        Ok(())
    }

    fn has_annotations(&self) -> bool {
        !self.annotations.is_empty()
    }

    /// Writes an Ion null of the specified type.
    fn write_null(&mut self, ion_type: IonType) -> IonResult<()> {
        self.prepare_value()?;
        self.update_length(1);
        self.buffer
            .write_byte(IonTypeCode::from(ion_type).null_type_descriptor());
        self.finish_value()
    }

    /// Writes an Ion boolean with the specified value.
    fn write_bool(&mut self, value: bool) -> IonResult<()> {
        self.prepare_value()?;
        self.update_length(1);
        self.buffer.write_byte(if value {
            type_descriptors::BOOL_TRUE
        } else {
            type_descriptors::BOOL_FALSE
        });
        self.finish_value()
    }

    /// Writes an Ion integer with the specified value.
    fn write_i64(&mut self, value: i64) -> IonResult<()> {
        self.prepare_value()?;
        if value == 0 {
            self.update_length(1);
            self.buffer.write_byte(type_descriptors::INT_ZERO);
        } else if value < 0 {
            // unsigned_abs() handles i64::MIN, whose magnitude is 2^63.
            self.write_typed_uint(IonTypeCode::NegativeInteger, value.unsigned_abs());
        } else {
            self.write_typed_uint(IonTypeCode::PositiveInteger, value as u64);
        }
        self.finish_value()
    }

    /// Writes an Ion integer with the specified value.
    fn write_int(&mut self, value: &Int) -> IonResult<()> {
        // Anything that fits in an i64 takes the fixed-width path.
        if let Some(small) = value.as_i64() {
            return self.write_i64(small);
        }
        self.prepare_value()?;
        let type_code = if value.is_negative() {
            IonTypeCode::NegativeInteger
        } else {
            IonTypeCode::PositiveInteger
        };
        let magnitude = value.unsigned_abs().to_be_bytes_minimal();
        self.write_typed_bytes(type_code, &magnitude);
        self.finish_value()
    }

    /// Writes an Ion float with the specified value.
    fn write_f32(&mut self, value: f32) -> IonResult<()> {
        self.prepare_value()?;
        self.update_length(5);
        self.buffer.write_byte(type_descriptors::FLOAT_32);
        self.buffer.write_bytes(&value.to_be_bytes());
        self.finish_value()
    }

    /// Writes an Ion float with the specified value. When binary32 output is enabled, values
    /// that survive a round trip through `f32` are written in four bytes.
    fn write_f64(&mut self, value: f64) -> IonResult<()> {
        self.prepare_value()?;
        let narrowed = value as f32;
        if self.is_float_binary32_enabled && narrowed as f64 == value {
            self.update_length(5);
            self.buffer.write_byte(type_descriptors::FLOAT_32);
            self.buffer.write_bytes(&narrowed.to_be_bytes());
        } else {
            self.update_length(9);
            self.buffer.write_byte(type_descriptors::FLOAT_64);
            self.buffer.write_bytes(&value.to_be_bytes());
        }
        self.finish_value()
    }

    /// Writes an Ion decimal with the specified value.
    fn write_decimal(&mut self, value: &Decimal) -> IonResult<()> {
        self.prepare_value()?;
        if value.is_positive_zero_with_zero_exponent() {
            // 0d0 can be written in one byte
            self.update_length(1);
            self.buffer.write_byte(type_descriptors::DECIMAL_POSITIVE_ZERO);
        } else {
            self.write_optimistic_value(IonTypeCode::Decimal, |writer| {
                writer.write_decimal_value(value)
            })?;
        }
        self.finish_value()
    }

    /// Writes an Ion timestamp with the specified value. All fields are written in UTC.
    fn write_timestamp(&mut self, value: &Timestamp) -> IonResult<()> {
        self.prepare_value()?;
        self.write_optimistic_value(IonTypeCode::Timestamp, |writer| {
            match value.offset() {
                None => {
                    writer.update_length(1);
                    writer
                        .buffer
                        .write_byte(type_descriptors::TIMESTAMP_UNKNOWN_OFFSET);
                }
                Some(offset) => writer.write_var_int(offset as i64),
            }
            let fields = value.utc_fields();
            let precision = value.precision();
            writer.write_var_uint(fields.year as u64);
            if precision >= Precision::Month {
                writer.write_var_uint(fields.month as u64);
            }
            if precision >= Precision::Day {
                writer.write_var_uint(fields.day as u64);
            }
            if precision >= Precision::HourAndMinute {
                writer.write_var_uint(fields.hour as u64);
                writer.write_var_uint(fields.minute as u64);
            }
            if precision >= Precision::Second {
                writer.write_var_uint(fields.second as u64);
                if let Some(fraction) = value.fractional_seconds() {
                    // Only an exact 0d0 is dropped; 0d-3 still carries precision.
                    if !fraction.is_positive_zero_with_zero_exponent() {
                        writer.write_decimal_value(fraction);
                    }
                }
            }
        })?;
        self.finish_value()
    }

    fn write_symbol<A: AsRawSymbolTokenRef>(&mut self, value: A) -> IonResult<()> {
        let sid = Self::expect_symbol_id(value.as_raw_symbol_token_ref(), "a symbol value")?;
        self.prepare_value()?;
        self.write_typed_uint(IonTypeCode::Symbol, sid as u64);
        self.finish_value()
    }

    fn write_string<A: AsRef<str>>(&mut self, value: A) -> IonResult<()> {
        // The UTF-8 length of a str is known up front, so no length estimate is needed.
        self.prepare_value()?;
        self.write_typed_bytes(IonTypeCode::String, value.as_ref().as_bytes());
        self.finish_value()
    }

    fn write_string_utf16(&mut self, value: &[u16]) -> IonResult<()> {
        if let Some(Err(error)) = char::decode_utf16(value.iter().copied()).find(Result::is_err) {
            return encoding_error(format!(
                "cannot write a string with an unpaired surrogate ({:#06X})",
                error.unpaired_surrogate()
            ));
        }
        self.prepare_value()?;
        // Assume the text is ASCII and round the estimate up to the next length boundary.
        let length_position = self.buffer.position() + 1;
        let (estimated_length, preallocated_length) = if value.len() <= MAX_INLINE_LENGTH {
            self.buffer.write_byte(IonTypeCode::String.type_descriptor(0));
            (MAX_INLINE_LENGTH, 1)
        } else if value.len() <= PreallocationMode::Preallocate1.content_max_length() {
            self.buffer.write_bytes(
                &PreallocationMode::Preallocate1.typed_preallocated_bytes(IonTypeCode::String),
            );
            (PreallocationMode::Preallocate1.content_max_length(), 2)
        } else {
            self.buffer.write_bytes(
                &PreallocationMode::Preallocate2.typed_preallocated_bytes(IonTypeCode::String),
            );
            (PreallocationMode::Preallocate2.content_max_length(), 3)
        };
        self.update_length(preallocated_length);

        let utf8_length = self.buffer.write_utf16(value)?;
        if utf8_length <= estimated_length {
            if utf8_length <= MAX_INLINE_LENGTH {
                self.buffer.write_u8_at(
                    length_position - 1,
                    IonTypeCode::String.type_descriptor(utf8_length as u8),
                );
            } else if utf8_length <= PreallocationMode::Preallocate1.content_max_length() {
                self.buffer
                    .write_var_uint_direct1_at(length_position, utf8_length as u64);
            } else {
                self.buffer
                    .write_var_uint_direct2_at(length_position, utf8_length as u64);
            }
        } else {
            if estimated_length == MAX_INLINE_LENGTH {
                self.buffer.write_u8_at(
                    length_position - 1,
                    IonTypeCode::String.type_descriptor(length_codes::VAR_UINT),
                );
            }
            self.add_patch_point(length_position, preallocated_length - 1, utf8_length);
        }
        self.update_length(utf8_length);
        self.finish_value()
    }

    fn write_clob<A: AsRef<[u8]>>(&mut self, value: A) -> IonResult<()> {
        self.prepare_value()?;
        self.write_typed_bytes(IonTypeCode::Clob, value.as_ref());
        self.finish_value()
    }

    fn write_blob<A: AsRef<[u8]>>(&mut self, value: A) -> IonResult<()> {
        self.prepare_value()?;
        self.write_typed_bytes(IonTypeCode::Blob, value.as_ref());
        self.finish_value()
    }

    fn step_in(&mut self, container_type: IonType) -> IonResult<()> {
        let container = match container_type {
            IonType::List => ContainerType::List,
            IonType::SExp => ContainerType::SExp,
            IonType::Struct => ContainerType::Struct,
            _ => return illegal_operation(format!("cannot step into a(n) {container_type}")),
        };
        self.prepare_value()?;
        let mode = self.preallocation_mode;
        self.update_length(mode.typed_length());
        self.push_container(container);
        self.depth += 1;
        self.buffer
            .write_bytes(&mode.typed_preallocated_bytes(IonTypeCode::from(container_type)));
        Ok(())
    }

    fn set_field_name<A: AsRawSymbolTokenRef>(&mut self, name: A) -> IonResult<()> {
        if self.current_container_type() != Some(ContainerType::Struct) {
            return illegal_operation("cannot set a field name outside of a struct");
        }
        self.field_id = Some(Self::expect_symbol_id(
            name.as_raw_symbol_token_ref(),
            "a field name",
        )?);
        Ok(())
    }

    fn is_field_name_set(&self) -> bool {
        self.field_id.is_some()
    }

    fn parent_type(&self) -> Option<IonType> {
        self.containers
            .iter()
            .rev()
            .find_map(|container| container.container_type.ion_type())
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn step_out(&mut self) -> IonResult<()> {
        if self.field_id.is_some() {
            return illegal_operation("cannot step out with a field name set");
        }
        if !self.annotations.is_empty() {
            return illegal_operation("cannot step out with annotations set");
        }
        match self.current_container_type() {
            Some(container_type) if container_type.allowed_in_step_out() => {}
            _ => return illegal_operation("cannot step out when not in a container"),
        }
        self.pop_container()?;
        self.depth -= 1;
        self.finish_value()
    }

    /// Buffered data is only written out by `finish()`; flushing the raw writer flushes the
    /// output sink and nothing else.
    fn flush(&mut self) -> IonResult<()> {
        self.sink()?.flush()?;
        Ok(())
    }

    /// Writes the buffered stream to the output sink, splicing in any side patches, and empties
    /// the buffers.
    fn finish(&mut self) -> IonResult<()> {
        self.check_finishable()?;
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| illegal_operation_raw("the writer's output has already been closed"))?;
        Self::write_patched(&self.buffer, &self.patch_buffer, &self.patch_points, out)?;
        if self.stream_flush_mode == StreamFlushMode::Flush {
            out.flush()?;
        }
        self.reset_buffers();
        Ok(())
    }

    fn output(&self) -> Option<&W> {
        self.out.as_ref()
    }

    fn output_mut(&mut self) -> Option<&mut W> {
        self.out.as_mut()
    }
}

use crate::raw_symbol_token_ref::AsRawSymbolTokenRef;
use crate::result::IonResult;
use crate::types::{Decimal, Int, IonType, Timestamp};

/**
 * This trait captures the value-sink surface shared by the binary writers: everything needed to
 * write native Rust types to a stream as Ion values.
 */
pub trait IonWriter {
    /// The type to which the implementor writes its data. This may be a file, a buffer, etc.
    type Output;

    /// Returns the (major, minor) version of the Ion stream being written. If ion_version is called
    /// before an Ion Version Marker has been emitted, the version (1, 0) will be returned.
    fn ion_version(&self) -> (u8, u8);

    /// Writes an Ion version marker to the output stream.
    fn write_ion_version_marker(&mut self, major: u8, minor: u8) -> IonResult<()>;

    /// Returns `true` if this writer can resolve field names, annotations, and symbol values that
    /// are given as text; otherwise, returns `false`.
    ///
    /// If this method returns `false`, passing text to the [Self::set_annotations],
    /// [Self::set_field_name], or [Self::write_symbol] methods will return an `Err`.
    fn supports_text_symbol_tokens(&self) -> bool;

    /// Sets a list of annotations that will be applied to the next value that is written,
    /// replacing any that were previously set.
    fn set_annotations<I, A>(&mut self, annotations: I) -> IonResult<()>
    where
        A: AsRawSymbolTokenRef,
        I: IntoIterator<Item = A>;

    /// Appends an annotation to the list that will be applied to the next value.
    fn add_annotation<A: AsRawSymbolTokenRef>(&mut self, annotation: A) -> IonResult<()>;

    /// Returns `true` if annotations have been set for the next value.
    fn has_annotations(&self) -> bool;

    /// Writes an Ion `null` with the specified type to the output stream.
    /// To write an untyped `null` (which is equivalent to `null.null`), pass [IonType::Null].
    fn write_null(&mut self, ion_type: IonType) -> IonResult<()>;

    /// Writes an Ion `boolean` with the specified value to the output stream.
    fn write_bool(&mut self, value: bool) -> IonResult<()>;

    /// Writes an Ion `integer` with the specified value to the output stream.
    fn write_i64(&mut self, value: i64) -> IonResult<()>;

    /// Writes an Ion `integer` with the specified value to the output stream.
    fn write_int(&mut self, value: &Int) -> IonResult<()>;

    /// Writes an Ion `float` with the specified value to the output stream.
    fn write_f32(&mut self, value: f32) -> IonResult<()>;

    /// Writes an Ion `float` with the specified value to the output stream.
    fn write_f64(&mut self, value: f64) -> IonResult<()>;

    /// Writes an Ion `decimal` with the specified value to the output stream.
    fn write_decimal(&mut self, value: &Decimal) -> IonResult<()>;

    /// Writes an Ion `timestamp` with the specified value to the output stream.
    fn write_timestamp(&mut self, value: &Timestamp) -> IonResult<()>;

    /// Writes an Ion `symbol` with the specified value to the output stream.
    fn write_symbol<A: AsRawSymbolTokenRef>(&mut self, value: A) -> IonResult<()>;

    /// Writes an Ion `string` with the specified value to the output stream.
    fn write_string<A: AsRef<str>>(&mut self, value: A) -> IonResult<()>;

    /// Writes an Ion `string` whose text is given as UTF-16 code units. Unpaired surrogates
    /// result in an `Err`.
    fn write_string_utf16(&mut self, value: &[u16]) -> IonResult<()>;

    /// Writes an Ion `clob` with the specified value to the output stream.
    fn write_clob<A: AsRef<[u8]>>(&mut self, value: A) -> IonResult<()>;

    /// Writes an Ion `blob` with the specified value to the output stream.
    fn write_blob<A: AsRef<[u8]>>(&mut self, value: A) -> IonResult<()>;

    /// Starts a new Ion container with the specified type.
    /// The only valid IonType values are:
    /// * [IonType::List]
    /// * [IonType::SExp]
    /// * [IonType::Struct]
    /// Passing any other IonType will result in an `Err`.
    fn step_in(&mut self, container_type: IonType) -> IonResult<()>;

    /// Sets the current field name to `name`. The field name will be written before the next
    /// value. Calling this method while the writer is not positioned inside of a struct will
    /// result in an `Err`.
    fn set_field_name<A: AsRawSymbolTokenRef>(&mut self, name: A) -> IonResult<()>;

    /// Returns `true` if a field name has been set for the next value.
    fn is_field_name_set(&self) -> bool;

    /// If the writer is positioned at the top level, returns `None`. Otherwise, returns
    /// `Some(_)` with the parent container's [IonType].
    fn parent_type(&self) -> Option<IonType>;

    /// Returns the number of containers that the writer has stepped into without subsequently
    /// stepping out.
    fn depth(&self) -> usize;

    /// Returns `true` if the writer is positioned directly inside of a struct.
    fn is_in_struct(&self) -> bool {
        self.parent_type() == Some(IonType::Struct)
    }

    /// Ends the current container. If the writer is not currently positioned within a container,
    /// calling this method will result in an `Err`.
    fn step_out(&mut self) -> IonResult<()>;

    /// Causes any buffered, fully-written data to be written to the underlying io::Write
    /// implementation.
    fn flush(&mut self) -> IonResult<()>;

    /// Writes out all buffered data and ends the current stream segment. This method can only be
    /// called when the writer is at the top level.
    fn finish(&mut self) -> IonResult<()>;

    /// Returns a reference to the writer's output, or `None` if the writer released it when
    /// it was closed.
    fn output(&self) -> Option<&Self::Output>;

    /// Returns a mutable reference to the writer's output.
    ///
    /// Modifying the underlying sink is an inherently risky operation and can result in unexpected
    /// behavior or invalid data. It is not recommended for most use cases.
    fn output_mut(&mut self) -> Option<&mut Self::Output>;
}

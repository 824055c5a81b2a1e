//! A small binary Ion 1.0 decoder used to check what the writers produce, plus a reference
//! encoder that computes every length up front.
#![allow(dead_code)]

use std::sync::Arc;

use ion_binary_writer::constants::v1_0::{system_symbol_ids, SYSTEM_SYMBOLS};
use ion_binary_writer::result::encoding_error;
use ion_binary_writer::{Catalog, EmptyCatalog, IonResult, IonType, SharedSymbolTable};
use num_bigint::{BigInt, BigUint};

pub const IVM: [u8; 4] = [0xE0, 0x01, 0x00, 0xEA];

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTimestamp {
    pub offset_minutes: Option<i64>,
    pub year: u64,
    pub month: Option<u64>,
    pub day: Option<u64>,
    pub hour_and_minute: Option<(u64, u64)>,
    pub second: Option<u64>,
    // (exponent, coefficient)
    pub fraction: Option<(i64, BigInt)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(IonType),
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Decimal {
        coefficient: BigInt,
        exponent: i64,
        is_negative_zero: bool,
    },
    Timestamp(DecodedTimestamp),
    // `None` for symbols with unknown text.
    Symbol(Option<String>),
    String(String),
    Clob(Vec<u8>),
    Blob(Vec<u8>),
    List(Vec<Element>),
    SExp(Vec<Element>),
    Struct(Vec<(Option<String>, Element)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub annotations: Vec<Option<String>>,
    pub value: Value,
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Element {
            annotations: Vec::new(),
            value,
        }
    }
}

impl Element {
    pub fn with_annotations(mut self, annotations: &[&str]) -> Self {
        self.annotations = annotations.iter().map(|a| Some(a.to_string())).collect();
        self
    }
}

pub fn int(value: i64) -> Element {
    Value::Int(BigInt::from(value)).into()
}

pub fn symbol(text: &str) -> Element {
    Value::Symbol(Some(text.to_owned())).into()
}

pub fn string(text: &str) -> Element {
    Value::String(text.to_owned()).into()
}

pub fn boolean(value: bool) -> Element {
    Value::Bool(value).into()
}

pub fn list(values: Vec<Element>) -> Element {
    Value::List(values).into()
}

pub fn structure(fields: Vec<(&str, Element)>) -> Element {
    Value::Struct(
        fields
            .into_iter()
            .map(|(name, value)| (Some(name.to_owned()), value))
            .collect(),
    )
    .into()
}

/// A decoded stream: the user values, and the symbol tables that were declared along the way.
#[derive(Debug, Default)]
pub struct Decoded {
    pub values: Vec<Element>,
    pub ivm_count: usize,
    pub symbol_table_count: usize,
    pub append_count: usize,
}

pub fn decode(bytes: &[u8]) -> IonResult<Vec<Element>> {
    Ok(decode_stream(bytes, &EmptyCatalog {})?.values)
}

pub fn decode_stream(bytes: &[u8], catalog: &dyn Catalog) -> IonResult<Decoded> {
    let mut decoder = Decoder {
        bytes,
        position: 0,
        symbols: system_symbols(),
    };
    let mut decoded = Decoded::default();
    while decoder.position < bytes.len() {
        if bytes[decoder.position..].starts_with(&IVM) {
            decoder.position += IVM.len();
            decoder.symbols = system_symbols();
            decoded.ivm_count += 1;
            continue;
        }
        if bytes[decoder.position] == 0xE0 {
            return encoding_error(format!(
                "unsupported version marker at offset {}",
                decoder.position
            ));
        }
        let raw = decoder.read_raw_value()?;
        if raw.annotations.first() == Some(&system_symbol_ids::ION_SYMBOL_TABLE) {
            if let RawValue::Struct(fields) = &raw.value {
                let is_append = decoder.apply_symbol_table(fields, catalog)?;
                decoded.symbol_table_count += 1;
                if is_append {
                    decoded.append_count += 1;
                }
                continue;
            }
        }
        decoded.values.push(decoder.resolve(raw)?);
    }
    Ok(decoded)
}

fn system_symbols() -> Vec<Option<String>> {
    std::iter::once(None)
        .chain(SYSTEM_SYMBOLS.iter().map(|text| Some(text.to_string())))
        .collect()
}

// A value whose symbols are still symbol IDs.
#[derive(Debug)]
struct RawElement {
    annotations: Vec<usize>,
    value: RawValue,
}

#[derive(Debug)]
enum RawValue {
    Scalar(Value),
    Symbol(usize),
    List(Vec<RawElement>),
    SExp(Vec<RawElement>),
    Struct(Vec<(usize, RawElement)>),
}

struct Decoder<'a> {
    bytes: &'a [u8],
    position: usize,
    // Indexed by symbol ID.
    symbols: Vec<Option<String>>,
}

impl<'a> Decoder<'a> {
    fn next_byte(&mut self) -> IonResult<u8> {
        match self.bytes.get(self.position) {
            Some(byte) => {
                self.position += 1;
                Ok(*byte)
            }
            None => encoding_error("unexpected end of stream"),
        }
    }

    fn take(&mut self, length: usize) -> IonResult<&'a [u8]> {
        let end = self.position + length;
        if end > self.bytes.len() {
            return encoding_error(format!(
                "a length of {length} at offset {} runs past the end of the stream",
                self.position
            ));
        }
        let bytes = &self.bytes[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_var_uint(&mut self) -> IonResult<usize> {
        let mut value = 0usize;
        loop {
            let byte = self.next_byte()?;
            value = (value << 7) | (byte & 0x7F) as usize;
            if byte & 0x80 != 0 {
                return Ok(value);
            }
        }
    }

    fn read_length(&mut self, length_code: u8) -> IonResult<usize> {
        if length_code == 14 {
            self.read_var_uint()
        } else {
            Ok(length_code as usize)
        }
    }

    fn read_raw_value(&mut self) -> IonResult<RawElement> {
        let descriptor = self.next_byte()?;
        let (type_code, length_code) = (descriptor >> 4, descriptor & 0x0F);
        if type_code == 0x0E {
            let length = self.read_length(length_code)?;
            let end = self.position + length;
            let annotations_length = self.read_var_uint()?;
            let annotations_end = self.position + annotations_length;
            let mut annotations = Vec::new();
            while self.position < annotations_end {
                annotations.push(self.read_var_uint()?);
            }
            let mut inner = self.read_raw_value()?;
            if self.position != end {
                return encoding_error("annotation wrapper length does not match its value");
            }
            annotations.append(&mut inner.annotations);
            return Ok(RawElement {
                annotations,
                value: inner.value,
            });
        }
        let value = self.read_raw_body(type_code, length_code)?;
        Ok(RawElement {
            annotations: Vec::new(),
            value,
        })
    }

    fn read_raw_body(&mut self, type_code: u8, length_code: u8) -> IonResult<RawValue> {
        const TYPES: [IonType; 14] = [
            IonType::Null,
            IonType::Bool,
            IonType::Int,
            IonType::Int,
            IonType::Float,
            IonType::Decimal,
            IonType::Timestamp,
            IonType::Symbol,
            IonType::String,
            IonType::Clob,
            IonType::Blob,
            IonType::List,
            IonType::SExp,
            IonType::Struct,
        ];
        if length_code == 15 && (type_code as usize) < TYPES.len() {
            return Ok(RawValue::Scalar(Value::Null(TYPES[type_code as usize])));
        }
        if type_code == 1 {
            return Ok(RawValue::Scalar(Value::Bool(length_code == 1)));
        }
        let length = self.read_length(length_code)?;
        let body = self.take(length)?;
        let scalar = match type_code {
            2 => Value::Int(BigInt::from(BigUint::from_bytes_be(body))),
            3 => Value::Int(-BigInt::from(BigUint::from_bytes_be(body))),
            4 => match body.len() {
                0 => Value::Float(0.0),
                4 => Value::Float(f32::from_be_bytes([body[0], body[1], body[2], body[3]]) as f64),
                8 => {
                    let mut bits = [0u8; 8];
                    bits.copy_from_slice(body);
                    Value::Float(f64::from_be_bytes(bits))
                }
                other => return encoding_error(format!("invalid float length {other}")),
            },
            5 => Self::decode_decimal(body)?,
            6 => Value::Timestamp(Self::decode_timestamp(body)?),
            7 => {
                let sid = BigUint::from_bytes_be(body);
                let sid = usize::try_from(sid)
                    .or_else(|_| encoding_error("symbol ID does not fit in a usize"))?;
                return Ok(RawValue::Symbol(sid));
            }
            8 => match std::str::from_utf8(body) {
                Ok(text) => Value::String(text.to_owned()),
                Err(_) => return encoding_error("string is not valid UTF-8"),
            },
            9 => Value::Clob(body.to_vec()),
            10 => Value::Blob(body.to_vec()),
            11 | 12 | 13 => {
                let mut nested = Decoder {
                    bytes: body,
                    position: 0,
                    symbols: Vec::new(),
                };
                if type_code == 13 {
                    let mut fields = Vec::new();
                    while nested.position < body.len() {
                        let field_id = nested.read_var_uint()?;
                        fields.push((field_id, nested.read_raw_value()?));
                    }
                    return Ok(RawValue::Struct(fields));
                }
                let mut values = Vec::new();
                while nested.position < body.len() {
                    values.push(nested.read_raw_value()?);
                }
                return Ok(if type_code == 11 {
                    RawValue::List(values)
                } else {
                    RawValue::SExp(values)
                });
            }
            other => return encoding_error(format!("unexpected type code {other:X}")),
        };
        Ok(RawValue::Scalar(scalar))
    }

    fn decode_decimal(body: &[u8]) -> IonResult<Value> {
        if body.is_empty() {
            return Ok(Value::Decimal {
                coefficient: BigInt::from(0),
                exponent: 0,
                is_negative_zero: false,
            });
        }
        let mut decoder = Decoder {
            bytes: body,
            position: 0,
            symbols: Vec::new(),
        };
        let exponent = decoder.read_var_int()?;
        let (coefficient, is_negative) = signed_magnitude(&body[decoder.position..]);
        let is_negative_zero = is_negative && coefficient == BigInt::from(0);
        Ok(Value::Decimal {
            coefficient: if is_negative { -coefficient } else { coefficient },
            exponent,
            is_negative_zero,
        })
    }

    fn decode_timestamp(body: &[u8]) -> IonResult<DecodedTimestamp> {
        let mut decoder = Decoder {
            bytes: body,
            position: 0,
            symbols: Vec::new(),
        };
        let offset_minutes = if body.first() == Some(&0xC0) {
            decoder.position += 1;
            None
        } else {
            Some(decoder.read_var_int()?)
        };
        let year = decoder.read_var_uint()? as u64;
        let mut optional = || -> IonResult<Option<u64>> {
            if decoder.position < body.len() {
                decoder.read_var_uint().map(|v| Some(v as u64))
            } else {
                Ok(None)
            }
        };
        let month = optional()?;
        let day = optional()?;
        let hour = optional()?;
        let minute = optional()?;
        let second = optional()?;
        let fraction = if decoder.position < body.len() {
            let exponent = decoder.read_var_int()?;
            let (coefficient, is_negative) = signed_magnitude(&body[decoder.position..]);
            Some((exponent, if is_negative { -coefficient } else { coefficient }))
        } else {
            None
        };
        Ok(DecodedTimestamp {
            offset_minutes,
            year,
            month,
            day,
            hour_and_minute: hour.zip(minute),
            second,
            fraction,
        })
    }

    fn read_var_int(&mut self) -> IonResult<i64> {
        let first = self.next_byte()?;
        let is_negative = first & 0x40 != 0;
        let mut magnitude = (first & 0x3F) as i64;
        let mut byte = first;
        while byte & 0x80 == 0 {
            byte = self.next_byte()?;
            magnitude = (magnitude << 7) | (byte & 0x7F) as i64;
        }
        Ok(if is_negative { -magnitude } else { magnitude })
    }

    fn text(&self, sid: usize) -> IonResult<Option<String>> {
        match self.symbols.get(sid) {
            Some(text) => Ok(text.clone()),
            None => encoding_error(format!("symbol ID ${sid} is not defined")),
        }
    }

    fn resolve(&self, raw: RawElement) -> IonResult<Element> {
        let annotations = raw
            .annotations
            .iter()
            .map(|sid| self.text(*sid))
            .collect::<IonResult<Vec<_>>>()?;
        let value = match raw.value {
            RawValue::Scalar(value) => value,
            RawValue::Symbol(sid) => Value::Symbol(self.text(sid)?),
            RawValue::List(values) => Value::List(self.resolve_all(values)?),
            RawValue::SExp(values) => Value::SExp(self.resolve_all(values)?),
            RawValue::Struct(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (sid, value) in fields {
                    resolved.push((self.text(sid)?, self.resolve(value)?));
                }
                Value::Struct(resolved)
            }
        };
        Ok(Element { annotations, value })
    }

    fn resolve_all(&self, values: Vec<RawElement>) -> IonResult<Vec<Element>> {
        values.into_iter().map(|value| self.resolve(value)).collect()
    }

    // Installs a local symbol table. Returns `true` if it was an append.
    fn apply_symbol_table(
        &mut self,
        fields: &[(usize, RawElement)],
        catalog: &dyn Catalog,
    ) -> IonResult<bool> {
        let mut is_append = false;
        let mut imported: Vec<Option<String>> = Vec::new();
        let mut declared: Vec<Option<String>> = Vec::new();
        for (field_id, field) in fields {
            match (*field_id, &field.value) {
                (system_symbol_ids::IMPORTS, RawValue::Symbol(system_symbol_ids::ION_SYMBOL_TABLE)) => {
                    is_append = true
                }
                (system_symbol_ids::IMPORTS, RawValue::List(imports)) => {
                    for import in imports {
                        imported.extend(Self::import_symbols(import, catalog)?);
                    }
                }
                (system_symbol_ids::SYMBOLS, RawValue::List(symbols)) => {
                    for symbol in symbols {
                        declared.push(match &symbol.value {
                            RawValue::Scalar(Value::String(text)) => Some(text.clone()),
                            _ => None,
                        });
                    }
                }
                _ => {}
            }
        }
        if !is_append {
            self.symbols = system_symbols();
            self.symbols.extend(imported);
        }
        self.symbols.extend(declared);
        Ok(is_append)
    }

    fn import_symbols(import: &RawElement, catalog: &dyn Catalog) -> IonResult<Vec<Option<String>>> {
        let RawValue::Struct(fields) = &import.value else {
            return encoding_error("an import must be a struct");
        };
        let mut name = None;
        let mut version = 1usize;
        let mut max_id = None;
        for (field_id, field) in fields {
            match (*field_id, &field.value) {
                (system_symbol_ids::NAME, RawValue::Scalar(Value::String(text))) => {
                    name = Some(text.clone())
                }
                (system_symbol_ids::VERSION, RawValue::Scalar(Value::Int(n))) => {
                    version = usize::try_from(n).unwrap_or(1)
                }
                (system_symbol_ids::MAX_ID, RawValue::Scalar(Value::Int(n))) => {
                    max_id = usize::try_from(n).ok()
                }
                _ => {}
            }
        }
        let Some(name) = name else {
            return encoding_error("an import must have a name");
        };
        let table: Option<Arc<SharedSymbolTable>> = catalog.get_table_with_version(&name, version);
        let max_id = match (max_id, &table) {
            (Some(max_id), _) => max_id,
            (None, Some(table)) => table.max_id(),
            (None, None) => return encoding_error(format!("cannot resolve import '{name}'")),
        };
        Ok((1..=max_id)
            .map(|sid| {
                table
                    .as_ref()
                    .and_then(|t| t.text_for(sid))
                    .map(str::to_owned)
            })
            .collect())
    }
}

fn signed_magnitude(bytes: &[u8]) -> (BigInt, bool) {
    if bytes.is_empty() {
        return (BigInt::from(0), false);
    }
    let is_negative = bytes[0] & 0x80 != 0;
    let mut magnitude = bytes.to_vec();
    magnitude[0] &= 0x7F;
    (BigInt::from(BigUint::from_bytes_be(&magnitude)), is_negative)
}

/// A value tree for the reference encoder. Symbols are already symbol IDs.
#[derive(Debug, Clone)]
pub enum RefValue {
    Bool(bool),
    List(Vec<RefValue>),
    Struct(Vec<(usize, RefValue)>),
    Annotated(Vec<usize>, Box<RefValue>),
}

pub fn var_uint(value: usize) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8 | 0x80];
    let mut rest = value >> 7;
    while rest > 0 {
        bytes.insert(0, (rest & 0x7F) as u8);
        rest >>= 7;
    }
    bytes
}

// A length in exactly `width` VarUInt bytes, zero-padded.
fn padded_var_uint(value: usize, width: usize) -> Vec<u8> {
    let mut bytes = var_uint(value);
    while bytes.len() < width {
        bytes.insert(0, 0);
    }
    bytes
}

/// The header a writer that reserves `pad` length bytes produces for `length` bytes of content.
pub fn reference_header(type_code: u8, length: usize, pad: usize) -> Vec<u8> {
    let fits = match pad {
        0 => false,
        1 => length <= 0x7F,
        _ => length <= 0x3FFF,
    };
    if pad == 0 && length <= 13 {
        return vec![(type_code << 4) | length as u8];
    }
    let mut header = vec![(type_code << 4) | 14];
    if fits {
        header.extend(padded_var_uint(length, pad));
    } else {
        header.extend(var_uint(length));
    }
    header
}

/// Encodes `value` the way a writer reserving `pad` length bytes per container must, computing
/// each length before writing its header.
pub fn reference_encode(value: &RefValue, pad: usize) -> Vec<u8> {
    match value {
        RefValue::Bool(b) => vec![if *b { 0x11 } else { 0x10 }],
        RefValue::List(values) => {
            let body: Vec<u8> = values.iter().flat_map(|v| reference_encode(v, pad)).collect();
            let mut encoded = reference_header(0xB, body.len(), pad);
            encoded.extend(body);
            encoded
        }
        RefValue::Struct(fields) => {
            let mut body = Vec::new();
            for (sid, field) in fields {
                body.extend(var_uint(*sid));
                body.extend(reference_encode(field, pad));
            }
            let mut encoded = reference_header(0xD, body.len(), pad);
            encoded.extend(body);
            encoded
        }
        RefValue::Annotated(sids, inner) => {
            let annotations: Vec<u8> = sids.iter().flat_map(|sid| var_uint(*sid)).collect();
            let mut body = var_uint(annotations.len());
            body.extend(annotations);
            body.extend(reference_encode(inner, pad));
            let mut encoded = reference_header(0xE, body.len(), pad);
            encoded.extend(body);
            encoded
        }
    }
}

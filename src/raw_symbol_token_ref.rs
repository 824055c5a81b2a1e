use crate::symbol_token::SymbolToken;
use crate::types::SymbolId;
use std::borrow::Cow;

/// A borrowed view of a symbolic value (a field name, an annotation, or a symbol value) as the
/// caller supplied it: either text that still needs to be interned, or a symbol ID that has
/// already been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSymbolTokenRef<'a> {
    SymbolId(SymbolId),
    Text(Cow<'a, str>),
}

impl<'a> RawSymbolTokenRef<'a> {
    /// Returns `true` if this token matches either the specified symbol ID or text value.
    /// This is useful for recognizing system symbols whose encoding is not known in advance.
    pub fn matches_sid_or_text(&self, symbol_id: SymbolId, symbol_text: &str) -> bool {
        match self {
            RawSymbolTokenRef::SymbolId(sid) => symbol_id == *sid,
            RawSymbolTokenRef::Text(text) => symbol_text == text,
        }
    }
}

/// Implemented by types that can be viewed as a [RawSymbolTokenRef] without allocations.
pub trait AsRawSymbolTokenRef {
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef;
}

impl<'a> AsRawSymbolTokenRef for RawSymbolTokenRef<'a> {
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef {
        self.clone()
    }
}

impl AsRawSymbolTokenRef for SymbolId {
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef {
        RawSymbolTokenRef::SymbolId(*self)
    }
}

impl AsRawSymbolTokenRef for String {
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef {
        RawSymbolTokenRef::Text(Cow::from(self.as_str()))
    }
}

impl AsRawSymbolTokenRef for &str {
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef {
        RawSymbolTokenRef::Text(Cow::from(*self))
    }
}

// Text wins over the symbol ID: a token carrying both is re-interned against the writer's
// current context rather than trusted blindly.
impl AsRawSymbolTokenRef for SymbolToken {
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef {
        match (self.text(), self.local_sid()) {
            (Some(text), _) => RawSymbolTokenRef::Text(Cow::from(text)),
            (None, Some(sid)) => RawSymbolTokenRef::SymbolId(sid),
            (None, None) => RawSymbolTokenRef::SymbolId(0),
        }
    }
}

impl<T> AsRawSymbolTokenRef for &T
where
    T: AsRawSymbolTokenRef,
{
    fn as_raw_symbol_token_ref(&self) -> RawSymbolTokenRef {
        (*self).as_raw_symbol_token_ref()
    }
}

impl<'a> From<&'a str> for RawSymbolTokenRef<'a> {
    fn from(value: &'a str) -> Self {
        RawSymbolTokenRef::Text(Cow::Borrowed(value))
    }
}

impl<'a> From<SymbolId> for RawSymbolTokenRef<'a> {
    fn from(value: SymbolId) -> Self {
        RawSymbolTokenRef::SymbolId(value)
    }
}

//! Resolved symbol tokens and constructors for the tokens the writer synthesizes.

use std::fmt;
use std::sync::Arc;

use crate::constants::v1_0;
use crate::result::{illegal_operation, IonResult};
use crate::types::SymbolId;

/// A symbol that has been (or may be) resolved against a symbol table: its text, if known, and
/// its symbol ID, if one has been assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolToken {
    text: Option<Arc<str>>,
    sid: Option<SymbolId>,
}

impl SymbolToken {
    pub(crate) fn new(text: Option<Arc<str>>, sid: Option<SymbolId>) -> Self {
        SymbolToken { text, sid }
    }

    /// A token whose text is not known; only its symbol ID can be written.
    pub fn unknown_text(sid: SymbolId) -> Self {
        SymbolToken {
            text: None,
            sid: Some(sid),
        }
    }

    /// A token that carries text but has not been assigned a symbol ID yet.
    pub fn text_only<A: AsRef<str>>(text: A) -> Self {
        SymbolToken {
            text: Some(Arc::from(text.as_ref())),
            sid: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub(crate) fn shared_text(&self) -> Option<&Arc<str>> {
        self.text.as_ref()
    }

    pub fn local_sid(&self) -> Option<SymbolId> {
        self.sid
    }
}

impl fmt::Display for SymbolToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.text, self.sid) {
            (Some(text), _) => write!(f, "'{text}'"),
            (None, Some(sid)) => write!(f, "${sid}"),
            (None, None) => write!(f, "$0"),
        }
    }
}

/// Constructs a token with the given text and symbol ID. Symbol IDs start at 1.
pub fn symbol<A: AsRef<str>>(text: A, sid: SymbolId) -> IonResult<SymbolToken> {
    if sid == 0 {
        return illegal_operation(format!(
            "symbol '{}' cannot be assigned symbol ID 0",
            text.as_ref()
        ));
    }
    Ok(SymbolToken {
        text: Some(Arc::from(text.as_ref())),
        sid: Some(sid),
    })
}

/// Returns the token for one of the Ion 1.0 system symbols (`$1` through `$9`).
pub fn system_symbol(sid: SymbolId) -> IonResult<SymbolToken> {
    match sid
        .checked_sub(1)
        .and_then(|index| v1_0::SYSTEM_SYMBOLS.get(index))
    {
        Some(text) => symbol(text, sid),
        None => illegal_operation(format!("${sid} is not a system symbol")),
    }
}

/// Returns a token for every Ion 1.0 system symbol in symbol ID order.
pub fn system_symbols() -> impl Iterator<Item = SymbolToken> {
    v1_0::SYSTEM_SYMBOLS
        .iter()
        .enumerate()
        .map(|(index, text)| SymbolToken {
            text: Some(Arc::from(*text)),
            sid: Some(index + 1),
        })
}

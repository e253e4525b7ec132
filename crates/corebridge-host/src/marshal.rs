//! Fixed-capacity wide buffers and their conversion to the runtime's string
//! encoding.
//!
//! Callers hand us UTF-16 (`wchar_t`) buffers. hostfxr expects `char_t`,
//! which is UTF-16 on Windows and UTF-8 everywhere else, so every string
//! crossing into the runtime goes through [`RuntimeString`].

use std::fmt;

use netcorehost::pdcstring::{PdCStr, PdCString, PdChar, PdUChar};
use thiserror::Error;
use widestring::U16CStr;

/// Code unit of the runtime's native strings: `u16` on Windows, `u8`
/// elsewhere.
pub type RuntimeChar = PdUChar;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("no NUL terminator within {capacity} code units")]
    MissingTerminator { capacity: usize },

    #[error("{len} code units plus terminator exceed capacity of {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },

    #[error("interior NUL at code unit {position}")]
    InteriorNul { position: usize },

    #[error("unpaired UTF-16 surrogate at code unit {position}")]
    InvalidUtf16 { position: usize },
}

/// A NUL-terminated UTF-16 buffer of exactly `N` code units, laid out like
/// `wchar_t[N]` on Windows.
///
/// Values that do not fit together with their terminator are rejected on
/// the way in; buffers without a terminator are rejected on the way out.
/// Nothing is ever truncated.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WideBuf<const N: usize>([u16; N]);

impl<const N: usize> WideBuf<N> {
    pub const fn zeroed() -> Self {
        Self([0; N])
    }

    /// Wrap raw code units as received from a caller, terminator or not.
    pub const fn from_raw(units: [u16; N]) -> Self {
        Self(units)
    }

    pub fn from_units(units: &[u16]) -> Result<Self, MarshalError> {
        if let Some(position) = units.iter().position(|&u| u == 0) {
            return Err(MarshalError::InteriorNul { position });
        }
        if units.len() >= N {
            return Err(MarshalError::CapacityExceeded {
                len: units.len(),
                capacity: N,
            });
        }
        let mut buf = [0u16; N];
        buf[..units.len()].copy_from_slice(units);
        Ok(Self(buf))
    }

    pub fn encode(value: &str) -> Result<Self, MarshalError> {
        let units: Vec<u16> = value.encode_utf16().collect();
        Self::from_units(&units)
    }

    /// The string up to its terminator.
    pub fn as_u16cstr(&self) -> Result<&U16CStr, MarshalError> {
        U16CStr::from_slice_truncate(&self.0)
            .map_err(|_| MarshalError::MissingTerminator { capacity: N })
    }

    pub fn to_runtime_string(&self) -> Result<RuntimeString, MarshalError> {
        RuntimeString::from_wide(self.as_u16cstr()?)
    }
}

impl<const N: usize> Default for WideBuf<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> fmt::Debug for WideBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u16cstr() {
            Ok(s) => write!(f, "{:?}", s.to_string_lossy()),
            Err(_) => write!(f, "<unterminated [u16; {N}]>"),
        }
    }
}

/// An owned, NUL-terminated string in the runtime's `char_t` encoding.
pub struct RuntimeString {
    inner: PdCString,
}

impl RuntimeString {
    /// Convert a terminated UTF-16 string. On Windows this is a copy; elsewhere
    /// the text is transcoded to UTF-8 and unpaired surrogates are rejected.
    pub fn from_wide(value: &U16CStr) -> Result<Self, MarshalError> {
        #[cfg(windows)]
        let units: Vec<RuntimeChar> = value.as_slice().to_vec();
        #[cfg(not(windows))]
        let units: Vec<RuntimeChar> = {
            let mut text = String::with_capacity(value.len());
            let mut position = 0;
            for decoded in char::decode_utf16(value.as_slice().iter().copied()) {
                let ch = decoded.map_err(|_| MarshalError::InvalidUtf16 { position })?;
                position += ch.len_utf16();
                text.push(ch);
            }
            text.into_bytes()
        };
        Self::from_units(units)
    }

    pub fn encode(value: &str) -> Result<Self, MarshalError> {
        #[cfg(windows)]
        let units: Vec<RuntimeChar> = value.encode_utf16().collect();
        #[cfg(not(windows))]
        let units: Vec<RuntimeChar> = value.as_bytes().to_vec();

        Self::from_units(units)
    }

    fn from_units(units: Vec<RuntimeChar>) -> Result<Self, MarshalError> {
        let nul = units.iter().position(|&u| u == 0);
        let inner = PdCString::from_vec(units).map_err(|_| MarshalError::InteriorNul {
            position: nul.unwrap_or_default(),
        })?;
        Ok(Self { inner })
    }

    pub fn as_ptr(&self) -> *const PdChar {
        self.inner.as_ptr()
    }

    /// Code units, without the terminator.
    pub fn as_units(&self) -> &[RuntimeChar] {
        self.inner.as_slice()
    }

    pub fn len(&self) -> usize {
        self.as_units().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes, without the terminator.
    pub fn byte_len(&self) -> usize {
        self.len() * std::mem::size_of::<RuntimeChar>()
    }

    pub fn to_string_lossy(&self) -> String {
        #[cfg(windows)]
        {
            String::from_utf16_lossy(self.as_units())
        }
        #[cfg(not(windows))]
        {
            String::from_utf8_lossy(self.as_units()).into_owned()
        }
    }
}

impl AsRef<PdCStr> for RuntimeString {
    fn as_ref(&self) -> &PdCStr {
        self.inner.as_ref()
    }
}

impl PartialEq for RuntimeString {
    fn eq(&self, other: &Self) -> bool {
        self.as_units() == other.as_units()
    }
}

impl Eq for RuntimeString {}

impl fmt::Debug for RuntimeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

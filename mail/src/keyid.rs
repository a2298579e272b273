//! Long key identifiers.
//!
//! Mail user agents juggle key identifiers from many sources:
//! fingerprints shown to the user (often with spaces), key ids in
//! PKESK and signature packets, and ids stored alongside keys.  A
//! [`Longid`] is the common denominator: the 16 hex digits of a V4
//! key id, upper case, no spaces.

use std::fmt;
use std::str::FromStr;

use crate::openpgp;
use openpgp::{Fingerprint, KeyHandle, KeyID};

use crate::{Error, Result};

/// A 16 hex digit key identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Longid(String);

impl fmt::Display for Longid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Longid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Longid")
            .field(&self.0)
            .finish()
    }
}

impl FromStr for Longid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<&KeyID> for Longid {
    fn from(id: &KeyID) -> Self {
        Longid(id.to_hex())
    }
}

impl From<KeyID> for Longid {
    fn from(id: KeyID) -> Self {
        Longid::from(&id)
    }
}

impl From<&Fingerprint> for Longid {
    fn from(fp: &Fingerprint) -> Self {
        Longid::from(KeyID::from(fp))
    }
}

impl From<Fingerprint> for Longid {
    fn from(fp: Fingerprint) -> Self {
        Longid::from(&fp)
    }
}

impl From<&KeyHandle> for Longid {
    fn from(h: &KeyHandle) -> Self {
        Longid::from(KeyID::from(h))
    }
}

impl From<KeyHandle> for Longid {
    fn from(h: KeyHandle) -> Self {
        Longid::from(&h)
    }
}

impl Longid {
    /// Parses a hex-encoded key id or fingerprint.
    ///
    /// Whitespace is ignored, as is a leading `0x`.  A 40 digit
    /// fingerprint yields its last 16 digits.
    ///
    /// ```
    /// use sequoia_mail::Longid;
    ///
    /// let a: Longid = "8F17 7771 18A3 3DDA 9BA4  8E62 AACB 3243 6300 52D9"
    ///     .parse()?;
    /// let b: Longid = "aacb3243630052d9".parse()?;
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "AACB3243630052D9");
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_hex(hex: &str) -> Result<Self> {
        let mut digits: String = hex.chars()
            .filter(|c| ! c.is_whitespace())
            .collect();
        if digits.starts_with("0x") || digits.starts_with("0X") {
            digits.drain(..2);
        }

        if ! digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidLongid(hex.into()).into());
        }

        match digits.len() {
            16 => Ok(Longid(digits.to_ascii_uppercase())),
            40 => Ok(Longid(digits[24..].to_ascii_uppercase())),
            _ => Err(Error::InvalidLongid(hex.into()).into()),
        }
    }

    /// Converts a binary key id (8 bytes) or V4 fingerprint (20
    /// bytes).
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        match raw.len() {
            8 => Ok(KeyID::from_bytes(raw).into()),
            20 => Ok(Fingerprint::from_bytes(raw).into()),
            n => Err(Error::InvalidLongid(
                format!("{} bytes of key material", n)).into()),
        }
    }

    /// Returns the identifier as string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether this is the wildcard identifier.
    pub fn is_wildcard(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Returns whether `handle` refers to the same key.
    pub fn aliases(&self, handle: &KeyHandle) -> bool {
        *self == Longid::from(handle)
    }
}

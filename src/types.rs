//! Value types shared across the crate.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::Result;

/// Minimum number of digits a phone number must carry to be addressable.
pub const MIN_PHONE_DIGITS: usize = 10;

/// A recipient normalized to the transport's addressing form, `<user>@<domain>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Normalizes a caller-supplied identity.
    ///
    /// Values that already carry an `@` are taken as fully addressed. Anything else is treated as
    /// a phone number: non-digits are stripped and `domain` is appended.
    pub fn normalize(raw: &str, domain: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.contains('@') {
            return Ok(Self(raw.to_owned()));
        }

        let digits = phone_digits(raw);
        if digits.is_empty() {
            return Err(crate::error::Error::validation(format!(
                "identity {raw:?} contains no digits"
            )));
        }

        Ok(Self(format!("{digits}@{domain}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `@`, i.e. the phone number for phone identities.
    #[must_use]
    pub fn user(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(user, _)| user)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips everything that is not an ASCII digit.
#[must_use]
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Opaque session credentials. Only the credential store and the transport look inside.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBlob(Vec<u8>);

impl CredentialBlob {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        Ok(Self(STANDARD.decode(encoded)?))
    }
}

// Contents are key material; never print them.
impl fmt::Debug for CredentialBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialBlob({} bytes)", self.0.len())
    }
}

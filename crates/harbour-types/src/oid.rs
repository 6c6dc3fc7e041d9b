use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Number of hex characters in an encoded [`Oid`].
pub const OID_HEX_LEN: usize = 64;

/// Content-addressed identifier for a stored object.
///
/// An `Oid` is the SHA-256 digest of an object's bytes. It is always carried
/// and displayed as 64 lowercase hex characters, which is also the form used
/// as the storage key in every backend.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid([u8; 32]);

impl Oid {
    /// Create an `Oid` from a pre-computed digest.
    pub const fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// Parse from a hex string. Upper-case input is accepted and normalized.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != OID_HEX_LEN {
            return Err(TypeError::InvalidLength {
                expected: OID_HEX_LEN,
                actual: s.len(),
            });
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short_hex())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 32]> for Oid {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Oid::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn parse_known_digest() {
        let oid = Oid::parse(EMPTY_SHA256).unwrap();
        assert_eq!(oid.to_hex(), EMPTY_SHA256);
        assert_eq!(format!("{oid}"), EMPTY_SHA256);
    }

    #[test]
    fn upper_case_is_normalized() {
        let oid = Oid::parse(&EMPTY_SHA256.to_uppercase()).unwrap();
        assert_eq!(oid.to_hex(), EMPTY_SHA256);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Oid::parse("abc").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 64,
                actual: 3
            }
        );
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "z".repeat(64);
        assert!(matches!(Oid::parse(&bad), Err(TypeError::InvalidHex(_))));
    }

    #[test]
    fn short_hex_is_8_chars() {
        let oid = Oid::parse(EMPTY_SHA256).unwrap();
        assert_eq!(oid.short_hex(), "e3b0c442");
        assert_eq!(format!("{oid:?}"), "Oid(e3b0c442)");
    }

    #[test]
    fn serializes_as_hex_string() {
        let oid = Oid::parse(EMPTY_SHA256).unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, format!("\"{EMPTY_SHA256}\""));
        let back: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<Oid>("\"not-an-oid\"").is_err());
    }

    proptest! {
        #[test]
        fn any_digest_parses_from_its_hex(bytes in proptest::array::uniform32(any::<u8>())) {
            let oid = Oid::from_digest(bytes);
            prop_assert_eq!(Oid::parse(&oid.to_hex()).unwrap(), oid);
        }

        #[test]
        fn short_strings_never_parse(s in "[0-9a-f]{0,63}") {
            prop_assert!(Oid::parse(&s).is_err());
        }
    }
}

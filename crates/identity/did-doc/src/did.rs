/*!
 * DID (Decentralized Identifier) type definitions per W3C DID Core 1.0
 *
 * # W3C DID Grammar (ABNF)
 * ```abnf
 * did                = "did:" method-name ":" method-specific-id
 * method-name        = 1*method-char
 * method-char        = %x61-7A / DIGIT  ; lowercase + digits
 * method-specific-id = *( *idchar ":" ) 1*idchar
 * idchar             = ALPHA / DIGIT / "." / "-" / "_" / pct-encoded
 * ```
 */

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use crate::{did_url::DIDUrl, errors::DIDError};

/// A validated Decentralized Identifier
///
/// DIDs are parsed and validated at construction time. A `DID` never carries
/// a path, query or fragment; use [`DIDUrl`] for those.
///
/// # Examples
///
/// ```
/// use did_doc::DID;
///
/// let did: DID = "did:example:123".parse().unwrap();
/// assert_eq!(did.method(), "example");
/// assert_eq!(did.reference("key-1").unwrap().to_string(), "did:example:123#key-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DID {
    method: String,
    method_specific_id: String,
}

/// Check if a character is a valid `idchar` (pct-encoded handled separately)
fn is_idchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Validate a method name: non-empty, lowercase letters and digits only
pub(crate) fn validate_method(method: &str) -> Result<(), DIDError> {
    if method.is_empty()
        || !method
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(DIDError::InvalidMethod(method.into()));
    }
    Ok(())
}

/// Validate a method-specific identifier
pub(crate) fn validate_method_specific_id(s: &str) -> Result<(), DIDError> {
    if s.is_empty() {
        return Err(DIDError::InvalidMethodSpecificId("empty".into()));
    }

    if s.ends_with(':') {
        return Err(DIDError::InvalidMethodSpecificId(
            "cannot end with ':'".into(),
        ));
    }

    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if is_idchar(c) || c == ':' {
            continue;
        }
        if c == '%' {
            match (chars.next(), chars.next()) {
                (Some(h1), Some(h2)) if h1.is_ascii_hexdigit() && h2.is_ascii_hexdigit() => {
                    continue;
                }
                _ => {
                    return Err(DIDError::InvalidMethodSpecificId(
                        "invalid percent-encoding".into(),
                    ));
                }
            }
        }
        return Err(DIDError::InvalidMethodSpecificId(format!(
            "invalid character '{c}'"
        )));
    }

    Ok(())
}

impl FromStr for DID {
    type Err = DIDError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("did:").ok_or(DIDError::MissingPrefix)?;

        let (method, method_specific_id) = rest
            .split_once(':')
            .ok_or_else(|| DIDError::InvalidMethod("missing method".into()))?;

        validate_method(method)?;
        validate_method_specific_id(method_specific_id)?;

        Ok(DID {
            method: method.to_string(),
            method_specific_id: method_specific_id.to_string(),
        })
    }
}

impl fmt::Display for DID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.method_specific_id)
    }
}

impl DID {
    /// Parse a DID string (equivalent to `str.parse()`)
    pub fn parse(s: &str) -> Result<Self, DIDError> {
        s.parse()
    }

    /// Returns true if `s` is a valid DID
    pub fn is_valid(s: &str) -> bool {
        s.parse::<DID>().is_ok()
    }

    /// Returns the DID method name ("example", "key", ...)
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the method-specific identifier
    pub fn method_specific_id(&self) -> &str {
        &self.method_specific_id
    }

    /// Form a DID URL for this DID from optional parts
    pub fn url(
        &self,
        path: Option<&str>,
        query: Option<&BTreeMap<String, String>>,
        fragment: Option<&str>,
    ) -> Result<DIDUrl, DIDError> {
        DIDUrl::unparse(Some(self), path, query, fragment)
    }

    /// Return a DID URL pointing at `fragment` of this DID's document,
    /// suitable as the `id` of a verification method or service
    pub fn reference(&self, fragment: &str) -> Result<DIDUrl, DIDError> {
        DIDUrl::unparse(Some(self), None, None, Some(fragment))
    }
}

impl Ord for DID {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for DID {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for DID {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DID {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl From<DID> for String {
    fn from(did: DID) -> Self {
        did.to_string()
    }
}

impl TryFrom<String> for DID {
    type Error = DIDError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<&str> for DID {
    type Error = DIDError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_did() {
        let did: DID = "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK"
            .parse()
            .unwrap();
        assert_eq!(did.method(), "key");
        assert_eq!(
            did.method_specific_id(),
            "z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK"
        );
    }

    #[test]
    fn colons_in_method_specific_id() {
        let did: DID = "did:web:example.com:user:alice".parse().unwrap();
        assert_eq!(did.method_specific_id(), "example.com:user:alice");
    }

    #[test]
    fn display_roundtrip() {
        let original = "did:example:z6Mkmpe2DyE4NsDiAb58d75hpi1BjqbH6wYMschUkjWDEEuR";
        let did: DID = original.parse().unwrap();
        assert_eq!(did.to_string(), original);
    }

    #[test]
    fn valid_percent_encoding() {
        let did: DID = "did:web:example.com%3A8080".parse().unwrap();
        assert_eq!(did.method_specific_id(), "example.com%3A8080");
    }

    #[test]
    fn error_missing_prefix() {
        assert_eq!(
            "not-a-did".parse::<DID>().unwrap_err(),
            DIDError::MissingPrefix
        );
    }

    #[test]
    fn error_invalid_method() {
        assert!(matches!(
            "did:UPPER:123".parse::<DID>().unwrap_err(),
            DIDError::InvalidMethod(_)
        ));
    }

    #[test]
    fn error_rejects_url_components() {
        // A DID never carries a fragment; that is a DIDUrl
        assert!(matches!(
            "did:example:123#key-1".parse::<DID>().unwrap_err(),
            DIDError::InvalidMethodSpecificId(_)
        ));
    }

    #[test]
    fn error_partial_match() {
        assert!(!DID::is_valid("did:bad:char'@='acters:example:1234abcd"));
    }

    #[test]
    fn error_trailing_colon() {
        assert!(matches!(
            "did:example:123:".parse::<DID>().unwrap_err(),
            DIDError::InvalidMethodSpecificId(_)
        ));
    }

    #[test]
    fn ordering_follows_string_form() {
        let a: DID = "did:a:x".parse().unwrap();
        let a0: DID = "did:a0:x".parse().unwrap();
        // '0' sorts before ':' in the string form
        assert!(a0 < a);
    }

    #[test]
    fn reference_builds_fragment_url() {
        let did: DID = "did:example:123".parse().unwrap();
        let url = did.reference("key-1").unwrap();
        assert_eq!(url.to_string(), "did:example:123#key-1");
        assert_eq!(url.did(), Some(&did));
    }

    #[test]
    fn serde_as_string() {
        let did: DID = serde_json::from_str("\"did:example:123\"").unwrap();
        assert_eq!(serde_json::to_string(&did).unwrap(), "\"did:example:123\"");
        assert!(serde_json::from_str::<DID>("\"example:123\"").is_err());
    }
}

/*!
 * DID URL type
 *
 * ```abnf
 * did-url       = did path-abempty [ "?" query ] [ "#" fragment ]
 * relative-ref  = ( path-absolute / "" ) [ "?" query ] [ "#" fragment ]
 * ```
 *
 * A [`DIDUrl`] is either absolute (it starts with a DID) or relative (it
 * starts with `/`, `?` or `#` and is resolved against the DID of the
 * document it appears in). Equality, hashing and ordering use the string
 * form.
 */

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};
use url::form_urlencoded;

use crate::{did::DID, errors::DIDError};

#[derive(Debug, Clone)]
pub struct DIDUrl {
    did: Option<DID>,
    /// Stored with its leading `/`
    path: Option<String>,
    /// Raw query string, without the leading `?`
    query: Option<String>,
    fragment: Option<String>,
}

/// Check if a character is an `unreserved` char per RFC 3986
fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Check if a character is a `sub-delims` char per RFC 3986
fn is_sub_delims(c: char) -> bool {
    matches!(
        c,
        '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ',' | ';' | '='
    )
}

/// `pchar = unreserved / pct-encoded / sub-delims / ":" / "@"`
fn is_pchar(c: char) -> bool {
    is_unreserved(c) || is_sub_delims(c) || matches!(c, ':' | '@')
}

fn validate_pchar_sequence(s: &str, allow_slash_question: bool) -> Result<(), String> {
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if is_pchar(c) {
            continue;
        }
        if allow_slash_question && matches!(c, '/' | '?') {
            continue;
        }
        if c == '%' {
            match (chars.next(), chars.next()) {
                (Some(h1), Some(h2)) if h1.is_ascii_hexdigit() && h2.is_ascii_hexdigit() => {
                    continue;
                }
                _ => return Err("invalid percent-encoding".into()),
            }
        }
        return Err(format!("invalid character '{c}'"));
    }
    Ok(())
}

/// `path-abempty = *( "/" segment )`, expects the leading `/`
fn validate_path(s: &str) -> Result<(), DIDError> {
    let segments = s
        .strip_prefix('/')
        .ok_or_else(|| DIDError::InvalidPath("path must start with '/'".into()))?;
    for segment in segments.split('/') {
        validate_pchar_sequence(segment, false).map_err(DIDError::InvalidPath)?;
    }
    Ok(())
}

fn validate_query(s: &str) -> Result<(), DIDError> {
    validate_pchar_sequence(s, true).map_err(DIDError::InvalidQuery)
}

fn validate_fragment(s: &str) -> Result<(), DIDError> {
    validate_pchar_sequence(s, true).map_err(DIDError::InvalidFragment)
}

/// Split `[/path][?query][#fragment]`; `s` must start with one of the
/// delimiters or be empty. Empty components are kept so the URL prints back
/// as it was written.
fn parse_components(
    s: &str,
) -> Result<(Option<String>, Option<String>, Option<String>), DIDError> {
    let (before_fragment, fragment) = match s.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment.to_string())),
        None => (s, None),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (before_fragment, None),
    };
    let path = (!path.is_empty()).then(|| path.to_string());

    if let Some(ref p) = path {
        validate_path(p)?;
    }
    if let Some(ref q) = query {
        validate_query(q)?;
    }
    if let Some(ref f) = fragment {
        validate_fragment(f)?;
    }

    Ok((path, query, fragment))
}

impl FromStr for DIDUrl {
    type Err = DIDError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("did:") {
            let did_end = s.find(['/', '?', '#']).unwrap_or(s.len());
            let did: DID = s[..did_end].parse()?;
            let (path, query, fragment) = parse_components(&s[did_end..])?;
            return Ok(DIDUrl {
                did: Some(did),
                path,
                query,
                fragment,
            });
        }

        if !s.starts_with(['/', '?', '#']) {
            return Err(DIDError::InvalidUrl(format!(
                "{s} is neither a DID URL nor a relative reference"
            )));
        }

        let (path, query, fragment) = parse_components(s)?;
        let empty = |c: &Option<String>| c.as_deref().is_none_or(str::is_empty);
        if path.is_none() && empty(&query) && empty(&fragment) {
            return Err(DIDError::InvalidUrl(format!(
                "relative reference {s} has no path, query or fragment"
            )));
        }

        Ok(DIDUrl {
            did: None,
            path,
            query,
            fragment,
        })
    }
}

impl fmt::Display for DIDUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref did) = self.did {
            write!(f, "{did}")?;
        }
        if let Some(ref path) = self.path {
            write!(f, "{path}")?;
        }
        if let Some(ref query) = self.query {
            write!(f, "?{query}")?;
        }
        if let Some(ref fragment) = self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl DIDUrl {
    /// Parse a DID URL string (equivalent to `str.parse()`)
    pub fn parse(s: &str) -> Result<Self, DIDError> {
        s.parse()
    }

    /// Returns true if `s` parses as an absolute or relative DID URL
    pub fn is_valid(s: &str) -> bool {
        s.parse::<DIDUrl>().is_ok()
    }

    /// Form a DID URL from parts.
    ///
    /// A missing leading `/` on `path` is added; `query` pairs are
    /// form-urlencoded in key order.
    pub fn unparse(
        did: Option<&DID>,
        path: Option<&str>,
        query: Option<&BTreeMap<String, String>>,
        fragment: Option<&str>,
    ) -> Result<Self, DIDError> {
        let mut value = did.map(|did| did.to_string()).unwrap_or_default();

        if let Some(path) = path.filter(|p| !p.is_empty()) {
            if !path.starts_with('/') {
                value.push('/');
            }
            value.push_str(path);
        }

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query.iter())
                .finish();
            value.push('?');
            value.push_str(&encoded);
        }

        if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
            value.push('#');
            value.push_str(fragment);
        }

        value.parse()
    }

    /// The DID this URL is rooted at; `None` for relative references
    pub fn did(&self) -> Option<&DID> {
        self.did.as_ref()
    }

    /// Path including its leading `/`
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Raw query string without the leading `?`
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query parameters
    pub fn query_pairs(&self) -> Option<BTreeMap<String, String>> {
        self.query.as_ref().map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect::<BTreeMap<String, String>>()
        })
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns true if this URL has no DID component
    pub fn is_relative(&self) -> bool {
        self.did.is_none()
    }

    /// Resolve a relative reference against `did`. Absolute URLs are
    /// returned unchanged.
    pub fn as_absolute(&self, did: &DID) -> DIDUrl {
        if self.did.is_some() {
            return self.clone();
        }
        DIDUrl {
            did: Some(did.clone()),
            path: self.path.clone(),
            query: self.query.clone(),
            fragment: self.fragment.clone(),
        }
    }
}

impl PartialEq for DIDUrl {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for DIDUrl {}

impl Hash for DIDUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl Ord for DIDUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string())
    }
}

impl PartialOrd for DIDUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<DID> for DIDUrl {
    fn from(did: DID) -> Self {
        DIDUrl {
            did: Some(did),
            path: None,
            query: None,
            fragment: None,
        }
    }
}

impl Serialize for DIDUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DIDUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl From<DIDUrl> for String {
    fn from(url: DIDUrl) -> Self {
        url.to_string()
    }
}

impl TryFrom<&str> for DIDUrl {
    type Error = DIDError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl TryFrom<String> for DIDUrl {
    type Error = DIDError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

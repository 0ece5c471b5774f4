//! https://www.w3.org/TR/did-core/#verification-relationships

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;
use std::fmt;

use crate::{
    DID, DIDUrl,
    errors::DocumentError,
    resource::{Resource, json_kind},
    verification_method::VerificationMethod,
};

/// The five verification relationships of a DID document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipKind {
    Authentication,
    AssertionMethod,
    KeyAgreement,
    CapabilityInvocation,
    CapabilityDelegation,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 5] = [
        RelationshipKind::Authentication,
        RelationshipKind::AssertionMethod,
        RelationshipKind::KeyAgreement,
        RelationshipKind::CapabilityInvocation,
        RelationshipKind::CapabilityDelegation,
    ];

    /// Document field name
    pub fn field(self) -> &'static str {
        match self {
            RelationshipKind::Authentication => "authentication",
            RelationshipKind::AssertionMethod => "assertionMethod",
            RelationshipKind::KeyAgreement => "keyAgreement",
            RelationshipKind::CapabilityInvocation => "capabilityInvocation",
            RelationshipKind::CapabilityDelegation => "capabilityDelegation",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Entry of a verification relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipItem {
    /// Reference to a Verification Method
    Reference(DIDUrl),
    /// Embedded Verification Method
    Embedded(VerificationMethod),
}

impl RelationshipItem {
    /// Returns the id of the verification-method
    pub fn id(&self) -> &DIDUrl {
        match self {
            RelationshipItem::Reference(url) => url,
            RelationshipItem::Embedded(vm) => vm.id(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, RelationshipItem::Reference(_))
    }

    pub fn as_embedded(&self) -> Option<&VerificationMethod> {
        match self {
            RelationshipItem::Embedded(vm) => Some(vm),
            RelationshipItem::Reference(_) => None,
        }
    }

    /// Errors other than [`DocumentError::Validation`] (a bad material
    /// arity on an embedded method) are passed through unchanged
    fn from_value(value: Value) -> Result<Self, DocumentError> {
        const KIND: &str = "RelationshipItem";

        match value {
            Value::String(s) => s.parse().map(RelationshipItem::Reference).map_err(|e| {
                DocumentError::validation(KIND, format!("{s} is not a valid DID URL ({e})"))
            }),
            Value::Object(map) => VerificationMethod::from_map(map).map(RelationshipItem::Embedded),
            other => Err(DocumentError::validation(
                KIND,
                format!(
                    "expected a DID URL or a verification method, found {}",
                    json_kind(&other)
                ),
            )),
        }
    }

    /// Same method, with relative ids resolved against `did` when given
    fn matches(&self, other: &RelationshipItem, did: Option<&DID>) -> bool {
        if self == other {
            return true;
        }
        let id = |url: &DIDUrl| match did {
            Some(did) => url.as_absolute(did),
            None => url.clone(),
        };
        match (self, other) {
            (RelationshipItem::Reference(a), RelationshipItem::Embedded(b))
            | (RelationshipItem::Embedded(b), RelationshipItem::Reference(a)) => id(a) == id(b.id()),
            (RelationshipItem::Reference(a), RelationshipItem::Reference(b)) => id(a) == id(b),
            (RelationshipItem::Embedded(a), RelationshipItem::Embedded(b)) => {
                did.is_some() && a.with_id(id(a.id())) == b.with_id(id(b.id()))
            }
        }
    }
}

impl From<DIDUrl> for RelationshipItem {
    fn from(url: DIDUrl) -> Self {
        RelationshipItem::Reference(url)
    }
}

impl From<VerificationMethod> for RelationshipItem {
    fn from(vm: VerificationMethod) -> Self {
        RelationshipItem::Embedded(vm)
    }
}

impl Serialize for RelationshipItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RelationshipItem::Reference(url) => url.serialize(serializer),
            RelationshipItem::Embedded(vm) => vm.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RelationshipItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RelationshipItem::from_value(value).map_err(de::Error::custom)
    }
}

/// Ordered list of embedded methods and references to methods defined
/// elsewhere
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationRelationship {
    items: Vec<RelationshipItem>,
}

impl VerificationRelationship {
    pub fn new(items: Vec<RelationshipItem>) -> Self {
        VerificationRelationship { items }
    }

    pub fn items(&self) -> &[RelationshipItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RelationshipItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedded methods only
    pub fn embedded(&self) -> impl Iterator<Item = &VerificationMethod> {
        self.items.iter().filter_map(RelationshipItem::as_embedded)
    }

    /// Bare references only
    pub fn references(&self) -> impl Iterator<Item = &DIDUrl> {
        self.items.iter().filter_map(|item| match item {
            RelationshipItem::Reference(url) => Some(url),
            RelationshipItem::Embedded(_) => None,
        })
    }

    /// Membership test.
    ///
    /// An item is contained if it equals a stored item, or if it is an
    /// embedded method whose id equals a stored reference (and the other
    /// way round).
    pub fn contains(&self, item: &RelationshipItem) -> bool {
        self.items.iter().any(|stored| stored.matches(item, None))
    }

    /// Membership test with relative ids on both sides resolved against `did`
    pub fn contains_in(&self, item: &RelationshipItem, did: &DID) -> bool {
        self.items.iter().any(|stored| stored.matches(item, Some(did)))
    }

    /// Parse a JSON list, reporting every bad entry
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        const KIND: &str = "VerificationRelationship";

        let Value::Array(values) = value else {
            return Err(DocumentError::validation(
                KIND,
                format!("expected a list, found {}", json_kind(&value)),
            ));
        };

        let mut items = Vec::with_capacity(values.len());
        let mut errors = Vec::new();
        for (i, value) in values.into_iter().enumerate() {
            match RelationshipItem::from_value(value) {
                Ok(item) => items.push(item),
                Err(DocumentError::Validation {
                    resource: "RelationshipItem",
                    errors: inner,
                }) => errors.extend(inner.into_iter().map(|e| format!("[{i}]: {e}"))),
                Err(e @ DocumentError::Validation { .. }) => errors.push(format!("[{i}]: {e}")),
                Err(e) => return Err(e),
            }
        }

        if errors.is_empty() {
            Ok(VerificationRelationship { items })
        } else {
            Err(DocumentError::Validation {
                resource: KIND,
                errors,
            })
        }
    }
}

impl From<Vec<RelationshipItem>> for VerificationRelationship {
    fn from(items: Vec<RelationshipItem>) -> Self {
        VerificationRelationship { items }
    }
}

impl<'a> IntoIterator for &'a VerificationRelationship {
    type Item = &'a RelationshipItem;
    type IntoIter = std::slice::Iter<'a, RelationshipItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Serialize for VerificationRelationship {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerificationRelationship {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        VerificationRelationship::from_value(value).map_err(de::Error::custom)
    }
}

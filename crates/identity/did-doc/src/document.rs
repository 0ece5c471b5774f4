//! The DID Document aggregate
//! <https://www.w3.org/TR/did-core/#core-properties>

use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeMap};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    DID, DIDUrl,
    config::DocumentConfig,
    corrections,
    errors::DocumentError,
    index::{ResourceIndex, ResourceRef, Slot},
    one_or_many::OneOrMany,
    resource::{Resource, Validator, json_kind},
    service::Service,
    verification_method::VerificationMethod,
    verification_relationship::{RelationshipItem, RelationshipKind, VerificationRelationship},
};

/// Context every DID document is expected to carry
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// Entry of `@context`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextEntry {
    Uri(String),
    Inline(Map<String, Value>),
}

impl From<&str> for ContextEntry {
    fn from(uri: &str) -> Self {
        ContextEntry::Uri(uri.to_string())
    }
}

/// A [DID Document]
///
/// Documents are immutable. The resource index is built when the document is
/// created and lives as long as the document; use
/// [`crate::builder::DIDDocumentBuilder`] to derive a modified copy.
///
/// [DID Document]: https://www.w3.org/TR/did-core/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DIDDocument {
    context: Vec<ContextEntry>,

    /// DID Subject Identifier
    id: DID,

    also_known_as: Option<Vec<String>>,

    controller: Option<Vec<DID>>,

    verification_method: Option<Vec<VerificationMethod>>,

    authentication: Option<VerificationRelationship>,

    assertion_method: Option<VerificationRelationship>,

    key_agreement: Option<VerificationRelationship>,

    capability_invocation: Option<VerificationRelationship>,

    capability_delegation: Option<VerificationRelationship>,

    /// Set of Services
    service: Option<Vec<Service>>,

    /// Properties without a typed representation
    extra: Map<String, Value>,

    index: ResourceIndex,
}

impl DIDDocument {
    /// Apply the corrections of `config` to the raw document, then parse it
    pub fn from_map_with(
        map: Map<String, Value>,
        config: &DocumentConfig,
    ) -> Result<Self, DocumentError> {
        DIDDocument::from_map(config.apply(map)?)
    }

    pub fn context(&self) -> &[ContextEntry] {
        &self.context
    }

    pub fn id(&self) -> &DID {
        &self.id
    }

    pub fn also_known_as(&self) -> Option<&[String]> {
        self.also_known_as.as_deref()
    }

    pub fn controller(&self) -> Option<&[DID]> {
        self.controller.as_deref()
    }

    /// Verification methods; empty when the document has none
    pub fn verification_methods(&self) -> &[VerificationMethod] {
        self.verification_method.as_deref().unwrap_or_default()
    }

    pub fn relationship(&self, kind: RelationshipKind) -> Option<&VerificationRelationship> {
        match kind {
            RelationshipKind::Authentication => self.authentication.as_ref(),
            RelationshipKind::AssertionMethod => self.assertion_method.as_ref(),
            RelationshipKind::KeyAgreement => self.key_agreement.as_ref(),
            RelationshipKind::CapabilityInvocation => self.capability_invocation.as_ref(),
            RelationshipKind::CapabilityDelegation => self.capability_delegation.as_ref(),
        }
    }

    pub fn authentication(&self) -> Option<&VerificationRelationship> {
        self.authentication.as_ref()
    }

    pub fn assertion_method(&self) -> Option<&VerificationRelationship> {
        self.assertion_method.as_ref()
    }

    pub fn key_agreement(&self) -> Option<&VerificationRelationship> {
        self.key_agreement.as_ref()
    }

    pub fn capability_invocation(&self) -> Option<&VerificationRelationship> {
        self.capability_invocation.as_ref()
    }

    pub fn capability_delegation(&self) -> Option<&VerificationRelationship> {
        self.capability_delegation.as_ref()
    }

    /// Services; empty when the document has none
    pub fn services(&self) -> &[Service] {
        self.service.as_deref().unwrap_or_default()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn resolve_slot(&self, slot: Slot) -> Option<ResourceRef<'_>> {
        match slot {
            Slot::VerificationMethod(i) => self
                .verification_methods()
                .get(i)
                .map(ResourceRef::VerificationMethod),
            Slot::Relationship(kind, i) => self
                .relationship(kind)?
                .items()
                .get(i)?
                .as_embedded()
                .map(ResourceRef::VerificationMethod),
            Slot::Service(i) => self.services().get(i).map(ResourceRef::Service),
        }
    }

    /// Find the resource named by `reference`, a DID URL that is either
    /// absolute or relative to this document
    pub fn dereference(&self, reference: &str) -> Result<ResourceRef<'_>, DocumentError> {
        let url: DIDUrl = reference.parse()?;
        self.dereference_url(&url)
    }

    pub fn dereference_url(&self, url: &DIDUrl) -> Result<ResourceRef<'_>, DocumentError> {
        let id = url.as_absolute(&self.id);
        self.index
            .get(&id)
            .and_then(|slot| self.resolve_slot(slot))
            .ok_or_else(|| DocumentError::IDNotFound(id.to_string()))
    }

    /// Dereference, then read the resource as `T`
    pub fn dereference_as<T: Resource>(&self, reference: &str) -> Result<T, DocumentError> {
        self.dereference(reference)?.deserialize_into()
    }

    /// Returns a DID Verification Method if found by ID
    pub fn get_verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.dereference(id).ok()?.as_verification_method()
    }

    /// Returns a reference to the first service with the given fragment
    /// (the text after the `#` in the service id), if it exists
    pub fn find_service(&self, fragment: &str) -> Option<&Service> {
        self.services()
            .iter()
            .find(|s| s.id().fragment() == Some(fragment))
    }

    /// Is `item` part of the relationship `kind`? Relative ids on either side
    /// are resolved against this document's DID.
    pub fn contains(&self, kind: RelationshipKind, item: &RelationshipItem) -> bool {
        self.relationship(kind)
            .is_some_and(|relationship| relationship.contains_in(item, &self.id))
    }

    /// Does this DID contain authentication verification_method with the given id?
    pub fn contains_authentication(&self, id: &str) -> bool {
        self.contains_reference(RelationshipKind::Authentication, id)
    }

    /// Does this DID contain a key agreement with the given id?
    pub fn contains_key_agreement(&self, id: &str) -> bool {
        self.contains_reference(RelationshipKind::KeyAgreement, id)
    }

    fn contains_reference(&self, kind: RelationshipKind, id: &str) -> bool {
        match id.parse::<DIDUrl>() {
            Ok(url) => self.contains(kind, &RelationshipItem::Reference(url)),
            Err(_) => false,
        }
    }

    /// The methods of relationship `kind`, references dereferenced
    pub fn resolve_relationship(
        &self,
        kind: RelationshipKind,
    ) -> Result<Vec<&VerificationMethod>, DocumentError> {
        let Some(relationship) = self.relationship(kind) else {
            return Ok(Vec::new());
        };

        relationship
            .iter()
            .map(|item| match item {
                RelationshipItem::Embedded(vm) => Ok(vm),
                RelationshipItem::Reference(url) => {
                    let resource = self.dereference_url(url)?;
                    resource
                        .as_verification_method()
                        .ok_or_else(|| DocumentError::TypeMismatch {
                            id: url.to_string(),
                            expected: VerificationMethod::KIND,
                            reason: "reference names a service".to_string(),
                        })
                }
            })
            .collect()
    }
}

/// Validation of the document spine; nested resources are checked later
fn validate_spine(map: &Map<String, Value>) -> Result<Option<DID>, DocumentError> {
    let mut check = Validator::new(DIDDocument::KIND, map);
    let id = check.did("id", true);

    match check.present("@context", false) {
        None | Some(Value::String(_)) | Some(Value::Object(_)) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !matches!(item, Value::String(_) | Value::Object(_)) {
                    check.error(
                        &format!("@context[{i}]"),
                        format!("expected a string or an object, found {}", json_kind(item)),
                    );
                }
            }
        }
        Some(other) => check.error(
            "@context",
            format!("expected a string or a list, found {}", json_kind(other)),
        ),
    }

    check.string_list("alsoKnownAs", false);

    match check.present("controller", false) {
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !item.as_str().is_some_and(DID::is_valid) {
                    check.error(&format!("controller[{i}]"), "expected a DID");
                }
            }
        }
        Some(_) => {
            check.did("controller", false);
        }
        None => {}
    }

    check.array("verificationMethod", false);
    for kind in RelationshipKind::ALL {
        check.array(kind.field(), false);
    }
    check.array("service", false);

    check.finish()?;
    Ok(id)
}

/// Remove an optional field; `null` counts as absent
fn take_field(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    map.remove(key).filter(|value| !value.is_null())
}

/// Remove a list of resources from `map`, collecting validation failures
/// of its entries into `errors`
fn take_resources<T: Resource>(
    map: &mut Map<String, Value>,
    key: &str,
    errors: &mut Vec<String>,
) -> Result<Option<Vec<T>>, DocumentError> {
    let Some(Value::Array(values)) = take_field(map, key) else {
        return Ok(None);
    };

    let mut items = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match T::from_value(value) {
            Ok(item) => items.push(item),
            Err(DocumentError::Validation { errors: inner, .. }) => {
                errors.extend(inner.into_iter().map(|e| format!("{key}[{i}].{e}")));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Some(items))
}

fn take_relationship(
    map: &mut Map<String, Value>,
    kind: RelationshipKind,
    errors: &mut Vec<String>,
) -> Result<Option<VerificationRelationship>, DocumentError> {
    let Some(value) = take_field(map, kind.field()) else {
        return Ok(None);
    };
    match VerificationRelationship::from_value(value) {
        Ok(relationship) => Ok(Some(relationship)),
        Err(DocumentError::Validation { errors: inner, .. }) => {
            let field = kind.field();
            errors.extend(inner.into_iter().map(|e| {
                if e.starts_with('[') {
                    format!("{field}{e}")
                } else {
                    format!("{field}: {e}")
                }
            }));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl Resource for DIDDocument {
    const KIND: &'static str = "DIDDocument";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        let mut map = corrections::allow_public_key(map)?;

        let Some(id) = validate_spine(&map)? else {
            return Err(DocumentError::validation(Self::KIND, "id: field required"));
        };

        let context = match take_field(&mut map, "@context") {
            Some(value) => serde_json::from_value::<OneOrMany<ContextEntry>>(value)
                .map_err(|e| DocumentError::validation(Self::KIND, format!("@context: {e}")))?
                .into_vec(),
            None => vec![ContextEntry::from(DID_CONTEXT)],
        };
        let also_known_as = take_field(&mut map, "alsoKnownAs")
            .map(serde_json::from_value::<Vec<String>>)
            .transpose()
            .map_err(|e| DocumentError::validation(Self::KIND, format!("alsoKnownAs: {e}")))?;
        let controller = take_field(&mut map, "controller")
            .map(serde_json::from_value::<OneOrMany<DID>>)
            .transpose()
            .map_err(|e| DocumentError::validation(Self::KIND, format!("controller: {e}")))?
            .map(OneOrMany::into_vec);

        let mut errors = Vec::new();
        let verification_method = take_resources(&mut map, "verificationMethod", &mut errors)?;
        let authentication =
            take_relationship(&mut map, RelationshipKind::Authentication, &mut errors)?;
        let assertion_method =
            take_relationship(&mut map, RelationshipKind::AssertionMethod, &mut errors)?;
        let key_agreement =
            take_relationship(&mut map, RelationshipKind::KeyAgreement, &mut errors)?;
        let capability_invocation =
            take_relationship(&mut map, RelationshipKind::CapabilityInvocation, &mut errors)?;
        let capability_delegation =
            take_relationship(&mut map, RelationshipKind::CapabilityDelegation, &mut errors)?;
        let service = take_resources(&mut map, "service", &mut errors)?;

        if !errors.is_empty() {
            return Err(DocumentError::Validation {
                resource: Self::KIND,
                errors,
            });
        }

        map.remove("id");
        let mut doc = DIDDocument {
            context,
            id,
            also_known_as,
            controller,
            verification_method,
            authentication,
            assertion_method,
            key_agreement,
            capability_invocation,
            capability_delegation,
            service,
            extra: map,
            index: ResourceIndex::default(),
        };

        let index = ResourceIndex::build(
            &doc.id,
            doc.verification_methods(),
            RelationshipKind::ALL
                .into_iter()
                .filter_map(|kind| doc.relationship(kind).map(|r| (kind, r))),
            doc.services(),
        )?;
        debug!("indexed {} resource(s) of {}", index.len(), doc.id);
        doc.index = index;

        Ok(doc)
    }
}

impl Serialize for DIDDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@context", &self.context)?;
        map.serialize_entry("id", &self.id)?;
        if let Some(also_known_as) = &self.also_known_as {
            map.serialize_entry("alsoKnownAs", also_known_as)?;
        }
        if let Some(controller) = &self.controller {
            map.serialize_entry("controller", controller)?;
        }
        if let Some(verification_method) = &self.verification_method {
            map.serialize_entry("verificationMethod", verification_method)?;
        }
        for kind in RelationshipKind::ALL {
            if let Some(relationship) = self.relationship(kind) {
                map.serialize_entry(kind.field(), relationship)?;
            }
        }
        if let Some(service) = &self.service {
            map.serialize_entry("service", service)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DIDDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        DIDDocument::from_map(map).map_err(de::Error::custom)
    }
}

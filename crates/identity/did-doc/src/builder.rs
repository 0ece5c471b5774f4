//! Builders for DID Documents and their resources
//!
//! [`DIDDocumentBuilder`] owns one sub-builder per list of the document.
//! Sub-builders hand out fragment ids of the form `<base>-<n>` when no
//! explicit ident is given; `n` starts at the number of concrete items the
//! sub-builder was seeded with, so a builder made with
//! [`DIDDocumentBuilder::from_doc`] continues the numbering of the document.
//!
//! ```rust
//! use did_doc::{DID, builder::DIDDocumentBuilder, verification_method::{Material, Suite}};
//!
//! let did: DID = "did:example:123".parse().unwrap();
//! let mut builder = DIDDocumentBuilder::new(did);
//! let key = builder
//!     .verification_method()
//!     .add(
//!         Material::Base58("3M5RCDjPTWPkKSN3sxUmmMqHbmRPegYP1tjcKyrDbt9J".to_string()),
//!         Some(Suite::Ed25519VerificationKey2018),
//!         None,
//!         None,
//!     )
//!     .unwrap()
//!     .id()
//!     .clone();
//! builder.authentication().reference(key);
//!
//! let doc = builder.build().unwrap();
//! assert!(doc.contains_authentication("#key-0"));
//! ```

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    DID, DIDUrl,
    document::{ContextEntry, DID_CONTEXT, DIDDocument},
    errors::DocumentError,
    resource::Resource,
    service::{
        DIDCommV1Service, DIDCommV1Type, DIDCommV2Endpoint, DIDCommV2Service, DIDCommV2Type,
        Service, ServiceEndpoint,
    },
    verification_method::{Material, Suite, VerificationMethod},
    verification_relationship::{RelationshipItem, RelationshipKind, VerificationRelationship},
};

/// Document fields owned by the builder; extras may not shadow them
const BUILDER_FIELDS: &[&str] = &[
    "@context",
    "id",
    "alsoKnownAs",
    "controller",
    "verificationMethod",
    "authentication",
    "assertionMethod",
    "keyAgreement",
    "capabilityInvocation",
    "capabilityDelegation",
    "service",
];

/// Generates `<base>-<n>` fragments
#[derive(Debug, Clone)]
struct IdGenerator {
    base: &'static str,
    next: usize,
}

impl IdGenerator {
    fn new(base: &'static str, start: usize) -> Self {
        IdGenerator { base, next: start }
    }

    /// Next fragment for which `taken` is false
    fn next_ident(&mut self, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let ident = format!("{}-{}", self.base, self.next);
            self.next += 1;
            if !taken(&ident) {
                return ident;
            }
        }
    }
}

fn has_fragment(id: &DIDUrl, fragment: &str) -> bool {
    id.fragment() == Some(fragment)
}

/// Builds verification methods under a DID
#[derive(Debug, Clone)]
pub struct VerificationMethodBuilder {
    did: DID,
    ids: IdGenerator,
    default_suite: Option<Suite>,
    methods: Vec<VerificationMethod>,
}

impl VerificationMethodBuilder {
    fn seeded(did: DID, base: &'static str, methods: Vec<VerificationMethod>) -> Self {
        VerificationMethodBuilder {
            did,
            ids: IdGenerator::new(base, methods.len()),
            default_suite: None,
            methods,
        }
    }

    /// Suite used by [`Self::add`] when none is given
    pub fn set_default_suite(&mut self, suite: Suite) -> &mut Self {
        self.default_suite = Some(suite);
        self
    }

    /// Create a method from its parts; `controller` defaults to the
    /// builder's DID and `suite` to the default suite
    fn make(
        &self,
        ident: &str,
        material: Material,
        suite: Option<Suite>,
        controller: Option<DID>,
    ) -> Result<VerificationMethod, DocumentError> {
        let suite = suite.or_else(|| self.default_suite.clone()).ok_or_else(|| {
            DocumentError::Builder("no suite given and no default suite set".to_string())
        })?;
        let id = self.did.reference(ident)?;
        let controller = controller.unwrap_or_else(|| self.did.clone());
        VerificationMethod::new(id, suite, controller, material)
    }

    /// Add a verification method, returning the stored method.
    ///
    /// Without `ident` the next free `key-<n>` fragment is used.
    pub fn add(
        &mut self,
        material: Material,
        suite: Option<Suite>,
        ident: Option<&str>,
        controller: Option<DID>,
    ) -> Result<&VerificationMethod, DocumentError> {
        let ident = match ident {
            Some(ident) => ident.to_string(),
            None => {
                let methods = &self.methods;
                self.ids
                    .next_ident(|ident| methods.iter().any(|vm| has_fragment(vm.id(), ident)))
            }
        };
        let vm = self.make(&ident, material, suite, controller)?;
        debug!("builder: added verification method {}", vm.id());
        self.methods.push(vm);
        Ok(&self.methods[self.methods.len() - 1])
    }

    /// Remove a method equal to `vm`
    pub fn remove(&mut self, vm: &VerificationMethod) -> Result<(), DocumentError> {
        let position = self
            .methods
            .iter()
            .position(|stored| stored == vm)
            .ok_or_else(|| DocumentError::Builder(format!("{} is not in the builder", vm.id())))?;
        self.methods.remove(position);
        Ok(())
    }

    pub fn methods(&self) -> &[VerificationMethod] {
        &self.methods
    }
}

/// Builds a verification relationship: embedded methods and references
#[derive(Debug, Clone)]
pub struct RelationshipBuilder {
    kind: RelationshipKind,
    methods: VerificationMethodBuilder,
    items: Vec<RelationshipItem>,
}

impl RelationshipBuilder {
    fn seeded(did: DID, kind: RelationshipKind, items: Vec<RelationshipItem>) -> Self {
        let base = match kind {
            RelationshipKind::Authentication => "auth",
            RelationshipKind::AssertionMethod => "assert",
            RelationshipKind::KeyAgreement => "key-agreement",
            RelationshipKind::CapabilityInvocation => "capability-invocation",
            RelationshipKind::CapabilityDelegation => "capability-delegation",
        };
        let mut methods = VerificationMethodBuilder::seeded(did, base, Vec::new());
        methods.ids.next = items.iter().filter(|item| !item.is_reference()).count();
        RelationshipBuilder {
            kind,
            methods,
            items,
        }
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    /// Suite used by [`Self::embed`] when none is given
    pub fn set_default_suite(&mut self, suite: Suite) -> &mut Self {
        self.methods.set_default_suite(suite);
        self
    }

    /// Add a reference to a method defined elsewhere
    pub fn reference(&mut self, url: DIDUrl) -> &mut Self {
        self.items.push(RelationshipItem::Reference(url));
        self
    }

    /// Parse `url` and add it as a reference
    pub fn reference_str(&mut self, url: &str) -> Result<&mut Self, DocumentError> {
        let url: DIDUrl = url
            .parse()
            .map_err(|e| DocumentError::Builder(format!("reference must be a DID URL, not {url:?}: {e}")))?;
        Ok(self.reference(url))
    }

    /// Embed a new verification method, returning it
    pub fn embed(
        &mut self,
        material: Material,
        suite: Option<Suite>,
        ident: Option<&str>,
        controller: Option<DID>,
    ) -> Result<&VerificationMethod, DocumentError> {
        let ident = match ident {
            Some(ident) => ident.to_string(),
            None => {
                let items = &self.items;
                self.methods
                    .ids
                    .next_ident(|ident| items.iter().any(|item| has_fragment(item.id(), ident)))
            }
        };
        let vm = self.methods.make(&ident, material, suite, controller)?;
        debug!("builder: embedded {} in {}", vm.id(), self.kind);
        self.items.push(RelationshipItem::Embedded(vm));
        self.items
            .last()
            .and_then(RelationshipItem::as_embedded)
            .ok_or_else(|| DocumentError::Builder("embedded method was not stored".to_string()))
    }

    /// Remove an item equal to `item`, embedded or reference
    pub fn remove(&mut self, item: &RelationshipItem) -> Result<(), DocumentError> {
        let position = self
            .items
            .iter()
            .position(|stored| stored == item)
            .ok_or_else(|| {
                DocumentError::Builder(format!("{} is not in {}", item.id(), self.kind))
            })?;
        self.items.remove(position);
        Ok(())
    }

    pub fn items(&self) -> &[RelationshipItem] {
        &self.items
    }
}

/// Optional settings of [`ServiceBuilder::add_didcomm`]
#[derive(Debug, Clone, Default)]
pub struct DIDCommServiceOptions {
    pub type_: Option<DIDCommV1Type>,
    pub ident: Option<String>,
    pub accept: Option<Vec<String>>,
    /// Defaults to one more than the highest priority of the DIDComm
    /// services already added
    pub priority: Option<i64>,
}

/// Builds services under a DID
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    did: DID,
    ids: IdGenerator,
    services: Vec<Service>,
}

impl ServiceBuilder {
    fn seeded(did: DID, services: Vec<Service>) -> Self {
        ServiceBuilder {
            did,
            ids: IdGenerator::new("service", services.len()),
            services,
        }
    }

    fn service_id(&mut self, ident: Option<&str>) -> Result<DIDUrl, DocumentError> {
        let ident = match ident {
            Some(ident) => ident.to_string(),
            None => {
                let services = &self.services;
                self.ids
                    .next_ident(|ident| services.iter().any(|s| has_fragment(s.id(), ident)))
            }
        };
        Ok(self.did.reference(&ident)?)
    }

    fn push(&mut self, service: Service) -> &Service {
        debug!("builder: added service {}", service.id());
        self.services.push(service);
        &self.services[self.services.len() - 1]
    }

    /// Add a service of any type.
    ///
    /// The service is read back the way a document would read it, so a
    /// DIDComm shaped service comes out as its DIDComm variant.
    pub fn add(
        &mut self,
        type_: &str,
        endpoint: impl Into<ServiceEndpoint>,
        ident: Option<&str>,
        extra: Map<String, Value>,
    ) -> Result<&Service, DocumentError> {
        let id = self.service_id(ident)?;
        let endpoint: ServiceEndpoint = endpoint.into();
        let mut map = extra;
        map.insert("id".to_string(), Value::String(id.to_string()));
        map.insert("type".to_string(), Value::String(type_.to_string()));
        map.insert(
            "serviceEndpoint".to_string(),
            serde_json::to_value(endpoint)?,
        );
        let service = Service::from_map(map)?;
        Ok(self.push(service))
    }

    /// Add a DIDComm v1 service
    pub fn add_didcomm(
        &mut self,
        endpoint: &str,
        recipient_keys: Vec<DIDUrl>,
        routing_keys: Vec<DIDUrl>,
        options: DIDCommServiceOptions,
    ) -> Result<&Service, DocumentError> {
        let id = self.service_id(options.ident.as_deref())?;
        let priority = match options.priority {
            Some(priority) => priority,
            None => self
                .services
                .iter()
                .filter_map(|service| match service {
                    Service::DIDCommV1(s) => Some(s.priority),
                    _ => None,
                })
                .max()
                .map_or(0, |max| max + 1),
        };
        let service = DIDCommV1Service {
            id,
            type_: options.type_.unwrap_or_default(),
            service_endpoint: endpoint.into(),
            recipient_keys,
            routing_keys,
            accept: options.accept,
            priority,
        };
        Ok(self.push(service.into()))
    }

    /// Add a DIDComm v2 service with one or more endpoints
    pub fn add_didcomm_v2(
        &mut self,
        endpoints: Vec<DIDCommV2Endpoint>,
        ident: Option<&str>,
    ) -> Result<&Service, DocumentError> {
        if endpoints.is_empty() {
            return Err(DocumentError::Builder(
                "a DIDComm v2 service needs at least one endpoint".to_string(),
            ));
        }
        let service = DIDCommV2Service {
            id: self.service_id(ident)?,
            type_: DIDCommV2Type::DIDCommMessaging,
            service_endpoint: endpoints.into(),
        };
        Ok(self.push(service.into()))
    }

    /// Remove a service equal to `service`
    pub fn remove(&mut self, service: &Service) -> Result<(), DocumentError> {
        let position = self
            .services
            .iter()
            .position(|stored| stored == service)
            .ok_or_else(|| {
                DocumentError::Builder(format!("{} is not in the builder", service.id()))
            })?;
        self.services.remove(position);
        Ok(())
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }
}

/// Mutable construction of a [`DIDDocument`]
#[derive(Debug, Clone)]
pub struct DIDDocumentBuilder {
    id: DID,
    context: Vec<ContextEntry>,
    also_known_as: Option<Vec<String>>,
    controller: Option<Vec<DID>>,
    verification_method: VerificationMethodBuilder,
    authentication: RelationshipBuilder,
    assertion_method: RelationshipBuilder,
    key_agreement: RelationshipBuilder,
    capability_invocation: RelationshipBuilder,
    capability_delegation: RelationshipBuilder,
    service: ServiceBuilder,
    extra: Map<String, Value>,
}

impl DIDDocumentBuilder {
    /// Empty document for `id` with the default DID context
    pub fn new(id: DID) -> Self {
        let relationship = |kind| RelationshipBuilder::seeded(id.clone(), kind, Vec::new());
        DIDDocumentBuilder {
            context: vec![ContextEntry::from(DID_CONTEXT)],
            also_known_as: None,
            controller: None,
            verification_method: VerificationMethodBuilder::seeded(id.clone(), "key", Vec::new()),
            authentication: relationship(RelationshipKind::Authentication),
            assertion_method: relationship(RelationshipKind::AssertionMethod),
            key_agreement: relationship(RelationshipKind::KeyAgreement),
            capability_invocation: relationship(RelationshipKind::CapabilityInvocation),
            capability_delegation: relationship(RelationshipKind::CapabilityDelegation),
            service: ServiceBuilder::seeded(id.clone(), Vec::new()),
            extra: Map::new(),
            id,
        }
    }

    /// Builder seeded with every part of `doc`
    pub fn from_doc(doc: &DIDDocument) -> Self {
        let id = doc.id().clone();
        let relationship = |kind| {
            let items = doc
                .relationship(kind)
                .map(|r| r.items().to_vec())
                .unwrap_or_default();
            RelationshipBuilder::seeded(id.clone(), kind, items)
        };
        DIDDocumentBuilder {
            context: doc.context().to_vec(),
            also_known_as: doc.also_known_as().map(<[String]>::to_vec),
            controller: doc.controller().map(<[DID]>::to_vec),
            verification_method: VerificationMethodBuilder::seeded(
                id.clone(),
                "key",
                doc.verification_methods().to_vec(),
            ),
            authentication: relationship(RelationshipKind::Authentication),
            assertion_method: relationship(RelationshipKind::AssertionMethod),
            key_agreement: relationship(RelationshipKind::KeyAgreement),
            capability_invocation: relationship(RelationshipKind::CapabilityInvocation),
            capability_delegation: relationship(RelationshipKind::CapabilityDelegation),
            service: ServiceBuilder::seeded(id.clone(), doc.services().to_vec()),
            extra: doc.extra().clone(),
            id,
        }
    }

    /// Replace `@context`
    pub fn with_context(mut self, context: Vec<ContextEntry>) -> Self {
        self.context = context;
        self
    }

    pub fn with_also_known_as(mut self, also_known_as: Vec<String>) -> Self {
        self.also_known_as = Some(also_known_as);
        self
    }

    pub fn with_controller(mut self, controller: Vec<DID>) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Set a property without a typed representation
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &DID {
        &self.id
    }

    pub fn verification_method(&mut self) -> &mut VerificationMethodBuilder {
        &mut self.verification_method
    }

    pub fn relationship(&mut self, kind: RelationshipKind) -> &mut RelationshipBuilder {
        match kind {
            RelationshipKind::Authentication => &mut self.authentication,
            RelationshipKind::AssertionMethod => &mut self.assertion_method,
            RelationshipKind::KeyAgreement => &mut self.key_agreement,
            RelationshipKind::CapabilityInvocation => &mut self.capability_invocation,
            RelationshipKind::CapabilityDelegation => &mut self.capability_delegation,
        }
    }

    pub fn authentication(&mut self) -> &mut RelationshipBuilder {
        &mut self.authentication
    }

    pub fn assertion_method(&mut self) -> &mut RelationshipBuilder {
        &mut self.assertion_method
    }

    pub fn key_agreement(&mut self) -> &mut RelationshipBuilder {
        &mut self.key_agreement
    }

    pub fn capability_invocation(&mut self) -> &mut RelationshipBuilder {
        &mut self.capability_invocation
    }

    pub fn capability_delegation(&mut self) -> &mut RelationshipBuilder {
        &mut self.capability_delegation
    }

    pub fn service(&mut self) -> &mut ServiceBuilder {
        &mut self.service
    }

    /// Assemble a new document.
    ///
    /// The document is read through [`DIDDocument::from_map`], so it is
    /// validated and indexed exactly like a parsed one. Empty lists are left
    /// out.
    pub fn build(&self) -> Result<DIDDocument, DocumentError> {
        let mut map = Map::new();
        for (key, value) in &self.extra {
            if BUILDER_FIELDS.contains(&key.as_str()) {
                warn!("builder: extra property {key} is shadowed by the document field");
                continue;
            }
            // Without methods, a stale publicKey would be read as verificationMethod
            if key == "publicKey" && self.verification_method.methods.is_empty() {
                warn!("builder: dropping legacy publicKey; no verification methods remain");
                continue;
            }
            map.insert(key.clone(), value.clone());
        }

        map.insert("@context".to_string(), serde_json::to_value(&self.context)?);
        map.insert("id".to_string(), Value::String(self.id.to_string()));
        if let Some(also_known_as) = &self.also_known_as {
            map.insert("alsoKnownAs".to_string(), serde_json::to_value(also_known_as)?);
        }
        if let Some(controller) = &self.controller {
            map.insert("controller".to_string(), serde_json::to_value(controller)?);
        }
        if !self.verification_method.methods.is_empty() {
            map.insert(
                "verificationMethod".to_string(),
                serde_json::to_value(&self.verification_method.methods)?,
            );
        }
        for relationship in [
            &self.authentication,
            &self.assertion_method,
            &self.key_agreement,
            &self.capability_invocation,
            &self.capability_delegation,
        ] {
            if !relationship.items.is_empty() {
                let items = VerificationRelationship::new(relationship.items.clone());
                map.insert(relationship.kind.field().to_string(), serde_json::to_value(&items)?);
            }
        }
        if !self.service.services.is_empty() {
            map.insert("service".to_string(), serde_json::to_value(&self.service.services)?);
        }

        DIDDocument::from_map(map)
    }
}

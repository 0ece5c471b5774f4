//! Resource index of a DID document.
//!
//! Maps the absolute id of every embedded resource (verification methods,
//! methods embedded in relationships, services) to its position in the
//! document. Bare relationship references are not indexed; they resolve
//! through the index to the method they name.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{trace, warn};

use crate::{
    DID, DIDUrl,
    errors::DocumentError,
    resource::Resource,
    service::Service,
    verification_method::VerificationMethod,
    verification_relationship::{RelationshipKind, VerificationRelationship},
};

/// Position of an indexed resource inside its document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    VerificationMethod(usize),
    Relationship(RelationshipKind, usize),
    Service(usize),
}

/// A resource found in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    VerificationMethod(&'a VerificationMethod),
    Service(&'a Service),
}

impl<'a> ResourceRef<'a> {
    pub fn id(&self) -> &'a DIDUrl {
        match self {
            ResourceRef::VerificationMethod(vm) => vm.id(),
            ResourceRef::Service(service) => service.id(),
        }
    }

    pub fn as_verification_method(&self) -> Option<&'a VerificationMethod> {
        match self {
            ResourceRef::VerificationMethod(vm) => Some(vm),
            ResourceRef::Service(_) => None,
        }
    }

    pub fn as_service(&self) -> Option<&'a Service> {
        match self {
            ResourceRef::Service(service) => Some(service),
            ResourceRef::VerificationMethod(_) => None,
        }
    }

    pub fn to_map(&self) -> Result<Map<String, Value>, DocumentError> {
        match self {
            ResourceRef::VerificationMethod(vm) => vm.to_map(),
            ResourceRef::Service(service) => service.to_map(),
        }
    }

    /// Re-read the resource as `T`, failing with
    /// [`DocumentError::TypeMismatch`] if its shape does not fit
    pub fn deserialize_into<T: Resource>(&self) -> Result<T, DocumentError> {
        T::from_map(self.to_map()?).map_err(|e| DocumentError::TypeMismatch {
            id: self.id().to_string(),
            expected: T::KIND,
            reason: e.to_string(),
        })
    }

    /// Equal once both ids are resolved against `did`
    fn same_as(&self, other: &ResourceRef<'_>, did: &DID) -> bool {
        match (self, other) {
            (ResourceRef::VerificationMethod(a), ResourceRef::VerificationMethod(b)) => {
                a.with_id(a.id().as_absolute(did)) == b.with_id(b.id().as_absolute(did))
            }
            (ResourceRef::Service(a), ResourceRef::Service(b)) => {
                a.with_id(a.id().as_absolute(did)) == b.with_id(b.id().as_absolute(did))
            }
            _ => false,
        }
    }
}

/// Absolute id to resource position, owned by one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIndex {
    entries: HashMap<DIDUrl, Slot>,
}

impl ResourceIndex {
    /// Walk the parts of a document and index everything that carries an id.
    ///
    /// Re-inserting an equal resource under the same id is accepted; two
    /// different resources sharing an id fail with
    /// [`DocumentError::IdentifiedResourceMismatch`].
    pub(crate) fn build<'a>(
        did: &DID,
        verification_methods: &'a [VerificationMethod],
        relationships: impl IntoIterator<Item = (RelationshipKind, &'a VerificationRelationship)>,
        services: &'a [Service],
    ) -> Result<Self, DocumentError> {
        let mut seen: HashMap<DIDUrl, (Slot, ResourceRef<'a>)> = HashMap::new();

        let mut insert = |slot: Slot, resource: ResourceRef<'a>| -> Result<(), DocumentError> {
            let id = resource.id().as_absolute(did);
            if let Some((_, existing)) = seen.get(&id) {
                if existing.same_as(&resource, did) {
                    trace!("index: {id} already present with an equal resource");
                    return Ok(());
                }
                warn!("index: {id} is claimed by two different resources");
                return Err(DocumentError::IdentifiedResourceMismatch(id.to_string()));
            }
            trace!("index: inserting {id}");
            seen.insert(id, (slot, resource));
            Ok(())
        };

        for (i, vm) in verification_methods.iter().enumerate() {
            insert(Slot::VerificationMethod(i), ResourceRef::VerificationMethod(vm))?;
        }
        for (kind, relationship) in relationships {
            for (i, item) in relationship.iter().enumerate() {
                if let Some(vm) = item.as_embedded() {
                    insert(Slot::Relationship(kind, i), ResourceRef::VerificationMethod(vm))?;
                }
            }
        }
        for (i, service) in services.iter().enumerate() {
            insert(Slot::Service(i), ResourceRef::Service(service))?;
        }

        Ok(ResourceIndex {
            entries: seen
                .into_iter()
                .map(|(id, (slot, _))| (id, slot))
                .collect(),
        })
    }

    pub(crate) fn get(&self, id: &DIDUrl) -> Option<Slot> {
        self.entries.get(id).copied()
    }

    /// Absolute ids of every indexed resource, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = &DIDUrl> {
        self.entries.keys()
    }

    pub fn contains(&self, id: &DIDUrl) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

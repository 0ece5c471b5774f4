/*!
*   DID Document resource model
*
*   Typed parsing, validation, indexing, dereferencing and building of
*   [DID Documents](https://www.w3.org/TR/did-core/).
*
*   Raw documents arrive as JSON maps. [`DIDDocument::from_map`] checks the
*   document shape, resolves every verification method and service into its
*   concrete variant (unknown types are kept, not rejected) and builds the
*   resource index used by [`DIDDocument::dereference`].
*/

pub mod builder;
pub mod config;
pub mod corrections;
pub mod did;
pub mod did_url;
pub mod document;
pub mod errors;
pub mod index;
pub mod one_or_many;
pub mod resource;
pub mod service;
pub mod verification_method;
pub mod verification_relationship;

pub use builder::DIDDocumentBuilder;
pub use did::DID;
pub use did_url::DIDUrl;
pub use document::DIDDocument;
pub use errors::{DIDError, DocumentError};
pub use index::ResourceRef;
pub use resource::Resource;
pub use service::Service;
pub use verification_method::VerificationMethod;
pub use verification_relationship::{RelationshipItem, RelationshipKind, VerificationRelationship};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_and_dereference() {
        let doc = DIDDocument::from_value(json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:example:123456789abcdefghi",
            "verificationMethod": [{
                "id": "#keys-1",
                "type": "Ed25519VerificationKey2018",
                "controller": "did:example:123456789abcdefghi",
                "publicKeyBase58": "H3C2AVvLMv6gmMNam3uVAjZpfkcJCwDwnZn6z3wXmqPV"
            }]
        }))
        .unwrap();

        let vm = doc
            .dereference("did:example:123456789abcdefghi#keys-1")
            .unwrap()
            .as_verification_method()
            .unwrap();
        assert_eq!(vm.type_(), "Ed25519VerificationKey2018");
    }
}

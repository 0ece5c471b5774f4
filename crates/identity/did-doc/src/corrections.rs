//! Corrections for known deviations in documents produced by resolvers.
//!
//! A correction is a pure `map -> map` function applied to the raw document
//! before it is validated. Corrections are chosen by the caller through
//! [`crate::config::DocumentConfig`]; the validation rules themselves never
//! change.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{DID, errors::DocumentError};

/// A correction applied to a raw document
pub type Correction = fn(Map<String, Value>) -> Result<Map<String, Value>, DocumentError>;

/// Read the legacy `publicKey` field as `verificationMethod`.
///
/// Only applies when `verificationMethod` is absent; otherwise `publicKey`
/// is left alone and kept as an extra field.
pub fn allow_public_key(
    mut doc: Map<String, Value>,
) -> Result<Map<String, Value>, DocumentError> {
    if !doc.contains_key("verificationMethod")
        && let Some(public_key) = doc.remove("publicKey")
    {
        warn!("document uses legacy publicKey; reading it as verificationMethod");
        doc.insert("verificationMethod".to_string(), public_key);
    }
    Ok(doc)
}

/// Give every resource without an `id` the id `<did>#inserted-<n>`.
///
/// Objects found in the top-level fields of the document (directly or inside
/// lists) are resources; `n` counts up from 0 across the whole document.
/// Inline `@context` objects are left alone.
pub fn insert_missing_ids(
    mut doc: Map<String, Value>,
) -> Result<Map<String, Value>, DocumentError> {
    let did: DID = doc
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| DocumentError::validation("DIDDocument", "id: no ID found in document"))?
        .parse()?;

    let mut next = 0;
    for (key, value) in doc.iter_mut() {
        if key == "@context" || key == "id" {
            continue;
        }
        insert_ids(value, &did, &mut next)?;
    }

    if next > 0 {
        debug!("inserted {next} missing resource id(s) into {did}");
    }
    Ok(doc)
}

fn insert_ids(value: &mut Value, did: &DID, next: &mut usize) -> Result<(), DocumentError> {
    match value {
        Value::Array(items) => {
            for item in items {
                insert_ids(item, did, next)?;
            }
        }
        Value::Object(resource) if !resource.contains_key("id") => {
            let id = did.reference(&format!("inserted-{next}"))?;
            resource.insert("id".to_string(), Value::String(id.to_string()));
            *next += 1;
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn inserts_missing_ids_in_order() {
        let doc = insert_missing_ids(map(json!({
            "id": "did:example:123",
            "verificationMethod": [
                {"the present values": "don't matter here"},
                {"id": "#key-1"},
                {"nor": "here"}
            ],
            "service": [{"type": "LinkedDomains"}]
        })))
        .unwrap();

        assert_eq!(
            doc["verificationMethod"][0]["id"],
            json!("did:example:123#inserted-0")
        );
        assert_eq!(doc["verificationMethod"][1]["id"], json!("#key-1"));
        assert_eq!(
            doc["verificationMethod"][2]["id"],
            json!("did:example:123#inserted-1")
        );
        // Map keys iterate in order, "service" after "verificationMethod"
        assert_eq!(doc["service"][0]["id"], json!("did:example:123#inserted-2"));
    }

    #[test]
    fn inline_context_is_untouched() {
        let doc = insert_missing_ids(map(json!({
            "@context": ["https://www.w3.org/ns/did/v1", {"@vocab": "https://example.com#"}],
            "id": "did:example:123"
        })))
        .unwrap();
        assert!(doc["@context"][1].get("id").is_none());
    }

    #[test]
    fn insert_missing_ids_needs_document_id() {
        assert!(insert_missing_ids(Map::new()).is_err());
    }

    #[test]
    fn public_key_alias() {
        let doc = allow_public_key(map(json!({
            "id": "did:example:123",
            "publicKey": [{"id": "#key-1"}]
        })))
        .unwrap();
        assert!(doc.get("publicKey").is_none());
        assert_eq!(doc["verificationMethod"][0]["id"], json!("#key-1"));
    }

    #[test]
    fn public_key_kept_when_verification_method_present() {
        let doc = allow_public_key(map(json!({
            "id": "did:example:123",
            "publicKey": [{"id": "#old"}],
            "verificationMethod": [{"id": "#new"}]
        })))
        .unwrap();
        assert_eq!(doc["publicKey"][0]["id"], json!("#old"));
        assert_eq!(doc["verificationMethod"][0]["id"], json!("#new"));
    }
}

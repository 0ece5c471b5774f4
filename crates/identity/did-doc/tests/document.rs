use did_doc::{
    DIDDocument, DocumentError, RelationshipItem, RelationshipKind, Resource, Service,
    config::DocumentConfigBuilder,
    resource::GenericResource,
    service::{DIDCommV1Service, DIDCommV2Service},
    verification_method::KnownVerificationMethod,
};
use serde_json::{Value, json};
use tracing_subscriber::filter;

const DID: &str = "did:example:z6Mkmpe2DyE4NsDiAb58d75hpi1BjqbH6wYMschUkjWDEEuR";

fn init_logging() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter::EnvFilter::from_default_env())
        .finish();
    // Several tests share the process; only the first one installs it
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn key(id: &str, key: &str) -> Value {
    json!({
        "id": id,
        "type": "Ed25519VerificationKey2018",
        "controller": DID,
        "publicKeyBase58": key
    })
}

fn round_trip(raw: Value) -> DIDDocument {
    init_logging();
    let doc = DIDDocument::from_value(raw.clone()).expect("Couldn't parse document");
    assert_eq!(serde_json::to_value(&doc).unwrap(), raw);

    let again: DIDDocument =
        serde_json::from_value(serde_json::to_value(&doc).unwrap()).expect("Couldn't re-parse");
    assert_eq!(again, doc);
    doc
}

#[test]
fn round_trip_required_fields_only() {
    let doc = round_trip(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": DID
    }));
    assert!(doc.index().is_empty());
}

#[test]
fn round_trip_all_relationships() {
    let doc = round_trip(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "authentication": ["#key-0", key("#auth-0", "3M5RCDjPTWPkKSN3sxUmmMqHbmRPegYP1tjcKyrDbt9J")],
        "assertionMethod": [format!("{DID}#key-0")],
        "keyAgreement": [{
            "id": "#key-agreement-0",
            "type": "X25519KeyAgreementKey2019",
            "controller": DID,
            "publicKeyBase58": "JhNWeSVLMYccCk7iopQW4guaSJTojqpMEELgSLhKwRr"
        }],
        "capabilityInvocation": ["#key-0"],
        "capabilityDelegation": [key("#capability-delegation-0", "GfHq2tTVk9z4eXgyNRg6uXWsVsiApqPZKAMQSk8Tyd8R")]
    }));

    for kind in RelationshipKind::ALL {
        assert!(doc.relationship(kind).is_some(), "{kind} missing");
    }
    // key-0, auth-0, key-agreement-0 and capability-delegation-0
    assert_eq!(doc.index().len(), 4);
}

#[test]
fn round_trip_didcomm_v1_service() {
    let doc = round_trip(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": DID,
        "service": [{
            "id": "#did-communication",
            "type": "did-communication",
            "serviceEndpoint": "https://agents-r-us.com",
            "recipientKeys": [format!("{DID}#key-0")],
            "routingKeys": [],
            "priority": 0
        }]
    }));
    assert!(matches!(doc.services()[0], Service::DIDCommV1(_)));
}

#[test]
fn round_trip_didcomm_v2_service() {
    let doc = round_trip(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": DID,
        "service": [{
            "id": "#didcomm-0",
            "type": "DIDCommMessaging",
            "serviceEndpoint": [
                {
                    "uri": "https://example.com/didcomm",
                    "accept": ["didcomm/v2"],
                    "routingKeys": ["did:example:mediator#key-1"]
                },
                {
                    "uri": "wss://example.com/ws",
                    "routingKeys": []
                }
            ]
        }]
    }));
    let service: DIDCommV2Service = doc.dereference_as("#didcomm-0").unwrap();
    assert_eq!(service.service_endpoint.len(), 2);
}

#[test]
fn round_trip_unknown_method_and_service() {
    let doc = round_trip(json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": DID,
        "verificationMethod": [{
            "id": "#future",
            "type": "SomeFutureSuite2099",
            "controller": DID,
            "publicKeyFuture": {"x": "abc"}
        }],
        "service": [{
            "id": "#linked-domain",
            "type": ["LinkedDomains", "Extra"],
            "serviceEndpoint": {"origins": ["https://example.com"]},
            "description": "home"
        }]
    }));
    assert!(!doc.verification_methods()[0].suite().is_known());
    assert!(matches!(doc.services()[0], Service::Unknown(_)));
}

#[test]
fn null_optional_fields_are_omitted() {
    init_logging();
    let mut fields = vec!["@context", "alsoKnownAs", "controller", "verificationMethod", "service"];
    fields.extend(RelationshipKind::ALL.map(|kind| kind.field()));

    for field in fields {
        let mut raw = json!({"id": DID});
        raw[field] = Value::Null;
        let doc = DIDDocument::from_value(raw)
            .unwrap_or_else(|e| panic!("{field}: null was rejected: {e}"));

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["@context"], json!(["https://www.w3.org/ns/did/v1"]), "{field}");
        if field != "@context" {
            assert!(value.get(field).is_none(), "{field} was kept");
        }
        assert!(doc.extra().is_empty());
    }
}

#[test]
fn dereference_relative_and_absolute() {
    init_logging();
    let doc = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "service": [{
            "id": "#service-0",
            "type": "LinkedDomains",
            "serviceEndpoint": "https://example.com"
        }]
    }))
    .unwrap();

    let absolute = doc.dereference(&format!("{DID}#key-0")).unwrap();
    let relative = doc.dereference("#key-0").unwrap();
    assert_eq!(absolute, relative);
    assert_eq!(
        absolute.as_verification_method().unwrap().type_(),
        "Ed25519VerificationKey2018"
    );

    let service = doc.dereference("#service-0").unwrap();
    assert_eq!(service.as_service().unwrap().endpoint_uris(), vec!["https://example.com"]);
    assert!(service.as_verification_method().is_none());

    let generic: GenericResource = doc.dereference_as("#service-0").unwrap();
    assert_eq!(generic.properties["serviceEndpoint"], "https://example.com");

    assert!(matches!(
        doc.dereference("#key-9"),
        Err(DocumentError::IDNotFound(id)) if id == format!("{DID}#key-9")
    ));
    assert!(matches!(doc.dereference("key 0"), Err(DocumentError::DID(_))));
}

#[test]
fn dereference_as_wrong_type_is_a_mismatch() {
    let doc = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")]
    }))
    .unwrap();

    let err = doc.dereference_as::<DIDCommV1Service>("#key-0").unwrap_err();
    assert!(matches!(err, DocumentError::TypeMismatch { expected: "DIDCommV1Service", .. }));

    let known: KnownVerificationMethod = doc.dereference_as("#key-0").unwrap();
    assert_eq!(known.id().to_string(), "#key-0");
}

#[test]
fn different_resources_sharing_an_id_are_rejected() {
    let err = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "authentication": [key("#key-0", "3M5RCDjPTWPkKSN3sxUmmMqHbmRPegYP1tjcKyrDbt9J")]
    }))
    .unwrap_err();
    assert!(matches!(
        err,
        DocumentError::IdentifiedResourceMismatch(id) if id == format!("{DID}#key-0")
    ));
}

#[test]
fn identical_resources_sharing_an_id_are_accepted() {
    let doc = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "authentication": [key(&format!("{DID}#key-0"), "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")]
    }))
    .unwrap();
    assert_eq!(doc.index().len(), 1);
    assert!(doc.dereference("#key-0").is_ok());
}

#[test]
fn service_and_method_sharing_an_id_are_rejected() {
    let err = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#shared", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "service": [{"id": "#shared", "type": "LinkedDomains", "serviceEndpoint": "https://example.com"}]
    }))
    .unwrap_err();
    assert!(matches!(err, DocumentError::IdentifiedResourceMismatch(_)));
}

#[test]
fn relationship_membership() {
    let embedded = key("#auth-0", "3M5RCDjPTWPkKSN3sxUmmMqHbmRPegYP1tjcKyrDbt9J");
    let doc = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "authentication": ["#key-0", embedded.clone()]
    }))
    .unwrap();

    let method: RelationshipItem =
        RelationshipItem::Embedded(serde_json::from_value(embedded).unwrap());
    assert!(doc.contains(RelationshipKind::Authentication, &method));

    let by_id = RelationshipItem::Reference(format!("{DID}#auth-0").parse().unwrap());
    assert!(doc.contains(RelationshipKind::Authentication, &by_id));
    assert!(!doc.contains(RelationshipKind::KeyAgreement, &by_id));

    assert!(doc.contains_authentication("#key-0"));
    assert!(doc.contains_authentication(&format!("{DID}#key-0")));
    assert!(!doc.contains_authentication("#key-1"));
    assert!(!doc.contains_key_agreement("#key-0"));
}

#[test]
fn resolve_relationship_follows_references() {
    let doc = DIDDocument::from_value(json!({
        "id": DID,
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")],
        "authentication": ["#key-0", key("#auth-0", "3M5RCDjPTWPkKSN3sxUmmMqHbmRPegYP1tjcKyrDbt9J")],
        "assertionMethod": ["#missing"]
    }))
    .unwrap();

    let methods = doc.resolve_relationship(RelationshipKind::Authentication).unwrap();
    let ids: Vec<String> = methods.iter().map(|vm| vm.id().to_string()).collect();
    assert_eq!(ids, vec!["#key-0", "#auth-0"]);

    assert!(matches!(
        doc.resolve_relationship(RelationshipKind::AssertionMethod),
        Err(DocumentError::IDNotFound(_))
    ));
    assert!(doc
        .resolve_relationship(RelationshipKind::KeyAgreement)
        .unwrap()
        .is_empty());
}

#[test]
fn corrections_run_before_validation() {
    let raw = json!({
        "id": DID,
        "verificationMethod": [{
            "type": "Ed25519VerificationKey2018",
            "controller": DID,
            "publicKeyBase58": "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283"
        }]
    });
    let map = raw.as_object().unwrap().clone();
    assert!(DIDDocument::from_map(map.clone()).is_err());

    let config = DocumentConfigBuilder::default()
        .with_insert_missing_ids()
        .build();
    let doc = DIDDocument::from_map_with(map, &config).unwrap();
    assert!(doc.dereference("#inserted-0").is_ok());
}

#[test]
fn json_text_round_trip() {
    let raw = json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": DID,
        "alsoKnownAs": ["https://example.com/alice"],
        "controller": ["did:example:123"],
        "verificationMethod": [key("#key-0", "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283")]
    });
    let text = serde_json::to_string(&raw).unwrap();
    let doc = DIDDocument::from_json(&text).unwrap();
    assert_eq!(doc.to_json().unwrap(), text);
}

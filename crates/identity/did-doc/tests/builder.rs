use did_doc::{
    DID, DIDDocument, DIDDocumentBuilder, RelationshipItem, RelationshipKind, Resource, Service,
    builder::DIDCommServiceOptions,
    document::ContextEntry,
    service::{DIDCommV1Type, DIDCommV2Endpoint},
    verification_method::{Material, Suite},
};
use serde_json::{Map, json};

fn did() -> DID {
    "did:example:123".parse().unwrap()
}

fn base58(key: &str) -> Material {
    Material::Base58(key.to_string())
}

#[test]
fn methods_without_idents_are_numbered_from_zero() {
    let mut builder = DIDDocumentBuilder::new(did());
    builder
        .verification_method()
        .set_default_suite(Suite::Ed25519VerificationKey2018);
    for key in ["a", "b", "c", "d"] {
        builder.verification_method().add(base58(key), None, None, None).unwrap();
    }
    let doc = builder.build().unwrap();

    let fragments: Vec<&str> = doc
        .verification_methods()
        .iter()
        .filter_map(|vm| vm.id().fragment())
        .collect();
    assert_eq!(fragments, vec!["key-0", "key-1", "key-2", "key-3"]);
    assert!(doc.dereference("#key-3").is_ok());
}

#[test]
fn from_doc_continues_numbering() {
    let doc = DIDDocument::from_value(json!({
        "id": "did:example:123",
        "verificationMethod": [{
            "id": "did:example:123#key-0",
            "type": "Ed25519VerificationKey2018",
            "controller": "did:example:123",
            "publicKeyBase58": "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283"
        }],
        "authentication": ["#key-0"]
    }))
    .unwrap();

    let mut builder = DIDDocumentBuilder::from_doc(&doc);
    let added = builder
        .verification_method()
        .add(
            base58("3M5RCDjPTWPkKSN3sxUmmMqHbmRPegYP1tjcKyrDbt9J"),
            Some(Suite::Ed25519VerificationKey2018),
            None,
            None,
        )
        .unwrap();
    assert_eq!(added.id().to_string(), "did:example:123#key-1");

    // References do not count towards the relationship numbering
    let embedded = builder
        .authentication()
        .embed(
            base58("GfHq2tTVk9z4eXgyNRg6uXWsVsiApqPZKAMQSk8Tyd8R"),
            Some(Suite::Ed25519VerificationKey2018),
            None,
            None,
        )
        .unwrap();
    assert_eq!(embedded.id().fragment(), Some("auth-0"));

    let rebuilt = builder.build().unwrap();
    assert_eq!(rebuilt.verification_methods().len(), 2);
    assert_eq!(rebuilt.authentication().map(|r| r.len()), Some(2));
}

#[test]
fn from_doc_then_build_is_unchanged() {
    let doc = DIDDocument::from_value(json!({
        "@context": ["https://www.w3.org/ns/did/v1", "https://w3id.org/security/suites/ed25519-2018/v1"],
        "id": "did:example:123",
        "alsoKnownAs": ["https://example.com/alice"],
        "verificationMethod": [{
            "id": "#key-0",
            "type": "Ed25519VerificationKey2018",
            "controller": "did:example:123",
            "publicKeyBase58": "8NNydiyd3KjF46ERwY7rycTBvGKRh4J1BbnYvTYCK283"
        }],
        "keyAgreement": ["#key-0"],
        "service": [{"id": "#service-0", "type": "LinkedDomains", "serviceEndpoint": "https://example.com"}],
        "created": "2024-01-01T00:00:00Z"
    }))
    .unwrap();

    let rebuilt = DIDDocumentBuilder::from_doc(&doc).build().unwrap();
    assert_eq!(rebuilt, doc);
}

#[test]
fn removing_items() {
    let mut builder = DIDDocumentBuilder::new(did());
    let vm = builder
        .verification_method()
        .add(base58("a"), Some(Suite::Ed25519VerificationKey2018), None, None)
        .unwrap()
        .clone();
    builder.authentication().reference(vm.id().clone());
    builder.authentication().reference_str("#other").unwrap();

    builder
        .authentication()
        .remove(&RelationshipItem::Reference("#other".parse().unwrap()))
        .unwrap();
    builder.verification_method().remove(&vm).unwrap();
    assert!(builder.verification_method().remove(&vm).is_err());

    // The dangling reference is still accepted; references are not checked
    let doc = builder.build().unwrap();
    assert!(doc.verification_methods().is_empty());
    assert!(doc.contains(RelationshipKind::Authentication, &RelationshipItem::Reference(vm.id().clone())));
}

#[test]
fn full_document() {
    let mut builder = DIDDocumentBuilder::new(did())
        .with_context(vec![
            ContextEntry::from("https://www.w3.org/ns/did/v1"),
            ContextEntry::from("https://didcomm.org/messaging/contexts/v2"),
        ])
        .with_controller(vec!["did:example:456".parse().unwrap()]);

    let signing = builder
        .verification_method()
        .add(
            Material::Multibase("z6MkmM42vxfqZQsv4ehtTjFFxQ4sQKS2w6WR7emozFAn5cxu".to_string()),
            Some(Suite::Multikey),
            None,
            None,
        )
        .unwrap()
        .id()
        .clone();
    builder.authentication().reference(signing.clone());
    builder.assertion_method().reference(signing.clone());
    let agreement = builder
        .key_agreement()
        .embed(
            Material::Multibase("z6LSbysY2xFMRpGMhb7tFTLMpeuPRaqaWM1yECx2AtzE3KCc".to_string()),
            Some(Suite::X25519KeyAgreementKey2020),
            None,
            None,
        )
        .unwrap()
        .id()
        .clone();

    builder
        .service()
        .add_didcomm(
            "https://agents.example.com",
            vec![agreement.clone()],
            vec![],
            DIDCommServiceOptions {
                type_: Some(DIDCommV1Type::DIDCommMessaging),
                accept: Some(vec!["didcomm/aip2;env=rfc19".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
    builder
        .service()
        .add_didcomm_v2(
            vec![
                DIDCommV2Endpoint::new("https://example.com/didcomm")
                    .with_accept(vec!["didcomm/v2".to_string()]),
            ],
            Some("didcomm"),
        )
        .unwrap();
    let mut extra = Map::new();
    extra.insert("origins".to_string(), json!(["https://example.com"]));
    builder
        .service()
        .add("LinkedDomains", "https://example.com", None, extra)
        .unwrap();

    let doc = builder.build().unwrap();
    let value = serde_json::to_value(&doc).unwrap();
    assert_eq!(value["controller"], json!(["did:example:456"]));
    assert_eq!(value["authentication"], json!(["did:example:123#key-0"]));
    assert_eq!(value["keyAgreement"][0]["id"], json!("did:example:123#key-agreement-0"));
    assert_eq!(value["service"][0]["priority"], json!(0));
    assert_eq!(value["service"][0]["type"], json!("DIDCommMessaging"));
    assert_eq!(value["service"][1]["id"], json!("did:example:123#didcomm"));
    // "didcomm" was given explicitly, so the generator is still at 1
    assert_eq!(value["service"][2]["id"], json!("did:example:123#service-1"));

    assert!(matches!(doc.services()[0], Service::DIDCommV1(_)));
    assert!(matches!(doc.services()[1], Service::DIDCommV2(_)));
    assert!(matches!(doc.services()[2], Service::Unknown(_)));
    assert_eq!(doc.index().len(), 5);

    assert_eq!(DIDDocument::from_value(value).unwrap(), doc);
}

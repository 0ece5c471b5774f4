//! Parse a DID Document from a file and print every resource it indexes.
//!
//! `RUST_LOG=did_doc=debug cargo run --example inspect -- -f doc.json`
use clap::Parser;
use did_doc::{DIDDocument, RelationshipKind, Resource, ResourceRef, config::DocumentConfigBuilder};
use std::fs;
use tracing_subscriber::filter;

/// DID Document inspection tool
#[derive(Parser)]
#[command(name = "inspect")]
#[command(bin_name = "inspect")]
struct Cli {
    /// File holding the DID Document (JSON)
    #[arg(short, long)]
    file_name: String,

    /// Give resources without an id a generated one before parsing
    #[arg(long)]
    insert_missing_ids: bool,
}

fn load_file(file: &str) -> String {
    fs::read_to_string(file).unwrap_or_else(|_| panic!("Failed to read file: {file}"))
}

fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Logging failed, exiting...");

    let args = Cli::parse();

    let mut config = DocumentConfigBuilder::default();
    if args.insert_missing_ids {
        config = config.with_insert_missing_ids();
    }
    let config = config.build();

    let input = load_file(&args.file_name);
    let raw: serde_json::Value = serde_json::from_str(&input).expect("Couldn't deserialize input");
    let serde_json::Value::Object(map) = raw else {
        panic!("{} does not hold a JSON object", args.file_name);
    };
    let doc = DIDDocument::from_map_with(map, &config).expect("Invalid DID Document");

    println!("{}", doc.id());
    let mut ids: Vec<_> = doc.index().ids().collect();
    ids.sort();
    for id in ids {
        match doc.dereference_url(id) {
            Ok(ResourceRef::VerificationMethod(vm)) => {
                let material = vm
                    .material_kind()
                    .map_or_else(|| "no material".to_string(), |kind| kind.to_string());
                println!("  {id}: {} ({material})", vm.type_());
            }
            Ok(ResourceRef::Service(service)) => {
                println!(
                    "  {id}: {} -> {}",
                    service.types().join(", "),
                    service.endpoint_uris().join(", ")
                );
            }
            Err(e) => println!("  {id}: {e}"),
        }
    }

    for kind in RelationshipKind::ALL {
        match doc.resolve_relationship(kind) {
            Ok(methods) if methods.is_empty() => {}
            Ok(methods) => {
                let ids: Vec<String> = methods.iter().map(|vm| vm.id().to_string()).collect();
                println!("{kind}: {}", ids.join(", "));
            }
            Err(e) => println!("{kind}: {e}"),
        }
    }

    println!("{}", doc.to_json().expect("Couldn't serialize the document"));
}

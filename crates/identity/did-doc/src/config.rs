//! Options for reading DID documents.
//!
//! Call the [DocumentConfigBuilder] to create a new configuration.
//!
//! Example: Inserting ids for resources that have none before parsing:
//! ```rust
//! use did_doc::{DIDDocument, config::DocumentConfigBuilder};
//! use serde_json::json;
//!
//! let config = DocumentConfigBuilder::default()
//!     .with_insert_missing_ids()
//!     .build();
//!
//! let raw = json!({
//!     "id": "did:example:123",
//!     "service": [{"type": "LinkedDomains", "serviceEndpoint": "https://example.com"}]
//! });
//! let doc = DIDDocument::from_map_with(raw.as_object().unwrap().clone(), &config).unwrap();
//! assert!(doc.dereference("#inserted-0").is_ok());
//! ```

use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    corrections::{self, Correction},
    errors::DocumentError,
};

/// Configuration for reading DID documents.
///
/// Use the [DocumentConfigBuilder] to create a new configuration.
#[derive(Clone, Debug, Default)]
pub struct DocumentConfig {
    pub(crate) corrections: Vec<Correction>,
}

impl DocumentConfig {
    /// Apply every configured correction, in order
    pub fn apply(&self, mut doc: Map<String, Value>) -> Result<Map<String, Value>, DocumentError> {
        for (i, correction) in self.corrections.iter().enumerate() {
            doc = correction(doc)?;
            debug!("applied document correction {i}");
        }
        Ok(doc)
    }

    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }
}

/// Document Config Builder.
///
/// - corrections: ordered corrections applied to the raw document before it
///   is validated (default: none).
#[derive(Default)]
pub struct DocumentConfigBuilder {
    corrections: Vec<Correction>,
}

impl DocumentConfigBuilder {
    /// Append a correction; corrections run in the order they were added
    pub fn with_correction(mut self, correction: Correction) -> Self {
        self.corrections.push(correction);
        self
    }

    /// Give resources without an `id` a generated one.
    /// See [corrections::insert_missing_ids]
    pub fn with_insert_missing_ids(self) -> Self {
        self.with_correction(corrections::insert_missing_ids)
    }

    /// Build the [DocumentConfig].
    pub fn build(self) -> DocumentConfig {
        DocumentConfig {
            corrections: self.corrections,
        }
    }
}

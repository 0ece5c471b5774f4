//! Common base of every document resource.
//!
//! A resource is an extensible JSON object: known fields are typed, anything
//! else is carried through untouched so that writing a resource back out is
//! lossless. Wire names are camelCase.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::fmt;

use crate::{DID, DIDUrl, errors::DocumentError, one_or_many::OneOrMany};

/// Shared contract for the typed views of a DID document and its parts.
///
/// `from_map` validates the structure of a raw map first and reports every
/// offending field at once, then hydrates the typed value. It never returns a
/// partially built value.
pub trait Resource: Serialize + DeserializeOwned + Sized {
    /// Name used in error messages
    const KIND: &'static str;

    /// Validate and hydrate from a raw JSON object
    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::validation(Self::KIND, e.to_string()))
    }

    /// Serialize to a raw JSON object using wire names, with extras merged in
    fn to_map(&self) -> Result<Map<String, Value>, DocumentError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(DocumentError::validation(
                Self::KIND,
                format!("serialized to {} instead of an object", json_kind(&other)),
            )),
        }
    }

    /// Like [`Resource::from_map`] but accepts any JSON value
    fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(DocumentError::validation(
                Self::KIND,
                format!("expected an object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Re-interpret this resource as a more specific type
    fn deserialize_into<T: Resource>(&self) -> Result<T, DocumentError> {
        T::from_map(self.to_map()?)
    }

    fn from_json(json: &str) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(&self.to_map()?)?)
    }
}

/// Plain extensible record: an optional `id`, an optional `type` and
/// whatever else the object holds.
///
/// Every indexed resource can be read back as a `GenericResource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericResource {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<DIDUrl>,

    #[serde(rename = "type")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub type_: Option<OneOrMany<String>>,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Resource for GenericResource {
    const KIND: &'static str = "Resource";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        let mut check = Validator::new(Self::KIND, &map);
        check.did_url("id", false);
        check.strings("type", false);
        check.finish()?;

        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::validation(Self::KIND, e.to_string()))
    }
}

/// Human readable name of a JSON value's type
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Collects structural errors for one raw object.
///
/// Each check records a message for its field and returns the checked value
/// when it is present and well formed. [`Validator::finish`] turns the
/// collected messages into a single [`DocumentError::Validation`].
pub(crate) struct Validator<'a> {
    resource: &'static str,
    map: &'a Map<String, Value>,
    errors: Vec<String>,
}

impl<'a> Validator<'a> {
    pub(crate) fn new(resource: &'static str, map: &'a Map<String, Value>) -> Self {
        Validator {
            resource,
            map,
            errors: Vec::new(),
        }
    }

    pub(crate) fn error(&mut self, key: &str, message: impl fmt::Display) {
        self.errors.push(format!("{key}: {message}"));
    }

    /// Present and not null
    pub(crate) fn present(&mut self, key: &str, required: bool) -> Option<&'a Value> {
        let map: &'a Map<String, Value> = self.map;
        match map.get(key) {
            Some(Value::Null) | None => {
                if required {
                    self.error(key, "field required");
                }
                None
            }
            Some(value) => Some(value),
        }
    }

    fn wrong_kind(&mut self, key: &str, expected: &str, found: &Value) {
        self.error(key, format!("expected {expected}, found {}", json_kind(found)));
    }

    pub(crate) fn string(&mut self, key: &str, required: bool) -> Option<&'a str> {
        let value = self.present(key, required)?;
        match value.as_str() {
            Some(s) => Some(s),
            None => {
                self.wrong_kind(key, "a string", value);
                None
            }
        }
    }

    /// A string or a non-empty list of strings
    pub(crate) fn strings(&mut self, key: &str, required: bool) -> Option<Vec<&'a str>> {
        let value = self.present(key, required)?;
        match value {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::Array(items) if items.is_empty() => {
                self.error(key, "list must not be empty");
                None
            }
            Value::Array(items) => {
                let strings: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                if strings.is_none() {
                    self.error(key, "expected a list of strings");
                }
                strings
            }
            other => {
                self.wrong_kind(key, "a string or a list of strings", other);
                None
            }
        }
    }

    /// A list of strings
    pub(crate) fn string_list(&mut self, key: &str, required: bool) -> Option<Vec<&'a str>> {
        let items = self.array(key, required)?;
        let strings: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
        if strings.is_none() {
            self.error(key, "expected a list of strings");
        }
        strings
    }

    pub(crate) fn did(&mut self, key: &str, required: bool) -> Option<DID> {
        let s = self.string(key, required)?;
        match s.parse::<DID>() {
            Ok(did) => Some(did),
            Err(e) => {
                self.error(key, format!("{s} is not a valid DID ({e})"));
                None
            }
        }
    }

    pub(crate) fn did_url(&mut self, key: &str, required: bool) -> Option<DIDUrl> {
        let s = self.string(key, required)?;
        match s.parse::<DIDUrl>() {
            Ok(url) => Some(url),
            Err(e) => {
                self.error(key, format!("{s} is not a valid DID URL ({e})"));
                None
            }
        }
    }

    /// A list whose entries are all DID URL strings
    pub(crate) fn did_urls(&mut self, key: &str, required: bool) -> Option<Vec<DIDUrl>> {
        let items = self.array(key, required)?;
        let mut urls = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str().map(DIDUrl::parse) {
                Some(Ok(url)) => urls.push(url),
                Some(Err(e)) => self.error(&format!("{key}[{i}]"), e),
                None => self.wrong_kind(&format!("{key}[{i}]"), "a DID URL string", item),
            }
        }
        Some(urls)
    }

    pub(crate) fn array(&mut self, key: &str, required: bool) -> Option<&'a Vec<Value>> {
        let value = self.present(key, required)?;
        match value.as_array() {
            Some(items) => Some(items),
            None => {
                self.wrong_kind(key, "an array", value);
                None
            }
        }
    }

    pub(crate) fn integer(&mut self, key: &str, required: bool) -> Option<i64> {
        let value = self.present(key, required)?;
        match value.as_i64() {
            Some(n) => Some(n),
            None => {
                self.wrong_kind(key, "an integer", value);
                None
            }
        }
    }

    /// Reject any key that is not in `allowed`
    pub(crate) fn deny_extra(&mut self, allowed: &[&str]) {
        let map: &'a Map<String, Value> = self.map;
        let extra: Vec<&String> = map
            .keys()
            .filter(|k| !allowed.contains(&k.as_str()))
            .collect();
        for key in extra {
            self.error(key, "extra fields not permitted");
        }
    }

    pub(crate) fn finish(self) -> Result<(), DocumentError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DocumentError::Validation {
                resource: self.resource,
                errors: self.errors,
            })
        }
    }
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
    fn generic_resource_keeps_extra_fields() {
        let raw = json!({
            "id": "did:example:123#thing",
            "type": ["A", "B"],
            "someValue": {"nested": [1, 2, 3]},
            "nothing": null
        });
        let resource = GenericResource::from_value(raw.clone()).unwrap();
        assert_eq!(
            resource.id.as_ref().map(ToString::to_string).as_deref(),
            Some("did:example:123#thing")
        );
        assert_eq!(resource.type_.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(Value::Object(resource.to_map().unwrap()), raw);
    }

    #[test]
    fn generic_resource_rejects_bad_id() {
        let err = GenericResource::from_value(json!({"id": "not a url"})).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Validation { resource: "Resource", .. }
        ));
    }

    #[test]
    fn from_value_requires_object() {
        let err = GenericResource::from_value(json!("did:example:123")).unwrap_err();
        assert!(err.to_string().contains("expected an object, found a string"));
    }

    #[test]
    fn validator_aggregates_errors() {
        let raw = map(json!({"type": 5, "priority": "high", "extra": true}));
        let mut check = Validator::new("Thing", &raw);
        check.did_url("id", true);
        check.strings("type", true);
        check.integer("priority", false);
        check.deny_extra(&["id", "type", "priority"]);

        match check.finish().unwrap_err() {
            DocumentError::Validation { resource, errors } => {
                assert_eq!(resource, "Thing");
                assert_eq!(
                    errors,
                    vec![
                        "id: field required",
                        "type: expected a string or a list of strings, found a number",
                        "priority: expected an integer, found a string",
                        "extra: extra fields not permitted",
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validator_checks_list_entries() {
        let raw = map(json!({"keys": ["#key-1", 7, "not a url"]}));
        let mut check = Validator::new("Thing", &raw);
        let urls = check.did_urls("keys", true).unwrap();
        assert_eq!(urls.len(), 1);
        let err = check.finish().unwrap_err().to_string();
        assert!(err.contains("keys[1]"));
        assert!(err.contains("keys[2]"));
    }
}

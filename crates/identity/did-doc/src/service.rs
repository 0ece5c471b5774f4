//! https://www.w3.org/TR/did-core/#services
//!
//! Services are parsed into the most specific shape that fits: DIDComm v1,
//! then DIDComm v2, otherwise [`UnknownService`], which keeps every field.
//! The DIDComm shapes are strict and reject fields they do not define.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;
use url::Url;

use crate::{
    DID, DIDUrl,
    errors::DocumentError,
    one_or_many::OneOrMany,
    resource::{Resource, Validator, json_kind},
};

/// What an endpoint string turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    DID,
    DIDUrl,
    Url,
    /// Any other string, e.g. `didcomm:transport/queue` style values that are
    /// not valid URLs, or an empty string
    Other,
}

/// An endpoint string, kept exactly as written
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointUri(String);

impl EndpointUri {
    pub fn new(uri: impl Into<String>) -> Self {
        EndpointUri(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the endpoint string
    pub fn kind(&self) -> EndpointKind {
        if DID::is_valid(&self.0) {
            EndpointKind::DID
        } else if self.0.starts_with("did:") && DIDUrl::is_valid(&self.0) {
            EndpointKind::DIDUrl
        } else if Url::parse(&self.0).is_ok() {
            EndpointKind::Url
        } else {
            EndpointKind::Other
        }
    }
}

impl fmt::Display for EndpointUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointUri {
    fn from(uri: &str) -> Self {
        EndpointUri(uri.to_string())
    }
}

/// Entry of an endpoint set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointEntry {
    Uri(EndpointUri),
    Map(Map<String, Value>),
}

/// Service Endpoint definitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEndpoint {
    /// Single String (DID, DID URL, URL or plain string)
    Uri(EndpointUri),

    /// Single Map
    Map(Map<String, Value>),

    /// Set of Strings/Maps
    Set(Vec<EndpointEntry>),
}

impl ServiceEndpoint {
    /// Returns every URI of the endpoint: plain strings, and the `uri` of
    /// maps that have one
    pub fn uris(&self) -> Vec<&str> {
        fn map_uri(map: &Map<String, Value>) -> Option<&str> {
            map.get("uri").and_then(Value::as_str)
        }

        match self {
            ServiceEndpoint::Uri(uri) => vec![uri.as_str()],
            ServiceEndpoint::Map(map) => map_uri(map).into_iter().collect(),
            ServiceEndpoint::Set(entries) => entries
                .iter()
                .filter_map(|entry| match entry {
                    EndpointEntry::Uri(uri) => Some(uri.as_str()),
                    EndpointEntry::Map(map) => map_uri(map),
                })
                .collect(),
        }
    }

    /// Returns the first URI of the endpoint, if available
    pub fn get_uri(&self) -> Option<&str> {
        self.uris().into_iter().next()
    }
}

impl From<&str> for ServiceEndpoint {
    fn from(uri: &str) -> Self {
        ServiceEndpoint::Uri(uri.into())
    }
}

/// `type` values of a DIDComm v1 service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DIDCommV1Type {
    IndyAgent,
    #[default]
    #[serde(rename = "did-communication")]
    DIDCommunication,
    DIDCommMessaging,
}

impl DIDCommV1Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            DIDCommV1Type::IndyAgent => "IndyAgent",
            DIDCommV1Type::DIDCommunication => "did-communication",
            DIDCommV1Type::DIDCommMessaging => "DIDCommMessaging",
        }
    }

    fn from_type(type_: &str) -> Option<Self> {
        [
            DIDCommV1Type::IndyAgent,
            DIDCommV1Type::DIDCommunication,
            DIDCommV1Type::DIDCommMessaging,
        ]
        .into_iter()
        .find(|t| t.as_str() == type_)
    }
}

/// `type` of a DIDComm v2 service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DIDCommV2Type {
    #[default]
    DIDCommMessaging,
}

/// DIDComm v1 service: a single endpoint string with recipient and routing
/// keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DIDCommV1Service {
    pub id: DIDUrl,

    #[serde(rename = "type", default)]
    pub type_: DIDCommV1Type,

    pub service_endpoint: EndpointUri,

    pub recipient_keys: Vec<DIDUrl>,

    #[serde(default)]
    pub routing_keys: Vec<DIDUrl>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accept: Option<Vec<String>>,

    #[serde(default)]
    pub priority: i64,
}

const DIDCOMM_V1_FIELDS: &[&str] = &[
    "id",
    "type",
    "serviceEndpoint",
    "recipientKeys",
    "routingKeys",
    "accept",
    "priority",
];

impl Resource for DIDCommV1Service {
    const KIND: &'static str = "DIDCommV1Service";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        let mut check = Validator::new(Self::KIND, &map);
        check.did_url("id", true);
        if let Some(type_) = check.string("type", false)
            && DIDCommV1Type::from_type(type_).is_none()
        {
            check.error("type", format!("{type_} is not a DIDComm v1 service type"));
        }
        check.string("serviceEndpoint", true);
        check.did_urls("recipientKeys", true);
        check.did_urls("routingKeys", false);
        check.string_list("accept", false);
        check.integer("priority", false);
        check.deny_extra(DIDCOMM_V1_FIELDS);
        check.finish()?;

        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::validation(Self::KIND, e.to_string()))
    }
}

/// One endpoint of a DIDComm v2 service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DIDCommV2Endpoint {
    pub uri: EndpointUri,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub accept: Option<Vec<String>>,

    #[serde(default)]
    pub routing_keys: Vec<DIDUrl>,

    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl DIDCommV2Endpoint {
    pub fn new(uri: impl Into<String>) -> Self {
        DIDCommV2Endpoint {
            uri: EndpointUri::new(uri),
            accept: None,
            routing_keys: Vec::new(),
            properties: Map::new(),
        }
    }

    pub fn with_accept(mut self, accept: Vec<String>) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn with_routing_keys(mut self, routing_keys: Vec<DIDUrl>) -> Self {
        self.routing_keys = routing_keys;
        self
    }
}

impl Resource for DIDCommV2Endpoint {
    const KIND: &'static str = "DIDCommV2Endpoint";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        let mut check = Validator::new(Self::KIND, &map);
        check.string("uri", true);
        check.string_list("accept", false);
        check.did_urls("routingKeys", false);
        check.finish()?;

        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::validation(Self::KIND, e.to_string()))
    }
}

/// DIDComm v2 service: one or many endpoint objects, each with its own `uri`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DIDCommV2Service {
    pub id: DIDUrl,

    #[serde(rename = "type", default)]
    pub type_: DIDCommV2Type,

    pub service_endpoint: OneOrMany<DIDCommV2Endpoint>,
}

impl Resource for DIDCommV2Service {
    const KIND: &'static str = "DIDCommV2Service";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        let mut check = Validator::new(Self::KIND, &map);
        check.did_url("id", true);
        if let Some(type_) = check.string("type", false)
            && type_ != "DIDCommMessaging"
        {
            check.error("type", format!("{type_} is not a DIDComm v2 service type"));
        }

        let endpoints: Vec<(String, &Value)> = match check.present("serviceEndpoint", true) {
            Some(Value::Array(items)) if items.is_empty() => {
                check.error("serviceEndpoint", "list must not be empty");
                Vec::new()
            }
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("serviceEndpoint[{i}]"), item))
                .collect(),
            Some(item) => vec![("serviceEndpoint".to_string(), item)],
            None => Vec::new(),
        };
        for (key, item) in endpoints {
            match item {
                Value::Object(endpoint) => {
                    if let Err(e) = DIDCommV2Endpoint::from_map(endpoint.clone()) {
                        check.error(&key, e);
                    }
                }
                other => check.error(
                    &key,
                    format!("expected an endpoint object, found {}", json_kind(other)),
                ),
            }
        }

        check.deny_extra(&["id", "type", "serviceEndpoint"]);
        check.finish()?;

        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::validation(Self::KIND, e.to_string()))
    }
}

/// Any service that is not one of the DIDComm shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownService {
    pub id: DIDUrl,

    #[serde(rename = "type")]
    pub type_: OneOrMany<String>,

    pub service_endpoint: ServiceEndpoint,

    /// Each Service can have multiple other properties
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// Checks shared by every service shape
fn validate_spine(resource: &'static str, map: &Map<String, Value>) -> Result<(), DocumentError> {
    let mut check = Validator::new(resource, map);
    check.did_url("id", true);
    check.strings("type", true);
    match check.present("serviceEndpoint", true) {
        Some(Value::String(_)) | Some(Value::Object(_)) | None => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if !matches!(item, Value::String(_) | Value::Object(_)) {
                    check.error(
                        &format!("serviceEndpoint[{i}]"),
                        format!("expected a string or an object, found {}", json_kind(item)),
                    );
                }
            }
        }
        Some(other) => check.error(
            "serviceEndpoint",
            format!(
                "expected a string, an object or a list, found {}",
                json_kind(other)
            ),
        ),
    }
    check.finish()
}

impl Resource for UnknownService {
    const KIND: &'static str = "Service";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        validate_spine(Self::KIND, &map)?;
        serde_json::from_value(Value::Object(map))
            .map_err(|e| DocumentError::validation(Self::KIND, e.to_string()))
    }
}

/// A service of a DID document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Service {
    DIDCommV1(DIDCommV1Service),
    DIDCommV2(DIDCommV2Service),
    Unknown(UnknownService),
}

impl Service {
    pub fn id(&self) -> &DIDUrl {
        match self {
            Service::DIDCommV1(s) => &s.id,
            Service::DIDCommV2(s) => &s.id,
            Service::Unknown(s) => &s.id,
        }
    }

    /// The `type` value(s)
    pub fn types(&self) -> Vec<&str> {
        match self {
            Service::DIDCommV1(s) => vec![s.type_.as_str()],
            Service::DIDCommV2(_) => vec!["DIDCommMessaging"],
            Service::Unknown(s) => s.type_.iter().map(String::as_str).collect(),
        }
    }

    /// Every endpoint URI of the service
    pub fn endpoint_uris(&self) -> Vec<&str> {
        match self {
            Service::DIDCommV1(s) => vec![s.service_endpoint.as_str()],
            Service::DIDCommV2(s) => s
                .service_endpoint
                .iter()
                .map(|endpoint| endpoint.uri.as_str())
                .collect(),
            Service::Unknown(s) => s.service_endpoint.uris(),
        }
    }

    /// Copy of this service with a different id
    pub(crate) fn with_id(&self, id: DIDUrl) -> Self {
        let mut service = self.clone();
        match &mut service {
            Service::DIDCommV1(s) => s.id = id,
            Service::DIDCommV2(s) => s.id = id,
            Service::Unknown(s) => s.id = id,
        }
        service
    }
}

impl Resource for Service {
    const KIND: &'static str = "Service";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        validate_spine(Self::KIND, &map)?;

        let v1 = match DIDCommV1Service::from_map(map.clone()) {
            Ok(service) => return Ok(Service::DIDCommV1(service)),
            Err(e) => e,
        };
        let v2 = match DIDCommV2Service::from_map(map.clone()) {
            Ok(service) => return Ok(Service::DIDCommV2(service)),
            Err(e) => e,
        };

        if let Some(type_) = map.get("type").and_then(Value::as_str)
            && DIDCommV1Type::from_type(type_).is_some()
        {
            let id = map.get("id").and_then(Value::as_str).unwrap_or_default();
            debug!("service ({id}) of type {type_} kept as unknown: {v1}; {v2}");
        }

        Ok(Service::Unknown(UnknownService::from_map(map)?))
    }
}

impl Serialize for Service {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Service::DIDCommV1(s) => s.serialize(serializer),
            Service::DIDCommV2(s) => s.serialize(serializer),
            Service::Unknown(s) => s.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Service {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Service::from_map(map).map_err(de::Error::custom)
    }
}

impl From<DIDCommV1Service> for Service {
    fn from(service: DIDCommV1Service) -> Self {
        Service::DIDCommV1(service)
    }
}

impl From<DIDCommV2Service> for Service {
    fn from(service: DIDCommV2Service) -> Self {
        Service::DIDCommV2(service)
    }
}

impl From<UnknownService> for Service {
    fn from(service: UnknownService) -> Self {
        Service::Unknown(service)
    }
}

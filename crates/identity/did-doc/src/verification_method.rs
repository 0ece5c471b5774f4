//! DID Verification Method Definition
//! <https://www.w3.org/TR/did-core/#verification-methods>
//!
//! A verification method is an `{id, type, controller}` spine plus exactly one
//! verification material field. The `type` selects a [`Suite`]; suites with a
//! known layout fix which material fields they accept, anything else becomes
//! [`Suite::Unknown`] and keeps whatever material was supplied.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value};
use std::{fmt, ops::Deref};
use tracing::debug;

use crate::{
    DID, DIDUrl,
    errors::DocumentError,
    resource::{Resource, Validator, json_kind},
};

/// Wire names of the fields that may carry verification material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Base58,
    Pem,
    Jwk,
    Hex,
    Multibase,
    BlockchainAccountId,
    EthereumAddress,
    Gpg,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 8] = [
        MaterialKind::Base58,
        MaterialKind::Pem,
        MaterialKind::Jwk,
        MaterialKind::Hex,
        MaterialKind::Multibase,
        MaterialKind::BlockchainAccountId,
        MaterialKind::EthereumAddress,
        MaterialKind::Gpg,
    ];

    /// camelCase field name on the wire
    pub fn field(self) -> &'static str {
        match self {
            MaterialKind::Base58 => "publicKeyBase58",
            MaterialKind::Pem => "publicKeyPem",
            MaterialKind::Jwk => "publicKeyJwk",
            MaterialKind::Hex => "publicKeyHex",
            MaterialKind::Multibase => "publicKeyMultibase",
            MaterialKind::BlockchainAccountId => "blockchainAccountId",
            MaterialKind::EthereumAddress => "ethereumAddress",
            MaterialKind::Gpg => "publicKeyGpg",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        MaterialKind::ALL.into_iter().find(|kind| kind.field() == field)
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Verification material, tagged by the field it was found in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Material {
    Base58(String),
    Pem(String),
    Jwk(Map<String, Value>),
    Hex(String),
    Multibase(String),
    BlockchainAccountId(String),
    EthereumAddress(String),
    Gpg(String),
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Base58(_) => MaterialKind::Base58,
            Material::Pem(_) => MaterialKind::Pem,
            Material::Jwk(_) => MaterialKind::Jwk,
            Material::Hex(_) => MaterialKind::Hex,
            Material::Multibase(_) => MaterialKind::Multibase,
            Material::BlockchainAccountId(_) => MaterialKind::BlockchainAccountId,
            Material::EthereumAddress(_) => MaterialKind::EthereumAddress,
            Material::Gpg(_) => MaterialKind::Gpg,
        }
    }

    /// String encoded material; `None` for JWKs
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Material::Jwk(_) => None,
            Material::Base58(s)
            | Material::Pem(s)
            | Material::Hex(s)
            | Material::Multibase(s)
            | Material::BlockchainAccountId(s)
            | Material::EthereumAddress(s)
            | Material::Gpg(s) => Some(s),
        }
    }

    pub fn as_jwk(&self) -> Option<&Map<String, Value>> {
        match self {
            Material::Jwk(jwk) => Some(jwk),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Material::Jwk(jwk) => Value::Object(jwk.clone()),
            other => Value::String(other.as_str().unwrap_or_default().to_string()),
        }
    }

    /// Read a material field value; JWKs must be objects, everything else a
    /// string
    pub fn from_value(kind: MaterialKind, value: &Value) -> Result<Self, String> {
        let string = || {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("expected a string, found {}", json_kind(value)))
        };

        Ok(match kind {
            MaterialKind::Jwk => match value {
                Value::Object(jwk) => Material::Jwk(jwk.clone()),
                other => return Err(format!("expected an object, found {}", json_kind(other))),
            },
            MaterialKind::Base58 => Material::Base58(string()?),
            MaterialKind::Pem => Material::Pem(string()?),
            MaterialKind::Hex => Material::Hex(string()?),
            MaterialKind::Multibase => Material::Multibase(string()?),
            MaterialKind::BlockchainAccountId => Material::BlockchainAccountId(string()?),
            MaterialKind::EthereumAddress => Material::EthereumAddress(string()?),
            MaterialKind::Gpg => Material::Gpg(string()?),
        })
    }
}

/// Declares the closed set of verification method suites.
///
/// Each entry names the `type` literal (the variant name) and the material
/// kinds it accepts. `optional` marks suites that may carry no material.
macro_rules! suites {
    (@optional) => { false };
    (@optional optional) => { true };

    ($( $(#[$meta:meta])* $suite:ident: [$($kind:ident),+] $(, $optional:ident)?; )+) => {
        /// Verification method type.
        ///
        /// Known suites fix the accepted material; any other `type` value is
        /// kept verbatim in [`Suite::Unknown`].
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Suite {
            $( $(#[$meta])* $suite, )+
            Unknown(String),
        }

        impl Suite {
            /// Select the suite for a `type` value
            pub fn from_type(type_: &str) -> Suite {
                $(
                    if type_ == stringify!($suite) {
                        return Suite::$suite;
                    }
                )+
                Suite::Unknown(type_.to_string())
            }

            /// The `type` value written on the wire
            pub fn as_str(&self) -> &str {
                match self {
                    $( Suite::$suite => stringify!($suite), )+
                    Suite::Unknown(type_) => type_,
                }
            }

            /// Material kinds this suite accepts
            pub fn accepted_materials(&self) -> &'static [MaterialKind] {
                match self {
                    $( Suite::$suite => &[$(MaterialKind::$kind),+], )+
                    Suite::Unknown(_) => &MaterialKind::ALL,
                }
            }

            /// True if a method of this suite may carry no material at all
            pub fn material_optional(&self) -> bool {
                match self {
                    $( Suite::$suite => suites!(@optional $($optional)?), )+
                    Suite::Unknown(_) => true,
                }
            }
        }
    };
}

suites! {
    Ed25519VerificationKey2018: [Base58];
    Ed25519VerificationKey2020: [Multibase];
    OpenPgpVerificationKey2019: [Pem];
    JsonWebKey2020: [Jwk];
    EcdsaSecp256k1VerificationKey2019: [Jwk, Hex];
    EcdsaSecp256k1RecoveryMethod2020: [Jwk, Hex, EthereumAddress];
    /// Accepts any material, or none
    SchnorrSecp256k1VerificationKey2019: [
        Base58, Pem, Jwk, Hex, Multibase, BlockchainAccountId, EthereumAddress, Gpg
    ], optional;
    Bls12381G1Key2020: [Base58];
    Bls12381G2Key2020: [Base58];
    GpgVerificationKey2020: [Gpg];
    RsaVerificationKey2018: [Jwk];
    X25519KeyAgreementKey2019: [Base58];
    X25519KeyAgreementKey2020: [Multibase];
    Multikey: [Multibase];
}

impl Suite {
    pub fn is_known(&self) -> bool {
        !matches!(self, Suite::Unknown(_))
    }

    pub fn accepts(&self, kind: MaterialKind) -> bool {
        self.accepted_materials().contains(&kind)
    }

    /// Check a material (or its absence) against this suite
    fn check_material(&self, material: Option<&Material>) -> Result<(), String> {
        match material {
            Some(material) if !self.accepts(material.kind()) => Err(format!(
                "{self} does not accept {}",
                material.kind().field()
            )),
            None if !self.material_optional() => Err(format!(
                "{self} requires one of {}",
                self.accepted_materials()
                    .iter()
                    .map(|kind| kind.field())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Suite {
    fn from(type_: &str) -> Self {
        Suite::from_type(type_)
    }
}

/// A verification method of any suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMethod {
    id: DIDUrl,
    suite: Suite,
    controller: DID,
    material: Option<Material>,
    /// Every other property of the method
    properties: Map<String, Value>,
}

impl VerificationMethod {
    /// Create a method, checking that `suite` accepts `material`
    pub fn new(
        id: DIDUrl,
        suite: Suite,
        controller: DID,
        material: Material,
    ) -> Result<Self, DocumentError> {
        suite
            .check_material(Some(&material))
            .map_err(|e| DocumentError::validation(Self::KIND, format!("type: {e}")))?;

        Ok(VerificationMethod {
            id,
            suite,
            controller,
            material: Some(material),
            properties: Map::new(),
        })
    }

    pub fn id(&self) -> &DIDUrl {
        &self.id
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    /// The `type` value
    pub fn type_(&self) -> &str {
        self.suite.as_str()
    }

    pub fn controller(&self) -> &DID {
        &self.controller
    }

    /// The verification material, failing with
    /// [`DocumentError::MaterialUnknown`] if the method carries none
    pub fn material(&self) -> Result<&Material, DocumentError> {
        self.material.as_ref().ok_or(DocumentError::MaterialUnknown)
    }

    pub fn material_kind(&self) -> Option<MaterialKind> {
        self.material.as_ref().map(Material::kind)
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Copy of this method with a different id
    pub(crate) fn with_id(&self, id: DIDUrl) -> Self {
        VerificationMethod {
            id,
            ..self.clone()
        }
    }

    fn to_object(&self) -> Map<String, Value> {
        let mut map = self.properties.clone();
        map.insert("id".into(), Value::String(self.id.to_string()));
        map.insert("type".into(), Value::String(self.suite.to_string()));
        map.insert(
            "controller".into(),
            Value::String(self.controller.to_string()),
        );
        if let Some(material) = &self.material {
            map.insert(material.kind().field().into(), material.to_value());
        }
        map
    }
}

/// Unwrap a single-entry list, the shape some resolvers emit for `type` and
/// `controller`
fn unwrap_first(map: &mut Map<String, Value>, key: &str) {
    if let Some(Value::Array(items)) = map.get(key)
        && let Some(first) = items.first()
    {
        let first = first.clone();
        map.insert(key.to_string(), first);
    }
}

impl Resource for VerificationMethod {
    const KIND: &'static str = "VerificationMethod";

    fn from_map(mut map: Map<String, Value>) -> Result<Self, DocumentError> {
        unwrap_first(&mut map, "type");
        unwrap_first(&mut map, "controller");

        let mut check = Validator::new(Self::KIND, &map);
        let id = check.did_url("id", true);
        let type_ = check.string("type", true).map(str::to_string);
        let controller = if map.contains_key("controller") {
            check.did("controller", true)
        } else {
            match id.as_ref().map(|id| id.did()) {
                Some(Some(did)) => Some(did.clone()),
                Some(None) => {
                    check.error("controller", "field required when id is relative");
                    None
                }
                None => None,
            }
        };

        // A derived controller counts as present
        let key_count = map.len() + usize::from(!map.contains_key("controller"));
        if key_count < 4 {
            check.error(
                "material",
                format!(
                    "Key material expected, found: {}",
                    map.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            );
        }

        let present: Vec<MaterialKind> = MaterialKind::ALL
            .into_iter()
            .filter(|kind| !matches!(map.get(kind.field()), None | Some(Value::Null)))
            .collect();
        if present.len() > 1 {
            return Err(DocumentError::MaterialArity {
                found: present.iter().map(|kind| kind.field().to_string()).collect(),
            });
        }

        let mut material = None;
        if let Some(kind) = present.first()
            && let Some(value) = map.get(kind.field())
        {
            match Material::from_value(*kind, value) {
                Ok(m) => material = Some(m),
                Err(e) => check.error(kind.field(), e),
            }
        }
        check.finish()?;

        let (Some(id), Some(type_), Some(controller)) = (id, type_, controller) else {
            // Validator::finish reports any missing field
            return Err(DocumentError::validation(Self::KIND, "incomplete method"));
        };

        let mut suite = Suite::from_type(&type_);
        if let Err(reason) = suite.check_material(material.as_ref()) {
            debug!("verification method ({id}) falls back to an unknown suite: {reason}");
            suite = Suite::Unknown(type_);
        }

        map.remove("id");
        map.remove("type");
        map.remove("controller");
        for kind in MaterialKind::ALL {
            map.remove(kind.field());
        }

        Ok(VerificationMethod {
            id,
            suite,
            controller,
            material,
            properties: map,
        })
    }
}

impl Serialize for VerificationMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerificationMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        VerificationMethod::from_map(map).map_err(de::Error::custom)
    }
}

/// A verification method whose `type` is one of the known suites and whose
/// material matches that suite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownVerificationMethod(VerificationMethod);

impl KnownVerificationMethod {
    pub fn into_inner(self) -> VerificationMethod {
        self.0
    }
}

impl Deref for KnownVerificationMethod {
    type Target = VerificationMethod;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<VerificationMethod> for KnownVerificationMethod {
    type Error = DocumentError;

    fn try_from(method: VerificationMethod) -> Result<Self, Self::Error> {
        if method.suite.is_known() {
            return Ok(KnownVerificationMethod(method));
        }

        let suite = Suite::from_type(method.type_());
        let reason = match suite.check_material(method.material.as_ref()) {
            Err(reason) => reason,
            Ok(()) => format!("{} is not a known verification method type", method.type_()),
        };
        Err(DocumentError::validation(Self::KIND, format!("type: {reason}")))
    }
}

impl Resource for KnownVerificationMethod {
    const KIND: &'static str = "KnownVerificationMethod";

    fn from_map(map: Map<String, Value>) -> Result<Self, DocumentError> {
        VerificationMethod::from_map(map)?.try_into()
    }
}

impl Serialize for KnownVerificationMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for KnownVerificationMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        KnownVerificationMethod::from_map(map).map_err(de::Error::custom)
    }
}

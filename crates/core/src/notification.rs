//! Inbound and outbound notification records.
//!
//! An inbound notification names a resource (`id` + `version`) and optionally
//! the metric handlers it wants computed. Every other key is carried through
//! verbatim in `extra`, so producers can add fields without this crate
//! knowing about them. Numbers are kept as their original JSON text.

use std::fmt;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::NotificationError;

/// Keys every inbound notification must carry, checked in this order.
pub const REQUIRED_KEYS: &[&str] = &["id", "version"];

/// Key holding the requested handler slugs.
pub const RESOURCES_KEY: &str = "resources";

/// Key injected into every outbound notification.
pub const META_KEY: &str = "meta";

fn invalid_type(key: &str, expected: &str) -> NotificationError {
    NotificationError::Decode(serde_json::Error::custom(format!(
        "invalid type for `{key}`: expected {expected}"
    )))
}

/// Resource version: producers send either a string or a number.
#[derive(Debug, Clone, PartialEq)]
pub enum Version {
    Text(String),
    Number(serde_json::Number),
}

impl Version {
    fn from_json(value: Value) -> Result<Self, NotificationError> {
        match value {
            Value::String(s) => Ok(Version::Text(s)),
            Value::Number(n) => Ok(Version::Number(n)),
            _ => Err(invalid_type("version", "a string or a number")),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Text(s) => f.write_str(s),
            Version::Number(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Version::Text(s) => s.serialize(serializer),
            Version::Number(n) => n.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Version::from_json(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// A decoded "compute metrics for this resource" notification.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundNotification {
    pub id: String,
    pub version: Version,
    /// Raw `resources` list, kept verbatim. `None` or empty means all handlers.
    pub resources: Option<Vec<Value>>,
    /// All remaining keys, in input order.
    pub extra: IndexMap<String, Value>,
}

impl InboundNotification {
    /// Decode a raw JSON payload.
    ///
    /// Fails with [`NotificationError::Decode`] for malformed JSON or
    /// mistyped fields, and with [`NotificationError::MissingField`] naming
    /// the first absent required key.
    pub fn decode(payload: &str) -> Result<Self, NotificationError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, NotificationError> {
        let Value::Object(map) = value else {
            return Err(NotificationError::NotAnObject);
        };
        require_keys(&map, REQUIRED_KEYS)?;

        let mut extra: IndexMap<String, Value> = map.into_iter().collect();

        let id = match extra.shift_remove("id") {
            Some(Value::String(id)) => id,
            Some(_) => return Err(invalid_type("id", "a string")),
            None => return Err(NotificationError::MissingField("id")),
        };
        let version = match extra.shift_remove("version") {
            Some(version) => Version::from_json(version)?,
            None => return Err(NotificationError::MissingField("version")),
        };

        // `"resources": null` stays in `extra` untouched and requests nothing.
        let requested = match extra.get(RESOURCES_KEY) {
            None | Some(Value::Null) => false,
            Some(Value::Array(_)) => true,
            Some(_) => return Err(invalid_type(RESOURCES_KEY, "an array")),
        };
        let resources = match requested.then(|| extra.shift_remove(RESOURCES_KEY)) {
            Some(Some(Value::Array(items))) => Some(items),
            _ => None,
        };

        Ok(Self {
            id,
            version,
            resources,
            extra,
        })
    }

    /// The explicitly requested handler slugs, if the list is present and
    /// non-empty. Entries that are not strings name no handler and are skipped.
    pub fn requested_handlers(&self) -> Option<Vec<&str>> {
        let resources = self.resources.as_ref().filter(|r| !r.is_empty())?;
        Some(resources.iter().filter_map(Value::as_str).collect())
    }

    fn serialize_entries<M: SerializeMap>(
        &self,
        map: &mut M,
        skip: Option<&str>,
    ) -> Result<(), M::Error> {
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("version", &self.version)?;
        if let Some(resources) = &self.resources {
            map.serialize_entry(RESOURCES_KEY, resources)?;
        }
        for (key, value) in &self.extra {
            if Some(key.as_str()) != skip {
                map.serialize_entry(key, value)?;
            }
        }
        Ok(())
    }
}

impl Serialize for InboundNotification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_entries(&mut map, None)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for InboundNotification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        InboundNotification::from_value(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// Check that `map` contains every key in `keys`, reporting the first one missing.
pub fn require_keys(map: &Map<String, Value>, keys: &[&'static str]) -> Result<(), NotificationError> {
    match keys.iter().find(|k| !map.contains_key(**k)) {
        Some(key) => Err(NotificationError::MissingField(key)),
        None => Ok(()),
    }
}

/// Routing metadata telling a worker which handler to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMeta {
    pub worker: WorkerTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTarget {
    pub handler: String,
}

impl WorkerMeta {
    pub fn for_handler(handler: impl Into<String>) -> Self {
        Self {
            worker: WorkerTarget {
                handler: handler.into(),
            },
        }
    }
}

/// An inbound notification addressed to exactly one handler.
///
/// Serializes as the inbound fields followed by `meta`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundNotification {
    pub notification: InboundNotification,
    pub meta: WorkerMeta,
}

impl OutboundNotification {
    /// Copy `inbound` and set its `meta` to target `handler`.
    ///
    /// A `meta` key already present on the inbound payload is replaced.
    pub fn for_handler(inbound: &InboundNotification, handler: &str) -> Self {
        let mut notification = inbound.clone();
        notification.extra.shift_remove(META_KEY);
        Self {
            notification,
            meta: WorkerMeta::for_handler(handler),
        }
    }

    pub fn handler(&self) -> &str {
        &self.meta.worker.handler
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for OutboundNotification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.notification.serialize_entries(&mut map, Some(META_KEY))?;
        map.serialize_entry(META_KEY, &self.meta)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for OutboundNotification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut notification = InboundNotification::from_value(Value::deserialize(deserializer)?)
            .map_err(D::Error::custom)?;
        let meta = notification
            .extra
            .shift_remove(META_KEY)
            .ok_or_else(|| D::Error::missing_field(META_KEY))?;
        let meta = WorkerMeta::deserialize(meta).map_err(D::Error::custom)?;
        Ok(Self { notification, meta })
    }
}

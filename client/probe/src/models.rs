use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// Keys written by `EventPayload` itself; extra fields may not shadow them.
const RESERVED_KEYS: &[&str] = &[
    "channelCode",
    "softwareId",
    "installTime",
    "activateTime",
    "downloadTime",
    "deviceInfo",
    "deviceId",
    "realInstall",
    "triggerContext",
    "licenseKey",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Install,
    Activate,
    Download,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Install, EventKind::Activate, EventKind::Download];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Download => "download",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            EventKind::Install => "/stats/install",
            EventKind::Activate => "/stats/activate",
            EventKind::Download => "/stats/download",
        }
    }

    pub fn time_field(&self) -> &'static str {
        match self {
            EventKind::Install => "installTime",
            EventKind::Activate => "activateTime",
            EventKind::Download => "downloadTime",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "install" => Ok(EventKind::Install),
            "activate" => Ok(EventKind::Activate),
            "download" => Ok(EventKind::Download),
            other => Err(format!(
                "unknown event kind '{other}' (expected install, activate or download)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub os: String,
    pub model: String,
    pub manufacturer: String,
    pub brand: String,
    pub sdk: u32,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            os: "Android 13".to_string(),
            model: "Test Device".to_string(),
            manufacturer: "Test".to_string(),
            brand: "Test".to_string(),
            sdk: 33,
        }
    }
}

/// One tracking event; the timestamp key depends on `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    pub kind: EventKind,
    pub channel_code: String,
    pub software_id: i64,
    pub timestamp: String,
    pub device_info: Option<DeviceInfo>,
    pub device_id: Option<String>,
    pub real_install: Option<bool>,
    pub trigger_context: Option<String>,
    pub license_key: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl EventPayload {
    pub fn with_device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = Some(device_info);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn real_install(mut self, real_install: bool) -> Self {
        self.real_install = Some(real_install);
        self
    }

    pub fn trigger_context(mut self, context: impl Into<String>) -> Self {
        self.trigger_context = Some(context.into());
        self
    }

    pub fn license_key(mut self, key: impl Into<String>) -> Self {
        self.license_key = Some(key.into());
        self
    }

    pub fn extra(mut self, key: &str, value: impl Into<String>) -> Self {
        if RESERVED_KEYS.contains(&key) {
            tracing::debug!(key, "ignoring extra field that shadows a payload key");
            return self;
        }
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn to_json(&self) -> Value {
        // Serializing plain strings, numbers and maps cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("channelCode", &self.channel_code)?;
        map.serialize_entry("softwareId", &self.software_id)?;
        map.serialize_entry(self.kind.time_field(), &self.timestamp)?;
        if let Some(device_info) = &self.device_info {
            map.serialize_entry("deviceInfo", device_info)?;
        }
        if let Some(real_install) = self.real_install {
            map.serialize_entry("realInstall", &real_install)?;
        }
        if let Some(context) = &self.trigger_context {
            map.serialize_entry("triggerContext", context)?;
        }
        if let Some(key) = &self.license_key {
            map.serialize_entry("licenseKey", key)?;
        }
        if let Some(device_id) = &self.device_id {
            map.serialize_entry("deviceId", device_id)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default, deserialize_with = "truthy")]
    pub success: bool,
    #[serde(default, deserialize_with = "any_text")]
    pub message: Option<String>,
    pub data: Option<Value>,
}

// Servers are loose about the envelope: `success` may be null, 0/1 or a
// string, and `message` may be a number or an object.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    })
}

fn any_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

impl ApiResponse {
    pub fn revenue(&self) -> Option<String> {
        match self.data.as_ref()?.get("revenue")? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(kind: EventKind) -> EventPayload {
        EventPayload {
            kind,
            channel_code: "3001".to_string(),
            software_id: 1,
            timestamp: "2025-09-04T01:20:00.000Z".to_string(),
            device_info: None,
            device_id: None,
            real_install: None,
            trigger_context: None,
            license_key: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn timestamp_key_follows_kind() {
        for kind in EventKind::ALL {
            let json = payload(kind).to_json();
            assert_eq!(json[kind.time_field()], "2025-09-04T01:20:00.000Z");
            let other_keys = EventKind::ALL
                .iter()
                .filter(|other| **other != kind)
                .map(|other| other.time_field());
            for key in other_keys {
                assert!(json.get(key).is_none(), "{key} leaked into {kind} payload");
            }
        }
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = payload(EventKind::Install).to_json();
        let object = json.as_object().expect("object");
        assert_eq!(object.len(), 3);
        assert!(!object.contains_key("deviceId"));
        assert!(!object.contains_key("deviceInfo"));
    }

    #[test]
    fn extra_cannot_shadow_reserved_keys() {
        let json = payload(EventKind::Install)
            .extra("channelCode", "9999")
            .extra("testScenario", "first_gallery_open")
            .to_json();
        assert_eq!(json["channelCode"], "3001");
        assert_eq!(json["testScenario"], "first_gallery_open");
    }

    #[test]
    fn parses_kind_case_insensitively() {
        assert_eq!("Activate".parse::<EventKind>(), Ok(EventKind::Activate));
        assert!("refund".parse::<EventKind>().is_err());
    }

    #[test]
    fn revenue_reads_number_and_string() {
        let numeric: ApiResponse =
            serde_json::from_str(r#"{"success": true, "data": {"revenue": 1.5}}"#).unwrap();
        assert_eq!(numeric.revenue().as_deref(), Some("1.5"));

        let text: ApiResponse =
            serde_json::from_str(r#"{"success": true, "data": {"revenue": "2.00"}}"#).unwrap();
        assert_eq!(text.revenue().as_deref(), Some("2.00"));

        let missing: ApiResponse = serde_json::from_str(r#"{"message": "x"}"#).unwrap();
        assert!(!missing.success);
        assert!(missing.revenue().is_none());
    }

    #[test]
    fn envelope_tolerates_loose_types() {
        let null_flag: ApiResponse =
            serde_json::from_str(r#"{"success": null, "message": "bad channel"}"#).unwrap();
        assert!(!null_flag.success);
        assert_eq!(null_flag.message.as_deref(), Some("bad channel"));

        let numeric: ApiResponse =
            serde_json::from_str(r#"{"success": 1, "message": 4004}"#).unwrap();
        assert!(numeric.success);
        assert_eq!(numeric.message.as_deref(), Some("4004"));

        let zero: ApiResponse = serde_json::from_str(r#"{"success": 0, "message": null}"#).unwrap();
        assert!(!zero.success);
        assert!(zero.message.is_none());
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{DeviceInfo, EventKind, EventPayload};

#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    software_id: i64,
    device: DeviceInfo,
}

impl PayloadBuilder {
    pub fn new(software_id: i64, device: DeviceInfo) -> Self {
        Self {
            software_id,
            device,
        }
    }

    pub fn software_id(&self) -> i64 {
        self.software_id
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    // The clock is read once per payload.
    pub fn build(&self, kind: EventKind, channel: &str, device_id: Option<&str>) -> EventPayload {
        self.build_at(kind, channel, device_id, Utc::now())
    }

    pub fn build_at(
        &self,
        kind: EventKind,
        channel: &str,
        device_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> EventPayload {
        EventPayload {
            kind,
            channel_code: channel.to_string(),
            software_id: self.software_id,
            timestamp: format_timestamp(at),
            device_info: None,
            device_id: device_id.map(str::to_string),
            real_install: None,
            trigger_context: None,
            license_key: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn build_with_device(
        &self,
        kind: EventKind,
        channel: &str,
        device_id: Option<&str>,
    ) -> EventPayload {
        self.build(kind, channel, device_id)
            .with_device_info(self.device.clone())
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

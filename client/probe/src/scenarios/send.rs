//! One-off event sent from the command line.

use std::io::Write;

use crate::{error::Result, models::EventKind, report};

use super::{attempt_succeeded, Probe};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    pub kind: EventKind,
    pub device_id: Option<String>,
    pub real_install: bool,
    pub trigger_context: Option<String>,
    pub license_key: Option<String>,
    pub device_info: bool,
}

impl SendOptions {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            device_id: None,
            real_install: false,
            trigger_context: None,
            license_key: None,
            device_info: true,
        }
    }
}

impl Probe {
    pub async fn send_event<W: Write>(&self, out: &mut W, options: &SendOptions) -> Result<bool> {
        let builder = self.builder();
        let device_id = options.device_id.as_deref();
        let mut payload = if options.device_info {
            builder.build_with_device(options.kind, self.channel(), device_id)
        } else {
            builder.build(options.kind, self.channel(), device_id)
        };
        if options.real_install {
            payload = payload.real_install(true);
        }
        if let Some(context) = &options.trigger_context {
            payload = payload.trigger_context(context.as_str());
        }
        if let Some(key) = &options.license_key {
            payload = payload.license_key(key.as_str());
        }

        writeln!(out, "{} event", options.kind)?;
        writeln!(out, "payload: {}", payload.to_pretty_json())?;
        let attempt = self.dispatch(&payload, self.timeout()).await;
        match &attempt {
            Ok(record) => report::describe_response(out, record)?,
            Err(err) => report::describe_failure(out, err)?,
        }
        out.flush()?;
        let success = attempt_succeeded(&attempt);
        tracing::info!(kind = options.kind.as_str(), success, "event sent");
        Ok(success)
    }
}

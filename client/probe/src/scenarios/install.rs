//! Smart install tracking: device-fingerprinted installs flagged as real.

use std::io::Write;

use crate::{
    error::Result,
    models::{EventKind, EventPayload},
    report::{self, CaseOutcome, SuiteOutcome, SuiteReport, RULE},
};

use super::Probe;

pub const SMART_DEVICE: &str = "test_device_12345_smart";
pub const FIRST_USAGE_DEVICE: &str = "test_device_first_usage";
pub const DUPLICATE_DEVICE: &str = "test_device_duplicate_prevention";
pub const DUPLICATE_ATTEMPTS: usize = 3;
pub const DEVICES: [&str; 4] = [
    "test_device_samsung_galaxy",
    "test_device_huawei_mate",
    "test_device_xiaomi_mi",
    "test_device_oneplus_9",
];

fn smart_install(probe: &Probe, device_id: &str) -> EventPayload {
    probe
        .builder()
        .build_with_device(EventKind::Install, probe.channel(), Some(device_id))
        .real_install(true)
}

pub async fn run<W: Write>(probe: &Probe, out: &mut W) -> Result<SuiteReport> {
    writeln!(out, "smart install tracking")?;
    writeln!(out, "{RULE}")?;

    let mut suite = SuiteReport::new("smart install");

    report::section(out, "smart install")?;
    let single = smart_install_check(probe, out, SMART_DEVICE).await?;
    suite.push("smart install", SuiteOutcome::Check(single));

    report::section(out, "duplicate prevention")?;
    let attempts = duplicate_prevention(probe, out).await?;
    suite.push("duplicate prevention", SuiteOutcome::Dedup(attempts));

    report::section(out, "different devices")?;
    let devices = different_devices(probe, out).await?;
    suite.push("different devices", SuiteOutcome::Named(devices));

    report::section(out, "first usage flow")?;
    let flow = first_usage_flow(probe, out).await?;
    suite.push("first usage flow", SuiteOutcome::Check(flow));

    Ok(suite)
}

async fn smart_install_check<W: Write>(probe: &Probe, out: &mut W, base: &str) -> Result<bool> {
    let device_id = probe.device_id(base);
    let payload = smart_install(probe, &device_id);
    writeln!(out, "device id: {device_id}")?;
    writeln!(out, "channel: {}", payload.channel_code)?;
    writeln!(out, "real install: true")?;
    let success = probe.send_verbose(out, &payload).await?;
    writeln!(out, "smart install {}", report::mark(success))?;
    Ok(success)
}

async fn duplicate_prevention<W: Write>(probe: &Probe, out: &mut W) -> Result<Vec<bool>> {
    let device_id = probe.device_id(DUPLICATE_DEVICE);
    let mut results = Vec::with_capacity(DUPLICATE_ATTEMPTS);

    for attempt in 1..=DUPLICATE_ATTEMPTS {
        writeln!(out, "\nattempt {attempt}:")?;
        let payload = smart_install(probe, &device_id);
        match probe.dispatch(&payload, probe.short_timeout()).await {
            Ok(record) => {
                writeln!(out, "  device id: {device_id}")?;
                writeln!(
                    out,
                    "  result: {} (HTTP {})",
                    report::mark(record.success),
                    record.status
                )?;
                if let Some(message) = record.message() {
                    writeln!(out, "  message: {message}")?;
                }
                results.push(record.success);
            }
            Err(err) => {
                writeln!(out, "  error: {err}")?;
                results.push(false);
            }
        }
    }

    writeln!(out, "\nduplicate prevention:")?;
    for (index, accepted) in results.iter().enumerate() {
        writeln!(out, "  attempt {}: {}", index + 1, dedup_verdict(index, *accepted))?;
        if index > 0 && *accepted {
            tracing::warn!(
                device_id = %device_id,
                attempt = index + 1,
                "duplicate install accepted by server"
            );
        }
    }
    Ok(results)
}

// First attempt must be accepted; later acceptances are warnings only.
pub fn dedup_verdict(index: usize, accepted: bool) -> &'static str {
    match (index, accepted) {
        (0, true) => "accepted (expected)",
        (0, false) => "rejected (expected acceptance)",
        (_, false) => "rejected (expected)",
        (_, true) => "WARNING unexpectedly accepted (expected rejection)",
    }
}

async fn different_devices<W: Write>(probe: &Probe, out: &mut W) -> Result<Vec<CaseOutcome>> {
    let mut results = Vec::with_capacity(DEVICES.len());
    for base in DEVICES {
        let device_id = probe.device_id(base);
        let payload = smart_install(probe, &device_id);
        let success = probe.send_line(out, &device_id, &payload).await?;
        results.push(CaseOutcome {
            name: device_id,
            success,
        });
    }

    writeln!(out, "\ndifferent devices:")?;
    for case in &results {
        writeln!(out, "  {}: {}", case.name, report::mark(case.success))?;
    }
    Ok(results)
}

async fn first_usage_flow<W: Write>(probe: &Probe, out: &mut W) -> Result<bool> {
    writeln!(out, "1. user installs the app")?;
    writeln!(out, "2. app starts (no install event yet)")?;
    writeln!(out, "3. user opens the browser")?;
    writeln!(out, "4. first site visit triggers the smart install event")?;
    // A fresh device; the single smart install above already used its own.
    let success = smart_install_check(probe, out, FIRST_USAGE_DEVICE).await?;
    writeln!(out, "5. browsing continues")?;
    writeln!(out, "6. fifth visit triggers activation (covered by the tracking suite)")?;
    Ok(success)
}

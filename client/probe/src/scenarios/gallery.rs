//! Install events triggered by the first gallery open.

use std::io::Write;

use crate::{
    error::Result,
    models::{EventKind, EventPayload},
    report::{self, SuiteOutcome, SuiteReport, RULE},
};

use super::Probe;

pub const GALLERY_DEVICE: &str = "gallery_device_12345_smart";
pub const GALLERY_FLOW_DEVICE: &str = "gallery_device_first_usage";
pub const COMPARISON_GALLERY_DEVICE: &str = "comparison_gallery_device";
pub const COMPARISON_BROWSER_DEVICE: &str = "comparison_browser_device";
pub const PRECISION_DEVICE: &str = "precision_test_device_001";

pub const GALLERY_FIRST_OPEN: &str = "gallery_first_open";
pub const GALLERY_REPEAT_OPEN: &str = "gallery_repeat_open";
pub const BROWSER_FIRST_VISIT: &str = "browser_first_visit";

fn gallery_install(probe: &Probe, device_id: &str, context: &str) -> EventPayload {
    probe
        .builder()
        .build_with_device(EventKind::Install, probe.channel(), Some(device_id))
        .real_install(true)
        .trigger_context(context)
}

pub async fn run<W: Write>(probe: &Probe, out: &mut W) -> Result<SuiteReport> {
    writeln!(out, "gallery install tracking")?;
    writeln!(out, "{RULE}")?;

    let mut suite = SuiteReport::new("gallery install");

    report::section(out, "gallery install")?;
    let single = gallery_install_check(probe, out, GALLERY_DEVICE).await?;
    suite.push("gallery install", SuiteOutcome::Check(single));

    report::section(out, "gallery vs browser trigger")?;
    let (gallery, browser) = trigger_comparison(probe, out).await?;
    suite.push(
        "gallery vs browser trigger",
        SuiteOutcome::Pair {
            primary: gallery,
            comparison: browser,
        },
    );

    report::section(out, "gallery usage flow")?;
    let flow = gallery_usage_flow(probe, out).await?;
    suite.push("gallery usage flow", SuiteOutcome::Check(flow));

    report::section(out, "trigger precision")?;
    let (first, repeat) = trigger_precision(probe, out).await?;
    suite.push(
        "trigger precision",
        SuiteOutcome::Pair {
            primary: first,
            comparison: repeat,
        },
    );

    Ok(suite)
}

async fn gallery_install_check<W: Write>(probe: &Probe, out: &mut W, base: &str) -> Result<bool> {
    let device_id = probe.device_id(base);
    let payload = gallery_install(probe, &device_id, GALLERY_FIRST_OPEN);
    writeln!(out, "trigger: first gallery open")?;
    writeln!(out, "device id: {device_id}")?;
    writeln!(out, "channel: {}", payload.channel_code)?;
    let success = probe.send_verbose(out, &payload).await?;
    writeln!(out, "gallery install {}", report::mark(success))?;
    Ok(success)
}

async fn trigger_comparison<W: Write>(probe: &Probe, out: &mut W) -> Result<(bool, bool)> {
    writeln!(out, "1. gallery trigger")?;
    let gallery_device = probe.device_id(COMPARISON_GALLERY_DEVICE);
    let payload = gallery_install(probe, &gallery_device, GALLERY_FIRST_OPEN);
    let gallery = probe.send_line(out, "gallery trigger", &payload).await?;

    writeln!(out, "2. browser trigger (retired)")?;
    let browser_device = probe.device_id(COMPARISON_BROWSER_DEVICE);
    let payload = gallery_install(probe, &browser_device, BROWSER_FIRST_VISIT);
    let browser = probe.send_line(out, "browser trigger", &payload).await?;

    writeln!(out, "\ncomparison:")?;
    writeln!(
        out,
        "  gallery trigger (current): {}",
        if gallery { "working" } else { "needs attention" }
    )?;
    writeln!(
        out,
        "  browser trigger (retired): {}",
        if browser { "still accepted by the API" } else { "rejected" }
    )?;
    Ok((gallery, browser))
}

async fn gallery_usage_flow<W: Write>(probe: &Probe, out: &mut W) -> Result<bool> {
    writeln!(out, "1. user installs the app")?;
    writeln!(out, "2. app starts on the main screen (no event)")?;
    writeln!(out, "3. user browses the gallery list")?;
    writeln!(out, "4. user opens a gallery")?;
    writeln!(out, "5. gallery screen resumes and sends the smart install event")?;
    let success = gallery_install_check(probe, out, GALLERY_FLOW_DEVICE).await?;
    writeln!(out, "6. later features never send a second install event")?;
    Ok(success)
}

async fn trigger_precision<W: Write>(probe: &Probe, out: &mut W) -> Result<(bool, bool)> {
    let device_id = probe.device_id(PRECISION_DEVICE);

    writeln!(out, "1. first gallery open")?;
    let payload = gallery_install(probe, &device_id, GALLERY_FIRST_OPEN)
        .extra("testScenario", "first_gallery_open");
    let first = probe.send_line(out, "first open", &payload).await?;

    writeln!(out, "2. repeat gallery open on the same device")?;
    let payload = gallery_install(probe, &device_id, GALLERY_REPEAT_OPEN)
        .extra("testScenario", "repeat_gallery_open");
    let repeat = probe.send_line(out, "repeat open", &payload).await?;
    writeln!(
        out,
        "  repeat open: {}",
        if repeat { "server allows" } else { "server rejects" }
    )?;
    writeln!(out, "  note: repeat suppression happens on the client")?;

    Ok((first, repeat))
}

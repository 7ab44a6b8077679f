//! Activation and download tracking.

use std::io::Write;

use crate::{
    error::Result,
    models::{EventKind, EventPayload},
    report::{self, CaseOutcome, SuiteOutcome, SuiteReport, RULE},
};

use super::{Probe, UNKNOWN_CHANNEL};

/// License key sent when the fifth site visit activates the browser.
pub const BROWSER_ACTIVATION_KEY: &str = "browser_activation_5_visits";
pub const CHANNELS: [&str; 4] = [UNKNOWN_CHANNEL, "3001", "3002", "3003"];
pub const VISITS_BEFORE_ACTIVATION: u32 = 5;

fn activation(probe: &Probe, channel: &str, license_key: &str) -> EventPayload {
    probe
        .builder()
        .build_with_device(EventKind::Activate, channel, None)
        .license_key(license_key)
}

pub async fn run<W: Write>(probe: &Probe, out: &mut W) -> Result<SuiteReport> {
    writeln!(out, "activation and download tracking")?;
    writeln!(out, "{RULE}")?;

    let mut suite = SuiteReport::new("activation and download");

    report::section(out, "activation")?;
    let activated = activation_check(probe, out).await?;
    suite.push("activation", SuiteOutcome::Check(activated));

    report::section(out, "download")?;
    let downloaded = download_check(probe, out).await?;
    suite.push("download", SuiteOutcome::Check(downloaded));

    report::section(out, "user journey")?;
    let journey = user_journey(probe, out).await?;
    suite.push("user journey", SuiteOutcome::Check(journey));

    report::section(out, "channels")?;
    let channels = multiple_channels(probe, out).await?;
    suite.push("channels", SuiteOutcome::Named(channels));

    Ok(suite)
}

async fn activation_check<W: Write>(probe: &Probe, out: &mut W) -> Result<bool> {
    let payload = activation(probe, probe.channel(), BROWSER_ACTIVATION_KEY);
    writeln!(out, "license key: {BROWSER_ACTIVATION_KEY}")?;
    writeln!(out, "channel: {}", payload.channel_code)?;
    let success = probe.send_verbose(out, &payload).await?;
    writeln!(out, "activation {}", report::mark(success))?;
    Ok(success)
}

async fn download_check<W: Write>(probe: &Probe, out: &mut W) -> Result<bool> {
    let payload = probe
        .builder()
        .build_with_device(EventKind::Download, probe.channel(), None);
    writeln!(out, "channel: {}", payload.channel_code)?;
    let success = probe.send_verbose(out, &payload).await?;
    writeln!(out, "download {}", report::mark(success))?;
    Ok(success)
}

async fn user_journey<W: Write>(probe: &Probe, out: &mut W) -> Result<bool> {
    writeln!(out, "1. install already reported at first launch")?;
    writeln!(out, "2. user browses sites")?;
    for visit in 1..=VISITS_BEFORE_ACTIVATION {
        if visit == VISITS_BEFORE_ACTIVATION {
            writeln!(out, "   visit {visit} -> activation")?;
        } else {
            writeln!(out, "   visit {visit}")?;
        }
    }
    writeln!(out, "3. user downloads a file")?;

    let activated = activation_check(probe, out).await?;
    let downloaded = download_check(probe, out).await?;

    writeln!(out, "\njourney:")?;
    writeln!(out, "  activation: {}", report::mark(activated))?;
    writeln!(out, "  download: {}", report::mark(downloaded))?;
    Ok(activated && downloaded)
}

async fn multiple_channels<W: Write>(probe: &Probe, out: &mut W) -> Result<Vec<CaseOutcome>> {
    let mut results = Vec::with_capacity(CHANNELS.len());
    for channel in CHANNELS {
        let payload = activation(probe, channel, &format!("test_activation_{channel}"));
        let label = format!("channel {channel}");
        let expect_accept = channel != UNKNOWN_CHANNEL;
        let success = probe
            .send_line_expecting(out, &label, &payload, expect_accept)
            .await?;
        results.push(CaseOutcome {
            name: label,
            success,
        });
    }

    writeln!(out, "\nchannels:")?;
    for case in &results {
        writeln!(out, "  {}: {}", case.name, report::mark(case.success))?;
    }
    Ok(results)
}

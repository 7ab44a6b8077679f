//! End-to-end check of the three stats endpoints with bare payloads.

use std::io::Write;

use crate::{
    error::Result,
    models::EventKind,
    report::{self, SuiteOutcome, SuiteReport, Tally, RULE},
};

use super::{attempt_rejected, attempt_succeeded, Probe, UNKNOWN_CHANNEL};

struct Case {
    name: String,
    kind: EventKind,
    channel: String,
}

fn cases(channel: &str) -> Vec<Case> {
    vec![
        Case {
            name: format!("install - channel {channel}"),
            kind: EventKind::Install,
            channel: channel.to_string(),
        },
        Case {
            name: format!("activate - channel {channel} (revenue)"),
            kind: EventKind::Activate,
            channel: channel.to_string(),
        },
        Case {
            name: format!("download - channel {channel}"),
            kind: EventKind::Download,
            channel: channel.to_string(),
        },
        Case {
            name: format!("install - channel {UNKNOWN_CHANNEL} (unknown)"),
            kind: EventKind::Install,
            channel: UNKNOWN_CHANNEL.to_string(),
        },
    ]
}

pub async fn run<W: Write>(probe: &Probe, out: &mut W) -> Result<SuiteReport> {
    writeln!(out, "stats API smoke check")?;
    writeln!(out, "target: {}", probe.invoker().base_url())?;
    writeln!(out, "{RULE}")?;

    let cases = cases(probe.channel());
    let mut tally = Tally::new();
    let mut unknown_rejected = false;
    for (index, case) in cases.iter().enumerate() {
        if index > 0 {
            probe.pause().await;
        }
        writeln!(out, "\n{}", case.name)?;
        let payload = probe.builder().build(case.kind, &case.channel, None);
        let attempt = probe.dispatch(&payload, probe.timeout()).await;
        match &attempt {
            Ok(record) => report::describe_response(out, record)?,
            Err(err) => report::describe_failure(out, err)?,
        }
        if case.channel == UNKNOWN_CHANNEL {
            unknown_rejected = attempt_rejected(&attempt);
        }
        tally.record(case.name.clone(), attempt_succeeded(&attempt));
    }

    writeln!(out, "\n{RULE}")?;
    writeln!(out, "smoke results")?;
    writeln!(out, "{RULE}")?;
    tally.write_summary(out)?;
    let reachable = tally.successes() > 0;
    if reachable {
        writeln!(out, "\nthe stats API is reachable and accepting events")?;
    } else {
        writeln!(out, "\nno case succeeded; check the API host and payload format")?;
    }

    // The raw tally counts the unknown channel as a failure; the verdict
    // only needs the API to answer and to turn that channel away.
    let mut suite = SuiteReport::new("smoke");
    suite.push("API reachable", SuiteOutcome::Check(reachable));
    suite.push(
        format!("channel {UNKNOWN_CHANNEL} rejected"),
        SuiteOutcome::Check(unknown_rejected),
    );
    Ok(suite)
}

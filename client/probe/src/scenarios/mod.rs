//! Scripted suites against the live stats API.
//!
//! Calls are strictly sequential; a failed case is reported and the suite
//! moves on. Only errors writing the report abort a run.

mod gallery;
mod install;
mod send;
mod smoke;
mod tracking;

pub use send::SendOptions;

use std::{fmt, io::Write, str::FromStr, time::Duration};

use crate::{
    config::ProbeConfig,
    error::{ProbeError, Result},
    invoker::{Invoker, ResponseRecord},
    models::EventPayload,
    payload::PayloadBuilder,
    report::{self, SuiteReport},
};

pub type Attempt = std::result::Result<ResponseRecord, ProbeError>;

// Channel the server is expected not to know.
pub const UNKNOWN_CHANNEL: &str = "0000";

pub fn attempt_succeeded(attempt: &Attempt) -> bool {
    matches!(attempt, Ok(record) if record.success)
}

// A transport error proves nothing about the channel, so it is not a rejection.
pub fn attempt_rejected(attempt: &Attempt) -> bool {
    matches!(attempt, Ok(record) if !record.success)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    Smoke,
    Install,
    Gallery,
    Tracking,
}

impl Suite {
    pub const ALL: [Suite; 4] = [Suite::Smoke, Suite::Install, Suite::Gallery, Suite::Tracking];

    pub fn as_str(&self) -> &'static str {
        match self {
            Suite::Smoke => "smoke",
            Suite::Install => "install",
            Suite::Gallery => "gallery",
            Suite::Tracking => "tracking",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Suite::ALL
            .into_iter()
            .find(|suite| suite.as_str() == value)
            .ok_or_else(|| format!("unknown suite '{value}'"))
    }
}

pub struct Probe {
    invoker: Invoker,
    builder: PayloadBuilder,
    channel: String,
    timeout: Duration,
    short_timeout: Duration,
    case_delay: Duration,
    device_suffix: Option<String>,
}

impl Probe {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let device_suffix = if config.unique_devices {
            let id = uuid::Uuid::new_v4().simple().to_string();
            Some(id[..8].to_string())
        } else {
            None
        };
        Ok(Self {
            invoker: Invoker::new(&config.base_url)?,
            builder: PayloadBuilder::new(config.software_id, config.device.clone()),
            channel: config.channel.clone(),
            timeout: config.timeout,
            short_timeout: config.short_timeout,
            case_delay: config.case_delay,
            device_suffix,
        })
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn builder(&self) -> &PayloadBuilder {
        &self.builder
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn short_timeout(&self) -> Duration {
        self.short_timeout
    }

    pub fn device_id(&self, base: &str) -> String {
        match &self.device_suffix {
            Some(suffix) => format!("{base}_{suffix}"),
            None => base.to_string(),
        }
    }

    pub async fn dispatch(&self, payload: &EventPayload, timeout: Duration) -> Attempt {
        self.invoker.send(payload, timeout).await
    }

    pub async fn send_verbose<W: Write>(
        &self,
        out: &mut W,
        payload: &EventPayload,
    ) -> Result<bool> {
        writeln!(out, "payload: {}", payload.to_pretty_json())?;
        let attempt = self.dispatch(payload, self.timeout).await;
        match &attempt {
            Ok(record) => {
                writeln!(out, "\nstatus: {}", record.status)?;
                if !record.body.is_empty() {
                    writeln!(out, "body: {}", record.body)?;
                }
            }
            Err(err) => report::describe_failure(out, err)?,
        }
        Ok(attempt_succeeded(&attempt))
    }

    /// Send one payload and print a single `label: PASS (HTTP n)` line.
    pub async fn send_line<W: Write>(
        &self,
        out: &mut W,
        label: &str,
        payload: &EventPayload,
    ) -> Result<bool> {
        self.send_line_expecting(out, label, payload, true).await
    }

    /// Like `send_line`, but passes when the API turns the event away.
    pub async fn send_line_expecting<W: Write>(
        &self,
        out: &mut W,
        label: &str,
        payload: &EventPayload,
        expect_accept: bool,
    ) -> Result<bool> {
        let attempt = self.dispatch(payload, self.short_timeout).await;
        let passed = if expect_accept {
            attempt_succeeded(&attempt)
        } else {
            attempt_rejected(&attempt)
        };
        match &attempt {
            Ok(record) if expect_accept => writeln!(
                out,
                "  {label}: {} (HTTP {})",
                report::mark(passed),
                record.status
            )?,
            Ok(record) => writeln!(
                out,
                "  {label}: {} (HTTP {}, rejection expected)",
                report::mark(passed),
                record.status
            )?,
            Err(err) => writeln!(out, "  {label}: error - {err}")?,
        }
        Ok(passed)
    }

    pub async fn pause(&self) {
        if !self.case_delay.is_zero() {
            tokio::time::sleep(self.case_delay).await;
        }
    }

    pub async fn run_suite<W: Write>(&self, suite: Suite, out: &mut W) -> Result<SuiteReport> {
        tracing::info!(suite = suite.as_str(), base_url = self.invoker.base_url(), "suite started");
        let report = match suite {
            Suite::Smoke => smoke::run(self, out).await?,
            Suite::Install => install::run(self, out).await?,
            Suite::Gallery => gallery::run(self, out).await?,
            Suite::Tracking => tracking::run(self, out).await?,
        };
        report.write_summary(out)?;
        tracing::info!(
            suite = suite.as_str(),
            passed = report.passed_count(),
            total = report.checks.len(),
            "suite finished"
        );
        Ok(report)
    }

    pub async fn run_suites<W: Write>(&self, suites: &[Suite], out: &mut W) -> Result<bool> {
        let mut all_passed = true;
        for suite in suites {
            let report = self.run_suite(*suite, out).await?;
            all_passed &= report.passed();
        }
        out.flush()?;
        Ok(all_passed)
    }
}

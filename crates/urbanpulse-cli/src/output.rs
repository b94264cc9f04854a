use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use urbanpulse_core::{CircuitSnapshot, UtcDateTime};

use crate::error::CliError;

/// JSON document printed on stdout for every command.
#[derive(Debug, Serialize)]
pub struct Report {
    pub data: Value,
    pub meta: ReportMeta,
}

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuits: Option<BTreeMap<String, CircuitSnapshot>>,
}

impl ReportMeta {
    pub fn new(
        latency_ms: u64,
        warnings: Vec<String>,
        circuits: Option<BTreeMap<String, CircuitSnapshot>>,
    ) -> Self {
        Self {
            generated_at: UtcDateTime::now(),
            latency_ms,
            warnings,
            circuits,
        }
    }
}

pub fn render(report: &Report, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_report(&mut handle, report, pretty)
}

fn write_report<W: Write>(writer: &mut W, report: &Report, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, report)?;
    } else {
        serde_json::to_writer(&mut *writer, report)?;
    }
    writeln!(writer)?;
    Ok(())
}

//! Decoding of the raw stdout buffer into an [`ExecutionReport`].

use tracing::{debug, trace};

use super::model::ExecutionReport;
use crate::error::{Error, Result};

/// Decode the captured stdout of a playbook run.
///
/// Malformed or truncated output yields [`Error::ReportDecode`] carrying the
/// raw text, which keeps "could not understand the output" apart from a
/// well-formed report describing a failed run.
pub fn parse_report(stdout: &[u8]) -> Result<ExecutionReport> {
    trace!(bytes = stdout.len(), "Decoding execution report");

    let report: ExecutionReport = serde_json::from_slice(stdout)
        .map_err(|e| Error::report_decode(String::from_utf8_lossy(stdout), e))?;

    debug!(
        plays = report.plays.len(),
        hosts = report.stats.len(),
        "Decoded execution report"
    );
    Ok(report)
}

impl std::str::FromStr for ExecutionReport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_report(s.as_bytes())
    }
}

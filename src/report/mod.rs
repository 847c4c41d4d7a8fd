//! Execution report model and decoder.
//!
//! The report is the structured JSON summary ansible writes to stdout when
//! `ANSIBLE_STDOUT_CALLBACK=json` is set. It is decoded once per run and does
//! not outlive the call that parsed it.

mod model;
mod parse;

pub use model::{
    ExecutionReport, Header, HostResult, HostStat, ItemResult, Message, Play, Task,
};
pub use parse::parse_report;

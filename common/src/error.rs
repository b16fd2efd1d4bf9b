use std::time::Duration;

use thiserror::Error;

use crate::config::Invocation;

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("driver printed no result line")]
    NoResultLine,
    #[error("expected at least 3 fields, found {found}")]
    TooFewFields { found: usize },
    #[error("field 2 is not a number: {field:?}")]
    NotNumeric { field: String },
    #[error("malformed record: {0}")]
    Malformed(#[from] csv::Error),
}

/// Errors that abort a sweep. Each one names the invocation that failed.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("could not launch driver for {invocation}: {source}")]
    Launch {
        invocation: Invocation,
        #[source]
        source: std::io::Error,
    },
    #[error("could not collect driver output for {invocation}: {source}")]
    Wait {
        invocation: Invocation,
        #[source]
        source: std::io::Error,
    },
    #[error("driver exited with {} for {invocation}", exit_code_str(.code))]
    Exit {
        invocation: Invocation,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("could not parse driver output for {invocation}: {failure}")]
    Parse {
        invocation: Invocation,
        output: String,
        #[source]
        failure: ParseFailure,
    },
    #[error("driver timed out after {after:?} for {invocation}")]
    Timeout {
        invocation: Invocation,
        after: Duration,
    },
}

impl SweepError {
    pub fn invocation(&self) -> &Invocation {
        match self {
            SweepError::Launch { invocation, .. }
            | SweepError::Wait { invocation, .. }
            | SweepError::Exit { invocation, .. }
            | SweepError::Parse { invocation, .. }
            | SweepError::Timeout { invocation, .. } => invocation,
        }
    }
}

fn exit_code_str(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "signal".to_owned(),
    }
}

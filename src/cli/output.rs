//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::StackError;

/// Map workflow errors to the text printed before exiting non-zero.
pub fn map_error(e: &StackError) -> String {
    let banner = match e {
        StackError::Cancelled { .. } => "*** CANCELLED ***",
        StackError::TeardownPartialFailure { .. } => "*** WARNING ***",
        _ => "*** ERROR ***",
    };
    format!("\n{}\n{}\nAborting...", banner, e)
}

//! Exit code logic for the mirror process.
//!
//! Single responsibility: map the traversal summary to the process exit outcome.

use autoindex_mirror::TraversalSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from a traversal summary.
pub(crate) fn determine_exit_outcome(summary: &TraversalSummary) -> ProcessExit {
    if summary.cancelled {
        ProcessExit::Interrupted
    } else if !summary.has_failures() {
        ProcessExit::Success
    } else if summary.files_present() > 0 || summary.directories_completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

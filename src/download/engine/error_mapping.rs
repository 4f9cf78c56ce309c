use super::{DownloadTask, ErrorKind};
use crate::events::MirrorEvent;

/// Builds the failure event reported for a task that ended in `kind`.
pub(super) fn failure_event(task: &DownloadTask, kind: ErrorKind, message: String) -> MirrorEvent {
    MirrorEvent::DownloadFailed {
        file_name: display_name(task),
        url: task.url.to_string(),
        kind,
        message,
    }
}

/// Name shown for a task; falls back to the URL when the path has no file name.
fn display_name(task: &DownloadTask) -> String {
    if task.file_name.is_empty() {
        task.url.to_string()
    } else {
        task.file_name.clone()
    }
}

//! Guaranteed reversal of transient filesystem state.
//!
//! Operations that set files aside or create scratch artifacts register one
//! [`UndoAction`] per mutation, at the moment the mutation happens. The stack
//! is unwound in reverse registration order on every exit path, so a failure
//! halfway through still puts external state back.

use log::{debug, warn};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// One reversal step registered by an operation that mutated external state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    RemoveFile(PathBuf),
    RemoveDirAll(PathBuf),
    /// Put a file that was set aside under another name back where it came
    /// from, replacing whatever sits at the original path now.
    RestoreAside { aside: PathBuf, original: PathBuf },
}

/// Reversal steps collected in registration order, executed in reverse.
#[derive(Default)]
pub struct UndoStack {
    actions: Vec<UndoAction>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run all registered actions, most recent first.
    ///
    /// A failing action is logged and the remaining actions still run; the
    /// stack is empty afterwards either way.
    #[tracing::instrument(skip(self, runtime))]
    pub fn unwind<R: Runtime>(&mut self, runtime: &R) {
        while let Some(action) = self.actions.pop() {
            debug!("undo: {:?}", action);
            if let Err(e) = apply(runtime, &action) {
                warn!("Cleanup step {:?} failed: {:#}", action, e);
            }
        }
    }
}

fn apply<R: Runtime>(runtime: &R, action: &UndoAction) -> anyhow::Result<()> {
    match action {
        UndoAction::RemoveFile(path) => runtime.remove_file(path),
        UndoAction::RemoveDirAll(path) => runtime.remove_dir_all(path),
        UndoAction::RestoreAside { aside, original } => {
            if runtime.exists(original) {
                runtime.remove_file(original)?;
            }
            runtime.rename(aside, original)
        }
    }
}

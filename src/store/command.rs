//! External commands that stand in for the store's native item editor.
//!
//! Each command is an argv array.  Arguments may contain the placeholders
//! `{id}`, `{kind}` and `{source}`, which are substituted before spawning.

use std::process::{Command, Stdio};
use std::thread;

use serde::Deserialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::item::ItemKind;

#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
pub struct ActionCommands {
    #[serde(default, rename = "open_command")]
    pub open: Option<Vec<String>>,
    #[serde(default, rename = "new_task_command")]
    pub new_task: Option<Vec<String>>,
    #[serde(default, rename = "new_appointment_command")]
    pub new_appointment: Option<Vec<String>>,
}

impl ActionCommands {
    pub fn open(&self, kind: ItemKind, entry_id: &str, source: &str) -> StoreResult<()> {
        let template = self
            .open
            .as_deref()
            .ok_or_else(|| StoreError::ActionFailed("no open_command configured".into()))?;
        spawn(&expand(template, Some(entry_id), kind, source))
    }

    pub fn create(&self, kind: ItemKind, source: &str) -> StoreResult<()> {
        let template = match kind {
            ItemKind::Task => self.new_task.as_deref(),
            ItemKind::Appointment => self.new_appointment.as_deref(),
        }
        .ok_or_else(|| StoreError::ActionFailed(format!("no command configured to create a {kind}")))?;
        spawn(&expand(template, None, kind, source))
    }
}

/// Substitute placeholders in every argument.  `{id}` becomes empty when
/// there is no item yet.
fn expand(template: &[String], entry_id: Option<&str>, kind: ItemKind, source: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{id}", entry_id.unwrap_or_default())
                .replace("{kind}", kind.as_str())
                .replace("{source}", source)
        })
        .collect()
}

/// Start `argv` detached from the terminal and reap it in the background.
fn spawn(argv: &[String]) -> StoreResult<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| StoreError::ActionFailed("empty command".into()))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| StoreError::ActionFailed(format!("{program}: {e}")))?;

    debug!(%program, pid = child.id(), "spawned item command");
    thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

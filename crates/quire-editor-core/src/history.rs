//! Transactional undo/redo history.
//!
//! Edits are recorded as line-level [`Command`]s grouped into transactions.
//! Each committed transaction is one undo step, except that consecutive
//! single-line edits of the same [`InputMode`] coalesce into the step before
//! them, so a burst of typing undoes at once.

use tracing::{debug, trace};
use web_time::Instant;

use crate::config::HistoryConfig;
use crate::document::{Line, TextDocument, common_bounds};
use crate::error::{EditorError, Result};
use crate::types::{EditorRange, InputMode};

/// A reversible line-level mutation.
///
/// Commands take the document explicitly. `exec` records what it replaced
/// so `undo` can restore it and `redo` can reapply without recomputing.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    InsertLine {
        index: usize,
        line: Line,
    },
    DeleteLine {
        index: usize,
        removed: Option<Line>,
    },
    UpdateLine {
        index: usize,
        before: Option<Line>,
        after: Line,
    },
    Composite(Vec<Command>),
}

impl Command {
    pub fn insert_line(index: usize, line: Line) -> Self {
        Command::InsertLine { index, line }
    }

    pub fn delete_line(index: usize) -> Self {
        Command::DeleteLine {
            index,
            removed: None,
        }
    }

    pub fn update_line(index: usize, after: Line) -> Self {
        Command::UpdateLine {
            index,
            before: None,
            after,
        }
    }

    pub fn exec(&mut self, doc: &mut TextDocument) -> Result<()> {
        match self {
            Command::InsertLine { index, line } => doc.insert_line(*index, line.clone()),
            Command::DeleteLine { index, removed } => {
                if doc.line_count() == 1 {
                    return Err(EditorError::InvalidCommand(
                        "cannot delete the only line of a document".into(),
                    ));
                }
                *removed = Some(doc.remove_line(*index)?);
                Ok(())
            }
            Command::UpdateLine {
                index,
                before,
                after,
            } => {
                *before = Some(doc.replace_line(*index, after.clone())?);
                Ok(())
            }
            Command::Composite(commands) => {
                for command in commands {
                    command.exec(doc)?;
                }
                Ok(())
            }
        }
    }

    pub fn undo(&self, doc: &mut TextDocument) -> Result<()> {
        match self {
            Command::InsertLine { index, .. } => doc.remove_line(*index).map(|_| ()),
            Command::DeleteLine { index, removed } => {
                let line = removed.clone().ok_or_else(not_executed)?;
                doc.insert_line(*index, line)
            }
            Command::UpdateLine { index, before, .. } => {
                let line = before.clone().ok_or_else(not_executed)?;
                doc.replace_line(*index, line).map(|_| ())
            }
            Command::Composite(commands) => {
                for command in commands.iter().rev() {
                    command.undo(doc)?;
                }
                Ok(())
            }
        }
    }

    pub fn redo(&self, doc: &mut TextDocument) -> Result<()> {
        match self {
            Command::InsertLine { index, line } => doc.insert_line(*index, line.clone()),
            Command::DeleteLine { index, .. } => doc.remove_line(*index).map(|_| ()),
            Command::UpdateLine { index, after, .. } => {
                doc.replace_line(*index, after.clone()).map(|_| ())
            }
            Command::Composite(commands) => {
                for command in commands {
                    command.redo(doc)?;
                }
                Ok(())
            }
        }
    }

    /// Index of the line a lone update touches.
    fn updated_line(&self) -> Option<usize> {
        match self {
            Command::UpdateLine { index, .. } => Some(*index),
            _ => None,
        }
    }
}

fn not_executed() -> EditorError {
    EditorError::InvalidCommand("command was never executed".into())
}

/// Commands turning `old` into `new`: updates for the changed lines both
/// have, then deletes or inserts for the difference in line count.
pub fn diff_lines(old: &TextDocument, new: &TextDocument) -> Vec<Command> {
    let (old_lines, new_lines) = (old.lines(), new.lines());
    let (prefix, suffix) = common_bounds(old_lines, new_lines);
    let old_mid = old_lines.len() - prefix - suffix;
    let new_mid = new_lines.len() - prefix - suffix;
    let paired = old_mid.min(new_mid);

    let mut commands = Vec::new();
    for i in prefix..prefix + paired {
        commands.push(Command::update_line(i, new_lines[i].clone()));
    }
    for _ in paired..old_mid {
        commands.push(Command::delete_line(prefix + paired));
    }
    for i in prefix + paired..prefix + new_mid {
        commands.push(Command::insert_line(i, new_lines[i].clone()));
    }
    commands
}

/// One undo step.
#[derive(Debug, Clone)]
pub struct StackEntry {
    pub commands: Vec<Command>,
    pub selection_before: Option<EditorRange>,
    pub selection_after: Option<EditorRange>,
    pub mode: Option<InputMode>,
    pub committed_at: Instant,
}

#[derive(Debug)]
struct Transaction {
    commands: Vec<Command>,
    selection_before: Option<EditorRange>,
    selection_after: Option<EditorRange>,
}

/// Selection to restore after an undo or redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoOutcome {
    pub selection: Option<EditorRange>,
}

#[derive(Debug)]
pub struct History {
    config: HistoryConfig,
    undo_stack: Vec<StackEntry>,
    redo_stack: Vec<StackEntry>,
    pending: Option<Transaction>,
    /// Mode of the last commit while it may still absorb the next one.
    coalescing: Option<InputMode>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: None,
            coalescing: None,
        }
    }

    pub fn is_transacting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn start_transaction(&mut self, selection_before: Option<EditorRange>) -> Result<()> {
        if self.pending.is_some() {
            return Err(EditorError::TransactionOpen);
        }
        self.pending = Some(Transaction {
            commands: Vec::new(),
            selection_before,
            selection_after: selection_before,
        });
        Ok(())
    }

    /// Execute `command` against `doc` as part of the open transaction.
    pub fn exec(&mut self, doc: &mut TextDocument, mut command: Command) -> Result<()> {
        let pending = self.pending.as_mut().ok_or(EditorError::NoTransaction)?;
        command.exec(doc)?;
        pending.commands.push(command);
        Ok(())
    }

    /// Selection to restore when the open transaction is redone.
    pub fn set_transaction_selection(&mut self, selection: Option<EditorRange>) -> Result<()> {
        let pending = self.pending.as_mut().ok_or(EditorError::NoTransaction)?;
        pending.selection_after = selection;
        Ok(())
    }

    /// Close the open transaction. Returns whether it was merged into the
    /// previous undo step. Empty transactions are dropped.
    pub fn commit(&mut self, mode: Option<InputMode>) -> Result<bool> {
        let transaction = self.pending.take().ok_or(EditorError::NoTransaction)?;
        if transaction.commands.is_empty() {
            trace!("dropping empty transaction");
            return Ok(false);
        }
        self.redo_stack.clear();
        let now = Instant::now();

        if self.can_merge(&transaction, mode, now) {
            if let Some(previous) = self.undo_stack.last_mut() {
                merge_into(previous, transaction, now);
                debug!(?mode, undo_len = self.undo_stack.len(), "coalesced edit into previous step");
                return Ok(true);
            }
        }

        self.undo_stack.push(StackEntry {
            commands: transaction.commands,
            selection_before: transaction.selection_before,
            selection_after: transaction.selection_after,
            mode,
            committed_at: now,
        });
        if self.undo_stack.len() > self.config.max_undo {
            let excess = self.undo_stack.len() - self.config.max_undo;
            self.undo_stack.drain(..excess);
        }
        self.coalescing = mode;
        debug!(?mode, undo_len = self.undo_stack.len(), "committed transaction");
        Ok(false)
    }

    fn can_merge(&self, transaction: &Transaction, mode: Option<InputMode>, now: Instant) -> bool {
        if mode.is_none() || self.coalescing != mode {
            return false;
        }
        let Some(previous) = self.undo_stack.last() else {
            return false;
        };
        if let Some(timeout) = self.config.coalesce_timeout() {
            if now.duration_since(previous.committed_at) >= timeout {
                return false;
            }
        }
        let [command] = transaction.commands.as_slice() else {
            return false;
        };
        let line = command.updated_line();
        line.is_some() && previous.commands.last().and_then(Command::updated_line) == line
    }

    /// Roll back the open transaction.
    pub fn abort(&mut self, doc: &mut TextDocument) -> Result<()> {
        let transaction = self.pending.take().ok_or(EditorError::NoTransaction)?;
        for command in transaction.commands.iter().rev() {
            command.undo(doc)?;
        }
        trace!(commands = transaction.commands.len(), "aborted transaction");
        Ok(())
    }

    /// The next commit starts a new undo step whatever its mode.
    pub fn break_coalescing(&mut self) {
        self.coalescing = None;
    }

    pub fn undo(&mut self, doc: &mut TextDocument) -> Result<Option<UndoOutcome>> {
        if self.pending.is_some() {
            return Err(EditorError::TransactionOpen);
        }
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(None);
        };
        for command in entry.commands.iter().rev() {
            command.undo(doc)?;
        }
        self.coalescing = None;
        let outcome = UndoOutcome {
            selection: entry.selection_before,
        };
        self.redo_stack.push(entry);
        debug!(undo_len = self.undo_stack.len(), redo_len = self.redo_stack.len(), "undo");
        Ok(Some(outcome))
    }

    pub fn redo(&mut self, doc: &mut TextDocument) -> Result<Option<UndoOutcome>> {
        if self.pending.is_some() {
            return Err(EditorError::TransactionOpen);
        }
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        for command in &entry.commands {
            command.redo(doc)?;
        }
        self.coalescing = None;
        let outcome = UndoOutcome {
            selection: entry.selection_after,
        };
        self.undo_stack.push(entry);
        debug!(undo_len = self.undo_stack.len(), redo_len = self.redo_stack.len(), "redo");
        Ok(Some(outcome))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.coalescing = None;
    }
}

/// Fold a single line update into `previous`: its last update now ends in
/// the new line state.
fn merge_into(previous: &mut StackEntry, transaction: Transaction, now: Instant) {
    if let (
        Some(Command::UpdateLine { after, .. }),
        Some(Command::UpdateLine { after: latest, .. }),
    ) = (
        previous.commands.last_mut(),
        transaction.commands.into_iter().next(),
    ) {
        *after = latest;
    }
    previous.selection_after = transaction.selection_after;
    previous.committed_at = now;
}

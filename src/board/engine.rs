//! Optimistic apply, then commit or roll back.
//!
//! Every operation follows the same path:
//!
//! 1. lock the entities it touches (queueing behind in-flight operations)
//! 2. check permission, plan the transition and swap in the new board
//! 3. issue the remote call without holding the board
//! 4. on success keep the board, on failure restore the captured partitions
//!
//! A reload (`replace_all` / `switch_project`) advances the board generation.
//! Calls that resolve after a reload are discarded and touch nothing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracker_common::{
    Actor, ActivityEventDraft, Column, ColumnId, Issue, IssueId, ProjectId,
};

use super::locks::{EntityLocks, LockKey};
use super::model::BoardModel;
use super::persistence::{ColumnStore, CommandOutcome, IssueStore, PersistCommand, dispatch};
use super::transition::{self, IssuePatch, NewIssue, Transition};
use crate::access::PermissionEvaluator;
use crate::activity::ActivityRecorder;
use crate::errors::BoardError;

const EVENT_CAPACITY: usize = 256;

/// Final state of an operation whose optimistic change was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The remote call succeeded and the change is final.
    Committed(T),
    /// The board was reloaded before the remote call resolved; its result
    /// was ignored.
    Discarded,
}

impl<T> Settled<T> {
    pub fn committed(self) -> Option<T> {
        match self {
            Self::Committed(value) => Some(value),
            Self::Discarded => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Settled<U> {
        match self {
            Self::Committed(value) => Settled::Committed(f(value)),
            Self::Discarded => Settled::Discarded,
        }
    }
}

/// Board lifecycle notifications for renderers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BoardEvent {
    /// Optimistic state, shown before the remote call resolves.
    Applied {
        op_id: u64,
        operation: &'static str,
        board: BoardModel,
    },
    Committed {
        op_id: u64,
        operation: &'static str,
        board: BoardModel,
    },
    RolledBack {
        op_id: u64,
        operation: &'static str,
        error: String,
        board: BoardModel,
    },
    Discarded {
        op_id: u64,
        operation: &'static str,
    },
    Reloaded {
        generation: u64,
        board: BoardModel,
    },
}

/// Result of a committed run, before it is narrowed per operation.
struct Committed {
    board: BoardModel,
    created_issue: Option<IssueId>,
}

pub struct BoardOrderingEngine {
    board: Mutex<BoardModel>,
    column_store: Arc<dyn ColumnStore>,
    issue_store: Arc<dyn IssueStore>,
    locks: EntityLocks,
    activity: ActivityRecorder,
    evaluator: PermissionEvaluator,
    events: broadcast::Sender<BoardEvent>,
    next_op: AtomicU64,
    next_provisional: AtomicI64,
}

impl std::fmt::Debug for BoardOrderingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardOrderingEngine")
            .field("next_op", &self.next_op)
            .field("activity", &self.activity)
            .finish_non_exhaustive()
    }
}

impl BoardOrderingEngine {
    pub fn new(
        board: BoardModel,
        column_store: Arc<dyn ColumnStore>,
        issue_store: Arc<dyn IssueStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            board: Mutex::new(board),
            column_store,
            issue_store,
            locks: EntityLocks::new(),
            activity: ActivityRecorder::disabled(),
            evaluator: PermissionEvaluator::new(),
            events,
            next_op: AtomicU64::new(1),
            next_provisional: AtomicI64::new(-1),
        }
    }

    pub fn with_activity(mut self, activity: ActivityRecorder) -> Self {
        self.activity = activity;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Copy of the current board, optimistic changes included.
    pub fn board(&self) -> Result<BoardModel, BoardError> {
        Ok(self.lock_board()?.clone())
    }

    pub fn generation(&self) -> Result<u64, BoardError> {
        Ok(self.lock_board()?.generation())
    }

    pub fn project_id(&self) -> Result<ProjectId, BoardError> {
        Ok(self.lock_board()?.project().id)
    }

    /// True while an operation on `key` is applied but not yet settled, or
    /// waiting to run.
    pub fn is_in_flight(&self, key: LockKey) -> bool {
        self.locks.in_flight(key)
    }

    // ── Reload ───────────────────────────────────────────────────────

    /// Replace the board contents from a fresh load. In-flight operations
    /// are abandoned and their results discarded when they resolve.
    pub fn replace_all(
        &self,
        columns: Vec<Column>,
        issues_by_column: BTreeMap<ColumnId, Vec<Issue>>,
    ) -> Result<u64, BoardError> {
        let mut board = self.lock_board()?;
        let generation = board.replace_all(columns, issues_by_column)?;
        self.locks.reset();
        info!(project_id = board.project().id, generation, "board reloaded");
        self.emit(BoardEvent::Reloaded {
            generation,
            board: board.clone(),
        });
        Ok(generation)
    }

    /// Open another project. The previous board and its locks are dropped.
    pub fn switch_project(&self, mut next: BoardModel) -> Result<u64, BoardError> {
        next.check_invariants()?;
        let mut board = self.lock_board()?;
        let generation = board.generation() + 1;
        next.set_generation(generation);
        *board = next;
        self.locks.reset();
        info!(project_id = board.project().id, generation, "switched project");
        self.emit(BoardEvent::Reloaded {
            generation,
            board: board.clone(),
        });
        Ok(generation)
    }

    // ── Columns ──────────────────────────────────────────────────────

    pub async fn move_column(
        &self,
        actor: &Actor,
        source_index: usize,
        dest_index: usize,
    ) -> Result<Settled<()>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |_| Ok(vec![LockKey::Layout]),
                |board| {
                    if !evaluator.can_manage_project(actor, board.project()) {
                        return Err(denied("move column"));
                    }
                    transition::move_column(board, source_index, dest_index)
                },
            )
            .await?;
        Ok(settled.map(|_| ()))
    }

    pub async fn create_column(
        &self,
        actor: &Actor,
        title: &str,
    ) -> Result<Settled<Column>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |board| {
                    Ok(vec![
                        LockKey::Layout,
                        LockKey::Column(transition::next_custom_column_id(board)),
                    ])
                },
                |board| {
                    if !evaluator.can_manage_project(actor, board.project()) {
                        return Err(denied("create column"));
                    }
                    transition::create_column(board, title)
                },
            )
            .await?;
        settled
            .map(|c| c.board.columns().last().cloned())
            .require("column")
    }

    pub async fn rename_column(
        &self,
        actor: &Actor,
        column_id: ColumnId,
        title: &str,
    ) -> Result<Settled<Column>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |_| Ok(vec![LockKey::Layout, LockKey::Column(column_id)]),
                |board| {
                    transition::protect_default_column(column_id)?;
                    if !evaluator.can_manage_project(actor, board.project()) {
                        return Err(denied("rename column"));
                    }
                    transition::rename_column(board, column_id, title)
                },
            )
            .await?;
        settled
            .map(|c| c.board.column(column_id).cloned())
            .require("column")
    }

    pub async fn delete_column(
        &self,
        actor: &Actor,
        column_id: ColumnId,
    ) -> Result<Settled<()>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |_| Ok(vec![LockKey::Layout, LockKey::Column(column_id)]),
                |board| {
                    transition::protect_default_column(column_id)?;
                    if !evaluator.can_manage_project(actor, board.project()) {
                        return Err(denied("delete column"));
                    }
                    transition::delete_column(board, column_id)
                },
            )
            .await?;
        Ok(settled.map(|_| ()))
    }

    // ── Issues ───────────────────────────────────────────────────────

    pub async fn move_issue(
        &self,
        actor: &Actor,
        issue_id: IssueId,
        source_column_id: ColumnId,
        dest_column_id: ColumnId,
        dest_index: usize,
    ) -> Result<Settled<()>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |_| {
                    Ok(vec![
                        LockKey::Issue(issue_id),
                        LockKey::Column(source_column_id),
                        LockKey::Column(dest_column_id),
                    ])
                },
                |board| {
                    let project = board.project();
                    let allowed = if source_column_id == dest_column_id {
                        evaluator.can_manage_issues(actor, project)
                    } else {
                        let assignee = board.issue(issue_id).and_then(|i| i.assignee_id);
                        evaluator.can_move_issue_between_columns(actor, project, assignee)
                    };
                    if !allowed {
                        return Err(denied("move issue"));
                    }
                    transition::move_issue(
                        board,
                        issue_id,
                        source_column_id,
                        dest_column_id,
                        dest_index,
                    )
                },
            )
            .await?;
        Ok(settled.map(|_| ()))
    }

    /// Append a new issue to a column. The committed issue carries the id
    /// assigned by the store.
    pub async fn create_issue(
        &self,
        actor: &Actor,
        column_id: ColumnId,
        new: NewIssue,
    ) -> Result<Settled<Issue>, BoardError> {
        let evaluator = self.evaluator;
        let provisional = self.next_provisional.fetch_sub(1, Ordering::Relaxed);
        let settled = self
            .run(
                actor,
                |_| Ok(vec![LockKey::Column(column_id)]),
                |board| {
                    if !evaluator.can_create_issue(actor, board.project()) {
                        return Err(denied("create issue"));
                    }
                    transition::create_issue(board, column_id, new, actor.id, provisional)
                },
            )
            .await?;
        settled
            .map(|c| c.created_issue.and_then(|id| c.board.issue(id).cloned()))
            .require("issue")
    }

    pub async fn update_issue(
        &self,
        actor: &Actor,
        issue_id: IssueId,
        patch: IssuePatch,
    ) -> Result<Settled<Issue>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |board| issue_keys(board, issue_id),
                |board| {
                    let issue = board.issue(issue_id).ok_or(BoardError::NotFound {
                        entity: "issue",
                        id: issue_id,
                    })?;
                    if !evaluator.can_edit_issue(actor, board.project(), issue) {
                        return Err(denied("update issue"));
                    }
                    transition::update_issue(board, issue_id, patch)
                },
            )
            .await?;
        settled
            .map(|c| c.board.issue(issue_id).cloned())
            .require("issue")
    }

    pub async fn delete_issue(
        &self,
        actor: &Actor,
        issue_id: IssueId,
    ) -> Result<Settled<()>, BoardError> {
        let evaluator = self.evaluator;
        let settled = self
            .run(
                actor,
                |board| issue_keys(board, issue_id),
                |board| {
                    if !evaluator.can_manage_issues(actor, board.project()) {
                        return Err(denied("delete issue"));
                    }
                    transition::delete_issue(board, issue_id)
                },
            )
            .await?;
        Ok(settled.map(|_| ()))
    }

    // ── Core ─────────────────────────────────────────────────────────

    /// Lock, apply, persist, then commit or roll back.
    ///
    /// `keys` is evaluated against the current board; if the keys change
    /// while waiting for them (an issue moved, a column was created) the
    /// locks are released and taken again.
    async fn run<K, P>(
        &self,
        actor: &Actor,
        keys: K,
        plan: P,
    ) -> Result<Settled<Committed>, BoardError>
    where
        K: Fn(&BoardModel) -> Result<Vec<LockKey>, BoardError>,
        P: FnOnce(&BoardModel) -> Result<Transition, BoardError>,
    {
        let (generation, mut wanted) = {
            let board = self.lock_board()?;
            (board.generation(), keys(&board)?)
        };
        let held = loop {
            let held = self.locks.acquire(&wanted).await;
            let board = self.lock_board()?;
            if board.generation() != generation {
                debug!(generation, "operation superseded by reload");
                return Err(BoardError::Superseded);
            }
            let current = keys(&board)?;
            if current == wanted {
                break held;
            }
            wanted = current;
        };

        let op_id = self.next_op.fetch_add(1, Ordering::Relaxed);
        let (command, snapshot, note, project_id) = {
            let mut board = self.lock_board()?;
            let transition = plan(&board)?;
            transition.board.check_invariants()?;
            let snapshot = board.capture(&transition.partitions);
            *board = transition.board;
            debug!(op_id, operation = transition.command.name(), actor_id = actor.id, "applied");
            self.emit(BoardEvent::Applied {
                op_id,
                operation: transition.command.name(),
                board: board.clone(),
            });
            (
                transition.command,
                snapshot,
                transition.activity,
                board.project().id,
            )
        };
        let operation = command.name();

        let result = dispatch(&command, &*self.column_store, &*self.issue_store).await;

        let mut board = self.lock_board()?;
        if board.generation() != generation {
            info!(op_id, operation, "board reloaded while in flight; result discarded");
            self.emit(BoardEvent::Discarded { op_id, operation });
            return Ok(Settled::Discarded);
        }

        match result {
            Ok(outcome) => {
                let mut issue_id = note.issue_id;
                let mut created_issue = None;
                if let (CommandOutcome::IssueCreated(id), PersistCommand::CreateIssue { issue }) =
                    (outcome, &command)
                {
                    board.rekey_issue(issue.id, id);
                    issue_id = Some(id);
                    created_issue = Some(id);
                }
                let committed = board.clone();
                drop(board);
                drop(held);

                debug!(op_id, operation, "committed");
                self.emit(BoardEvent::Committed {
                    op_id,
                    operation,
                    board: committed.clone(),
                });

                let mut draft = ActivityEventDraft::new(actor.id, note.kind, project_id)
                    .summary(note.summary);
                if let Some(id) = issue_id {
                    draft = draft.issue(id);
                }
                self.activity.record(draft);

                Ok(Settled::Committed(Committed {
                    board: committed,
                    created_issue,
                }))
            }
            Err(source) => {
                board.restore(snapshot);
                let restored = board.clone();
                drop(board);
                drop(held);

                warn!(op_id, operation, error = %source, "persistence failed; rolled back");
                self.emit(BoardEvent::RolledBack {
                    op_id,
                    operation,
                    error: source.to_string(),
                    board: restored,
                });
                Err(BoardError::PersistenceFailure { operation, source })
            }
        }
    }

    fn lock_board(&self) -> Result<MutexGuard<'_, BoardModel>, BoardError> {
        self.board.lock().map_err(|_| BoardError::LockPoisoned)
    }

    fn emit(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl<T> Settled<Option<T>> {
    fn require(self, entity: &str) -> Result<Settled<T>, BoardError> {
        match self {
            Settled::Committed(Some(value)) => Ok(Settled::Committed(value)),
            Settled::Committed(None) => Err(BoardError::InvariantViolation(format!(
                "committed {} missing from board",
                entity
            ))),
            Settled::Discarded => Ok(Settled::Discarded),
        }
    }
}

fn issue_keys(board: &BoardModel, issue_id: IssueId) -> Result<Vec<LockKey>, BoardError> {
    let (column_id, _) = board.locate_issue(issue_id).ok_or(BoardError::NotFound {
        entity: "issue",
        id: issue_id,
    })?;
    Ok(vec![LockKey::Issue(issue_id), LockKey::Column(column_id)])
}

fn denied(action: &'static str) -> BoardError {
    BoardError::PermissionDenied { action }
}

//! Board engine scenarios against fake persistence collaborators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, broadcast};
use tracker::activity::{ActivityFilter, ActivityRecorder, MemorySink};
use tracker::board::{
    BoardEvent, BoardModel, BoardOrderingEngine, ColumnStore, IssueMove, IssueStore, LockKey,
    NewIssue, Settled,
};
use tracker::errors::{BoardError, ValidationError};
use tracker_common::{
    ActivityType, Actor, Column, ColumnId, Issue, IssueId, IssueStatus, Project, ProjectId,
    ProjectKey, Role,
};

/// Store that records calls, can hold them at a gate and can fail chosen
/// operations.
struct FakeStore {
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    gate: Semaphore,
    next_id: AtomicI64,
}

impl FakeStore {
    fn open() -> Arc<Self> {
        Arc::new(Self::with_permits(Semaphore::MAX_PERMITS))
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self::with_permits(0))
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            gate: Semaphore::new(permits),
            next_id: AtomicI64::new(1000),
        }
    }

    fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    async fn pass(&self, operation: &'static str) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(operation);
        self.gate.acquire().await?.forget();
        if self.failing.lock().unwrap().contains(operation) {
            anyhow::bail!("{} timed out", operation);
        }
        Ok(())
    }
}

#[async_trait]
impl ColumnStore for FakeStore {
    async fn create_column(&self, _column: &Column) -> anyhow::Result<()> {
        self.pass("create_column").await
    }

    async fn rename_column(&self, _: ProjectId, _: ColumnId, _: &str) -> anyhow::Result<()> {
        self.pass("rename_column").await
    }

    async fn delete_column(&self, _: ProjectId, _: ColumnId) -> anyhow::Result<()> {
        self.pass("delete_column").await
    }

    async fn reorder_columns(&self, _: ProjectId, _: &[ColumnId]) -> anyhow::Result<()> {
        self.pass("reorder_columns").await
    }
}

#[async_trait]
impl IssueStore for FakeStore {
    async fn create_issue(&self, _issue: &Issue) -> anyhow::Result<IssueId> {
        self.pass("create_issue").await?;
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn update_issue(&self, _issue: &Issue) -> anyhow::Result<()> {
        self.pass("update_issue").await
    }

    async fn delete_issue(&self, _issue_id: IssueId) -> anyhow::Result<()> {
        self.pass("delete_issue").await
    }

    async fn move_issue(&self, _mv: &IssueMove) -> anyhow::Result<()> {
        self.pass("move_issue").await
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────

const PROJECT: ProjectId = 7;
const CREATOR: i64 = 99;

fn issue(id: IssueId, column: &Column, order: i32) -> Issue {
    Issue {
        id,
        column_id: column.id,
        project_id: PROJECT,
        title: format!("Issue {}", id),
        status: column.status(),
        start_date: None,
        end_date: None,
        assignee_id: None,
        reporter_id: 1,
        order,
    }
}

/// Project 7: To Do holds 40, 42, 44; Done holds 50; custom QA and Blocked.
fn sample_board() -> BoardModel {
    let project = Project {
        id: PROJECT,
        site_id: 1,
        name: "Core".into(),
        key: ProjectKey::parse("CORE").unwrap(),
        is_private: false,
        created_by: CREATOR,
    };
    let mut columns = Column::defaults_for(PROJECT);
    for (id, title) in [(100, "QA"), (101, "Blocked")] {
        columns.push(Column {
            id,
            project_id: PROJECT,
            title: title.into(),
            order: columns.len() as i32,
        });
    }
    let issues = vec![
        issue(40, &columns[0], 0),
        issue(42, &columns[0], 1),
        issue(44, &columns[0], 2),
        issue(50, &columns[2], 0),
    ];
    BoardModel::load(project, columns, issues).unwrap()
}

fn engine(store: &Arc<FakeStore>) -> Arc<BoardOrderingEngine> {
    Arc::new(BoardOrderingEngine::new(
        sample_board(),
        store.clone(),
        store.clone(),
    ))
}

fn admin() -> Actor {
    Actor::new(1, "admin").with_site_role(Role::Admin)
}

fn project_member() -> Actor {
    Actor::new(5, "member").with_project_role(PROJECT, Role::Member)
}

fn ids(board: &BoardModel, column_id: ColumnId) -> Vec<(IssueId, i32)> {
    board
        .issues(column_id)
        .iter()
        .map(|i| (i.id, i.order))
        .collect()
}

async fn wait_applied(rx: &mut broadcast::Receiver<BoardEvent>, operation: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(BoardEvent::Applied { operation: op, .. }) = rx.recv().await
                && op == operation
            {
                return;
            }
        }
    })
    .await
    .expect("operation was never applied");
}

// ── Scenarios ─────────────────────────────────────────────────────────

#[tokio::test]
async fn moving_issue_into_done_shifts_prior_occupant() {
    let store = FakeStore::open();
    let engine = engine(&store);

    let outcome = engine.move_issue(&admin(), 42, 1, 3, 0).await.unwrap();
    assert_eq!(outcome, Settled::Committed(()));

    let board = engine.board().unwrap();
    assert_eq!(ids(&board, 1), vec![(40, 0), (44, 1)]);
    assert_eq!(ids(&board, 3), vec![(42, 0), (50, 1)]);
    assert_eq!(board.issue(42).unwrap().status, IssueStatus::Done);
    assert_eq!(store.calls(), vec!["move_issue"]);
}

#[tokio::test]
async fn failed_column_move_restores_exact_snapshot() {
    let store = FakeStore::open();
    store.fail_on("reorder_columns");
    let engine = engine(&store);
    let before = engine.board().unwrap();
    let mut events = engine.subscribe();

    let err = engine.move_column(&admin(), 4, 3).await.unwrap_err();
    assert!(matches!(
        err,
        BoardError::PersistenceFailure {
            operation: "reorder_columns",
            ..
        }
    ));
    assert_eq!(engine.board().unwrap(), before);

    let applied = events.recv().await.unwrap();
    assert!(matches!(applied, BoardEvent::Applied { .. }));
    let rolled_back = events.recv().await.unwrap();
    match rolled_back {
        BoardEvent::RolledBack { board, error, .. } => {
            assert_eq!(board, before);
            assert!(error.contains("timed out"));
        }
        other => panic!("expected rollback, got {:?}", other),
    }
}

#[tokio::test]
async fn project_member_may_create_issues_but_not_columns() {
    let store = FakeStore::open();
    let engine = engine(&store);
    let member = project_member();

    let err = engine.create_column(&member, "Review").await.unwrap_err();
    assert!(err.is_permission_denied());
    assert!(store.calls().is_empty(), "denied ops never reach the store");

    let new = NewIssue {
        title: "Add search".into(),
        ..Default::default()
    };
    let created = engine
        .create_issue(&member, 1, new)
        .await
        .unwrap()
        .committed()
        .unwrap();
    assert_eq!(created.id, 1000);
    assert_eq!(created.order, 3);
    assert_eq!(created.reporter_id, member.id);
    assert_eq!(engine.board().unwrap().issue(1000), Some(&created));
}

#[tokio::test]
async fn creator_manages_project_without_recorded_role() {
    let store = FakeStore::open();
    let engine = engine(&store);
    let creator = Actor::new(CREATOR, "creator");

    let column = engine
        .create_column(&creator, "Review")
        .await
        .unwrap()
        .committed()
        .unwrap();
    assert_eq!(column.id, 102);
    assert_eq!(column.order, 5);
}

#[tokio::test]
async fn default_columns_are_protected_even_for_admins() {
    let store = FakeStore::open();
    let engine = engine(&store);
    for column_id in [1, 2, 3] {
        let err = engine
            .rename_column(&admin(), column_id, "Backlog")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BoardError::Validation(ValidationError::DefaultColumnProtected { .. })
        ));
        let err = engine.delete_column(&admin(), column_id).await.unwrap_err();
        assert!(err.is_validation());
    }
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn assignee_may_move_own_issue_across_columns() {
    let store = FakeStore::open();
    let engine = engine(&store);
    let member = project_member();

    let err = engine.move_issue(&member, 42, 1, 2, 0).await.unwrap_err();
    assert!(err.is_permission_denied());

    let patch = tracker::board::IssuePatch {
        assignee_id: Some(Some(member.id)),
        ..Default::default()
    };
    engine.update_issue(&admin(), 42, patch).await.unwrap();
    engine.move_issue(&member, 42, 1, 2, 0).await.unwrap();
    assert_eq!(
        engine.board().unwrap().issue(42).unwrap().status,
        IssueStatus::InProgress
    );

    // Reordering within a column needs manageIssues, which members lack.
    let err = engine.move_issue(&member, 40, 1, 1, 1).await.unwrap_err();
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn committed_operations_record_activity() {
    let store = FakeStore::open();
    let sink = Arc::new(MemorySink::new());
    let recorder = ActivityRecorder::spawn(sink.clone());
    let engine = BoardOrderingEngine::new(sample_board(), store.clone(), store.clone())
        .with_activity(recorder.clone());

    let new = NewIssue {
        title: "Ship it".into(),
        ..Default::default()
    };
    let created = engine
        .create_issue(&admin(), 1, new)
        .await
        .unwrap()
        .committed()
        .unwrap();
    store.fail_on("delete_issue");
    assert!(engine.delete_issue(&admin(), created.id).await.is_err());
    recorder.flush().await;

    let events = sink.recent(&ActivityFilter::project(PROJECT), 10);
    assert_eq!(events.len(), 1, "rolled back ops record nothing");
    assert_eq!(events[0].kind, ActivityType::IssueCreated);
    assert_eq!(events[0].issue_id, Some(created.id));
    assert!(engine.board().unwrap().issue(created.id).is_some());
}

#[tokio::test]
async fn same_column_operations_queue_while_disjoint_ones_proceed() {
    let store = FakeStore::gated();
    let engine = engine(&store);
    let mut events = engine.subscribe();

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_issue(&admin(), 42, 1, 1, 0).await })
    };
    wait_applied(&mut events, "move_issue").await;
    assert!(engine.is_in_flight(LockKey::Column(1)));

    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_issue(&admin(), 40, 1, 1, 2).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(store.calls(), vec!["move_issue"], "second op must wait");

    let third = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let new = NewIssue {
                title: "Parallel".into(),
                ..Default::default()
            };
            engine.create_issue(&admin(), 3, new).await
        })
    };
    wait_applied(&mut events, "create_issue").await;
    assert_eq!(engine.board().unwrap().issues(3).len(), 2);

    store.release(3);
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert!(third.await.unwrap().is_ok());

    let board = engine.board().unwrap();
    board.check_invariants().unwrap();
    assert_eq!(ids(&board, 1), vec![(42, 0), (44, 1), (40, 2)]);
}

#[tokio::test]
async fn rollback_leaves_concurrent_commits_in_other_columns() {
    let store = FakeStore::gated();
    store.fail_on("move_issue");
    let engine = engine(&store);
    let mut events = engine.subscribe();

    let failing = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_issue(&admin(), 40, 1, 1, 2).await })
    };
    wait_applied(&mut events, "move_issue").await;
    let creating = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let new = NewIssue {
                title: "Keep me".into(),
                ..Default::default()
            };
            engine.create_issue(&admin(), 3, new).await
        })
    };
    wait_applied(&mut events, "create_issue").await;

    store.release(2);
    assert!(failing.await.unwrap().is_err());
    assert!(creating.await.unwrap().is_ok());

    let board = engine.board().unwrap();
    assert_eq!(ids(&board, 1), vec![(40, 0), (42, 1), (44, 2)]);
    assert_eq!(ids(&board, 3), vec![(50, 0), (1000, 1)]);
    board.check_invariants().unwrap();
}

#[tokio::test]
async fn reload_discards_in_flight_results_and_supersedes_queued_ops() {
    let store = FakeStore::gated();
    let engine = engine(&store);
    let original = engine.board().unwrap();
    let mut events = engine.subscribe();

    let in_flight = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_issue(&admin(), 42, 1, 3, 0).await })
    };
    wait_applied(&mut events, "move_issue").await;
    let queued = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_issue(&admin(), 44, 1, 1, 0).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let generation = engine
        .replace_all(
            original.columns().to_vec(),
            original.issues_by_column().clone(),
        )
        .unwrap();
    assert_eq!(generation, original.generation() + 1);

    store.release(2);
    assert_eq!(in_flight.await.unwrap().unwrap(), Settled::Discarded);
    assert!(matches!(
        queued.await.unwrap(),
        Err(BoardError::Superseded)
    ));

    let board = engine.board().unwrap();
    assert_eq!(board.generation(), generation);
    assert_eq!(ids(&board, 1), ids(&original, 1));
    assert_eq!(ids(&board, 3), ids(&original, 3));
}

#[tokio::test]
async fn switching_project_abandons_old_locks() {
    let store = FakeStore::gated();
    let engine = engine(&store);
    let mut events = engine.subscribe();

    let stale = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_column(&admin(), 3, 4).await })
    };
    wait_applied(&mut events, "reorder_columns").await;

    let next = sample_board();
    engine.switch_project(next).unwrap();
    assert!(!engine.is_in_flight(LockKey::Layout));

    // A fresh op on the new board does not wait for the abandoned one.
    let fresh = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.move_column(&admin(), 4, 3).await })
    };
    wait_applied(&mut events, "reorder_columns").await;

    store.release(2);
    assert_eq!(stale.await.unwrap().unwrap(), Settled::Discarded);
    assert_eq!(fresh.await.unwrap().unwrap(), Settled::Committed(()));
    let order: Vec<ColumnId> = engine
        .board()
        .unwrap()
        .columns()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(order, vec![1, 2, 3, 101, 100]);
}

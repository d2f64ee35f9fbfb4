use std::cell::{Cell, RefCell};
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskdeck_core::api::{ApiError, DocumentUpload, TaskApi};
use taskdeck_core::dashboard::{Dashboard, DashboardError, ReloadOutcome};
use taskdeck_core::datetime::DayZone;
use taskdeck_core::documents::TaskDocuments;
use taskdeck_core::form::EditorSession;
use taskdeck_core::view::FilterMode;
use taskdeck_shared::{
    Field, TagSummary, TaskCreate, TaskDocumentDto, TaskDto, TaskPatch, TasksListArgs,
};

const STAMP: &str = "2026-02-01T09:00:00Z";

fn task(id: u64, title: &str, done: bool, priority: u8, due: Option<&str>) -> TaskDto {
    TaskDto {
        id,
        title: title.to_string(),
        done,
        priority,
        due_date: due.map(str::to_string),
        created_at: STAMP.to_string(),
        updated_at: STAMP.to_string(),
        notes: None,
        tags: vec![],
    }
}

fn server_error(path: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        url: format!("http://fake.test/{path}"),
        body: "boom".to_string(),
    }
}

/// In-memory backend with switches for failing
/// individual calls.
#[derive(Default)]
struct FakeApi {
    tasks: RefCell<Vec<TaskDto>>,
    documents: RefCell<Vec<TaskDocumentDto>>,
    next_id: Cell<u64>,
    fail_list: Cell<bool>,
    fail_create: Cell<bool>,
    fail_update: Cell<bool>,
    fail_delete: Cell<bool>,
    list_calls: RefCell<Vec<TasksListArgs>>,
    update_calls: RefCell<Vec<(u64, TaskPatch)>>,
    delete_calls: Cell<usize>,
}

impl FakeApi {
    fn with_tasks(tasks: Vec<TaskDto>) -> Self {
        let next_id = tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let api = Self::default();
        *api.tasks.borrow_mut() = tasks;
        api.next_id.set(next_id);
        api
    }

    fn take_id(&self) -> u64 {
        let id = self.next_id.get().max(1);
        self.next_id.set(id + 1);
        id
    }
}

impl TaskApi for FakeApi {
    async fn list_tasks(&self, args: &TasksListArgs) -> Result<Vec<TaskDto>, ApiError> {
        self.list_calls.borrow_mut().push(args.clone());
        if self.fail_list.get() {
            return Err(server_error("tasks"));
        }

        let search = args.search.as_deref().map(str::to_lowercase);
        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|t| args.show_done || !t.done)
            .filter(|t| args.tag.as_ref().is_none_or(|tag| t.tags.contains(tag)))
            .filter(|t| {
                search
                    .as_deref()
                    .is_none_or(|needle| t.title.to_lowercase().contains(needle))
            })
            .cloned()
            .collect())
    }

    async fn create_task(&self, create: &TaskCreate) -> Result<TaskDto, ApiError> {
        if self.fail_create.get() {
            return Err(server_error("tasks"));
        }

        let mut created = task(
            self.take_id(),
            &create.title,
            false,
            create.priority,
            create.due_date.as_deref(),
        );
        created.notes = create.notes.clone();
        created.tags = create.tags.clone();
        self.tasks.borrow_mut().push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<TaskDto, ApiError> {
        self.update_calls.borrow_mut().push((id, patch.clone()));
        if self.fail_update.get() {
            return Err(server_error(&format!("tasks/{id}")));
        }

        let mut tasks = self.tasks.borrow_mut();
        let stored = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| server_error(&format!("tasks/{id}")))?;
        if let Some(done) = patch.done.value() {
            stored.done = *done;
        }
        if let Some(title) = patch.title.value() {
            stored.title = title.clone();
        }
        if let Some(priority) = patch.priority.value() {
            stored.priority = *priority;
        }
        match &patch.due_date {
            Field::Value(due) => stored.due_date = Some(due.clone()),
            Field::Cleared => stored.due_date = None,
            Field::Unset => {}
        }
        match &patch.notes {
            Field::Value(notes) => stored.notes = Some(notes.clone()),
            Field::Cleared => stored.notes = None,
            Field::Unset => {}
        }
        if let Field::Value(tags) = &patch.tags {
            stored.tags = tags.clone();
        }
        stored.updated_at = "2026-02-17T10:00:00Z".to_string();
        Ok(stored.clone())
    }

    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        self.delete_calls.set(self.delete_calls.get() + 1);
        if self.fail_delete.get() {
            return Err(server_error(&format!("tasks/{id}")));
        }
        self.tasks.borrow_mut().retain(|t| t.id != id);
        Ok(())
    }

    async fn list_documents(&self, task_id: u64) -> Result<Vec<TaskDocumentDto>, ApiError> {
        Ok(self
            .documents
            .borrow()
            .iter()
            .filter(|doc| doc.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn upload_document(
        &self,
        task_id: u64,
        upload: DocumentUpload,
    ) -> Result<TaskDocumentDto, ApiError> {
        let id = self.take_id();
        let doc = TaskDocumentDto {
            id,
            task_id,
            original_name: upload.file_name,
            content_type: upload.content_type,
            size: Some(upload.bytes.len() as u64),
            created_at: STAMP.to_string(),
            download_url: format!("/documents/{id}/download"),
        };
        self.documents.borrow_mut().push(doc.clone());
        Ok(doc)
    }

    async fn download_document(&self, doc: &TaskDocumentDto) -> Result<Vec<u8>, ApiError> {
        Ok(doc.original_name.as_bytes().to_vec())
    }

    async fn delete_document(&self, doc_id: u64) -> Result<(), ApiError> {
        if self.fail_delete.get() {
            return Err(server_error(&format!("documents/{doc_id}")));
        }
        self.documents.borrow_mut().retain(|doc| doc.id != doc_id);
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<TagSummary>, ApiError> {
        Ok(vec![])
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-02-17T12:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn utc() -> DayZone {
    DayZone::parse("UTC").expect("zone")
}

fn seeded() -> Vec<TaskDto> {
    vec![
        task(1, "Buy milk", false, 2, Some("2026-02-17")),
        task(2, "File taxes", false, 1, Some("2026-02-10")),
        task(3, "Read book", true, 3, None),
        task(4, "Call plumber", false, 3, Some("2026-03-01")),
    ]
}

async fn loaded(window: Duration) -> Dashboard<FakeApi> {
    let mut dash = Dashboard::new(FakeApi::with_tasks(seeded()), utc(), window);
    dash.reload().await.expect("initial reload");
    dash
}

fn ids(tasks: &[TaskDto]) -> Vec<u64> {
    tasks.iter().map(|t| t.id).collect()
}

#[tokio::test]
async fn snapshot_combines_view_and_stats() {
    let mut dash = loaded(Duration::ZERO).await;

    let snapshot = dash.snapshot(now());
    assert_eq!(ids(&snapshot.visible), vec![2, 1, 4, 3]);
    assert_eq!(snapshot.stats.total, 4);
    assert_eq!(snapshot.stats.open, 3);
    assert_eq!(snapshot.stats.done, 1);
    assert_eq!(snapshot.stats.due_today, 1);
    assert_eq!(snapshot.stats.overdue, 1);

    dash.set_mode(FilterMode::Overdue);
    assert_eq!(ids(&dash.snapshot(now()).visible), vec![2]);
    dash.set_mode(FilterMode::Today);
    assert_eq!(ids(&dash.snapshot(now()).visible), vec![1]);
}

#[tokio::test]
async fn toggle_applies_before_server_answers() {
    let mut dash = loaded(Duration::ZERO).await;

    let pending = dash.begin_toggle(1).expect("known task");
    assert!(dash.task(1).expect("task").done);
    assert_eq!(pending.patch(), TaskPatch::done(true));

    let result = dash.api().update_task(1, &pending.patch()).await;
    let confirmed = dash.finish_toggle(pending, result).expect("confirmed");
    assert!(confirmed.done);
    assert!(dash.task(1).expect("task").done);
    assert_eq!(dash.task(1).expect("task").updated_at, "2026-02-17T10:00:00Z");
    assert!(dash.last_error().is_none());
}

#[tokio::test]
async fn failed_toggle_reverts_and_surfaces_error() {
    let mut dash = loaded(Duration::ZERO).await;
    dash.api().fail_update.set(true);

    let err = dash.toggle_done(3).await.expect_err("update fails");
    assert!(matches!(err, DashboardError::Api(ApiError::Status { status: 500, .. })));
    assert!(dash.task(3).expect("task").done);
    assert!(
        dash.last_error()
            .is_some_and(|msg| msg.contains("HTTP 500"))
    );

    let calls = dash.api().update_calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (3, TaskPatch::done(false)));
}

#[tokio::test]
async fn mark_done_skips_finished_tasks() {
    let mut dash = loaded(Duration::ZERO).await;

    let task = dash.mark_done(3).await.expect("already done");
    assert!(task.done);
    assert!(dash.api().update_calls.borrow().is_empty());

    let task = dash.mark_done(4).await.expect("completed");
    assert!(task.done);
    assert_eq!(dash.api().update_calls.borrow().len(), 1);
}

#[tokio::test]
async fn unknown_task_is_reported() {
    let mut dash = loaded(Duration::ZERO).await;
    let err = dash.toggle_done(99).await.expect_err("unknown");
    assert!(matches!(err, DashboardError::UnknownTask(99)));
    assert!(dash.api().update_calls.borrow().is_empty());
}

#[tokio::test]
async fn stale_reload_results_are_dropped() {
    let mut dash = Dashboard::new(FakeApi::default(), utc(), Duration::ZERO);

    let first = dash.begin_reload();
    let second = dash.begin_reload();
    assert!(second.seq() > first.seq());

    let applied = dash
        .apply_reload(second, Ok(vec![task(2, "newer", false, 3, None)]))
        .expect("apply newest");
    assert_eq!(applied, ReloadOutcome::Applied(1));

    let late = dash
        .apply_reload(
            first.clone(),
            Ok(vec![task(1, "older", false, 3, None), task(5, "older", false, 3, None)]),
        )
        .expect("stale is not an error");
    assert_eq!(late, ReloadOutcome::Stale);
    assert_eq!(ids(dash.tasks()), vec![2]);

    let late_failure = dash
        .apply_reload(first, Err(server_error("tasks")))
        .expect("stale failure ignored");
    assert_eq!(late_failure, ReloadOutcome::Stale);
    assert!(dash.last_error().is_none());
}

#[tokio::test]
async fn failed_reload_keeps_previous_list() {
    let mut dash = loaded(Duration::ZERO).await;
    dash.api().fail_list.set(true);

    assert!(dash.reload().await.is_err());
    assert_eq!(dash.tasks().len(), 4);
    assert!(dash.last_error().is_some());

    dash.api().fail_list.set(false);
    dash.reload().await.expect("recovers");
    assert!(dash.last_error().is_none());
}

#[tokio::test]
async fn reload_sends_current_query() {
    let mut dash = loaded(Duration::ZERO).await;
    dash.set_show_done(false);
    dash.set_tag(Some("  "));
    dash.set_search(Some(" milk "));

    dash.reload().await.expect("reload");

    let calls = dash.api().list_calls.borrow();
    let last = calls.last().expect("list call");
    assert!(!last.show_done);
    assert_eq!(last.tag, None);
    assert_eq!(last.search.as_deref(), Some("milk"));
    assert_eq!(ids(dash.tasks()), vec![1]);
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let mut dash = loaded(Duration::ZERO).await;
    let mut prompts = Vec::new();
    let mut decline = |prompt: &str| {
        prompts.push(prompt.to_string());
        false
    };

    let err = dash.delete_task(2, &mut decline).await.expect_err("declined");
    assert!(matches!(err, DashboardError::Cancelled));
    assert_eq!(prompts, vec!["Delete task #2 \"File taxes\"?".to_string()]);
    assert_eq!(dash.api().delete_calls.get(), 0);
    assert_eq!(dash.tasks().len(), 4);
    assert!(dash.last_error().is_none());
}

#[tokio::test]
async fn delete_removes_only_after_success() {
    let mut dash = loaded(Duration::ZERO).await;
    dash.api().fail_delete.set(true);

    assert!(dash.delete_task(2, &mut |_: &str| true).await.is_err());
    assert_eq!(dash.tasks().len(), 4);
    assert!(dash.last_error().is_some());

    dash.api().fail_delete.set(false);
    dash.delete_task(2, &mut |_: &str| true).await.expect("deleted");
    assert_eq!(ids(dash.tasks()), vec![1, 3, 4]);
    assert_eq!(dash.api().delete_calls.get(), 2);
}

#[tokio::test]
async fn create_failure_keeps_editor_open() {
    let mut dash = loaded(Duration::ZERO).await;
    dash.api().fail_create.set(true);
    let reloads_before = dash.api().list_calls.borrow().len();

    let mut session = EditorSession::create();
    session.form.title = "Plan trip".to_string();
    session.form.tags = "travel, summer".to_string();
    let form_before = session.form.clone();

    assert!(dash.submit(&mut session).await.is_err());
    assert!(session.is_open());
    assert_eq!(session.form, form_before);
    assert!(session.error.as_deref().is_some_and(|msg| msg.contains("HTTP 500")));
    assert_eq!(dash.tasks().len(), 4);
    assert_eq!(dash.api().list_calls.borrow().len(), reloads_before);
}

#[tokio::test]
async fn invalid_form_never_reaches_server() {
    let mut dash = loaded(Duration::ZERO).await;
    let mut session = EditorSession::create();
    session.form.title = "   ".to_string();

    let err = dash.submit(&mut session).await.expect_err("invalid");
    assert!(matches!(err, DashboardError::Form(_)));
    assert!(session.is_open());
    assert!(session.error.is_some());
    assert!(dash.last_error().is_none());
    assert_eq!(dash.tasks().len(), 4);
}

#[tokio::test]
async fn create_success_closes_editor_and_reloads() {
    let mut dash = loaded(Duration::ZERO).await;
    let mut session = EditorSession::create();
    session.form.title = "  Plan trip ".to_string();
    session.form.priority = 1;
    session.form.due_date = "2026-02-20".to_string();
    session.form.tags = "travel, summer, travel".to_string();

    let saved = dash.submit(&mut session).await.expect("created");
    assert!(!session.is_open());
    assert_eq!(saved.title, "Plan trip");
    assert_eq!(saved.tags, vec!["travel".to_string(), "summer".to_string()]);
    assert_eq!(saved.notes, None);
    assert!(dash.task(saved.id).is_some());
    assert_eq!(dash.tasks().len(), 5);
}

#[tokio::test]
async fn edit_clears_blank_optionals() {
    let mut dash = loaded(Duration::ZERO).await;
    let mut session = EditorSession::edit(dash.task(1).expect("task"));
    session.form.due_date.clear();
    session.form.notes = "from the corner shop".to_string();

    let saved = dash.submit(&mut session).await.expect("updated");
    assert_eq!(saved.due_date, None);
    assert_eq!(saved.notes.as_deref(), Some("from the corner shop"));

    let calls = dash.api().update_calls.borrow();
    let (id, patch) = calls.last().expect("update call");
    assert_eq!(*id, 1);
    assert_eq!(patch.due_date, Field::Cleared);
    assert_eq!(patch.done, Field::Unset);
    assert!(patch.title.is_unset());
    assert!(patch.tags.is_unset());
}

#[tokio::test]
async fn title_edit_ignores_unusable_stored_values() {
    let mut odd = task(7, "Old title", false, 0, Some("next week"));
    odd.notes = Some("  indented note\n".to_string());
    let mut dash = Dashboard::new(FakeApi::with_tasks(vec![odd]), utc(), Duration::ZERO);
    dash.reload().await.expect("reload");

    let mut session = EditorSession::edit(dash.task(7).expect("task"));
    session.form.title = "New title".to_string();

    let saved = dash.submit(&mut session).await.expect("title-only edit");
    assert!(!session.is_open());
    assert_eq!(saved.title, "New title");
    assert_eq!(saved.priority, 0);
    assert_eq!(saved.due_date.as_deref(), Some("next week"));
    assert_eq!(saved.notes.as_deref(), Some("  indented note\n"));

    let calls = dash.api().update_calls.borrow();
    let (_, patch) = calls.last().expect("update call");
    assert_eq!(patch.title, Field::Value("New title".to_string()));
    assert!(patch.priority.is_unset());
    assert!(patch.due_date.is_unset());
    assert!(patch.notes.is_unset());
}

#[tokio::test(start_paused = true)]
async fn only_settled_search_reloads() {
    let mut dash = loaded(Duration::from_millis(300)).await;
    let reloads_before = dash.api().list_calls.borrow().len();

    let early = dash.search_input("mi");
    let late = dash.search_input("milk");

    let outcome = dash.settle_search(early).await.expect("superseded");
    assert_eq!(outcome, ReloadOutcome::Stale);
    assert_eq!(dash.api().list_calls.borrow().len(), reloads_before);

    let outcome = dash.settle_search(late).await.expect("settled");
    assert_eq!(outcome, ReloadOutcome::Applied(1));

    let calls = dash.api().list_calls.borrow();
    assert_eq!(calls.len(), reloads_before + 1);
    assert_eq!(calls.last().and_then(|a| a.search.as_deref()), Some("milk"));
}

#[tokio::test(start_paused = true)]
async fn search_waits_out_window_then_reloads() {
    let mut dash = loaded(Duration::from_millis(300)).await;

    let outcome = dash.search("TAXES").await.expect("search");
    assert_eq!(outcome, ReloadOutcome::Applied(1));
    assert_eq!(ids(dash.tasks()), vec![2]);
    assert_eq!(dash.query().search.as_deref(), Some("TAXES"));

    let outcome = dash.search("   ").await.expect("cleared search");
    assert_eq!(outcome, ReloadOutcome::Applied(4));
    assert_eq!(dash.query().search, None);
}

#[tokio::test]
async fn cleared_error_leaves_list_alone() {
    let mut dash = loaded(Duration::ZERO).await;
    dash.api().fail_list.set(true);
    assert!(dash.reload().await.is_err());
    assert!(dash.snapshot(now()).last_error.is_some());

    dash.clear_error();
    assert!(dash.last_error().is_none());
    assert!(dash.snapshot(now()).last_error.is_none());
    assert_eq!(dash.tasks().len(), 4);
}

#[tokio::test]
async fn documents_follow_server_state() {
    let api = FakeApi::with_tasks(seeded());
    let mut docs = TaskDocuments::new(1);

    let upload = DocumentUpload {
        file_name: "receipt.pdf".to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: vec![1, 2, 3],
    };
    let doc = docs.upload(&api, upload).await.expect("uploaded");
    assert_eq!(docs.documents().len(), 1);
    assert_eq!(doc.size, Some(3));

    let mut other = TaskDocuments::new(2);
    assert!(other.refresh(&api).await.expect("listed").is_empty());

    let (fetched, bytes) = docs.download(&api, doc.id).await.expect("downloaded");
    assert_eq!(fetched.id, doc.id);
    assert_eq!(bytes, b"receipt.pdf".to_vec());

    assert!(matches!(
        docs.download(&api, 999).await,
        Err(DashboardError::UnknownDocument(999))
    ));

    assert!(matches!(
        docs.remove(&api, doc.id, &mut |_: &str| false).await,
        Err(DashboardError::Cancelled)
    ));
    assert_eq!(docs.documents().len(), 1);

    docs.remove(&api, doc.id, &mut |_: &str| true).await.expect("removed");
    assert!(docs.documents().is_empty());
    assert!(docs.refresh(&api).await.expect("listed").is_empty());
}

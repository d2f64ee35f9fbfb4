use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use taskdeck_shared::{TagSummary, TaskDto, TaskPatch, TasksListArgs};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{ApiError, TaskApi};
use crate::datetime::DayZone;
use crate::debounce::{Debounce, DebounceToken};
use crate::form::{EditorMode, EditorSession, FormError, optional_text};
use crate::stats::{TaskStats, compute_stats};
use crate::view::{FilterMode, visible_tasks};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("cancelled")]
    Cancelled,
    #[error("task #{0} is not in the current list")]
    UnknownTask(u64),
    #[error("document #{0} is not attached to this task")]
    UnknownDocument(u64),
}

/// Asks the user before a destructive
/// call goes out.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Query and sequence number captured when
/// a reload starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTicket {
    seq: u64,
    args: TasksListArgs,
}

impl ReloadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn args(&self) -> &TasksListArgs {
        &self.args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied(usize),
    Stale,
}

/// A completion flip already applied to
/// the local list, waiting for the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingToggle {
    task_id: u64,
    previous: bool,
}

impl PendingToggle {
    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn requested(&self) -> bool {
        !self.previous
    }

    pub fn patch(&self) -> TaskPatch {
        TaskPatch::done(self.requested())
    }
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub visible: Vec<TaskDto>,
    pub stats: TaskStats,
    pub mode: FilterMode,
    pub query: TasksListArgs,
    pub today: NaiveDate,
    pub last_error: Option<String>,
}

pub struct Dashboard<A> {
    api: A,
    zone: DayZone,
    tasks: Vec<TaskDto>,
    mode: FilterMode,
    query: TasksListArgs,
    reload_seq: u64,
    debounce: Debounce,
    last_error: Option<String>,
}

impl<A> Dashboard<A>
where
    A: TaskApi,
{
    pub fn new(api: A, zone: DayZone, debounce_window: Duration) -> Self {
        Self {
            api,
            zone,
            tasks: Vec::new(),
            mode: FilterMode::default(),
            query: TasksListArgs::default(),
            reload_seq: 0,
            debounce: Debounce::new(debounce_window),
            last_error: None,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tasks(&self) -> &[TaskDto] {
        &self.tasks
    }

    pub fn task(&self, id: u64) -> Option<&TaskDto> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        debug!(mode = %mode, "filter mode changed");
        self.mode = mode;
    }

    pub fn query(&self) -> &TasksListArgs {
        &self.query
    }

    pub fn set_show_done(&mut self, show_done: bool) {
        self.query.show_done = show_done;
    }

    pub fn set_tag(&mut self, tag: Option<&str>) {
        self.query.tag = tag.and_then(optional_text);
    }

    pub fn set_search(&mut self, search: Option<&str>) {
        self.query.search = search.and_then(optional_text);
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.zone.today(now)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        let today = self.today(now);
        DashboardSnapshot {
            visible: visible_tasks(&self.tasks, self.mode, today),
            stats: compute_stats(&self.tasks, today),
            mode: self.mode,
            query: self.query.clone(),
            today,
            last_error: self.last_error.clone(),
        }
    }

    fn surface(&mut self, err: DashboardError) -> DashboardError {
        error!(error = %err, "dashboard operation failed");
        self.last_error = Some(err.to_string());
        err
    }

    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.reload_seq += 1;
        debug!(seq = self.reload_seq, query = ?self.query, "reload started");
        ReloadTicket {
            seq: self.reload_seq,
            args: self.query.clone(),
        }
    }

    /// Installs a reload result unless a
    /// newer reload has started since the
    /// ticket was issued.
    pub fn apply_reload(
        &mut self,
        ticket: ReloadTicket,
        result: Result<Vec<TaskDto>, ApiError>,
    ) -> Result<ReloadOutcome, DashboardError> {
        if ticket.seq != self.reload_seq {
            debug!(
                seq = ticket.seq,
                latest = self.reload_seq,
                "dropping stale reload result"
            );
            return Ok(ReloadOutcome::Stale);
        }

        match result {
            Ok(tasks) => {
                info!(seq = ticket.seq, total = tasks.len(), "task list reloaded");
                let total = tasks.len();
                self.tasks = tasks;
                self.last_error = None;
                Ok(ReloadOutcome::Applied(total))
            }
            Err(err) => Err(self.surface(err.into())),
        }
    }

    #[instrument(skip(self))]
    pub async fn reload(&mut self) -> Result<ReloadOutcome, DashboardError> {
        let ticket = self.begin_reload();
        let result = self.api.list_tasks(ticket.args()).await;
        self.apply_reload(ticket, result)
    }

    /// Records new search text and starts a
    /// debounce window for it.
    pub fn search_input(&mut self, text: &str) -> DebounceToken {
        self.set_search(Some(text));
        self.debounce.trigger()
    }

    /// Reloads once the window for `token`
    /// passes quietly, otherwise reports
    /// the input as superseded.
    pub async fn settle_search(
        &mut self,
        token: DebounceToken,
    ) -> Result<ReloadOutcome, DashboardError> {
        let debounce = self.debounce.clone();
        if !debounce.settled(token).await {
            debug!("search input superseded before debounce window elapsed");
            return Ok(ReloadOutcome::Stale);
        }
        self.reload().await
    }

    #[instrument(skip(self))]
    pub async fn search(&mut self, text: &str) -> Result<ReloadOutcome, DashboardError> {
        let token = self.search_input(text);
        self.settle_search(token).await
    }

    /// Flips the local completion state
    /// before any network call.
    pub fn begin_toggle(&mut self, task_id: u64) -> Result<PendingToggle, DashboardError> {
        let Some(index) = self.tasks.iter().position(|task| task.id == task_id) else {
            return Err(self.surface(DashboardError::UnknownTask(task_id)));
        };

        let task = &mut self.tasks[index];
        let pending = PendingToggle {
            task_id,
            previous: task.done,
        };
        task.done = pending.requested();
        debug!(task_id, done = task.done, "applied optimistic toggle");
        Ok(pending)
    }

    /// Confirms or reverts an optimistic
    /// toggle.
    pub fn finish_toggle(
        &mut self,
        pending: PendingToggle,
        result: Result<TaskDto, ApiError>,
    ) -> Result<TaskDto, DashboardError> {
        let slot = self
            .tasks
            .iter_mut()
            .find(|task| task.id == pending.task_id);

        match result {
            Ok(server_task) => {
                if let Some(local) = slot {
                    *local = server_task.clone();
                }
                info!(task_id = pending.task_id, done = server_task.done, "toggle confirmed");
                Ok(server_task)
            }
            Err(err) => {
                if let Some(local) = slot {
                    local.done = pending.previous;
                }
                warn!(task_id = pending.task_id, "toggle rejected, reverted local state");
                Err(self.surface(err.into()))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn toggle_done(&mut self, task_id: u64) -> Result<TaskDto, DashboardError> {
        let pending = self.begin_toggle(task_id)?;
        let result = self.api.update_task(task_id, &pending.patch()).await;
        self.finish_toggle(pending, result)
    }

    /// Completes a task, leaving one that is
    /// already done untouched.
    #[instrument(skip(self))]
    pub async fn mark_done(&mut self, task_id: u64) -> Result<TaskDto, DashboardError> {
        match self.task(task_id).cloned() {
            Some(task) if task.done => {
                debug!(task_id, "task already done");
                Ok(task)
            }
            Some(_) => self.toggle_done(task_id).await,
            None => Err(self.surface(DashboardError::UnknownTask(task_id))),
        }
    }

    #[instrument(skip(self, confirm))]
    pub async fn delete_task<C>(
        &mut self,
        task_id: u64,
        confirm: &mut C,
    ) -> Result<(), DashboardError>
    where
        C: Confirm + ?Sized,
    {
        let Some(title) = self.task(task_id).map(|task| task.title.clone()) else {
            return Err(self.surface(DashboardError::UnknownTask(task_id)));
        };

        let prompt = format!("Delete task #{task_id} \"{title}\"?");
        if !confirm.confirm(&prompt) {
            debug!(task_id, "delete declined");
            return Err(DashboardError::Cancelled);
        }

        match self.api.delete_task(task_id).await {
            Ok(()) => {
                self.tasks.retain(|task| task.id != task_id);
                info!(task_id, "task deleted");
                Ok(())
            }
            Err(err) => Err(self.surface(err.into())),
        }
    }

    /// Sends the editor's form. On success the
    /// editor closes and the list is reloaded
    /// from the server; on failure the editor
    /// stays open with its form as it was.
    #[instrument(skip(self, session), fields(mode = ?session.mode))]
    pub async fn submit(&mut self, session: &mut EditorSession) -> Result<TaskDto, DashboardError> {
        let result = match session.mode {
            EditorMode::Create => match session.form.to_create() {
                Ok(create) => self.api.create_task(&create).await.map_err(DashboardError::from),
                Err(err) => Err(err.into()),
            },
            EditorMode::Edit(task_id) => match session.edit_patch() {
                Ok(patch) => self
                    .api
                    .update_task(task_id, &patch)
                    .await
                    .map_err(DashboardError::from),
                Err(err) => Err(err.into()),
            },
        };

        let saved = match result {
            Ok(task) => task,
            Err(err @ DashboardError::Form(_)) => {
                session.fail(err.to_string());
                return Err(err);
            }
            Err(err) => {
                session.fail(err.to_string());
                return Err(self.surface(err));
            }
        };

        session.close();
        info!(task_id = saved.id, "task saved");
        if let Err(err) = self.reload().await {
            warn!(error = %err, "reload after save failed");
        }
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn tag_summaries(&mut self) -> Result<Vec<TagSummary>, DashboardError> {
        match self.api.list_tags().await {
            Ok(tags) => Ok(tags),
            Err(err) => Err(self.surface(err.into())),
        }
    }
}

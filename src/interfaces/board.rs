//! View state and intent dispatch shared by the TUI and the headless commands.
//!
//! `TaskBoard` holds disposable copies of the persisted collections. Every
//! mutating intent writes through `LocalStore` and then re-reads the affected
//! collection; nothing is patched in place.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::llm::{CompletionBackend, ExecuteOptions, ExecutionResult};
use crate::core::storage::LocalStore;
use crate::core::storage::types::{
    ApiConfig, ExecutionStatus, NewExecution, NewTask, Task, TaskExecution, TaskStatus, TaskUpdate,
};
use crate::core::templates::Template;

/// Characters of a stored result shown per history entry.
pub const HISTORY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Everything a detached execution needs; it carries no store handle.
#[derive(Debug, Clone)]
pub struct ExecutionTicket {
    pub task_id: String,
    pub prompt: String,
    pub config: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub task_id: String,
    pub outcome: ExecutionResult,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Modal {
    Settings,
    Result(ExecutionReport),
    History {
        task_id: String,
        entries: Vec<TaskExecution>,
    },
    ConfirmDelete(String),
}

pub struct TaskBoard {
    store: LocalStore,
    backend: Arc<dyn CompletionBackend>,
    tasks: Vec<Task>,
    config: ApiConfig,
    executing: HashSet<String>,
    // Results that finished while another overlay was open.
    pending_results: VecDeque<ExecutionReport>,
    pub settings_draft: ApiConfig,
    pub show_templates: bool,
    pub modal: Option<Modal>,
    pub notice: Option<Notice>,
}

impl TaskBoard {
    pub fn new(store: LocalStore, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            store,
            backend,
            tasks: Vec::new(),
            config: ApiConfig::default(),
            executing: HashSet::new(),
            pending_results: VecDeque::new(),
            settings_draft: ApiConfig::default(),
            show_templates: false,
            modal: None,
            notice: None,
        }
    }

    pub fn reload(&mut self) -> Result<()> {
        self.tasks = self.store.get_tasks()?;
        self.config = self.store.get_api_config()?;
        self.settings_draft = self.config.clone();
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn backend(&self) -> Arc<dyn CompletionBackend> {
        Arc::clone(&self.backend)
    }

    /// Fresh read of one task from the store.
    pub fn find_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.store.get_task(task_id)
    }

    pub fn is_executing(&self, task_id: &str) -> bool {
        self.executing.contains(task_id)
    }

    pub fn in_flight(&self) -> usize {
        self.executing.len()
    }

    fn notify(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notice = Some(Notice {
            level,
            text: text.into(),
        });
    }

    fn refresh_tasks(&mut self) -> Result<()> {
        self.tasks = self.store.get_tasks()?;
        Ok(())
    }

    // --- Templates ---

    pub fn toggle_templates(&mut self) {
        self.show_templates = !self.show_templates;
    }

    pub fn create_from_template(&mut self, template: &Template) -> Result<Task> {
        let task = self.store.create_task(NewTask {
            name: template.name.to_string(),
            description: Some(template.description.to_string()),
            prompt: template.prompt.to_string(),
            schedule: template.default_schedule.to_string(),
            status: TaskStatus::Active,
            template_id: Some(template.id.to_string()),
        })?;
        self.refresh_tasks()?;
        self.show_templates = false;
        self.notify(NoticeLevel::Info, format!("Task created: {}", task.name));
        Ok(task)
    }

    // --- Task intents ---

    /// Flips active/paused. Unknown ids and completed tasks are left alone.
    pub fn toggle_status(&mut self, task_id: &str) -> Result<Option<Task>> {
        let Some(task) = self.tasks.iter().find(|t| t.id == task_id) else {
            return Ok(None);
        };
        let next = task.status.toggled();
        if next == task.status {
            return Ok(Some(task.clone()));
        }
        let updated = self.store.update_task(task_id, TaskUpdate::status(next))?;
        self.refresh_tasks()?;
        Ok(updated)
    }

    fn refuse_running(&mut self, task_id: &str) -> bool {
        if self.executing.contains(task_id) {
            self.notify(NoticeLevel::Warn, "Task is running; delete it once it finishes");
            return true;
        }
        false
    }

    pub fn request_delete(&mut self, task_id: &str) {
        if self.refuse_running(task_id) {
            return;
        }
        if self.tasks.iter().any(|t| t.id == task_id) {
            self.modal = Some(Modal::ConfirmDelete(task_id.to_string()));
        }
    }

    /// Deletes the task and its history. A task with a run in flight is
    /// refused, since its outcome would be recorded after the cascade.
    pub fn delete_task(&mut self, task_id: &str) -> Result<bool> {
        if matches!(&self.modal, Some(Modal::ConfirmDelete(id)) if id == task_id) {
            self.close_modal();
        }
        if self.refuse_running(task_id) {
            return Ok(false);
        }
        let deleted = self.store.delete_task(task_id);
        // Re-read even on failure: the task write may have landed.
        self.refresh_tasks()?;
        let deleted = deleted?;
        if deleted {
            self.notify(NoticeLevel::Info, "Task deleted");
        }
        Ok(deleted)
    }

    // --- Execution ---

    /// Marks the task in flight and hands back what the network call needs.
    ///
    /// Returns `None` for unknown tasks, for a task already in flight, and
    /// when the API settings are incomplete (the settings form is opened).
    pub fn begin_execution(&mut self, task_id: &str) -> Option<ExecutionTicket> {
        let prompt = self.tasks.iter().find(|t| t.id == task_id)?.prompt.clone();

        if !self.config.is_ready() {
            self.notify(
                NoticeLevel::Warn,
                "Configure the API key and endpoint before running tasks",
            );
            self.open_settings();
            return None;
        }

        if !self.executing.insert(task_id.to_string()) {
            return None;
        }

        info!("Executing task {}", task_id);
        Some(ExecutionTicket {
            task_id: task_id.to_string(),
            prompt,
            config: self.config.clone(),
        })
    }

    /// Persists the outcome, clears the in-flight marker and shows the result.
    ///
    /// While another overlay is open the result waits in a queue and is shown
    /// when that overlay closes.
    pub fn finish_execution(
        &mut self,
        ticket: ExecutionTicket,
        outcome: ExecutionResult,
    ) -> Result<ExecutionReport> {
        self.executing.remove(&ticket.task_id);

        let executed_at = Utc::now();
        let (status, result, error) = match &outcome {
            Ok(completion) => (ExecutionStatus::Success, Some(completion.content.clone()), None),
            Err(e) => (ExecutionStatus::Failed, None, Some(e.to_string())),
        };
        self.store.add_execution(NewExecution {
            task_id: ticket.task_id.clone(),
            status,
            result,
            error,
            executed_at,
        })?;

        if let Err(e) = &outcome {
            warn!("Task {} failed: {}", ticket.task_id, e);
        }
        let report = ExecutionReport {
            task_id: ticket.task_id,
            outcome,
            timestamp: executed_at,
        };
        if self.modal.is_some() {
            self.pending_results.push_back(report.clone());
            self.notify(
                NoticeLevel::Info,
                "A run finished; its result opens when this dialog closes",
            );
        } else {
            self.modal = Some(Modal::Result(report.clone()));
        }
        Ok(report)
    }

    /// Runs one execution to completion on the caller's task.
    pub async fn execute_task(&mut self, task_id: &str) -> Result<Option<ExecutionReport>> {
        let Some(ticket) = self.begin_execution(task_id) else {
            return Ok(None);
        };
        let backend = self.backend();
        let outcome = backend
            .execute(&ticket.prompt, &ticket.config, ExecuteOptions::default())
            .await;
        let report = self.finish_execution(ticket, outcome)?;
        Ok(Some(report))
    }

    // --- History ---

    pub fn view_history(&mut self, task_id: &str) -> Result<()> {
        let entries = self.store.get_task_executions(task_id)?;
        self.modal = Some(Modal::History {
            task_id: task_id.to_string(),
            entries,
        });
        Ok(())
    }

    // --- Settings ---

    pub fn open_settings(&mut self) {
        self.settings_draft = self.config.clone();
        self.modal = Some(Modal::Settings);
    }

    /// Saves the config when key and endpoint are both filled in.
    pub fn save_settings(&mut self, config: ApiConfig) -> Result<bool> {
        if !config.is_ready() {
            self.notify(NoticeLevel::Warn, "API key and endpoint are required");
            return Ok(false);
        }
        self.store.save_api_config(&config)?;
        self.config = self.store.get_api_config()?;
        self.settings_draft = self.config.clone();
        self.notify(NoticeLevel::Info, "API settings saved");
        if matches!(self.modal, Some(Modal::Settings)) {
            self.close_modal();
        }
        Ok(true)
    }

    /// Forgets the stored settings; the built-in defaults apply again.
    pub fn reset_settings(&mut self) -> Result<()> {
        self.store.clear_api_config()?;
        self.config = self.store.get_api_config()?;
        self.settings_draft = self.config.clone();
        self.notify(NoticeLevel::Info, "API settings reset");
        Ok(())
    }

    /// Closes the current overlay, showing the next queued result if any.
    pub fn close_modal(&mut self) {
        self.modal = self.pending_results.pop_front().map(Modal::Result);
    }
}

/// First `HISTORY_PREVIEW_CHARS` characters of `text`, with `...` when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(HISTORY_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

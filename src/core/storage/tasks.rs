use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use super::types::{NewTask, Task, TaskUpdate};
use super::{LocalStore, TASKS_KEY, generate_id};

impl LocalStore {
    pub fn get_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.read_json(TASKS_KEY)?.unwrap_or_default())
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.write_json(TASKS_KEY, tasks)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.get_tasks()?.into_iter().find(|t| t.id == id))
    }

    pub fn create_task(&self, new_task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            id: generate_id(),
            name: new_task.name,
            description: new_task.description,
            prompt: new_task.prompt,
            schedule: new_task.schedule,
            status: new_task.status,
            created_at: now,
            updated_at: now,
            template_id: new_task.template_id,
        };

        let mut tasks = self.get_tasks()?;
        tasks.push(task.clone());
        self.save_tasks(&tasks)?;

        info!("Created task '{}' ({})", task.name, task.id);
        Ok(task)
    }

    /// Returns `None` without writing when no task has `id`.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Option<Task>> {
        let mut tasks = self.get_tasks()?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            debug!("update_task: no task with id {}", id);
            return Ok(None);
        };

        if let Some(name) = update.name {
            task.name = name;
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(prompt) = update.prompt {
            task.prompt = prompt;
        }
        if let Some(schedule) = update.schedule {
            task.schedule = schedule;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(template_id) = update.template_id {
            task.template_id = Some(template_id);
        }
        task.updated_at = Utc::now();

        let updated = task.clone();
        self.save_tasks(&tasks)?;
        Ok(Some(updated))
    }

    /// Removes the task, then every execution that references it.
    ///
    /// The two collections are written one after the other. If the second
    /// write fails the task is already gone and its executions remain.
    pub fn delete_task(&self, id: &str) -> Result<bool> {
        let tasks = self.get_tasks()?;
        let before = tasks.len();
        let remaining: Vec<Task> = tasks.into_iter().filter(|t| t.id != id).collect();
        if remaining.len() == before {
            debug!("delete_task: no task with id {}", id);
            return Ok(false);
        }
        self.save_tasks(&remaining)?;

        let executions = self.get_executions()?;
        let kept: Vec<_> = executions.into_iter().filter(|e| e.task_id != id).collect();
        self.save_executions(&kept)
            .with_context(|| format!("task {} deleted but its history could not be removed", id))?;

        info!("Deleted task {}", id);
        Ok(true)
    }
}

use anyhow::Result;
use tracing::debug;

use super::types::{NewExecution, TaskExecution};
use super::{EXECUTIONS_KEY, LocalStore, MAX_EXECUTIONS, generate_id};

impl LocalStore {
    pub fn get_executions(&self) -> Result<Vec<TaskExecution>> {
        Ok(self.read_json(EXECUTIONS_KEY)?.unwrap_or_default())
    }

    pub fn save_executions(&self, executions: &[TaskExecution]) -> Result<()> {
        self.write_json(EXECUTIONS_KEY, executions)
    }

    /// History of one task, newest first.
    pub fn get_task_executions(&self, task_id: &str) -> Result<Vec<TaskExecution>> {
        let mut executions: Vec<TaskExecution> = self
            .get_executions()?
            .into_iter()
            .filter(|e| e.task_id == task_id)
            .collect();
        executions.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(executions)
    }

    /// Appends a record. Past the cap, only the `MAX_EXECUTIONS` newest by
    /// `executed_at` are kept, so a record stamped earlier than all others
    /// can be evicted by its own insert.
    pub fn add_execution(&self, execution: NewExecution) -> Result<TaskExecution> {
        let record = TaskExecution {
            id: generate_id(),
            task_id: execution.task_id,
            status: execution.status,
            result: execution.result,
            error: execution.error,
            executed_at: execution.executed_at,
        };

        let mut executions = self.get_executions()?;
        executions.push(record.clone());

        if executions.len() > MAX_EXECUTIONS {
            executions.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
            let evicted = executions.len() - MAX_EXECUTIONS;
            executions.truncate(MAX_EXECUTIONS);
            debug!("Evicted {} old execution record(s)", evicted);
        }

        self.save_executions(&executions)?;
        Ok(record)
    }
}

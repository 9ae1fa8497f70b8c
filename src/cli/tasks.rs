use anyhow::{Result, bail};
use chrono::{DateTime, Local, Utc};
use console::style;

use crate::core::storage::types::{ExecutionStatus, Task, TaskStatus};
use crate::core::templates::{find_template, grouped_templates};
use crate::core::terminal::{
    self, CLOCK, GuideSection, ROCKET, print_info, print_status, print_success, print_warn,
};
use crate::interfaces::board::{Modal, TaskBoard, preview};

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Resolves an exact id or an unambiguous id prefix.
pub(crate) fn resolve_task_id(tasks: &[Task], arg: &str) -> Result<String> {
    if let Some(task) = tasks.iter().find(|t| t.id == arg) {
        return Ok(task.id.clone());
    }
    let matches: Vec<&Task> = tasks.iter().filter(|t| t.id.starts_with(arg)).collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => bail!("No task matches '{}'", arg),
        _ => bail!("'{}' matches {} tasks; use more of the id", arg, matches.len()),
    }
}

fn status_label(status: TaskStatus) -> String {
    match status {
        TaskStatus::Active => style(status.as_str()).green().to_string(),
        TaskStatus::Paused => style(status.as_str()).yellow().to_string(),
        TaskStatus::Completed => style(status.as_str()).dim().to_string(),
    }
}

pub fn list_templates() {
    for (category, templates) in grouped_templates() {
        let mut section = GuideSection::new(category);
        for template in templates {
            section = section.command(template.id, template.name);
        }
        section.print();
    }
    println!(
        " Create one with {}\n",
        style("grok-tasks create --template <id>").green()
    );
}

pub fn list_tasks(board: &TaskBoard) {
    if board.tasks().is_empty() {
        print_info("No tasks yet. Run `grok-tasks templates` to pick a starting point.");
        return;
    }
    for task in board.tasks() {
        println!(
            "{} [{}]",
            style(&task.name).bold(),
            status_label(task.status)
        );
        print_status("id", &task.id);
        if let Some(description) = &task.description {
            print_status("about", description);
        }
        print_status("schedule", &task.schedule);
        print_status("created", &local_time(task.created_at));
        println!();
    }
}

pub fn create_task(board: &mut TaskBoard, template_id: &str) -> Result<()> {
    let Some(template) = find_template(template_id) else {
        bail!(
            "Unknown template '{}'. Run `grok-tasks templates` to list them.",
            template_id
        );
    };
    let task = board.create_from_template(template)?;
    print_success(&format!("Created task '{}'", task.name));
    print_status("id", &task.id);
    Ok(())
}

pub async fn run_task(board: &mut TaskBoard, arg: &str) -> Result<()> {
    let id = resolve_task_id(board.tasks(), arg)?;
    let Some(task) = board.find_task(&id)? else {
        bail!("Task {} no longer exists", id);
    };
    let name = task.name;

    println!("{}{}", ROCKET, style(format!("Running '{}'...", name)).bold());
    let Some(report) = board.execute_task(&id).await? else {
        if board.config().is_ready() {
            bail!("Task '{}' could not be started", id);
        }
        bail!("Configure the API first: grok-tasks config set");
    };

    match &report.outcome {
        Ok(completion) => {
            print_success("Execution succeeded");
            println!("\n{}\n", completion.content);
            if let Some(usage) = &completion.usage {
                print_status(
                    "tokens",
                    &format!(
                        "{} prompt + {} completion = {}",
                        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                    ),
                );
            }
        }
        Err(e) => terminal::print_error(&format!("Execution failed: {}", e)),
    }
    println!("{}{}", CLOCK, style(local_time(report.timestamp)).dim());
    Ok(())
}

pub fn toggle_task(board: &mut TaskBoard, arg: &str) -> Result<()> {
    let id = resolve_task_id(board.tasks(), arg)?;
    match board.toggle_status(&id)? {
        Some(task) => print_success(&format!(
            "'{}' is now {}",
            task.name,
            task.status.as_str()
        )),
        None => print_warn(&format!("Task {} disappeared before it could be updated", id)),
    }
    Ok(())
}

pub fn delete_task(board: &mut TaskBoard, arg: &str, yes: bool) -> Result<()> {
    let id = resolve_task_id(board.tasks(), arg)?;
    if !yes {
        let confirmed = inquire::Confirm::new(&format!(
            "Delete task {} and its execution history?",
            id
        ))
        .with_default(false)
        .prompt()?;
        if !confirmed {
            print_info("Cancelled");
            return Ok(());
        }
    }
    if board.delete_task(&id)? {
        print_success("Task deleted");
    } else {
        print_warn("Task was already gone");
    }
    Ok(())
}

pub fn show_history(board: &mut TaskBoard, arg: &str) -> Result<()> {
    let id = resolve_task_id(board.tasks(), arg)?;
    board.view_history(&id)?;
    let Some(Modal::History { entries, .. }) = board.modal.take() else {
        return Ok(());
    };
    if entries.is_empty() {
        print_info("No executions recorded for this task");
        return Ok(());
    }
    for entry in entries {
        let badge = match entry.status {
            ExecutionStatus::Success => style(entry.status.as_str()).green(),
            ExecutionStatus::Failed => style(entry.status.as_str()).red(),
        };
        println!("{} {}", style(local_time(entry.executed_at)).bold(), badge);
        if let Some(result) = &entry.result {
            println!("{}", preview(result));
        }
        if let Some(error) = &entry.error {
            println!("{}", style(error).red());
        }
        println!();
    }
    Ok(())
}

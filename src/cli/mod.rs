mod config;
mod tasks;

use anyhow::Result;
use console::style;
use std::sync::Arc;

use crate::core::llm::GrokClient;
use crate::core::storage::LocalStore;
use crate::core::terminal::{self, GuideSection, print_error};
use crate::interfaces::board::TaskBoard;
use crate::interfaces::tui::TuiApp;
use crate::logging;
use crate::platform::{DATA_DIR_ENV, NativePlatform, Platform};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Interactive")
        .command("tui", "Open the task board (default)")
        .print();

    GuideSection::new("Tasks")
        .command("list", "List tasks")
        .command("templates", "List built-in templates")
        .command("create --template <id>", "Create a task from a template")
        .command("run <task-id>", "Execute a task now and record the result")
        .command("toggle <task-id>", "Pause or resume a task")
        .command("history <task-id>", "Show a task's execution history")
        .command("delete <task-id> [--yes]", "Delete a task and its history")
        .print();

    GuideSection::new("Settings")
        .command("config show", "Show the API settings")
        .command(
            "config set [--key K] [--base URL] [--model M]",
            "Update the API settings (prompts when no flags)",
        )
        .command("config reset", "Forget the stored API settings")
        .print();

    GuideSection::new("Options")
        .command("--verbose, -v", "Debug logging")
        .text(&format!(
            "Data directory: {} (override with {})",
            NativePlatform::data_dir().display(),
            DATA_DIR_ENV
        ))
        .print();

    println!(
        " {} {} <command> [args]\n",
        style("Usage:").bold(),
        style("grok-tasks").green()
    );
}

/// Splits `--verbose`/`-v` out of the argument list.
pub(crate) fn strip_global_flags(args: &[String]) -> (bool, Vec<String>) {
    let mut verbose = false;
    let mut rest = Vec::with_capacity(args.len());
    for arg in args {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            _ => rest.push(arg.clone()),
        }
    }
    (verbose, rest)
}

/// Value following any of `names`, scanning from `start`.
pub(crate) fn flag_value(args: &[String], start: usize, names: &[&str]) -> Option<String> {
    let mut i = start;
    while i < args.len() {
        if names.contains(&args[i].as_str()) {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

/// First argument after `start` that is not a flag.
pub(crate) fn positional(args: &[String], start: usize) -> Option<String> {
    args.iter()
        .skip(start)
        .find(|a| !a.starts_with('-'))
        .cloned()
}

fn open_board() -> Result<TaskBoard> {
    let store = LocalStore::open(NativePlatform::data_dir())?;
    let mut board = TaskBoard::new(store, Arc::new(GrokClient::new()));
    board.reload()?;
    Ok(board)
}

fn require_task_arg(args: &[String], command: &str) -> Option<String> {
    let id = positional(args, 2);
    if id.is_none() {
        print_error(&format!("Usage: grok-tasks {} <task-id>", command));
    }
    id
}

pub async fn run_main() -> Result<()> {
    let raw: Vec<String> = std::env::args().collect();
    let (verbose, args) = strip_global_flags(&raw);
    let cmd = args.get(1).map(String::as_str).unwrap_or("tui");

    if cmd == "tui" {
        let log_tx = logging::init(verbose, true);
        let board = open_board()?;
        let mut app = TuiApp::new(board, Some(log_tx.subscribe()));
        return app.run_tui().await;
    }

    logging::init(verbose, !verbose);

    match cmd {
        "help" | "--help" | "-h" => print_help(),
        "templates" => tasks::list_templates(),
        "list" | "ls" => tasks::list_tasks(&open_board()?),
        "create" => match flag_value(&args, 2, &["--template", "-t"]) {
            Some(template_id) => tasks::create_task(&mut open_board()?, &template_id)?,
            None => {
                print_error("Usage: grok-tasks create --template <id>");
                tasks::list_templates();
            }
        },
        "run" => {
            if let Some(id) = require_task_arg(&args, "run") {
                tasks::run_task(&mut open_board()?, &id).await?;
            }
        }
        "toggle" => {
            if let Some(id) = require_task_arg(&args, "toggle") {
                tasks::toggle_task(&mut open_board()?, &id)?;
            }
        }
        "history" => {
            if let Some(id) = require_task_arg(&args, "history") {
                tasks::show_history(&mut open_board()?, &id)?;
            }
        }
        "delete" | "rm" => {
            if let Some(id) = require_task_arg(&args, "delete") {
                let yes = args.iter().any(|a| a == "--yes" || a == "-y");
                tasks::delete_task(&mut open_board()?, &id, yes)?;
            }
        }
        "config" => {
            let sub_cmd = args.get(2).map(String::as_str).unwrap_or("show");
            match sub_cmd {
                "show" => config::show_config(&open_board()?),
                "set" => {
                    let parsed = config::parse_config_set_args(&args, 3);
                    config::set_config(&mut open_board()?, parsed)?;
                }
                "reset" => config::reset_config(&mut open_board()?)?,
                _ => {
                    print_error("Unknown config command. Expected: show, set, reset");
                }
            }
        }
        _ => {
            print_error(&format!("Unknown command: {}", cmd));
            print_help();
        }
    }
    Ok(())
}

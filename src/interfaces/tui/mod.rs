mod events;
mod ui;

use tokio::sync::{broadcast, mpsc};

use crate::core::llm::ExecutionResult;
use crate::core::storage::types::ApiConfig;
use crate::core::templates::{Template, grouped_templates};
use crate::interfaces::board::{ExecutionTicket, TaskBoard};

struct KeyHint {
    key: &'static str,
    description: &'static str,
}

const KEY_HINTS: &[KeyHint] = &[
    KeyHint {
        key: "n",
        description: "templates",
    },
    KeyHint {
        key: "r",
        description: "run",
    },
    KeyHint {
        key: "space",
        description: "pause/resume",
    },
    KeyHint {
        key: "h",
        description: "history",
    },
    KeyHint {
        key: "d",
        description: "delete",
    },
    KeyHint {
        key: "s",
        description: "settings",
    },
    KeyHint {
        key: "q",
        description: "quit",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsField {
    ApiKey,
    ApiBase,
    Model,
}

impl SettingsField {
    fn next(self) -> Self {
        match self {
            SettingsField::ApiKey => SettingsField::ApiBase,
            SettingsField::ApiBase => SettingsField::Model,
            SettingsField::Model => SettingsField::ApiKey,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SettingsField::ApiKey => "API key",
            SettingsField::ApiBase => "Endpoint",
            SettingsField::Model => "Model",
        }
    }

    fn value_mut(self, config: &mut ApiConfig) -> &mut String {
        match self {
            SettingsField::ApiKey => &mut config.api_key,
            SettingsField::ApiBase => &mut config.api_base,
            SettingsField::Model => &mut config.model,
        }
    }
}

type Finished = (ExecutionTicket, ExecutionResult);

pub struct TuiApp {
    board: TaskBoard,

    selected: usize,
    template_cursor: usize,
    settings_field: SettingsField,
    modal_scroll: u16,
    spinner_tick: usize,
    should_quit: bool,

    // Detached executions report back here.
    done_tx: mpsc::Sender<Finished>,
    done_rx: mpsc::Receiver<Finished>,

    log_rx: Option<broadcast::Receiver<String>>,
    last_log: String,
}

impl TuiApp {
    pub fn new(board: TaskBoard, log_rx: Option<broadcast::Receiver<String>>) -> Self {
        let (done_tx, done_rx) = mpsc::channel(32);
        Self {
            board,
            selected: 0,
            template_cursor: 0,
            settings_field: SettingsField::ApiKey,
            modal_scroll: 0,
            spinner_tick: 0,
            should_quit: false,
            done_tx,
            done_rx,
            log_rx,
            last_log: String::new(),
        }
    }

    fn selected_task_id(&self) -> Option<String> {
        self.board.tasks().get(self.selected).map(|t| t.id.clone())
    }

    fn clamp_selection(&mut self) {
        let len = self.board.tasks().len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    /// Templates in the order the gallery shows them.
    fn gallery_order() -> Vec<&'static Template> {
        grouped_templates()
            .into_iter()
            .flat_map(|(_, members)| members)
            .collect()
    }

    fn drain_logs(&mut self) {
        let Some(rx) = self.log_rx.as_mut() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        self.last_log = line.to_string();
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }
}

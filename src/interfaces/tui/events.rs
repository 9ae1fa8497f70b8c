use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::Backend};
use std::{io, time::Duration};
use tokio::sync::mpsc;
use tracing::error;

use super::{SettingsField, TuiApp};
use crate::core::llm::ExecuteOptions;
use crate::interfaces::board::{ExecutionTicket, Modal, NoticeLevel};

impl TuiApp {
    pub async fn run_tui(&mut self) -> Result<()> {
        self.board.reload()?;

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = ratatui::backend::CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_app(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        <B as Backend>::Error: std::error::Error + Send + Sync + 'static,
    {
        loop {
            if self.should_quit {
                return Ok(());
            }

            self.drain_finished();
            self.drain_logs();

            if self.board.in_flight() > 0 {
                self.spinner_tick = self.spinner_tick.wrapping_add(1);
            }

            terminal.draw(|f| self.draw(f))?;

            // Short poll keeps the spinner moving while calls are outstanding.
            if event::poll(Duration::from_millis(80))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key);
            }

            tokio::task::yield_now().await;
        }
    }

    fn drain_finished(&mut self) {
        loop {
            match self.done_rx.try_recv() {
                Ok((ticket, outcome)) => {
                    if let Err(e) = self.board.finish_execution(ticket, outcome) {
                        error!("Could not record execution: {:?}", e);
                        self.report_error(format!("Could not record execution: {}", e));
                    }
                    self.modal_scroll = 0;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
    }

    fn spawn_execution(&self, ticket: ExecutionTicket) {
        let backend = self.board.backend();
        let tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = backend
                .execute(&ticket.prompt, &ticket.config, ExecuteOptions::default())
                .await;
            let _ = tx.send((ticket, outcome)).await;
        });
    }

    fn report_error(&mut self, text: String) {
        self.board.notice = Some(crate::interfaces::board::Notice {
            level: NoticeLevel::Error,
            text,
        });
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.board.modal.clone() {
            Some(Modal::Settings) => self.handle_settings_key(key),
            Some(Modal::ConfirmDelete(task_id)) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if let Err(e) = self.board.delete_task(&task_id) {
                        self.report_error(format!("Delete failed: {}", e));
                    }
                    self.clamp_selection();
                }
                _ => self.board.close_modal(),
            },
            Some(Modal::Result(_)) | Some(Modal::History { .. }) => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                    self.board.close_modal();
                    self.modal_scroll = 0;
                }
                KeyCode::Up => self.modal_scroll = self.modal_scroll.saturating_sub(1),
                KeyCode::Down => self.modal_scroll = self.modal_scroll.saturating_add(1),
                _ => {}
            },
            None if self.board.show_templates => self.handle_gallery_key(key),
            None => self.handle_list_key(key),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                self.selected = self.selected.saturating_add(1);
                self.clamp_selection();
            }
            KeyCode::Char('n') => {
                self.board.toggle_templates();
                self.template_cursor = 0;
            }
            KeyCode::Char('s') => {
                self.board.open_settings();
                self.settings_field = SettingsField::ApiKey;
            }
            KeyCode::Char(' ') => {
                if let Some(id) = self.selected_task_id()
                    && let Err(e) = self.board.toggle_status(&id)
                {
                    self.report_error(format!("Update failed: {}", e));
                }
            }
            KeyCode::Char('r') => {
                if let Some(id) = self.selected_task_id()
                    && let Some(ticket) = self.board.begin_execution(&id)
                {
                    self.spawn_execution(ticket);
                }
            }
            KeyCode::Char('h') => {
                if let Some(id) = self.selected_task_id() {
                    self.modal_scroll = 0;
                    if let Err(e) = self.board.view_history(&id) {
                        self.report_error(format!("Could not load history: {}", e));
                    }
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_task_id() {
                    self.board.request_delete(&id);
                }
            }
            _ => {}
        }
    }

    fn handle_gallery_key(&mut self, key: KeyEvent) {
        let templates = Self::gallery_order();
        match key.code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => self.board.toggle_templates(),
            KeyCode::Up => self.template_cursor = self.template_cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.template_cursor + 1 < templates.len() {
                    self.template_cursor += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(template) = templates.get(self.template_cursor) {
                    match self.board.create_from_template(template) {
                        Ok(_) => self.selected = self.board.tasks().len().saturating_sub(1),
                        Err(e) => self.report_error(format!("Could not create task: {}", e)),
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.board.close_modal(),
            KeyCode::Tab | KeyCode::Down => self.settings_field = self.settings_field.next(),
            KeyCode::BackTab | KeyCode::Up => {
                self.settings_field = self.settings_field.next().next();
            }
            KeyCode::Enter => {
                let draft = self.board.settings_draft.clone();
                if let Err(e) = self.board.save_settings(draft) {
                    self.report_error(format!("Could not save settings: {}", e));
                }
            }
            KeyCode::Backspace => {
                self.settings_field
                    .value_mut(&mut self.board.settings_draft)
                    .pop();
            }
            KeyCode::Char(c) => {
                self.settings_field
                    .value_mut(&mut self.board.settings_draft)
                    .push(c);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::GrokClient;
    use crate::core::storage::test_store;
    use crate::core::llm::{Completion, CompletionBackend, ExecutionResult};
    use crate::core::storage::types::ApiConfig;
    use crate::interfaces::board::TaskBoard;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn execute(
            &self,
            prompt: &str,
            _config: &ApiConfig,
            _options: ExecuteOptions,
        ) -> ExecutionResult {
            Ok(Completion {
                content: format!("echo: {}", prompt),
                usage: None,
            })
        }
    }

    /// App over an in-memory store with a usable config and one task.
    fn ready_app() -> TuiApp {
        let store = test_store();
        store
            .save_api_config(&ApiConfig {
                api_key: "sk-test".to_string(),
                ..ApiConfig::default()
            })
            .unwrap();
        let mut board = TaskBoard::new(store, Arc::new(EchoBackend));
        board.reload().unwrap();
        let mut app = TuiApp::new(board, None);
        app.handle_key(press(KeyCode::Char('n')));
        app.handle_key(press(KeyCode::Enter));
        app.board.notice = None;
        app
    }

    async fn wait_for_runs(app: &mut TuiApp) {
        for _ in 0..100 {
            tokio::task::yield_now().await;
            app.drain_finished();
            if app.board.in_flight() == 0 {
                return;
            }
        }
        panic!("execution never reported back");
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> TuiApp {
        let mut board = TaskBoard::new(test_store(), Arc::new(GrokClient::new()));
        board.reload().unwrap();
        TuiApp::new(board, None)
    }

    #[test]
    fn gallery_enter_creates_task_and_closes_gallery() {
        let mut app = app();
        app.handle_key(press(KeyCode::Char('n')));
        assert!(app.board.show_templates);
        app.handle_key(press(KeyCode::Down));
        app.handle_key(press(KeyCode::Enter));

        assert!(!app.board.show_templates);
        assert_eq!(app.board.tasks().len(), 1);
        let expected = TuiApp::gallery_order()[1].id;
        assert_eq!(app.board.tasks()[0].template_id.as_deref(), Some(expected));
    }

    #[test]
    fn settings_form_edits_and_saves_draft() {
        let mut app = app();
        app.handle_key(press(KeyCode::Char('s')));
        assert!(matches!(app.board.modal, Some(Modal::Settings)));
        for c in "sk-1".chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
        app.handle_key(press(KeyCode::Enter));

        assert!(app.board.modal.is_none());
        assert_eq!(app.board.config().api_key, "sk-1");
    }

    #[test]
    fn run_without_settings_opens_settings_form() {
        let mut app = app();
        app.handle_key(press(KeyCode::Char('n')));
        app.handle_key(press(KeyCode::Enter));
        app.handle_key(press(KeyCode::Char('r')));

        assert!(matches!(app.board.modal, Some(Modal::Settings)));
        assert_eq!(app.board.in_flight(), 0);
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app();
        app.handle_key(press(KeyCode::Char('n')));
        app.handle_key(press(KeyCode::Enter));

        app.handle_key(press(KeyCode::Char('d')));
        app.handle_key(press(KeyCode::Char('x')));
        assert_eq!(app.board.tasks().len(), 1);

        app.handle_key(press(KeyCode::Char('d')));
        app.handle_key(press(KeyCode::Char('y')));
        assert!(app.board.tasks().is_empty());
    }

    #[test]
    fn ctrl_c_quits_from_any_screen() {
        let mut app = app();
        app.handle_key(press(KeyCode::Char('s')));
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn spawned_run_is_recorded_then_shown() {
        let mut app = ready_app();
        let task_id = app.selected_task_id().unwrap();

        app.handle_key(press(KeyCode::Char('r')));
        assert_eq!(app.board.in_flight(), 1);
        assert!(app.board.is_executing(&task_id));
        // A second press while in flight is ignored.
        app.handle_key(press(KeyCode::Char('r')));
        assert_eq!(app.board.in_flight(), 1);

        wait_for_runs(&mut app).await;
        match &app.board.modal {
            Some(Modal::Result(report)) => {
                assert_eq!(report.task_id, task_id);
                assert!(report.outcome.as_ref().unwrap().content.starts_with("echo: "));
            }
            other => panic!("expected result overlay, got {:?}", other),
        }

        app.handle_key(press(KeyCode::Esc));
        app.handle_key(press(KeyCode::Char('h')));
        let Some(Modal::History { entries, .. }) = &app.board.modal else {
            panic!("expected history overlay");
        };
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_refused_while_the_task_runs() {
        let mut app = ready_app();

        app.handle_key(press(KeyCode::Char('r')));
        app.handle_key(press(KeyCode::Char('d')));
        assert!(app.board.modal.is_none());
        assert_eq!(
            app.board.notice.as_ref().map(|n| n.level),
            Some(NoticeLevel::Warn)
        );

        wait_for_runs(&mut app).await;
        assert_eq!(app.board.tasks().len(), 1);
        assert!(matches!(app.board.modal, Some(Modal::Result(_))));
    }

    #[tokio::test]
    async fn result_does_not_cover_the_settings_form() {
        let mut app = ready_app();

        app.handle_key(press(KeyCode::Char('r')));
        app.handle_key(press(KeyCode::Char('s')));
        app.handle_key(press(KeyCode::Char('x')));

        wait_for_runs(&mut app).await;
        assert!(matches!(app.board.modal, Some(Modal::Settings)));
        assert_eq!(app.board.settings_draft.api_key, "sk-testx");

        app.handle_key(press(KeyCode::Esc));
        assert!(matches!(app.board.modal, Some(Modal::Result(_))));
    }
}

use chrono::{DateTime, Local, Utc};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use super::{KEY_HINTS, SettingsField, TuiApp};
use crate::core::llm::ExecutionError;
use crate::core::storage::types::{ExecutionStatus, TaskExecution, TaskStatus};
use crate::core::templates::grouped_templates;
use crate::interfaces::board::{ExecutionReport, Modal, NoticeLevel, preview};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn status_style(status: TaskStatus) -> Style {
    match status {
        TaskStatus::Active => Style::default().fg(Color::Green),
        TaskStatus::Paused => Style::default().fg(Color::Yellow),
        TaskStatus::Completed => Style::default().fg(Color::DarkGray),
    }
}

fn local_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A rectangle of `percent_x` by `percent_y` centred in `area`.
fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn overlay_block(title: &str, color: Color) -> Block<'static> {
    Block::default()
        .title(format!(" {} (Esc to close) ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

impl TuiApp {
    pub(super) fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(f.area());

        f.render_widget(self.render_header(), chunks[0]);
        f.render_widget(self.render_tasks(), chunks[1]);
        f.render_widget(self.render_footer(), chunks[2]);

        if self.board.show_templates && self.board.modal.is_none() {
            let area = centered(f.area(), 80, 80);
            f.render_widget(Clear, area);
            f.render_widget(self.render_gallery(), area);
        }

        if let Some(modal) = &self.board.modal {
            let (widget, area) = match modal {
                Modal::Settings => (self.render_settings(), centered(f.area(), 70, 40)),
                Modal::Result(report) => (self.render_result(report), centered(f.area(), 85, 85)),
                Modal::History { task_id, entries } => (
                    self.render_history(task_id, entries),
                    centered(f.area(), 85, 85),
                ),
                Modal::ConfirmDelete(task_id) => {
                    (self.render_confirm_delete(task_id), centered(f.area(), 50, 20))
                }
            };
            f.render_widget(Clear, area);
            f.render_widget(widget, area);
        }
    }

    fn render_header(&self) -> Paragraph<'_> {
        let config = self.board.config();
        let endpoint = if config.api_key.is_empty() {
            Span::styled(
                "API key not set (press s)",
                Style::default().fg(Color::Yellow),
            )
        } else {
            Span::styled(
                format!("{} · {}", config.api_base, config.model),
                Style::default().fg(Color::DarkGray),
            )
        };
        Paragraph::new(Line::from(vec![
            Span::styled(
                " Grok Tasks ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            endpoint,
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
    }

    fn render_tasks(&self) -> Paragraph<'_> {
        let mut lines: Vec<Line> = Vec::new();
        let tasks = self.board.tasks();

        if tasks.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::styled(
                "  No tasks yet. Press n to create one from a template.",
                Style::default().fg(Color::DarkGray),
            ));
        }

        for (i, task) in tasks.iter().enumerate() {
            let is_selected = i == self.selected;
            let marker = if is_selected { "▶ " } else { "  " };
            let name_style = if is_selected {
                Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            let running = if self.board.is_executing(&task.id) {
                let frame = SPINNER[self.spinner_tick % SPINNER.len()];
                Span::styled(format!("  {} running", frame), Style::default().fg(Color::Yellow))
            } else {
                Span::raw("")
            };

            lines.push(Line::from(vec![
                Span::raw(marker),
                Span::styled(
                    format!("[{:<6}] ", task.status.as_str()),
                    status_style(task.status),
                ),
                Span::styled(task.name.as_str(), name_style),
                running,
            ]));
            if let Some(description) = &task.description {
                lines.push(Line::styled(
                    format!("            {}", description),
                    Style::default().fg(Color::Gray),
                ));
            }
            lines.push(Line::styled(
                format!("            schedule: {}", task.schedule),
                Style::default().fg(Color::DarkGray),
            ));
        }

        Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!(" My tasks ({}) ", tasks.len()))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .wrap(Wrap { trim: false })
    }

    fn render_footer(&self) -> Paragraph<'_> {
        let mut spans: Vec<Span> = Vec::new();
        match &self.board.notice {
            Some(notice) => {
                let color = match notice.level {
                    NoticeLevel::Info => Color::Green,
                    NoticeLevel::Warn => Color::Yellow,
                    NoticeLevel::Error => Color::Red,
                };
                spans.push(Span::styled(
                    format!(" {} ", notice.text),
                    Style::default().fg(color),
                ));
            }
            None if !self.last_log.is_empty() => spans.push(Span::styled(
                format!(" {} ", self.last_log),
                Style::default().fg(Color::DarkGray),
            )),
            None => {}
        }
        spans.push(Span::raw(" │ "));
        for hint in KEY_HINTS {
            spans.push(Span::styled(hint.key, Style::default().fg(Color::Cyan)));
            spans.push(Span::styled(
                format!(" {}  ", hint.description),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
    }

    fn render_gallery(&self) -> Paragraph<'_> {
        let mut lines: Vec<Line> = Vec::new();
        let mut index = 0;
        for (category, members) in grouped_templates() {
            lines.push(Line::styled(
                category,
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::BOLD),
            ));
            for template in members {
                let style = if index == self.template_cursor {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("  {}", template.name), style),
                    Span::styled(
                        format!("  ⏱ {}", template.default_schedule),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]));
                lines.push(Line::styled(
                    format!("    {}", template.description),
                    Style::default().fg(Color::Gray),
                ));
                index += 1;
            }
            lines.push(Line::from(""));
        }
        Paragraph::new(lines)
            .block(overlay_block("Template gallery · Enter to create", Color::Blue))
            .wrap(Wrap { trim: false })
    }

    fn render_settings(&self) -> Paragraph<'_> {
        let draft = &self.board.settings_draft;
        let mut lines = vec![Line::from("")];
        for (field, value) in [
            (SettingsField::ApiKey, &draft.api_key),
            (SettingsField::ApiBase, &draft.api_base),
            (SettingsField::Model, &draft.model),
        ] {
            let focused = field == self.settings_field;
            let label_style = if focused {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            let cursor = if focused { "█" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<10}", field.label()), label_style),
                Span::raw(format!("{}{}", value, cursor)),
            ]));
            lines.push(Line::from(""));
        }
        if let Some(notice) = &self.board.notice
            && notice.level != NoticeLevel::Info
        {
            lines.push(Line::styled(
                format!("  {}", notice.text),
                Style::default().fg(Color::Yellow),
            ));
        }
        lines.push(Line::styled(
            "  Tab next field · Enter save",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(lines).block(overlay_block("API settings", Color::Magenta))
    }

    fn render_result(&self, report: &ExecutionReport) -> Paragraph<'_> {
        let task_name = self
            .board
            .tasks()
            .iter()
            .find(|t| t.id == report.task_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| report.task_id.clone());

        let mut lines = vec![
            Line::styled(
                format!("{} · {}", task_name, local_time(&report.timestamp)),
                Style::default().fg(Color::DarkGray),
            ),
            Line::from(""),
        ];

        match &report.outcome {
            Ok(completion) => {
                lines.push(Line::styled(
                    "✔ Succeeded",
                    Style::default().fg(Color::Green),
                ));
                lines.push(Line::from(""));
                for text_line in completion.content.lines() {
                    lines.push(Line::from(text_line.to_string()));
                }
                if let Some(usage) = completion.usage {
                    lines.push(Line::from(""));
                    lines.push(Line::styled(
                        format!(
                            "Tokens: prompt {} · completion {} · total {}",
                            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                        ),
                        Style::default().fg(Color::Magenta),
                    ));
                }
            }
            Err(e) => {
                lines.push(Line::styled("✘ Failed", Style::default().fg(Color::Red)));
                lines.push(Line::from(""));
                lines.push(Line::styled(e.to_string(), Style::default().fg(Color::Red)));
                match e {
                    ExecutionError::MissingConfig => lines.push(Line::styled(
                        "Press s to open the API settings.",
                        Style::default().fg(Color::DarkGray),
                    )),
                    ExecutionError::Rejected { status, .. } => lines.push(Line::styled(
                        format!("Endpoint answered with HTTP {}", status),
                        Style::default().fg(Color::DarkGray),
                    )),
                    _ => {}
                }
            }
        }

        Paragraph::new(lines)
            .block(overlay_block("Execution result", Color::Cyan))
            .wrap(Wrap { trim: false })
            .scroll((self.modal_scroll, 0))
    }

    fn render_history(&self, task_id: &str, entries: &[TaskExecution]) -> Paragraph<'_> {
        let task_name = self
            .board
            .tasks()
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.name.as_str())
            .unwrap_or(task_id);
        let mut lines: Vec<Line> = Vec::new();
        if entries.is_empty() {
            lines.push(Line::styled(
                "No executions yet.",
                Style::default().fg(Color::DarkGray),
            ));
        }
        for entry in entries {
            let (label, color) = match entry.status {
                ExecutionStatus::Success => ("✔ success", Color::Green),
                ExecutionStatus::Failed => ("✘ failed", Color::Red),
            };
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(color)),
                Span::styled(
                    format!("  {}", local_time(&entry.executed_at)),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
            if let Some(result) = &entry.result {
                for text_line in preview(result).lines() {
                    lines.push(Line::from(format!("  {}", text_line)));
                }
            }
            if let Some(error) = &entry.error {
                lines.push(Line::styled(
                    format!("  {}", error),
                    Style::default().fg(Color::Red),
                ));
            }
            lines.push(Line::from(""));
        }
        Paragraph::new(lines)
            .block(overlay_block(
                &format!("History · {}", task_name),
                Color::Magenta,
            ))
            .wrap(Wrap { trim: false })
            .scroll((self.modal_scroll, 0))
    }

    fn render_confirm_delete(&self, task_id: &str) -> Paragraph<'_> {
        let name = self
            .board
            .tasks()
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.name.as_str())
            .unwrap_or(task_id);
        Paragraph::new(vec![
            Line::from(""),
            Line::from(format!("  Delete \"{}\" and its history?", name)),
            Line::from(""),
            Line::styled("  y confirm · any other key cancels", Style::default().fg(Color::DarkGray)),
        ])
        .block(overlay_block("Delete task", Color::Red))
    }
}

use anyhow::Result;
use inquire::{Password, PasswordDisplayMode, Text};

use crate::core::storage::types::{ApiConfig, DEFAULT_MODEL};
use crate::core::terminal::{GuideSection, print_error, print_success};
use crate::interfaces::board::TaskBoard;

use super::flag_value;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigSetArgs {
    pub key: Option<String>,
    pub base: Option<String>,
    pub model: Option<String>,
}

impl ConfigSetArgs {
    fn is_empty(&self) -> bool {
        self.key.is_none() && self.base.is_none() && self.model.is_none()
    }
}

pub(crate) fn parse_config_set_args(args: &[String], start: usize) -> ConfigSetArgs {
    ConfigSetArgs {
        key: flag_value(args, start, &["--key", "-k"]),
        base: flag_value(args, start, &["--base", "-b"]),
        model: flag_value(args, start, &["--model", "-m"]),
    }
}

/// Keeps the first and last four characters of a secret.
pub(crate) fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Applies the flags that were given on top of `current`.
pub(crate) fn merge_config(current: &ApiConfig, args: ConfigSetArgs) -> ApiConfig {
    ApiConfig {
        api_key: args.key.unwrap_or_else(|| current.api_key.clone()),
        api_base: args.base.unwrap_or_else(|| current.api_base.clone()),
        model: args.model.unwrap_or_else(|| current.model.clone()),
    }
}

pub fn show_config(board: &TaskBoard) {
    let config = board.config();
    let model = if config.model.is_empty() {
        format!("{} (default)", DEFAULT_MODEL)
    } else {
        config.model.clone()
    };
    GuideSection::new("API settings")
        .status("API key", &mask_secret(&config.api_key))
        .status("Endpoint", &config.api_base)
        .status("Model", &model)
        .blank()
        .text(if config.is_ready() {
            "Ready to run tasks."
        } else {
            "Incomplete: set a key with `grok-tasks config set`."
        })
        .print();
}

fn prompt_config(current: &ApiConfig) -> Result<ApiConfig> {
    let key = Password::new("API key (leave empty to keep current):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    let base = Text::new("API endpoint:")
        .with_default(&current.api_base)
        .prompt()?;
    let model = Text::new("Model:")
        .with_default(if current.model.is_empty() {
            DEFAULT_MODEL
        } else {
            current.model.as_str()
        })
        .prompt()?;

    Ok(merge_config(
        current,
        ConfigSetArgs {
            key: (!key.trim().is_empty()).then(|| key.trim().to_string()),
            base: Some(base.trim().to_string()),
            model: Some(model.trim().to_string()),
        },
    ))
}

pub fn set_config(board: &mut TaskBoard, args: ConfigSetArgs) -> Result<()> {
    let current = board.config().clone();
    let updated = if args.is_empty() {
        prompt_config(&current)?
    } else {
        merge_config(&current, args)
    };

    if board.save_settings(updated)? {
        show_config(board);
    } else if let Some(notice) = board.notice.take() {
        print_error(&notice.text);
    }
    Ok(())
}

pub fn reset_config(board: &mut TaskBoard) -> Result<()> {
    board.reset_settings()?;
    print_success("API settings reset to defaults");
    show_config(board);
    Ok(())
}

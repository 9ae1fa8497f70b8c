use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱  ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {}: {}", style(label).bold().cyan(), msg);
}

pub fn print_banner() {
    println!();
    println!("{}", style(" Grok Tasks Manager ").bold().black().on_cyan());
    println!(
        "{}\n",
        style(" Prompt tasks you run on demand, history kept locally.").dim()
    );
}

/// A titled block of aligned rows for help and listing output.
pub struct GuideSection {
    title: String,
    rows: Vec<String>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.rows.push(format!(
            "  {:<34} {}",
            style(name).green(),
            style(description).dim()
        ));
        self
    }

    pub fn status(mut self, label: &str, value: &str) -> Self {
        self.rows
            .push(format!("  {:<16} {}", style(label).bold().cyan(), value));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.rows.push(format!("  {}", text));
        self
    }

    pub fn blank(mut self) -> Self {
        self.rows.push(String::new());
        self
    }

    pub fn print(self) {
        println!("{}", style(&self.title).bold().underlined());
        for row in self.rows {
            println!("{}", row);
        }
        println!();
    }
}

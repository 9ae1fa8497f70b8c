pub mod board;
pub mod tui;

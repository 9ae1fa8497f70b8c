pub mod llm;
pub mod storage;
pub mod templates;
pub mod terminal;

pub mod chat_input;
pub mod progress_bar;
pub mod status_bar;

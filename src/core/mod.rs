pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod events;
pub mod line_decoder;
pub mod message;
pub mod session;

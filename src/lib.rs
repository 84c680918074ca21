//! codex-chat is a terminal client for a chat backend that streams its replies
//! as `data: ` lines.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the streaming pipeline: [`core::chat_stream`] reads the
//!   response body, [`core::line_decoder`] frames it into lines,
//!   [`core::events`] classifies lines, and [`core::conversation`] folds the
//!   resulting events into the conversation log. [`core::session`] ties them
//!   together behind a single `send` call.
//! - [`cli`] parses arguments and runs the interactive and one-shot front ends,
//!   which observe the log and print replies as they grow.
//! - [`api`] defines the request payload sent to the backend.
//! - [`utils`] holds URL joining and the transcript file writer.

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;

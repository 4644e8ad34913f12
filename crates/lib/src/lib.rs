//! Aloy core library: natural-language command interpretation and dispatch.
//!
//! A message is sent to the interpretation service, the resulting command is decoded into
//! a typed payload and either published to a per-domain broker queue or answered directly.

pub mod broker;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod inbound;
pub mod interpreter;
pub mod reply;

pub mod adapter;
pub mod catalog;
pub mod client;
pub mod config;
pub mod fallback;
pub mod flow;
pub mod persistence;
pub mod phrases;
pub mod pipeline;
pub mod prompts;
pub mod validator;

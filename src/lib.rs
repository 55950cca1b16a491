//! Agent Foreman: a long-task harness coordinating AI coding agents
//! against a project tree, with a durable task list as external memory.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

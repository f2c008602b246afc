//! Rustle WinAdmin - remote execution adapters for Windows administration tools
//!
//! Each adapter turns a typed request into one or more external command
//! invocations (GoodSync, IIS through PowerShell, `sc`, `svn`, `netsh`),
//! runs them through a shared [`modules::executor::CommandRunner`] and
//! interprets the output.

pub mod cli;
pub mod config;
pub mod modules;

pub use config::AdapterConfig;
pub use modules::{ModuleError, ModuleRegistry, ValidationError};

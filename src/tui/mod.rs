//! TUI debugger for the emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register view (hex and signed)
//! - Memory hex view
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};

//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::driver::{Machine, MachineState, INSTRUCTION_SIZE};
use std::collections::HashSet;

/// Bytes per memory view row.
pub const MEM_ROW_BYTES: usize = 8;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub machine: Machine,
    /// Breakpoints (by pc).
    pub breakpoints: HashSet<i32>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger around a loaded machine.
    pub fn new(machine: Machine) -> Self {
        Self {
            machine,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.is_stopped() {
            self.status = format!("Machine stopped: {:?}", self.machine.state);
            self.running = false;
            return;
        }

        let pc = self.machine.cpu().pc();
        match self.machine.step() {
            Ok(Some(instr)) => {
                let text = disassemble_instruction(pc, &instr);
                self.status = match self.machine.source_line(pc) {
                    Some(line) => format!("PC={:04} (line {}): {}", pc, line, text),
                    None => format!("PC={:04}: {}", pc, text),
                };
            }
            Ok(None) => {
                self.status = format!("Halted after {} cycles", self.machine.cpu().cycles());
                self.running = false;
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.is_stopped() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.machine.cpu().cycles());
            return;
        }

        self.step();

        // Stop on arrival at a breakpoint
        let pc = self.machine.cpu().pc();
        if self.running && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={}", pc);
        }
    }

    /// Toggle breakpoint at the current pc.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.cpu().pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={}", pc);
        }
    }

    /// Reload the program.
    pub fn reset(&mut self) {
        self.running = false;
        self.status = match self.machine.reset() {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Reset failed: {}", e),
        };
    }

    /// Scroll the memory view, clamped to the last row.
    pub fn scroll_memory(&mut self, down: bool) {
        let rows = self.machine.cpu().mem().capacity() / MEM_ROW_BYTES;
        if down {
            self.mem_scroll = (self.mem_scroll + 1).min(rows.saturating_sub(1));
        } else {
            self.mem_scroll = self.mem_scroll.saturating_sub(1);
        }
    }

    /// Get disassembly around the current pc: `(pc, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(i32, String, bool)> {
        let pc = self.machine.cpu().pc();
        let current = pc / INSTRUCTION_SIZE;
        let start = (current - (lines as i32 / 2)).max(0);

        (0..lines as i32)
            .filter_map(|i| {
                let addr = (start + i) * INSTRUCTION_SIZE;
                self.machine
                    .instruction_at(addr)
                    .map(|instr| (addr, disassemble_instruction(addr, instr), addr == pc))
            })
            .collect()
    }

    /// Whether the machine has halted or faulted.
    pub fn is_stopped(&self) -> bool {
        self.machine.state != MachineState::Running
    }
}

/// Run the debugger on a loaded machine.
pub fn run_debugger(machine: Machine) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(machine);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(false),
                        KeyCode::Down => app.scroll_memory(true),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

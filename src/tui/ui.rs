//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::Register;
use super::app::{DebuggerApp, MEM_ROW_BYTES};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: code, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(19),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw disassembly view.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(pc, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(pc) { "●" } else { " " };
            let text = format!("{}{:04}: {}", prefix, pc, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(pc) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw the register file, two registers per line.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = app.machine.cpu();

    let mut content: Vec<Line> = Register::ALL[1..]
        .chunks(2)
        .map(|pair| {
            let mut spans = Vec::new();
            for &reg in pair {
                let value = cpu.read_reg(reg);
                spans.push(Span::raw(format!("{:>4}: ", reg.abi_name())));
                spans.push(Span::styled(format!("{:08x}", value), value_style(value)));
                spans.push(Span::raw(format!(" {:>11}   ", value as i32)));
            }
            Line::from(spans)
        })
        .collect();

    content.push(Line::from(vec![
        Span::raw("  pc: "),
        Span::styled(format!("{}", cpu.pc()), Style::default().fg(Color::Yellow)),
        Span::raw("   Cycles: "),
        Span::styled(format!("{}", cpu.cycles()), Style::default().fg(Color::Cyan)),
        Span::raw("   State: "),
        Span::styled(format!("{:?}", app.machine.state),
            if app.machine.is_running() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Red)
            }),
    ]));

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let mem = app.machine.cpu().mem();
    let rows = mem.capacity() / MEM_ROW_BYTES;
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(rows);

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let base = row * MEM_ROW_BYTES;
            let bytes: Vec<u8> = (base..base + MEM_ROW_BYTES).map(|a| mem.read_byte(a)).collect();
            let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();

            let text = format!("0x{:04x}: {}", base, hex.join(" "));

            let style = if bytes.iter().any(|b| *b != 0) {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint  x: Reset  ↑↓: Memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Dim zero registers.
fn value_style(value: u32) -> Style {
    if value == 0 {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    }
}

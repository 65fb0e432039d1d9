//! Register and memory dumps.
//!
//! Pure formatting over read-only CPU state.

use crate::cpu::memory::AddressSpace;
use crate::cpu::{Register, RegisterFile};
use std::fmt::Write;

/// Bytes per hex dump row.
const ROW_BYTES: usize = 16;

/// Registers 1-31, two per row: ABI name, `xN` name, hex and signed value.
pub fn reg_dump(regs: &RegisterFile) -> String {
    let mut out = String::new();
    let entries: Vec<(Register, u32)> = regs.iter().skip(1).collect();

    for pair in entries.chunks(2) {
        let cells: Vec<String> = pair
            .iter()
            .map(|(reg, value)| {
                format!(
                    "{:>4} (x{:<2}) = 0x{:08x} {:>11}",
                    reg.abi_name(),
                    reg.index(),
                    value,
                    *value as i32
                )
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("   "));
    }

    out
}

/// The first `len` bytes of memory, 16 per row, clamped to capacity.
pub fn hex_dump(mem: &AddressSpace, len: usize) -> String {
    let end = len.min(mem.capacity());
    let mut out = String::new();

    for row in (0..end).step_by(ROW_BYTES) {
        let row_end = (row + ROW_BYTES).min(end);
        let _ = write!(out, "0x{:04x}:", row);
        for addr in row..row_end {
            if (addr - row) % 4 == 0 {
                out.push(' ');
            }
            let _ = write!(out, " {:02x}", mem.read_byte(addr));
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_dump_skips_zero() {
        let mut regs = RegisterFile::new();
        regs.write(Register::T1, 14);
        regs.write(Register::A0, u32::MAX);

        let dump = reg_dump(&regs);
        assert!(!dump.contains("zero"));
        assert_eq!(dump.lines().count(), 16);
        assert!(dump.contains("  t1 (x6 ) = 0x0000000e          14"));
        assert!(dump.contains("  a0 (x10) = 0xffffffff          -1"));
        assert!(dump.contains(" t6 (x31)"));
    }

    #[test]
    fn test_hex_dump_little_endian_bytes() {
        let mut mem = AddressSpace::new();
        mem.write_word(0, 9);
        mem.write_word(8, 0xAABB_CCDD);

        let dump = hex_dump(&mem, 32);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0x0000:  09 00 00 00  00 00 00 00  dd cc bb aa  00 00 00 00"
        );
        assert!(lines[1].starts_with("0x0010:"));
    }

    #[test]
    fn test_hex_dump_clamps_to_capacity() {
        let mem = AddressSpace::with_capacity(16);
        let dump = hex_dump(&mem, 4096);
        assert_eq!(dump.lines().count(), 1);
    }
}

//! HardwareLab Emulator - CLI Entry Point
//!
//! Commands:
//! - `hwlab-emu run <program>` - Assemble and run a program
//! - `hwlab-emu debug <program>` - Interactive debugger
//! - `hwlab-emu tokens <source>` - Show the tokenizer output
//! - `hwlab-emu disasm <source>` - Assemble and print a listing
//! - `hwlab-emu demo` - Load two words, add them, store the sum
//! - `hwlab-emu test` - Built-in self-test
//! - `hwlab-emu config` - Print a sample config file

use clap::{Parser, Subcommand};
use hwlab::{Config, Program};

#[derive(Parser)]
#[command(name = "hwlab-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instructional emulator for a small RISC-V inspired instruction set")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it runs off its last instruction
    Run {
        /// Path to the assembly source
        program: String,
        /// Maximum number of instructions to run (default from config)
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Data memory size in bytes (default from config)
        #[arg(long)]
        memory: Option<usize>,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final CPU state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the assembly source
        program: String,
    },
    /// Show the token lines of a source file
    Tokens {
        /// Path to the source file
        source: String,
    },
    /// Assemble and print a listing
    Disasm {
        /// Path to the source file
        source: String,
    },
    /// Run the built-in load/add/store demo
    Demo,
    /// Run the built-in self-test
    Test,
    /// Print a sample configuration file
    Config,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::get();

    match cli.command {
        Some(Commands::Run { program, max_cycles, memory, trace, json }) => {
            let max_cycles = max_cycles.unwrap_or_else(|| config.max_cycles());
            let memory = memory.unwrap_or_else(|| config.memory_bytes());
            run_program(&program, max_cycles, memory, trace, json, config.hexdump_bytes());
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program, config.memory_bytes());
        }
        Some(Commands::Tokens { source }) => {
            show_tokens(&source);
        }
        Some(Commands::Disasm { source }) => {
            disassemble_file(&source);
        }
        Some(Commands::Demo) => {
            run_demo(config.hexdump_bytes());
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        Some(Commands::Config) => {
            print!("{}", Config::sample_config());
            if let Some(path) = Config::user_config_path() {
                eprintln!("# user config path: {}", path.display());
            }
        }
        None => {
            println!("HardwareLab Emulator v0.1.0");
            println!("An instructional RISC-V style datapath emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Read and assemble a source file, exiting on failure.
fn load_program(path: &str) -> Program {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {}", path, e);
            std::process::exit(1);
        }
    };

    match hwlab::assemble(&source) {
        Ok(program) => {
            log::info!("assembled {} instructions from {}", program.len(), path);
            program
        }
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_machine(program: Program, memory: usize) -> hwlab::Machine {
    if memory % hwlab::cpu::memory::WORD_SIZE != 0 || memory < 2 * hwlab::cpu::memory::WORD_SIZE {
        eprintln!("❌ Memory size {} must be a multiple of 4 and at least 8 bytes", memory);
        std::process::exit(1);
    }
    match hwlab::Machine::new(program, memory) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: &str, max_cycles: u64, memory: usize, trace: bool, json: bool, dump_bytes: usize) {
    use hwlab::asm::disasm::disassemble_instruction;
    use hwlab::diag::{hex_dump, reg_dump};

    println!("🔧 Running: {}", path);

    let program = load_program(path);
    let mut machine = load_machine(program, memory);

    println!();
    println!("━━━ Execution ━━━");

    let result = machine.run_with(max_cycles, |pc, instr| {
        if trace {
            println!("{:04}: {}", pc, disassemble_instruction(pc, instr));
        }
    });
    match result {
        Ok(_) => {}
        Err(hwlab::DriverError::CycleLimit(limit)) => {
            println!();
            println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", limit);
        }
        Err(e) => {
            eprintln!("❌ CPU error: {}", e);
            std::process::exit(1);
        }
    }

    let cpu = machine.cpu();
    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles());
    println!("State:  {:?}", machine.state);
    println!("PC:     {}", cpu.pc());
    println!();
    print!("{}", reg_dump(cpu.regs()));
    println!();
    print!("{}", hex_dump(cpu.mem(), dump_bytes));

    if json {
        match serde_json::to_string_pretty(cpu) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, memory: usize) {
    println!("🔍 Loading: {}", path);

    let machine = load_machine(load_program(path), memory);

    println!("🚀 Launching debugger...");

    if let Err(e) = hwlab::run_debugger(machine) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _memory: usize) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn show_tokens(path: &str) {
    match hwlab::asm::tokenize_file(path) {
        Ok(lines) => {
            for line in lines {
                println!("{:>4}: {}", line.line, line.tokens.join(" | "));
            }
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

fn disassemble_file(path: &str) {
    println!("📖 Listing: {}", path);
    println!();

    let program = load_program(path);
    for (addr, value) in &program.data {
        println!("        .word {:#06x} {:#010x}", addr, value);
    }
    print!("{}", hwlab::disassemble(&program.instructions));
}

fn run_demo(dump_bytes: usize) {
    use hwlab::{Cpu, Register::*};
    use hwlab::diag::{hex_dump, reg_dump};

    println!("━━━ Load / Add / Store ━━━");
    println!();

    let mut cpu = Cpu::new();

    // set up some initial memory
    cpu.write_word(0, 0x9);
    cpu.write_word(4, 0x5);

    // load both into registers
    cpu.lw(T1, Zero, 0);
    cpu.lw(T2, Zero, 4);

    // add them, and store the result
    cpu.add(T1, T1, T2);
    cpu.sw(Zero, T1, 8);

    print!("{}", reg_dump(cpu.regs()));
    println!();
    print!("{}", hex_dump(cpu.mem(), dump_bytes));
}

fn run_self_test() {
    use hwlab::{AddressSpace, Cpu, Register, RegisterFile};

    println!("━━━ HardwareLab Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Test 1: zero register
    let mut regs = RegisterFile::new();
    regs.write(Register::Zero, 42);
    check("Zero register ignores writes", regs.read(Register::Zero) == 0);

    // Test 2: aligned round trip
    let mut mem = AddressSpace::new();
    mem.write_word(8, 0x1234_5678);
    check("Aligned word round trip", mem.read_word(8) == 0x1234_5678);

    // Test 3: unaligned round trip and byte partition
    let mut mem = AddressSpace::new();
    mem.write_word(2, 0xAABB_CCDD);
    check(
        "Unaligned word round trip",
        mem.read_word(2) == 0xAABB_CCDD && mem.words()[0] == 0xCCDD_0000 && mem.words()[1] == 0x0000_AABB,
    );

    // Test 4: wrapping arithmetic
    let mut cpu = Cpu::new();
    cpu.addi(Register::T0, Register::Zero, -1);
    cpu.addi(Register::T1, Register::Zero, 1);
    cpu.add(Register::T2, Register::T0, Register::T1);
    cpu.sub(Register::T3, Register::Zero, Register::T1);
    check(
        "Wrapping add/sub",
        cpu.read_reg(Register::T2) == 0 && cpu.read_reg(Register::T3) == u32::MAX,
    );

    // Test 5: branch
    let mut cpu = Cpu::new();
    cpu.beq(Register::T0, Register::T0, 4);
    check("BEQ on equal registers moves pc", cpu.pc() == 4);

    // Test 6: assembled program
    let program = hwlab::assemble(".word 0 9\n.word 4 5\nlw t1, 0(zero)\nlw t2, 4(zero)\nadd t1, t1, t2\nsw t1, 8(zero)");
    let ok = match program.map(|p| hwlab::Machine::new(p, 2048)) {
        Ok(Ok(mut m)) => m.run(100).is_ok() && m.cpu().read_word(8) == 14,
        _ => false,
    };
    check("Assembled load/add/store", ok);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}

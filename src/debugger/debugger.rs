// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use debugger::parser::{self, DumpFormat, DumpSize, ExamineSpec};
use i8080::cpu::{PauseReason, StepResult};
use i8080::machine::Machine;
use i8080::registers::RegisterPair;
use io::log;
use rustyline::Editor;
use std::io::{Write, stderr};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
enum Command {
    Help,
    Exit,
    Stop,
    Continue,
    Step,
    Registers,
    Examine,
}

// Full command names used for unique-prefix matching; two spellings may
// map to the same command.
const COMMAND_NAMES: [(&'static str, Command); 8] = [
    ("help", Command::Help),
    ("exit", Command::Exit),
    ("quit", Command::Exit),
    ("stop", Command::Stop),
    ("continue", Command::Continue),
    ("step", Command::Step),
    ("registers", Command::Registers),
    ("examine", Command::Examine),
];

struct CommandWithArguments {
    command: Command,
    args: Vec<String>,
}

/// The interactive machine-level debugger. Input is read on a separate
/// thread so a free-running machine keeps executing while the prompt
/// waits; the machine itself is only ever touched from the driving
/// thread, between steps.
pub struct Debugger {
    sender: SyncSender<String>,
    receiver: Receiver<String>,
    prompt_pending: bool,
    stepping: bool,
    shutdown: bool,
}

impl Debugger {
    /// Creates the debugger and spawns the line-editing input thread. The
    /// thread waits for a prompt string before each read so the prompt
    /// always carries the current program counter.
    pub fn new() -> Debugger {
        let (prompt_tx, prompt_rx) = mpsc::sync_channel::<String>(0);
        let (input_tx, input_rx) = mpsc::channel::<String>();

        thread::spawn(move || {
            let mut editor: Editor<()> = Editor::new();
            loop {
                let prompt = match prompt_rx.recv() {
                    Ok(prompt) => prompt,
                    Err(_) => break, // Debugger went away.
                };
                match editor.readline(&prompt) {
                    Ok(line) => {
                        if line.len() > 0 {
                            editor.add_history_entry(&line);
                        }
                        if input_tx.send(line).is_err() {
                            break
                        }
                    },
                    Err(_) => {
                        // Ctrl-C and Ctrl-D read as an exit request.
                        let _ = input_tx.send(String::from("exit"));
                        break
                    },
                }
            }
        });

        Debugger {
            sender: prompt_tx,
            receiver: input_rx,
            prompt_pending: false,
            stepping: false,
            shutdown: false,
        }
    }

    /// Runs one iteration of the debug loop: keeps a prompt offered to
    /// the operator, applies any pending command, and steps the CPU when
    /// free-running. Returns true once the operator asks to leave.
    pub fn step(&mut self, machine: &mut Machine) -> bool {
        if !self.prompt_pending {
            let prompt = format!("(0x{:04X}) > ", machine.cpu.regs.pc);
            if self.sender.send(prompt).is_ok() {
                self.prompt_pending = true;
            }
        }

        // Input is received from the prompt thread so the machine can run
        // without the debugger prompt blocking it.
        match self.receiver.try_recv() {
            Ok(input) => {
                self.prompt_pending = false;
                match self.interpret(input.clone()) {
                    Some(command) => {
                        self.execute_command(command, machine);
                    },
                    None => {
                        if input.len() > 0 {
                            writeln!(stderr(), "i8080-rs: unknown command \
                                                specified, try 'help'")
                                .unwrap();
                        }
                    },
                };
            },
            Err(_) => {}, // Ignore empty and disconnect errors.
        };

        if self.shutdown {
            return true
        }

        // If the debugger is free-running, continue execution like
        // normal, otherwise the CPU should not update. In the meantime,
        // sleep the host CPU while we wait for input.
        if self.stepping {
            match machine.step() {
                StepResult::Continue => {},
                StepResult::Pause(PauseReason::Halt) => {
                    self.stepping = false;
                    writeln!(stderr(), "i8080-rs: CPU halted at 0x{:04X}",
                             machine.cpu.regs.pc).unwrap();
                },
                StepResult::Pause(reason) => {
                    report_pause(reason);
                },
                StepResult::Fault(opcode) => {
                    self.stepping = false;
                    writeln!(stderr(), "i8080-rs: CPU faulted on opcode \
                                        {:#04X}", opcode).unwrap();
                },
            }
        } else {
            thread::sleep(Duration::from_millis(16));
        }

        self.shutdown
    }

    /// Parse a raw input string into a list of arguments and a command.
    /// This function also maps command names to their respective enums.
    fn interpret(&self, input: String) -> Option<CommandWithArguments> {
        let mut stderr = stderr();
        let args = match parser::input_to_arguments(input) {
            Ok(args) => args,
            Err(e) => {
                writeln!(stderr, "i8080-rs: {}", e).unwrap();
                return None;
            },
        };

        let command = {
            let raw_command = if args.len() > 0 {
                &args[0]
            } else {
                return None;
            };
            match Debugger::lookup_command(raw_command) {
                Some(command) => command,
                None => return None,
            }
        };

        Some(CommandWithArguments {
            command: command,
            args: args,
        })
    }

    /// Maps a command word to a command, accepting short aliases and any
    /// unambiguous prefix of a full command name. An `x/FMT` word carries
    /// its format specifier along and still selects examine.
    fn lookup_command(raw_command: &str) -> Option<Command> {
        let lowered = raw_command.to_lowercase();
        let name = match lowered.find('/') {
            Some(index) => &lowered[..index],
            None => &lowered[..],
        };

        // Single-letter aliases take priority over prefix matching since
        // several command names share their first letter.
        match name {
            "s" => return Some(Command::Step),
            "c" => return Some(Command::Continue),
            "r" => return Some(Command::Registers),
            "x" => return Some(Command::Examine),
            _ => {},
        }

        let mut matched: Option<Command> = None;
        for &(full_name, command) in COMMAND_NAMES.iter() {
            if full_name.starts_with(name) {
                if matched.is_some() {
                    return None; // Ambiguous prefix.
                }
                matched = Some(command);
            }
        }
        matched
    }

    /// Executes the correct debugger command based on the enum passed.
    fn execute_command(&mut self, command: CommandWithArguments,
                       machine: &mut Machine) {
        match command.command {
            Command::Help => self.execute_help(),
            Command::Exit => self.execute_exit(),
            Command::Stop => self.execute_stop(machine),
            Command::Continue => self.execute_continue(machine),
            Command::Step => self.execute_step(machine, &command.args),
            Command::Registers => self.execute_registers(machine),
            Command::Examine => self.execute_examine(machine, &command.args),
        };
    }

    /// Shows friendly help text for information about using the debugger.
    fn execute_help(&self) {
        writeln!(stderr(), "
Welcome to the i8080-rs debugger!

This subshell provides access to a few different commands that allow you
to observe and control the state of the virtual machine. Commands may be
abbreviated to any unambiguous prefix of their name.

  help             show this message
  step [COUNT]     execute the next COUNT instructions (default 1)
  continue         resume free-running execution
  stop             stop free-running execution
  registers        show the register file, flags and cycle counter
  x/FMT ADDR       examine memory at ADDR (also: examine)
  exit             leave the emulator

FMT is [COUNT][FORMAT][SIZE]: a decimal repeat count (default 8), then x
(hex), d (decimal), o (octal) or t (binary), then b (byte) or w (word).
ADDR is a hex address, or one of pc, sp, bc, de, hl to dump through a
register pair, e.g. `x/16xb 0x2000` or `x/4xw sp`.
"
        ).unwrap();
    }

    /// Stops the virtual machine by setting the shutdown flag.
    fn execute_exit(&mut self) {
        self.shutdown = true;
    }

    /// Stops execution of the CPU to allow the human some time to debug a
    /// problem or stare at hex codes all day to look like a l33t haxor.
    fn execute_stop(&mut self, machine: &mut Machine) {
        log::log("debugger", "Stopping execution now...",
                 &machine.runtime_options);
        self.stepping = false;
    }

    /// Starts execution if it's stopped.
    fn execute_continue(&mut self, machine: &mut Machine) {
        log::log("debugger", "Starting execution now...",
                 &machine.runtime_options);
        self.stepping = true;
    }

    /// Executes the next instruction, or the next COUNT instructions,
    /// tracing each one as it retires.
    fn execute_step(&mut self, machine: &mut Machine, args: &Vec<String>) {
        let count = if args.len() > 1 {
            match args[1].parse::<u32>() {
                Ok(count) if count > 0 => count,
                _ => {
                    writeln!(stderr(), "step: count must be a positive \
                                        number").unwrap();
                    return;
                },
            }
        } else {
            1
        };

        for _ in 0..count {
            match machine.step_traced(true) {
                StepResult::Continue => {},
                StepResult::Pause(PauseReason::Halt) => {
                    writeln!(stderr(), "i8080-rs: CPU halted at 0x{:04X}",
                             machine.cpu.regs.pc).unwrap();
                    break;
                },
                StepResult::Pause(reason) => {
                    report_pause(reason);
                },
                StepResult::Fault(opcode) => {
                    writeln!(stderr(), "i8080-rs: CPU faulted on opcode \
                                        {:#04X}", opcode).unwrap();
                    break;
                },
            }
        }
    }

    /// Dumps the register file, flags, cycle counter and CPU state.
    fn execute_registers(&self, machine: &Machine) {
        println!("{}", machine.cpu);
    }

    /// Allows dumping memory at a specified memory address in a
    /// configurable format. Since instructions have varying lengths, the
    /// dump makes no attempt to decode them; it renders raw bytes or
    /// words and lets the operator line the output up with the trace.
    fn execute_examine(&mut self, machine: &Machine, args: &Vec<String>) {
        const USAGE: &'static str = "Usage: x/FMT ADDR  (e.g. x/16xb 0x2000)";

        let spec = {
            let raw = &args[0];
            match raw.find('/') {
                Some(index) => {
                    match parser::parse_examine_format(&raw[index + 1..]) {
                        Ok(spec) => spec,
                        Err(e) => {
                            writeln!(stderr(), "examine: {}", e).unwrap();
                            writeln!(stderr(), "{}", USAGE).unwrap();
                            return;
                        },
                    }
                },
                None => ExamineSpec::default_spec(),
            }
        };

        let addr = if args.len() > 1 {
            let arg = args[1].to_lowercase();
            match arg.as_str() {
                "pc" => machine.cpu.regs.pc,
                "sp" => machine.cpu.regs.sp,
                "bc" => machine.cpu.regs.pair(RegisterPair::BC),
                "de" => machine.cpu.regs.pair(RegisterPair::DE),
                "hl" => machine.cpu.regs.pair(RegisterPair::HL),
                _ => match parser::parse_address(&arg) {
                    Ok(addr) => addr,
                    Err(e) => {
                        writeln!(stderr(), "examine: {}", e).unwrap();
                        return;
                    },
                },
            }
        } else {
            writeln!(stderr(), "examine: no address specified").unwrap();
            writeln!(stderr(), "{}", USAGE).unwrap();
            return;
        };

        dump_memory(machine, &spec, addr);
    }
}

/// Reports an unsupported peripheral instruction to the operator. The
/// machine has no I/O devices or interrupt controller wired up, so these
/// execute as expensive no-ops.
fn report_pause(reason: PauseReason) {
    match reason.describe() {
        Some(text) => writeln!(stderr(), "i8080-rs: {}", text).unwrap(),
        None => {},
    }
}

/// Prints `spec.count` items of memory starting at `start`, several per
/// line, each line prefixed with the address of its first item.
fn dump_memory(machine: &Machine, spec: &ExamineSpec, start: u16) {
    let per_line = match spec.format {
        DumpFormat::Binary => 4,
        _ => 8,
    };

    let mut addr = start;
    let mut line = String::new();
    let mut items_on_line = 0;

    for _ in 0..spec.count {
        if items_on_line == 0 {
            line.push_str(&format!("0x{:04X}:", addr));
        }

        line.push(' ');
        match spec.size {
            DumpSize::Byte => {
                line.push_str(&format_byte(spec.format,
                                           machine.memory.read_u8(addr)));
                addr = addr.wrapping_add(1);
            },
            DumpSize::Word => {
                line.push_str(&format_word(spec.format,
                                           machine.memory.read_u16(addr)));
                addr = addr.wrapping_add(2);
            },
        }

        items_on_line += 1;
        if items_on_line == per_line {
            println!("{}", line);
            line.clear();
            items_on_line = 0;
        }
    }

    if items_on_line > 0 {
        println!("{}", line);
    }
}

fn format_byte(format: DumpFormat, value: u8) -> String {
    match format {
        DumpFormat::Hex => format!("{:02X}", value),
        DumpFormat::Decimal => format!("{:3}", value),
        DumpFormat::Octal => format!("{:03o}", value),
        DumpFormat::Binary => format!("{:08b}", value),
    }
}

fn format_word(format: DumpFormat, value: u16) -> String {
    match format {
        DumpFormat::Hex => format!("{:04X}", value),
        DumpFormat::Decimal => format!("{:5}", value),
        DumpFormat::Octal => format!("{:06o}", value),
        DumpFormat::Binary => format!("{:016b}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(raw: &str) -> Option<Command> {
        Debugger::lookup_command(raw)
    }

    #[test]
    fn full_names_and_aliases_resolve() {
        assert!(matches!(lookup("help"), Some(Command::Help)));
        assert!(matches!(lookup("registers"), Some(Command::Registers)));
        assert!(matches!(lookup("s"), Some(Command::Step)));
        assert!(matches!(lookup("c"), Some(Command::Continue)));
        assert!(matches!(lookup("r"), Some(Command::Registers)));
        assert!(matches!(lookup("x"), Some(Command::Examine)));
        assert!(matches!(lookup("quit"), Some(Command::Exit)));
    }

    #[test]
    fn unambiguous_prefixes_resolve() {
        assert!(matches!(lookup("reg"), Some(Command::Registers)));
        assert!(matches!(lookup("cont"), Some(Command::Continue)));
        assert!(matches!(lookup("sto"), Some(Command::Stop)));
        assert!(matches!(lookup("h"), Some(Command::Help)));
        assert!(matches!(lookup("q"), Some(Command::Exit)));
        assert!(matches!(lookup("exa"), Some(Command::Examine)));
    }

    #[test]
    fn ambiguous_prefixes_and_unknown_words_do_not_resolve() {
        assert!(lookup("st").is_none()); // stop or step?
        assert!(lookup("e").is_none()); // exit or examine?
        assert!(lookup("bogus").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn examine_keeps_its_format_suffix() {
        assert!(matches!(lookup("x/16xb"), Some(Command::Examine)));
        assert!(matches!(lookup("examine/4dw"), Some(Command::Examine)));
    }

    #[test]
    fn command_words_are_case_insensitive() {
        assert!(matches!(lookup("HELP"), Some(Command::Help)));
        assert!(matches!(lookup("Step"), Some(Command::Step)));
    }

    #[test]
    fn bytes_and_words_format_in_every_base() {
        assert_eq!(format_byte(DumpFormat::Hex, 0xAB), "AB");
        assert_eq!(format_byte(DumpFormat::Decimal, 7), "  7");
        assert_eq!(format_byte(DumpFormat::Octal, 8), "010");
        assert_eq!(format_byte(DumpFormat::Binary, 5), "00000101");

        assert_eq!(format_word(DumpFormat::Hex, 0xBEEF), "BEEF");
        assert_eq!(format_word(DumpFormat::Decimal, 256), "  256");
        assert_eq!(format_word(DumpFormat::Octal, 8), "000010");
        assert_eq!(format_word(DumpFormat::Binary, 3),
                   "0000000000000011");
    }
}

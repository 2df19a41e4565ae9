// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use debugger::debugger::Debugger;
use i8080::cpu::{CPU, PauseReason, State, StepResult};
use i8080::instruction::Instruction;
use i8080::memory::Memory;
use io::errors::*;
use io::log;
use std::io::Write;
use std::io::stderr;

/// The Machine struct owns the CPU and its memory and drives them
/// according to the runtime options. It is the only place where the two
/// meet; everything else borrows them through it.
pub struct Machine {
    pub runtime_options: RuntimeOptions,
    pub cpu: CPU,
    pub memory: Memory,
}

impl Machine {
    /// Initializes the machine by dumping the program image into memory
    /// at address 0x0000 and putting the CPU into its reset state. An
    /// initial program counter from the command line overrides the reset
    /// value.
    pub fn new(image: Vec<u8>, runtime_options: RuntimeOptions) -> Machine {
        log::log("init", format!("Loaded {} byte image at 0x0000",
                                 image.len()), &runtime_options);

        let mut memory = Memory::new();
        memory.memdump(0x0000, &image);

        let mut cpu = CPU::new();
        match runtime_options.program_counter {
            Some(pc) => {
                log::log("init", format!("Starting execution at {:#06X}", pc),
                         &runtime_options);
                cpu.regs.pc = pc;
            },
            None => {},
        }

        Machine {
            runtime_options: runtime_options,
            cpu: cpu,
            memory: memory,
        }
    }

    /// Executes a single instruction, tracing it first when the verbose
    /// flag is set.
    pub fn step(&mut self) -> StepResult {
        let trace = self.runtime_options.verbose;
        self.step_traced(trace)
    }

    /// Executes a single instruction, optionally printing the trace line
    /// regardless of the verbose flag. The debugger uses this so `step`
    /// always shows what just ran.
    pub fn step_traced(&mut self, trace: bool) -> StepResult {
        if trace && self.cpu.state == State::Running {
            let instruction = Instruction::parse(self.cpu.regs.pc,
                                                 &self.memory);
            instruction.log(&self.cpu);
        }
        self.cpu.step(&mut self.memory)
    }

    /// Starts the execution loop and runs until the program halts or the
    /// operator leaves the debugger. Returns the process exit code.
    pub fn run(&mut self) -> i32 {
        if self.runtime_options.debugging {
            return self.run_debugger()
        }

        loop {
            match self.step() {
                StepResult::Continue => {},
                StepResult::Pause(PauseReason::Halt) => {
                    log::log("machine", "CPU halted, shutting down",
                             &self.runtime_options);
                    return EXIT_SUCCESS
                },
                StepResult::Pause(reason) => {
                    // The host's choice for unsupported peripheral
                    // instructions is to note them and keep going.
                    self.log_pause(reason);
                },
                StepResult::Fault(opcode) => {
                    writeln!(stderr(), "i8080-rs: CPU faulted on opcode \
                                        {:#04X}", opcode).unwrap();
                    println!("{}", self.cpu);
                    return EXIT_RUNTIME_FAILURE
                },
            }
        }
    }

    /// Hands control to the interactive debugger, which drives the
    /// machine one iteration at a time until the operator exits.
    fn run_debugger(&mut self) -> i32 {
        let mut debugger = Debugger::new();
        println!("i8080-rs debugger, stopped at 0x{:04X}; type 'help' for \
                  commands", self.cpu.regs.pc);
        loop {
            if debugger.step(self) {
                return EXIT_SUCCESS
            }
        }
    }

    fn log_pause(&self, reason: PauseReason) {
        match reason.describe() {
            Some(text) => log::log("machine", text, &self.runtime_options),
            None => {},
        }
    }
}

/// Flags and other information set through command-line arguments.
#[derive(Clone)]
pub struct RuntimeOptions {
    pub program_counter: Option<u16>,
    pub verbose: bool,
    pub debugging: bool,
}

// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use byteorder::{LittleEndian, ReadBytesExt};
use i8080::alu;
use i8080::cpu::{CPU, PauseReason, State};
use i8080::memory::Memory;
use i8080::opcode::{INSTRUCTION_SET, InstructionDef, Opcode, Operand};
use i8080::registers::RegisterPair;
use i8080::registers::{FLAG_ALL, FLAG_AUX_CARRY, FLAG_CARRY, FLAG_PARITY,
                       FLAG_SIGN, FLAG_ZERO};
use std::io::Cursor;
use std::mem;
use utils::arithmetic::{even_parity, is_negative};

// Flag mask for INR and DCR, which update everything except Carry.
const FLAGS_WITHOUT_CARRY: u8 = FLAG_ZERO | FLAG_SIGN | FLAG_PARITY |
                                FLAG_AUX_CARRY;

/// Outcome of executing one instruction. `NotTaken` marks a conditional
/// branch whose predicate failed, which matters for cycle accounting.
/// `Fault` marks a descriptor whose operand specification did not match
/// its kind, which the literal instruction table makes unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Normal,
    NotTaken,
    Pause(PauseReason),
    Fault,
}

/// All 8080 instructions are a maximum size of 3 bytes. The first byte is
/// the opcode which determines the action of the instruction. The
/// following bytes, present or not depending on the opcode, hold an
/// immediate data byte or a little-endian address word.
#[derive(Debug)]
pub struct Instruction(pub u8, pub u8, pub u8);

impl Instruction {
    /// Parses an instruction from memory at the address of the passed
    /// program counter. The operand bytes are captured here, relative to
    /// the opcode address, so handlers never have to recover them from an
    /// already-advanced program counter.
    pub fn parse(pc: u16, memory: &Memory) -> Instruction {
        let opcode = memory.read_u8(pc);
        let def = &INSTRUCTION_SET[opcode as usize];

        match def.bytes {
            1 => Instruction(opcode, 0, 0),
            2 => Instruction(opcode, memory.read_u8(pc.wrapping_add(1)), 0),
            _ => Instruction(opcode, memory.read_u8(pc.wrapping_add(1)),
                             memory.read_u8(pc.wrapping_add(2))),
        }
    }

    /// The raw opcode byte.
    #[inline(always)]
    pub fn raw_opcode(&self) -> u8 {
        self.0
    }

    /// The descriptor for this instruction's opcode.
    #[inline(always)]
    pub fn def(&self) -> &'static InstructionDef {
        &INSTRUCTION_SET[self.0 as usize]
    }

    /// The immediate data byte following the opcode.
    #[inline(always)]
    fn imm8(&self) -> u8 {
        self.1
    }

    /// The immediate word following the opcode, stored little-endian in
    /// the instruction stream.
    #[inline(always)]
    fn imm16(&self) -> u16 {
        let mut reader = Cursor::new(vec![self.1, self.2]);
        reader.read_u16::<LittleEndian>().unwrap()
    }

    /// Executes the instruction against the CPU and memory. The program
    /// counter has already been advanced past the instruction; control
    /// transfers overwrite it wholesale.
    pub fn execute(&self, cpu: &mut CPU, memory: &mut Memory) -> Execution {
        let def = self.def();

        match def.kind {
            Opcode::Nop => Execution::Normal,

            // Data movement.
            Opcode::Mov => match def.operand {
                Operand::RegReg(dst, src) => {
                    let value = cpu.read_register(src, memory);
                    cpu.write_register(dst, memory, value);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Mvi => match def.operand {
                Operand::Reg(reg) => {
                    let value = self.imm8();
                    cpu.write_register(reg, memory, value);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Lxi => match def.operand {
                Operand::RegPair(pair) => {
                    cpu.regs.set_pair(pair, self.imm16());
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Lda => {
                cpu.regs.a = memory.read_u8(self.imm16());
                Execution::Normal
            },
            Opcode::Sta => {
                memory.write_u8(self.imm16(), cpu.regs.a);
                Execution::Normal
            },
            Opcode::Lhld => {
                let addr = self.imm16();
                cpu.regs.l = memory.read_u8(addr);
                cpu.regs.h = memory.read_u8(addr.wrapping_add(1));
                Execution::Normal
            },
            Opcode::Shld => {
                let addr = self.imm16();
                memory.write_u8(addr, cpu.regs.l);
                memory.write_u8(addr.wrapping_add(1), cpu.regs.h);
                Execution::Normal
            },
            Opcode::Ldax => match def.operand {
                Operand::RegPair(pair) => {
                    cpu.regs.a = memory.read_u8(cpu.regs.pair(pair));
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Stax => match def.operand {
                Operand::RegPair(pair) => {
                    let addr = cpu.regs.pair(pair);
                    memory.write_u8(addr, cpu.regs.a);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Xchg => {
                mem::swap(&mut cpu.regs.d, &mut cpu.regs.h);
                mem::swap(&mut cpu.regs.e, &mut cpu.regs.l);
                Execution::Normal
            },
            Opcode::Xthl => {
                let sp = cpu.regs.sp;
                let low = cpu.regs.l;
                cpu.regs.l = memory.read_u8(sp);
                memory.write_u8(sp, low);

                let high_addr = sp.wrapping_add(1);
                let high = cpu.regs.h;
                cpu.regs.h = memory.read_u8(high_addr);
                memory.write_u8(high_addr, high);
                Execution::Normal
            },
            Opcode::Sphl => {
                cpu.regs.sp = cpu.regs.pair(RegisterPair::HL);
                Execution::Normal
            },
            Opcode::Pchl => {
                cpu.regs.pc = cpu.regs.pair(RegisterPair::HL);
                Execution::Normal
            },

            // 8-bit arithmetic and logic against the accumulator. The
            // register forms read their operand through the descriptor;
            // the immediate forms read the byte after the opcode.
            Opcode::Add | Opcode::Adc | Opcode::Sub | Opcode::Sbb |
            Opcode::Ana | Opcode::Xra | Opcode::Ora | Opcode::Cmp => {
                match def.operand {
                    Operand::Reg(reg) => {
                        let operand = cpu.read_register(reg, memory);
                        self.execute_accumulator_op(cpu, operand);
                        Execution::Normal
                    },
                    _ => Execution::Fault,
                }
            },
            Opcode::Adi | Opcode::Aci | Opcode::Sui | Opcode::Sbi |
            Opcode::Ani | Opcode::Xri | Opcode::Ori | Opcode::Cpi => {
                let operand = self.imm8();
                self.execute_accumulator_op(cpu, operand);
                Execution::Normal
            },

            Opcode::Inr | Opcode::Dcr => match def.operand {
                Operand::Reg(reg) => {
                    let mut value = cpu.read_register(reg, memory);
                    if def.kind == Opcode::Inr {
                        alu::adder(&mut cpu.regs.f, &mut value, 1, false,
                                   FLAGS_WITHOUT_CARRY);
                    } else {
                        alu::subtract(&mut cpu.regs.f, &mut value, 1, false,
                                      FLAGS_WITHOUT_CARRY);
                    }
                    cpu.write_register(reg, memory, value);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Inx | Opcode::Dcx => match def.operand {
                Operand::RegPair(pair) => {
                    let value = cpu.regs.pair(pair);
                    let value = if def.kind == Opcode::Inx {
                        value.wrapping_add(1)
                    } else {
                        value.wrapping_sub(1)
                    };
                    cpu.regs.set_pair(pair, value);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Dad => match def.operand {
                Operand::RegPair(pair) => {
                    let sum = cpu.regs.pair(RegisterPair::HL) as u32 +
                              cpu.regs.pair(pair) as u32;
                    cpu.regs.set_pair(RegisterPair::HL, sum as u16);
                    cpu.regs.set_flag(FLAG_CARRY, sum > 0xFFFF);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Daa => {
                self.execute_daa(cpu);
                Execution::Normal
            },
            Opcode::Cma => {
                cpu.regs.a = !cpu.regs.a;
                Execution::Normal
            },
            Opcode::Cmc => {
                cpu.regs.toggle_flag(FLAG_CARRY);
                Execution::Normal
            },
            Opcode::Stc => {
                cpu.regs.set_flag(FLAG_CARRY, true);
                Execution::Normal
            },

            // Rotates only ever touch the Carry flag.
            Opcode::Rlc => {
                let high = cpu.regs.a >> 7;
                cpu.regs.a = cpu.regs.a << 1 | high;
                cpu.regs.set_flag(FLAG_CARRY, high != 0);
                Execution::Normal
            },
            Opcode::Rrc => {
                let low = cpu.regs.a & 1;
                cpu.regs.a = cpu.regs.a >> 1 | low << 7;
                cpu.regs.set_flag(FLAG_CARRY, low != 0);
                Execution::Normal
            },
            Opcode::Ral => {
                let high = cpu.regs.a >> 7;
                cpu.regs.a = cpu.regs.a << 1 |
                             cpu.regs.flag(FLAG_CARRY) as u8;
                cpu.regs.set_flag(FLAG_CARRY, high != 0);
                Execution::Normal
            },
            Opcode::Rar => {
                let low = cpu.regs.a & 1;
                cpu.regs.a = (cpu.regs.flag(FLAG_CARRY) as u8) << 7 |
                             cpu.regs.a >> 1;
                cpu.regs.set_flag(FLAG_CARRY, low != 0);
                Execution::Normal
            },

            // Stack operations.
            Opcode::Push => match def.operand {
                Operand::RegPair(pair) => {
                    let value = cpu.regs.pair(pair);
                    cpu.stack_push(memory, value);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },
            Opcode::Pop => match def.operand {
                Operand::RegPair(pair) => {
                    let value = cpu.stack_pop(memory);
                    cpu.regs.set_pair(pair, value);
                    Execution::Normal
                },
                _ => Execution::Fault,
            },

            // Control transfers. The conditional forms share predicate
            // evaluation and fall through to the next instruction when
            // the predicate fails.
            Opcode::Jmp => {
                cpu.regs.pc = self.imm16();
                Execution::Normal
            },
            Opcode::Jnz | Opcode::Jz | Opcode::Jnc | Opcode::Jc |
            Opcode::Jpo | Opcode::Jpe | Opcode::Jp | Opcode::Jm => {
                if self.condition_met(cpu) {
                    cpu.regs.pc = self.imm16();
                    Execution::Normal
                } else {
                    Execution::NotTaken
                }
            },
            Opcode::Call => {
                self.execute_call(cpu, memory);
                Execution::Normal
            },
            Opcode::Cnz | Opcode::Cz | Opcode::Cnc | Opcode::Cc |
            Opcode::Cpo | Opcode::Cpe | Opcode::Cp | Opcode::Cm => {
                if self.condition_met(cpu) {
                    self.execute_call(cpu, memory);
                    Execution::Normal
                } else {
                    Execution::NotTaken
                }
            },
            Opcode::Ret => {
                cpu.regs.pc = cpu.stack_pop(memory);
                Execution::Normal
            },
            Opcode::Rnz | Opcode::Rz | Opcode::Rnc | Opcode::Rc |
            Opcode::Rpo | Opcode::Rpe | Opcode::Rp | Opcode::Rm => {
                if self.condition_met(cpu) {
                    cpu.regs.pc = cpu.stack_pop(memory);
                    Execution::Normal
                } else {
                    Execution::NotTaken
                }
            },
            Opcode::Rst => {
                // The vector number lives in bits 5:3 of the opcode and
                // selects one of the eight addresses 0x00, 0x08, .. 0x38.
                let vector = (self.0 >> 3 & 7) as u16 * 8;
                let ret = cpu.regs.pc;
                cpu.stack_push(memory, ret);
                cpu.regs.pc = vector;
                Execution::Normal
            },

            // Recognized opcodes whose effects need hardware this machine
            // does not emulate. Lengths and cycles are still accounted;
            // the host decides whether to resume.
            Opcode::Hlt => {
                // The halted CPU stays parked on the HLT opcode, since
                // only an interrupt could move it past.
                cpu.regs.pc = cpu.regs.pc.wrapping_sub(1);
                cpu.state = State::Halted;
                Execution::Pause(PauseReason::Halt)
            },
            Opcode::In => Execution::Pause(PauseReason::Input(self.imm8())),
            Opcode::Out => Execution::Pause(PauseReason::Output(self.imm8())),
            Opcode::Ei => Execution::Pause(PauseReason::EnableInterrupts),
            Opcode::Di => Execution::Pause(PauseReason::DisableInterrupts),
        }
    }

    /// Runs one of the eight accumulator operations against the resolved
    /// operand byte. ADC and SBB fold the Carry flag into a single ALU
    /// operation so the flags come out of the combined result.
    fn execute_accumulator_op(&self, cpu: &mut CPU, operand: u8) {
        let carry = cpu.regs.flag(FLAG_CARRY);
        let regs = &mut cpu.regs;

        match self.def().kind {
            Opcode::Add | Opcode::Adi => {
                alu::adder(&mut regs.f, &mut regs.a, operand, false, FLAG_ALL);
            },
            Opcode::Adc | Opcode::Aci => {
                alu::adder(&mut regs.f, &mut regs.a, operand, carry, FLAG_ALL);
            },
            Opcode::Sub | Opcode::Sui => {
                alu::subtract(&mut regs.f, &mut regs.a, operand, false,
                              FLAG_ALL);
            },
            Opcode::Sbb | Opcode::Sbi => {
                alu::subtract(&mut regs.f, &mut regs.a, operand, carry,
                              FLAG_ALL);
            },
            Opcode::Ana | Opcode::Ani => {
                alu::logical_and(&mut regs.f, &mut regs.a, operand, FLAG_ALL);
            },
            Opcode::Xra | Opcode::Xri => {
                alu::logical_xor(&mut regs.f, &mut regs.a, operand, FLAG_ALL);
            },
            Opcode::Ora | Opcode::Ori => {
                alu::logical_or(&mut regs.f, &mut regs.a, operand, FLAG_ALL);
            },
            Opcode::Cmp | Opcode::Cpi => {
                // The comparison subtracts into a scratch copy; only the
                // flags survive.
                let mut scratch = regs.a;
                alu::subtract(&mut regs.f, &mut scratch, operand, false,
                              FLAG_ALL);
            },
            _ => {},
        }
    }

    /// Decimal adjust: two conditional additions fix up each BCD nibble
    /// of the accumulator. The adjustment can set Carry but never clears
    /// one recorded before it, Auxiliary Carry comes from the low-nibble
    /// step alone, and S/Z/P end up reflecting the final accumulator.
    fn execute_daa(&self, cpu: &mut CPU) {
        let had_carry = cpu.regs.flag(FLAG_CARRY);
        if cpu.regs.a & 0x0F > 9 || cpu.regs.flag(FLAG_AUX_CARRY) {
            let regs = &mut cpu.regs;
            alu::adder(&mut regs.f, &mut regs.a, 0x06, false, FLAG_ALL);
        }
        if had_carry {
            cpu.regs.set_flag(FLAG_CARRY, true);
        }

        let had_carry = cpu.regs.flag(FLAG_CARRY);
        if cpu.regs.a >> 4 > 9 || had_carry {
            let regs = &mut cpu.regs;
            alu::adder(&mut regs.f, &mut regs.a, 0x60, false,
                       FLAG_CARRY | FLAG_ZERO | FLAG_SIGN | FLAG_PARITY);
        }
        if had_carry {
            cpu.regs.set_flag(FLAG_CARRY, true);
        }

        let result = cpu.regs.a;
        cpu.regs.set_flag(FLAG_ZERO, result == 0);
        cpu.regs.set_flag(FLAG_SIGN, is_negative(result));
        cpu.regs.set_flag(FLAG_PARITY, even_parity(result));
    }

    /// Pushes the return address (the already-advanced PC) and transfers
    /// control to the immediate address.
    fn execute_call(&self, cpu: &mut CPU, memory: &mut Memory) {
        let ret = cpu.regs.pc;
        cpu.stack_push(memory, ret);
        cpu.regs.pc = self.imm16();
    }

    /// Evaluates the branch predicate of a conditional jump, call or
    /// return against the flag register.
    fn condition_met(&self, cpu: &CPU) -> bool {
        let regs = &cpu.regs;

        match self.def().kind {
            Opcode::Jnz | Opcode::Cnz | Opcode::Rnz => !regs.flag(FLAG_ZERO),
            Opcode::Jz | Opcode::Cz | Opcode::Rz => regs.flag(FLAG_ZERO),
            Opcode::Jnc | Opcode::Cnc | Opcode::Rnc => !regs.flag(FLAG_CARRY),
            Opcode::Jc | Opcode::Cc | Opcode::Rc => regs.flag(FLAG_CARRY),
            Opcode::Jpo | Opcode::Cpo | Opcode::Rpo => !regs.flag(FLAG_PARITY),
            Opcode::Jpe | Opcode::Cpe | Opcode::Rpe => regs.flag(FLAG_PARITY),
            Opcode::Jp | Opcode::Cp | Opcode::Rp => !regs.flag(FLAG_SIGN),
            Opcode::Jm | Opcode::Cm | Opcode::Rm => regs.flag(FLAG_SIGN),
            _ => true,
        }
    }

    /// Renders the instruction as assembly text for trace output.
    pub fn disassemble(&self) -> String {
        let def = self.def();
        let mnemonic = def.kind.mnemonic();

        if def.kind == Opcode::Rst {
            return format!("{} {}", mnemonic, self.0 >> 3 & 7);
        }

        match def.operand {
            Operand::None => match def.bytes {
                2 => format!("{} 0x{:02X}", mnemonic, self.imm8()),
                3 => format!("{} 0x{:04X}", mnemonic, self.imm16()),
                _ => mnemonic.to_string(),
            },
            Operand::Reg(reg) => {
                if def.bytes == 2 {
                    format!("{} {:?},0x{:02X}", mnemonic, reg, self.imm8())
                } else {
                    format!("{} {:?}", mnemonic, reg)
                }
            },
            Operand::RegReg(dst, src) => {
                format!("{} {:?},{:?}", mnemonic, dst, src)
            },
            Operand::RegPair(pair) => {
                if def.bytes == 3 {
                    format!("{} {:?},0x{:04X}", mnemonic, pair, self.imm16())
                } else {
                    format!("{} {:?}", mnemonic, pair)
                }
            },
        }
    }

    /// Logs a human-readable representation of the instruction along with
    /// the CPU state in an easy to parse format. Must be called before
    /// the program counter advances past the instruction.
    pub fn log(&self, cpu: &CPU) {
        // Bytes that do not exist in the instruction are not displayed
        // rather than showing the default struct value 0.
        let instr_str = match self.def().bytes {
            1 => format!("{:02X}      ", self.0),
            2 => format!("{:02X} {:02X}   ", self.0, self.1),
            _ => format!("{:02X} {:02X} {:02X}", self.0, self.1, self.2),
        };

        println!("{:04X}  {}  {:14}  A:{:02X} F:{:02X} B:{:02X} C:{:02X} \
                  D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} CYC:{}",
                 cpu.regs.pc, instr_str, self.disassemble(), cpu.regs.a,
                 cpu.regs.f, cpu.regs.b, cpu.regs.c, cpu.regs.d, cpu.regs.e,
                 cpu.regs.h, cpu.regs.l, cpu.regs.sp, cpu.cycles);
    }
}

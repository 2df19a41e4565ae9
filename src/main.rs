// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[macro_use] extern crate enum_primitive;
extern crate byteorder;
extern crate chrono;
extern crate getopts;
extern crate num;
extern crate rustyline;

mod debugger;
mod i8080;
mod io;
mod utils;

use getopts::Options;
use i8080::machine::Machine;
use i8080::machine::RuntimeOptions;
use io::errors::*;
use std::env;
use std::io::Write;

/// Prints the application name alongside the cargo version.
fn print_version() {
    println!("i8080-rs {}", env!("CARGO_PKG_VERSION"));
}

/// Prints usage information with an optional reason.
fn print_usage(opts: Options, reason: Option<&str>) {
    let mut stderr = std::io::stderr();
    match reason {
        Some(r) => {
            writeln!(stderr, "{}", r).unwrap();
        },
        None => {}
    }
    writeln!(stderr, "i8080-rs is an Intel 8080 emulator and machine-level \
                      debugger written in Rust.").unwrap();
    writeln!(stderr, "").unwrap();
    writeln!(stderr, "{}", opts.usage("Usage: i8080-rs [OPTION]... [FILE]")).unwrap();
    writeln!(stderr, "FILE is a raw binary image of 8080 machine code, \
                      loaded at address 0x0000.").unwrap();
}

/// Initializes and starts the emulator. Returns an exit code after which
/// the program unwinds and stops executing. Once the emulator starts
/// executing, the application should only stop due to a halt, a fault, or
/// the operator leaving the debugger.
fn init() -> i32 {
    // Collect the argument from the environment (command-line arguments).
    let args: Vec<String> = env::args().collect();

    // Initialize the argument parser and parse the args with getopts using
    // the rules defined against the option object.
    let mut opts = Options::new();
    opts.optopt("p", "program-counter", "set the initial program counter to a specified address", "[HEX]");
    opts.optflag("v", "verbose", "display machine and instruction trace information");
    opts.optflag("", "version", "print version information");
    opts.optflag("h", "help", "print this message");
    opts.optflag("d", "debug", "start the interactive debugger");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            println!("{}", f.to_string());
            print_usage(opts, None);
            return EXIT_FAILURE
        },
    };

    // Handle flag based arguments.
    if matches.opt_present("version") {
        print_version();
        return EXIT_SUCCESS
    }
    if matches.opt_present("help") {
        print_usage(opts, None);
        return EXIT_SUCCESS
    }

    // Get the image filename from the first free argument and read the
    // image into memory (vector of bytes). The image is a required
    // argument.
    let image_file_name = if !matches.free.is_empty() {
        matches.free[0].clone()
    } else {
        print_usage(opts, Some("i8080-rs: no image passed, cannot start emulation"));
        return EXIT_FAILURE
    };
    let image = match io::binutils::read_bin(&image_file_name) {
        Ok(image) => image,
        Err(e) => {
            let mut stderr = std::io::stderr();
            writeln!(stderr, "i8080-rs: cannot open {}: {}", image_file_name, e).unwrap();
            return e.raw_os_error().unwrap_or(EXIT_FAILURE)
        }
    };

    // Reject images the address space cannot hold before touching the
    // machine.
    match io::binutils::validate_image(&image) {
        Ok(()) => {},
        Err(e) => {
            let mut stderr = std::io::stderr();
            writeln!(stderr, "i8080-rs: cannot load {}: {}", image_file_name, e).unwrap();
            return EXIT_INVALID_IMAGE
        }
    }

    // Parse the program counter argument if specified which will then be
    // passed to the CPU later on.
    //
    // The first 2 characters in the hex string are to be skipped if
    // they're "0x" as users are likely to insert this when inputting
    // hexadecimal numbers. Otherwise just convert the hex string to a
    // 16-bit unsigned integer as-is.
    let program_counter = match matches.opt_str("program-counter") {
        Some(arg) => {
            let hex = if arg.len() >= 2 && &arg[0..2] == "0x" {
                &arg[2..]
            } else {
                arg.as_str()
            };
            match u16::from_str_radix(hex, 16) {
                Ok(pc) => Some(pc),
                Err(e) => {
                    let mut stderr = std::io::stderr();
                    writeln!(stderr, "i8080-rs: cannot parse program counter: {}", e).unwrap();
                    return EXIT_INVALID_PC;
                },
            }
        },
        None => None,
    };

    // Initialize the machine with the loaded image and start executing.
    // The run function returns when the program halts, the CPU faults, or
    // the operator exits the debugger.
    let runtime_options = RuntimeOptions {
        program_counter: program_counter,
        verbose:         matches.opt_present("verbose"),
        debugging:       matches.opt_present("debug"),
    };
    let mut machine = Machine::new(image, runtime_options);
    machine.run()
}

/// Entry point of the program and wrapper of init. Takes the exit code
/// returned from init and exits with it.
fn main() {
    // std::process::exit requires a signed 32 bit integer, however POSIX
    // systems cannot have an exit code greater than 8 bits so that is what
    // the init function returns.
    let exit_code = init();
    std::process::exit(exit_code); // Unwinding done, safe to exit.
}

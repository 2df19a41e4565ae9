// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// How the examine command renders each item it dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    Hex,
    Decimal,
    Octal,
    Binary,
}

/// How many bytes of memory make up one dumped item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpSize {
    Byte,
    Word,
}

/// A parsed examine format: repeat count, item rendering, and item size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamineSpec {
    pub count: u16,
    pub format: DumpFormat,
    pub size: DumpSize,
}

impl ExamineSpec {
    /// The format used when the operator gives no FMT string: eight hex
    /// bytes.
    pub fn default_spec() -> ExamineSpec {
        ExamineSpec {
            count: 8,
            format: DumpFormat::Hex,
            size: DumpSize::Byte,
        }
    }
}

/// Converts raw command-line input into a list of separate arguments. The
/// vector of strings returned can be inspected further by each command's
/// own argument handling.
pub fn input_to_arguments(input: String) -> Result<Vec<String>, &'static str> {
    let mut args: Vec<String> = Vec::new();
    let mut start: usize = 0;
    let mut end: usize = 0;
    let mut last_was_whitespace = false;

    for c in input.chars() {
        let charlen = c.to_string().len();

        if is_whitespace(c) {
            if !last_was_whitespace && start != end {
                args.push(String::from(&input[start..end]));
            }

            end += charlen;
            start = end;
            last_was_whitespace = true;
        } else {
            end += charlen;
            last_was_whitespace = false;
        }
    }

    if start != end {
        args.push(String::from(&input[start..end]));
    }

    Ok(args)
}

/// Parses the FMT portion of an examine command (`x/FMT ADDR`). FMT is
/// `[COUNT][FORMAT][SIZE]` in any order after the count: COUNT is a
/// decimal repeat count (default 8), FORMAT is `x` hex, `d` decimal, `o`
/// octal or `t` binary (default hex), and SIZE is `b` byte or `w` word
/// (default byte). An empty FMT yields the defaults.
pub fn parse_examine_format(fmt: &str) -> Result<ExamineSpec, String> {
    let mut spec = ExamineSpec::default_spec();
    let mut count: u16 = 0;
    let mut have_count = false;

    for c in fmt.chars() {
        match c {
            '0'..='9' => {
                let digit = c as u16 - '0' as u16;
                count = match count.checked_mul(10)
                                   .and_then(|c| c.checked_add(digit)) {
                    Some(c) => c,
                    None => return Err(String::from("repeat count is too large")),
                };
                have_count = true;
            },
            'x' => spec.format = DumpFormat::Hex,
            'd' => spec.format = DumpFormat::Decimal,
            'o' => spec.format = DumpFormat::Octal,
            't' => spec.format = DumpFormat::Binary,
            'b' => spec.size = DumpSize::Byte,
            'w' => spec.size = DumpSize::Word,
            _ => return Err(format!("unknown format character '{}'", c)),
        }
    }

    if have_count {
        if count == 0 {
            return Err(String::from("repeat count must be positive"));
        }
        spec.count = count;
    }
    Ok(spec)
}

/// Parses a memory address written in hex, with or without a leading
/// "0x", as users are likely to write either.
pub fn parse_address(arg: &str) -> Result<u16, String> {
    let hex = if arg.len() >= 2 && &arg[0..2] == "0x" {
        &arg[2..]
    } else {
        arg
    };

    match u16::from_str_radix(hex, 16) {
        Ok(addr) => Ok(addr),
        Err(e) => Err(format!("cannot parse address '{}': {}", arg, e)),
    }
}

/// Returns true if the character passed is a whitespace character. Both
/// spaces and tabs are considered whitespace characters.
fn is_whitespace(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_splits_on_runs_of_whitespace() {
        let args = input_to_arguments(String::from("x/16x   0x10\tfoo"))
            .unwrap();
        assert_eq!(args, vec!["x/16x", "0x10", "foo"]);
    }

    #[test]
    fn input_ignores_leading_and_trailing_whitespace() {
        let args = input_to_arguments(String::from("  step 5  ")).unwrap();
        assert_eq!(args, vec!["step", "5"]);
        assert!(input_to_arguments(String::from("   ")).unwrap().is_empty());
        assert!(input_to_arguments(String::new()).unwrap().is_empty());
    }

    #[test]
    fn empty_format_yields_the_defaults() {
        let spec = parse_examine_format("").unwrap();
        assert_eq!(spec, ExamineSpec::default_spec());
    }

    #[test]
    fn format_parses_count_format_and_size() {
        let spec = parse_examine_format("16xb").unwrap();
        assert_eq!(spec.count, 16);
        assert_eq!(spec.format, DumpFormat::Hex);
        assert_eq!(spec.size, DumpSize::Byte);

        let spec = parse_examine_format("4dw").unwrap();
        assert_eq!(spec.count, 4);
        assert_eq!(spec.format, DumpFormat::Decimal);
        assert_eq!(spec.size, DumpSize::Word);

        let spec = parse_examine_format("t").unwrap();
        assert_eq!(spec.count, 8);
        assert_eq!(spec.format, DumpFormat::Binary);
    }

    #[test]
    fn format_rejects_garbage() {
        assert!(parse_examine_format("16q").is_err());
        assert!(parse_examine_format("0x").is_err());
        assert!(parse_examine_format("99999").is_err());
    }

    #[test]
    fn addresses_parse_with_and_without_the_prefix() {
        assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_address("1234").unwrap(), 0x1234);
        assert_eq!(parse_address("ffff").unwrap(), 0xFFFF);
        assert!(parse_address("wat").is_err());
        assert!(parse_address("10000").is_err());
    }
}

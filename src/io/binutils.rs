// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use i8080::memory::MEMORY_SIZE;
use std::fs::File;
use std::io::Error;
use std::io::Read;
use std::path::Path;
use std::result::Result;

/// Reads a binary file at a given path and stores it in a vector of bytes.
pub fn read_bin<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, Error> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut file = File::open(path)?;
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Validates a program image before it gets dumped into memory.
///
/// Images are headerless blobs of 8080 machine code that execute from
/// address 0x0000, so the only structural requirements are that there is
/// something to execute and that the image fits inside the 64 KiB address
/// space.
pub fn validate_image(image: &[u8]) -> Result<(), &'static str> {
    if image.is_empty() {
        return Err("image is empty, nothing to execute")
    }
    if image.len() > MEMORY_SIZE {
        return Err("image is larger than the 64 KiB address space")
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_up_to_the_address_space_size_validate() {
        assert!(validate_image(&[0x76]).is_ok());
        assert!(validate_image(&vec![0; MEMORY_SIZE]).is_ok());
    }

    #[test]
    fn empty_and_oversize_images_are_rejected() {
        assert!(validate_image(&[]).is_err());
        assert!(validate_image(&vec![0; MEMORY_SIZE + 1]).is_err());
    }
}

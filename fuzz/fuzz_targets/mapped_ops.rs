//! Fuzz target for a memory-mapped backing segment.
//!
//! Writes and reads arbitrary chunk sizes through a tiny memory tier so nearly
//! every byte passes through the mapping, wrapping around it repeatedly.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spillbuf::{BufferCoordinator, BufferError, ReadTimeout};
use std::collections::VecDeque;
use tempfile::TempDir;

#[derive(Debug, Arbitrary)]
struct MappedInput {
    backing_capacity: u8,
    steps: Vec<(u16, u8, u8)>,
}

fuzz_target!(|input: MappedInput| {
    let temp_dir = match TempDir::new() {
        Ok(d) => d,
        Err(_) => return,
    };
    let path = temp_dir.path().join("fuzz.map");

    let backing = input.backing_capacity as usize + 1;
    let buffer = match BufferCoordinator::create_mapped(&path, 1, backing) {
        Ok(b) => b,
        Err(_) => return,
    };

    let mut model: VecDeque<u8> = VecDeque::new();
    let mut counter = 0u8;

    for (write_len, pattern, read_len) in input.steps.into_iter().take(128) {
        let data: Vec<u8> = (0..write_len % 512)
            .map(|_| {
                counter = counter.wrapping_add(1);
                counter ^ pattern
            })
            .collect();

        match buffer.write(&data) {
            Ok(()) => model.extend(&data),
            Err(BufferError::Overflow { committed, .. }) => model.extend(&data[..committed]),
            Err(e) => panic!("unexpected write error: {}", e),
        }

        let mut out = vec![0u8; read_len as usize];
        let n = buffer
            .read(&mut out, ReadTimeout::NoWait)
            .expect("mapped read failed");
        let expected: Vec<u8> = model.drain(..n).collect();
        assert_eq!(&out[..n], expected.as_slice());
    }

    assert_eq!(buffer.available(), model.len());
    let _ = buffer.teardown();
});

//! Fuzz target for BufferCoordinator operation sequences.
//!
//! Tests:
//! - FIFO order across the memory/backing boundary and migration
//! - Overflow commits exactly the bytes that fit
//! - Finished/cancelled state transitions and the errors they produce
//! - Tier accounting never exceeds capacity

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spillbuf::{BufferCoordinator, BufferError, ReadTimeout};
use std::collections::VecDeque;
use std::io::Cursor;

#[derive(Debug, Arbitrary)]
struct OpsInput {
    memory_capacity: u8,
    backing_capacity: u8,
    operations: Vec<Op>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Write { data: Vec<u8> },
    Read { len: u8 },
    FinishWrite,
    Cancel,
}

fuzz_target!(|input: OpsInput| {
    let memory = input.memory_capacity as usize + 1;
    let backing = input.backing_capacity as usize + 1;

    let buffer = match BufferCoordinator::new(memory, backing, Cursor::new(Vec::new())) {
        Ok(b) => b,
        Err(_) => return,
    };

    let mut model: VecDeque<u8> = VecDeque::new();
    let mut finished = false;
    let mut cancelled = false;

    for op in input.operations.into_iter().take(256) {
        match op {
            Op::Write { data } => {
                let free = memory + backing - model.len();
                let result = buffer.write(&data);
                if cancelled {
                    assert!(matches!(result, Err(BufferError::Cancelled)));
                } else if finished {
                    assert!(matches!(result, Err(BufferError::Finished)));
                } else if data.len() <= free {
                    assert!(result.is_ok());
                    model.extend(&data);
                } else {
                    match result {
                        Err(BufferError::Overflow {
                            committed,
                            requested,
                        }) => {
                            assert_eq!(committed, free);
                            assert_eq!(requested, data.len());
                            model.extend(&data[..committed]);
                        }
                        other => panic!("expected overflow, got {:?}", other),
                    }
                }
            }
            Op::Read { len } => {
                let mut out = vec![0u8; len as usize];
                let result = buffer.read(&mut out, ReadTimeout::NoWait);
                if cancelled {
                    assert!(matches!(result, Err(BufferError::Cancelled)));
                    continue;
                }
                let n = result.expect("read failed on an in-memory segment");
                assert_eq!(n, out.len().min(model.len()));
                let expected: Vec<u8> = model.drain(..n).collect();
                assert_eq!(&out[..n], expected.as_slice());
            }
            Op::FinishWrite => {
                buffer.finish_write();
                finished = true;
            }
            Op::Cancel => {
                buffer.cancel();
                cancelled = true;
            }
        }

        let stats = buffer.stats();
        assert_eq!(stats.available(), model.len());
        assert!(stats.memory_used <= memory);
        assert!(stats.backing_used <= backing);
        // migration keeps the memory tier occupied while backing holds data
        if stats.backing_used > 0 {
            assert!(stats.memory_used > 0);
        }
    }

    let _ = buffer.teardown();
});

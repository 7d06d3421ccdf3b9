//! Pipelined bus traffic against the delayed memory model.

use satasim_conformance::{bus_read, bus_write, HarnessError};
use satasim_mem::{BusConfig, BusMemory, BusRequest};

fn memory(delay: u32, stall_one_in: u32, words_per_beat: u32) -> BusMemory {
    BusMemory::new(&BusConfig {
        words: 4096,
        delay,
        stall_one_in,
        seed: Some(7),
        words_per_beat,
    })
    .unwrap()
}

#[test]
fn every_delay_acks_after_exactly_that_many_steps() {
    for delay in 1..=12 {
        let mut mem = memory(delay, 0, 1);
        mem.set_word(3, 0xA5A5_0000 | delay);
        let mut out = [0u32];
        let read = BusRequest {
            cyc: true,
            stb: true,
            addr: 3,
            ..BusRequest::default()
        };
        let idle = BusRequest {
            cyc: true,
            ..BusRequest::default()
        };
        assert!(!mem.apply(&read, &mut out).ack);
        for step in 1..delay {
            assert!(!mem.apply(&idle, &mut out).ack, "delay {delay}: early ack at {step}");
        }
        assert!(mem.apply(&idle, &mut out).ack, "delay {delay}: missing ack");
        assert_eq!(out[0], 0xA5A5_0000 | delay);
    }
}

#[test]
fn streamed_writes_read_back_with_stalls() {
    let mut mem = memory(5, 4, 1);
    let data: Vec<u32> = (0..256u32).map(|i| i.wrapping_mul(0x0102_0304)).collect();

    let steps = bus_write(&mut mem, 100, &data, 10_000).unwrap();
    assert!(steps > data.len() + 5, "a 1-in-4 stall rate should cost extra steps");
    for (i, &w) in data.iter().enumerate() {
        assert_eq!(mem.word(100 + i), w);
    }

    let read = bus_read(&mut mem, 100, data.len(), 10_000).unwrap();
    assert_eq!(read, data);
}

#[test]
fn stall_free_stream_takes_length_plus_delay() {
    let mut mem = memory(4, 0, 1);
    let data = vec![1u32; 32];
    assert_eq!(bus_write(&mut mem, 0, &data, 1000).unwrap(), 32 + 4);
}

#[test]
fn wide_beats_round_trip() {
    let mut mem = memory(3, 8, 4);
    let data: Vec<u32> = (0..64u32).map(|i| !i).collect();
    bus_write(&mut mem, 10, &data, 10_000).unwrap();
    assert_eq!(mem.word(40), !0u32);
    assert_eq!(bus_read(&mut mem, 10, 16, 10_000).unwrap(), data);
}

#[test]
fn dropped_cycle_loses_pending_acks() {
    let mut mem = memory(6, 0, 1);
    let mut out = [0u32];
    for addr in 0..3 {
        mem.apply(
            &BusRequest {
                cyc: true,
                stb: true,
                addr,
                ..BusRequest::default()
            },
            &mut out,
        );
    }
    mem.apply(&BusRequest::default(), &mut out);
    let idle = BusRequest {
        cyc: true,
        ..BusRequest::default()
    };
    assert!((0..20).all(|_| !mem.apply(&idle, &mut out).ack));
}

#[test]
fn permanent_stall_times_out() {
    let mut mem = memory(2, 1, 1);
    let err = bus_write(&mut mem, 0, &[1, 2, 3], 50).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Timeout {
            operation: "bus write",
            steps: 50
        }
    ));
}

#[test]
fn image_loaded_memory_serves_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mem.bin");
    let bytes: Vec<u8> = (0..4096u32 * 4).map(|i| i as u8).collect();
    std::fs::write(&path, &bytes).unwrap();

    let mut mem = memory(2, 0, 1);
    mem.load_file(&path).unwrap();
    assert_eq!(bus_read(&mut mem, 1, 1, 100).unwrap(), vec![0x0405_0607]);
}

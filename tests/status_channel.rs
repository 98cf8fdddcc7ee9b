// tests/status_channel.rs

use std::thread;

use procsync::event_log::LogLevel;
use procsync::worker::{StatusKind, status_channel};

#[test]
fn test_per_worker_order_and_sequence() {
    let (sink, mut rx) = status_channel(1_000);

    let producers: Vec<_> = (0..4u32)
        .map(|id| {
            let mut tx = sink.sender_for(id);
            thread::spawn(move || {
                for p in 1..=50u8 {
                    assert!(tx.send(StatusKind::Progress(p)));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let events = rx.drain();
    assert_eq!(events.len(), 200);

    for id in 0..4u32 {
        let mine: Vec<_> = events.iter().filter(|e| e.worker_id == id).collect();
        let seqs: Vec<u64> = mine.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (0..50).collect::<Vec<u64>>());

        let progress: Vec<StatusKind> = mine.iter().map(|e| e.kind.clone()).collect();
        let expected: Vec<StatusKind> = (1..=50u8).map(StatusKind::Progress).collect();
        assert_eq!(progress, expected);
    }
}

#[test]
fn test_drain_never_returns_an_event_twice() {
    let (sink, mut rx) = status_channel(1_000);
    let mut tx = sink.sender_for(7);

    tx.log(LogLevel::Info, "one");
    tx.send(StatusKind::Progress(10));
    assert_eq!(rx.pending(), 2);

    let first = rx.drain();
    assert_eq!(first.len(), 2);
    assert_eq!(rx.pending(), 0);
    assert!(rx.drain().is_empty());

    tx.send(StatusKind::Terminated);
    let second = rx.drain();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].seq, 2);
    assert!(second[0].kind.is_terminal());
}

#[test]
fn test_ceiling_never_drops_events() {
    let (sink, mut rx) = status_channel(3);
    let mut tx = sink.sender_for(1);

    for p in 0..10u8 {
        assert!(tx.send(StatusKind::Progress(p)));
    }
    assert_eq!(rx.pending(), 10);
    assert_eq!(rx.drain().len(), 10);
}

#[test]
fn test_send_reports_disconnected_consumer() {
    let (sink, rx) = status_channel(10);
    let mut tx = sink.sender_for(3);
    drop(rx);

    assert!(!tx.send(StatusKind::Progress(1)));
}

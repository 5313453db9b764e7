//! Concurrent/Multi-threaded Tests for tabula-concurrency
//!
//! These tests verify correct behavior under actual concurrent execution:
//!
//! 1. **Exactly-once completion** - racing completions deliver one status
//!    and a replicate racing an abort resolves the operation once
//! 2. **Mirrored fields** - lock-free readers see unset or final values only
//! 3. **Timestamp monotonicity** - leader timestamps are unique under load
//! 4. **Stress Testing** - many operations resolve without leaking pending state
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_tests
//! cargo test --test concurrent_tests -- --nocapture --test-threads=1  # sequential for debugging
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use tabula_concurrency::{
    create_replicate_msg, CompletionStatus, ConsensusRound, Operation, OperationState,
    OperationType, Tablet, TabletContext, WriteEntry, WriteOperation,
};
use tabula_core::{Error, HybridClock, HybridTime, OpId, Result, TabletConfig, TabletId};
use tabula_storage::{MemKvStore, RawKvStore};

// ============================================================================
// Test Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn create_tablet() -> Arc<Tablet> {
    init_tracing();
    Arc::new(
        Tablet::new(
            TabletId::new(),
            TabletConfig::default(),
            Arc::new(HybridClock::new()),
            Arc::new(MemKvStore::new()),
        )
        .unwrap(),
    )
}

/// Store whose `put` parks until the test lets it through
struct GatedStore {
    inner: MemKvStore,
    entered: Barrier,
    release: Barrier,
}

impl GatedStore {
    fn new() -> Self {
        GatedStore {
            inner: MemKvStore::new(),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }
}

impl RawKvStore for GatedStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entered.wait();
        self.release.wait();
        self.inner.put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.scan_prefix(prefix)
    }

    fn truncate(&self) -> Result<()> {
        self.inner.truncate()
    }
}

fn record_statuses(op: &Operation) -> Arc<Mutex<Vec<CompletionStatus>>> {
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    op.set_completion_callback(Box::new(move |status| sink.lock().push(status)));
    statuses
}

fn create_write(tablet: &Arc<Tablet>, key: &str) -> Arc<Operation> {
    Arc::new(Operation::new(
        WriteOperation::new(vec![WriteEntry::new(key.as_bytes().to_vec(), b"v".to_vec())]),
        tablet,
    ))
}

fn leader_round(index: i64) -> Arc<ConsensusRound> {
    Arc::new(ConsensusRound::new(
        OpId::new(1, index),
        OpId::new(1, index - 1),
        create_replicate_msg(OperationType::Write),
    ))
}

// ============================================================================
// SECTION 1: Exactly-once Completion
// ============================================================================

mod exactly_once {
    use super::*;

    #[test]
    fn test_racing_completions_deliver_once() {
        const THREADS: usize = 8;

        for _ in 0..50 {
            let tablet = create_tablet();
            let op = create_write(&tablet, "k");
            let delivered = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&delivered);
            op.set_completion_callback(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

            let barrier = Arc::new(Barrier::new(THREADS));
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let op = Arc::clone(&op);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        op.complete_with_status(Ok(()));
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(delivered.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_racing_aborts_resolve_once() {
        const THREADS: usize = 4;

        let tablet = create_tablet();
        let op = create_write(&tablet, "k");
        op.set_consensus_round(leader_round(1)).unwrap();
        op.added_to_leader().unwrap();

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        op.set_completion_callback(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let op = Arc::clone(&op);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    op.aborted(Error::Aborted(format!("abort {}", i)));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(tablet.mvcc_manager().num_pending(), 0);
        assert!(tablet.pending_operations().is_empty());
    }

    #[test]
    fn test_abort_during_apply_is_ignored() {
        init_tracing();
        let store = Arc::new(GatedStore::new());
        let tablet = Arc::new(
            Tablet::new(
                TabletId::new(),
                TabletConfig::default(),
                Arc::new(HybridClock::new()),
                Arc::clone(&store) as Arc<dyn RawKvStore>,
            )
            .unwrap(),
        );
        let op = create_write(&tablet, "k");
        let statuses = record_statuses(&op);
        op.set_consensus_round(leader_round(1)).unwrap();
        op.added_to_leader().unwrap();
        let hybrid_time = op.hybrid_time();

        let applier = {
            let op = Arc::clone(&op);
            thread::spawn(move || op.replicated(1))
        };

        store.entered.wait();
        op.aborted(Error::Aborted("lost leadership".into()));
        assert_eq!(op.state(), OperationState::LeaderPending);
        assert!(!op.is_complete());
        assert!(op.replicated(1).unwrap_err().is_illegal_state());
        store.release.wait();

        applier.join().unwrap().unwrap();
        assert_eq!(op.state(), OperationState::Replicated);
        assert_eq!(*statuses.lock(), vec![Ok(())]);
        assert_eq!(tablet.mvcc_manager().num_pending(), 0);
        assert_eq!(tablet.mvcc_manager().last_replicated(), hybrid_time);
        assert!(tablet.pending_operations().is_empty());
        assert_eq!(tablet.storage().scan_prefix(b"k").unwrap().len(), 1);
    }

    #[test]
    fn test_replicate_racing_abort_resolves_once() {
        for _ in 0..100 {
            let tablet = create_tablet();
            let op = create_write(&tablet, "k");
            let statuses = record_statuses(&op);
            op.set_consensus_round(leader_round(1)).unwrap();
            op.added_to_leader().unwrap();
            let hybrid_time = op.hybrid_time();

            let barrier = Arc::new(Barrier::new(2));
            let replicate = {
                let op = Arc::clone(&op);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    op.replicated(1)
                })
            };
            let abort = {
                let op = Arc::clone(&op);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    op.aborted(Error::Aborted("lost leadership".into()));
                })
            };
            let replicate_result = replicate.join().unwrap();
            abort.join().unwrap();

            let statuses = statuses.lock();
            assert_eq!(statuses.len(), 1);
            let rows = tablet.storage().scan_prefix(b"k").unwrap().len();
            match &statuses[0] {
                Ok(()) => {
                    assert!(replicate_result.is_ok());
                    assert_eq!(op.state(), OperationState::Replicated);
                    assert_eq!(tablet.mvcc_manager().last_replicated(), hybrid_time);
                    assert_eq!(rows, 1);
                }
                Err(e) => {
                    assert!(matches!(e, Error::Aborted(_)));
                    assert!(replicate_result.unwrap_err().is_illegal_state());
                    assert_eq!(op.state(), OperationState::Aborted);
                    assert_eq!(tablet.mvcc_manager().last_replicated(), HybridTime::MIN);
                    assert_eq!(rows, 0);
                }
            }
            assert_eq!(tablet.mvcc_manager().num_pending(), 0);
            assert!(tablet.pending_operations().is_empty());
        }
    }
}

// ============================================================================
// SECTION 2: Mirrored Fields
// ============================================================================

mod mirrored_fields {
    use super::*;

    /// Readers spin on the lock-free accessors while one thread binds and
    /// assigns. Every observation must be either the unset value or the final
    /// one; nothing torn in between.
    #[test]
    fn test_readers_see_unset_or_final_values() {
        const READERS: usize = 4;

        for round in 0..20 {
            let tablet = create_tablet();
            let op = create_write(&tablet, "k");
            let expected_id = OpId::new(7, 1000 + round);
            let done = Arc::new(AtomicBool::new(false));
            let barrier = Arc::new(Barrier::new(READERS + 1));

            let readers: Vec<_> = (0..READERS)
                .map(|_| {
                    let op = Arc::clone(&op);
                    let done = Arc::clone(&done);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let mut seen_ht = HybridTime::INVALID;
                        while !done.load(Ordering::Acquire) {
                            let op_id = op.op_id();
                            assert!(op_id == OpId::INVALID || op_id == expected_id);

                            let ht = op.hybrid_time_even_if_unset();
                            if ht.is_valid() {
                                if seen_ht.is_valid() {
                                    assert_eq!(ht, seen_ht);
                                }
                                seen_ht = ht;
                            } else {
                                assert!(!seen_ht.is_valid(), "hybrid time went back to unset");
                            }

                            if let Some(bound) = op.consensus_round() {
                                assert_eq!(bound.id(), expected_id);
                            }
                        }
                    })
                })
                .collect();

            barrier.wait();
            let bound = Arc::new(ConsensusRound::new(
                expected_id,
                OpId::INVALID,
                create_replicate_msg(OperationType::Write),
            ));
            op.set_consensus_round(bound).unwrap();
            op.added_to_leader().unwrap();
            done.store(true, Ordering::Release);

            for reader in readers {
                reader.join().unwrap();
            }
            assert_eq!(op.op_id(), expected_id);
            assert!(op.has_hybrid_time());
        }
    }
}

// ============================================================================
// SECTION 3: Timestamp Monotonicity
// ============================================================================

mod monotonicity {
    use super::*;

    #[test]
    fn test_concurrent_leader_timestamps_are_unique() {
        const THREADS: usize = 8;
        const OPS_PER_THREAD: i64 = 100;

        let tablet = create_tablet();
        let barrier = Arc::new(Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS as i64)
            .map(|t| {
                let tablet = Arc::clone(&tablet);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut times = Vec::new();
                    let mut last = HybridTime::MIN;
                    for i in 0..OPS_PER_THREAD {
                        let op = create_write(&tablet, "k");
                        op.set_consensus_round(leader_round(1 + t * OPS_PER_THREAD + i))
                            .unwrap();
                        op.added_to_leader().unwrap();
                        let ht = op.hybrid_time();
                        assert!(ht > last, "timestamps within a thread must increase");
                        last = ht;
                        times.push(ht);
                        op.replicated(1).unwrap();
                    }
                    times
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for ht in handle.join().unwrap() {
                assert!(all.insert(ht), "duplicate leader timestamp {}", ht);
            }
        }
        assert_eq!(all.len(), THREADS * OPS_PER_THREAD as usize);
    }
}

// ============================================================================
// SECTION 4: Stress Testing
// ============================================================================

mod stress {
    use super::*;

    #[test]
    fn test_mixed_replicate_and_abort_leave_nothing_pending() {
        const THREADS: usize = 8;
        const OPS_PER_THREAD: i64 = 200;

        let tablet = create_tablet();
        let completed = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS as i64)
            .map(|t| {
                let tablet = Arc::clone(&tablet);
                let completed = Arc::clone(&completed);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..OPS_PER_THREAD {
                        let op = create_write(&tablet, &format!("t{}-{}", t, i));
                        let counter = Arc::clone(&completed);
                        op.set_completion_callback(Box::new(move |_| {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }));
                        op.set_consensus_round(leader_round(1 + t * OPS_PER_THREAD + i))
                            .unwrap();
                        op.added_to_leader().unwrap();
                        if i % 3 == 0 {
                            op.aborted(Error::Aborted("stress".into()));
                        } else {
                            op.replicated(1).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total = THREADS * OPS_PER_THREAD as usize;
        assert_eq!(completed.load(Ordering::SeqCst), total);
        assert_eq!(tablet.mvcc_manager().num_pending(), 0);
        assert!(tablet.pending_operations().is_empty());

        let aborted_per_thread = (0..OPS_PER_THREAD).filter(|i| i % 3 == 0).count();
        let applied = tablet.storage().scan_prefix(b"t").unwrap().len();
        assert_eq!(applied, total - THREADS * aborted_per_thread);
    }
}

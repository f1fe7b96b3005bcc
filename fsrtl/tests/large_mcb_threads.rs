//! Concurrent use of one LargeMcb from several threads.

use std::sync::Arc;
use std::thread;

use fsrtl::{fsrtl_get_mcb_stats, LargeMcb, McbRun, PoolType};

const THREADS: u64 = 4;
const EXTENTS_PER_THREAD: u64 = 50;
const EXTENT_SECTORS: u64 = 10;
const LBN_OFFSET: u64 = 50_000;

#[test]
fn test_concurrent_adds_coalesce() {
    let mcb = Arc::new(LargeMcb::new(PoolType::PagedPool));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let mcb = Arc::clone(&mcb);
            thread::spawn(move || {
                for i in 0..EXTENTS_PER_THREAD {
                    let vbn = t * 1000 + i * EXTENT_SECTORS;
                    mcb.add_entry(vbn, vbn + LBN_OFFSET, EXTENT_SECTORS).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Each thread fills [t*1000, t*1000 + 500) and leaves a 500 sector
    // hole before the next thread's range
    assert_eq!(mcb.number_of_runs(), 7);

    let runs = mcb.runs();
    for (index, run) in runs.iter().enumerate() {
        let t = index as u64 / 2;
        if index % 2 == 0 {
            assert_eq!(
                *run,
                McbRun { vbn: t * 1000, lbn: Some(t * 1000 + LBN_OFFSET), sector_count: 500 }
            );
        } else {
            assert_eq!(*run, McbRun { vbn: t * 1000 + 500, lbn: None, sector_count: 500 });
        }
    }

    for t in 0..THREADS {
        let hit = mcb.lookup(t * 1000 + 123).unwrap();
        assert_eq!(hit.lbn, Some(t * 1000 + 123 + LBN_OFFSET));
        assert!(mcb.lookup(t * 1000 + 700).map_or(true, |hit| hit.is_hole()));
    }
    assert_eq!(mcb.lookup_last(), Some((3499, 3499 + LBN_OFFSET)));
}

#[test]
fn test_concurrent_readers_and_writer() {
    let mcb = Arc::new(LargeMcb::default());
    mcb.add_entry(0, 9_000, 100).unwrap();

    let writer = {
        let mcb = Arc::clone(&mcb);
        thread::spawn(move || {
            for round in 0..200u64 {
                let vbn = 200 + (round % 20) * 5;
                mcb.add_entry(vbn, 20_000 + vbn, 2).unwrap();
                mcb.remove_entry(vbn, 2).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let mcb = Arc::clone(&mcb);
            thread::spawn(move || {
                for vbn in (0..100u64).cycle().take(2_000) {
                    let hit = mcb.lookup(vbn).unwrap();
                    assert_eq!(hit.lbn, Some(9_000 + vbn));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(mcb.runs(), [McbRun { vbn: 0, lbn: Some(9_000), sector_count: 100 }]);
    assert!(fsrtl_get_mcb_stats().mappings_allocated > 0);
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use softtcam_core::{KeyBits, PoolConfig, SoftTcam, TcamPool};

fn populated(seed: u64, rules: usize, config: PoolConfig) -> (SoftTcam<u32, u32>, Vec<u32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tcam = SoftTcam::with_config(config);
    for i in 0..rules as u32 {
        let mask = u32::prefix_mask(rng.random_range(4..=32));
        let data = rng.random::<u32>() & mask;
        tcam.insert(data, mask, i, i).unwrap();
    }
    let keys = (0..1000).map(|_| rng.random::<u32>() & 0xF0FF_FFFF).collect();
    (tcam, keys)
}

fn lookups(tcam: &SoftTcam<u32, u32>, keys: &[u32]) -> Vec<Option<u32>> {
    keys.iter().map(|&k| tcam.find(k).copied()).collect()
}

fn non_increasing(counts: &[u64]) -> bool {
    counts.windows(2).all(|w| w[0] >= w[1])
}

#[test]
fn sort_best_is_transparent_to_lookups() {
    let (mut tcam, keys) = populated(7, 300, PoolConfig::default());
    let before = lookups(&tcam, &keys);
    let counts = (tcam.node_count(), tcam.entry_count());

    tcam.sort_best();
    assert_eq!(lookups(&tcam, &keys), before);
    assert_eq!((tcam.node_count(), tcam.entry_count()), counts);
}

#[test]
fn sort_worst_is_transparent_to_lookups() {
    let (mut tcam, keys) = populated(11, 300, PoolConfig::default());
    let before = lookups(&tcam, &keys);

    tcam.sort_worst();
    assert_eq!(lookups(&tcam, &keys), before);
    tcam.sort_best();
    tcam.sort_worst();
    assert_eq!(lookups(&tcam, &keys), before);
}

#[test]
fn sort_best_packs_hot_elements_first() {
    let (mut tcam, keys) = populated(3, 200, PoolConfig::default());
    tcam.insert(0, 0, 1000, 1000).unwrap();
    tcam.clear_access_counters();
    // skewed workload: a few keys dominate
    for (i, &k) in keys.iter().enumerate() {
        for _ in 0..(i % 7) {
            tcam.find(k);
        }
    }
    let totals = tcam.pool().access_totals();
    assert!(totals.0 > 0 && totals.1 > 0);

    tcam.sort_best();
    let pool = tcam.pool();
    let nodes: Vec<u64> = pool.node_access_profile().into_iter().map(|(_, c)| c).collect();
    let entries: Vec<u64> = pool.entry_access_profile().into_iter().map(|(_, c)| c).collect();
    assert!(non_increasing(&nodes), "{nodes:?}");
    assert!(non_increasing(&entries), "{entries:?}");
    assert_eq!(pool.access_totals(), totals);
}

#[test]
fn sort_worst_with_one_byte_pages_matches_sort_best() {
    let config = PoolConfig {
        page_size: 1,
        ..PoolConfig::default()
    };
    let (mut tcam, keys) = populated(5, 120, config);
    tcam.clear_access_counters();
    for &k in keys.iter().step_by(3) {
        tcam.find(k);
    }
    tcam.sort_worst();
    let nodes: Vec<u64> = tcam
        .pool()
        .node_access_profile()
        .into_iter()
        .map(|(_, c)| c)
        .collect();
    assert!(non_increasing(&nodes), "{nodes:?}");
}

#[test]
fn reorder_remaps_every_engine_in_the_pool() {
    let mut pool = TcamPool::<u64, u64>::new();
    let a = pool.create_engine();
    let b = pool.create_engine();
    let lim = 12u64;
    for i in 0..lim {
        for j in 0..lim {
            let d = (i << 52) + (j << 20);
            pool.insert(a, d, 0xffff_0000_ffff_0000, 1, d).unwrap();
            pool.insert(b, i << 52, 0xffff_0000_0000_0000, (i * lim + j) as u32, j).unwrap();
        }
    }
    let probe = |pool: &TcamPool<u64, u64>| -> Vec<(Option<u64>, Option<u64>)> {
        (0..lim * lim)
            .map(|n| {
                let key = ((n / lim) << 52) + ((n % lim) << 20) + 0x1234;
                (
                    pool.find(a, key).unwrap().copied(),
                    pool.find(b, key).unwrap().copied(),
                )
            })
            .collect()
    };
    let before = probe(&pool);
    assert!(before.iter().all(|(x, y)| x.is_some() && y.is_some()));

    pool.sort_best();
    assert_eq!(probe(&pool), before);
    pool.sort_worst();
    assert_eq!(probe(&pool), before);
}

#[test]
fn trie_stays_mutable_after_reorder() {
    let (mut tcam, _) = populated(13, 50, PoolConfig::default());
    tcam.sort_worst();
    tcam.insert(0xDEAD_BEEF, u32::MAX, 10_000, 42).unwrap();
    assert_eq!(tcam.find(0xDEAD_BEEF), Some(&42));
    tcam.erase(0xDEAD_BEEF, u32::MAX, 10_000, &42).unwrap();

    tcam.sort_best();
    tcam.clear().unwrap();
    assert_eq!(tcam.node_count(), 0);
    assert_eq!(tcam.entry_count(), 0);
}

#[test]
fn access_counters_clear_and_dump() {
    let mut tcam = SoftTcam::<u32, u32>::new();
    tcam.insert(0x0A00_0000, 0xFF00_0000, 1, 1).unwrap();
    tcam.insert(0x0A01_0000, 0xFFFF_0000, 2, 2).unwrap();
    tcam.find(0x0A01_0203);

    let (nodes, entries) = tcam.pool().access_totals();
    assert!(nodes > 0);
    assert!(entries > 0);

    tcam.clear_access_counters();
    assert_eq!(tcam.pool().access_totals(), (0, 0));

    tcam.find(0x0A01_0203);
    let dump = tcam.dump_access_counters();
    assert_eq!(dump.lines().filter(|l| l.starts_with("N\t")).count(), tcam.node_count());
    assert_eq!(dump.lines().filter(|l| l.starts_with("E\t")).count(), tcam.entry_count());
    assert!(dump.contains(" node total access  : "), "{dump}");
    assert!(dump.contains(" entry total access : "), "{dump}");
}

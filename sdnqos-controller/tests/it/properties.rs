use std::net::Ipv4Addr;

use rand::Rng;
use tokio::time::Instant;

use sdnqos_controller::{ClassTable, FlowClassifier, FlowInstaller, TrafficCounters};

fn random_addr(rng: &mut impl Rng) -> Ipv4Addr {
    Ipv4Addr::from(rng.gen::<u32>())
}

#[test]
fn healthcare_sources_win_regardless_of_destination() {
    let classifier = FlowClassifier::default();
    let mut rng = rand::thread_rng();

    for _ in 0..1_000 {
        let src = Ipv4Addr::new(10, 2, 0, rng.gen());
        let dst = random_addr(&mut rng);

        let class = classifier.classify(src, dst);
        assert_eq!(class.name(), "Healthcare", "{src} -> {dst}");
        assert_eq!(class.priority(), 200);
        assert_eq!(class.queue(), Some(1));
    }
}

#[test]
fn overlapping_ranges_resolve_to_first_class() {
    let mut table = ClassTable::smart_city();
    table.classes[1].ranges = vec!["10.3.0.0/16".to_string()];
    table.classes[2].ranges = vec!["10.3.4.0/24".to_string()];

    let classifier = FlowClassifier::new(&table);
    let mut rng = rand::thread_rng();

    for _ in 0..200 {
        let addr = Ipv4Addr::new(10, 3, 4, rng.gen());
        assert_eq!(classifier.classify(addr, random_addr(&mut rng)).name(), "PublicSafety");
        assert_eq!(classifier.classify(Ipv4Addr::new(10, 1, 0, 1), addr).name(), "PublicSafety");
    }
}

#[test]
fn rule_pairs_are_symmetric() {
    let classifier = FlowClassifier::default();
    let mut rng = rand::thread_rng();

    for _ in 0..1_000 {
        // Bias towards the configured service networks.
        let src = Ipv4Addr::new(10, rng.gen_range(1..=7), 0, rng.gen());
        let dst = if rng.gen_bool(0.5) { random_addr(&mut rng) } else { Ipv4Addr::new(10, rng.gen_range(1..=7), 0, rng.gen()) };

        let class = classifier.classify(src, dst);
        let (forward, reverse) = FlowInstaller.rule_pair(class, src, dst);

        assert_eq!(forward.priority, reverse.priority);
        assert_eq!(forward.actions, reverse.actions);
        assert_eq!((forward.idle_timeout, forward.hard_timeout), (reverse.idle_timeout, reverse.hard_timeout));
        assert_eq!(forward.flow_match.ipv4_src, reverse.flow_match.ipv4_dst);
        assert_eq!(forward.flow_match.ipv4_dst, reverse.flow_match.ipv4_src);
        assert_eq!(forward.flow_match.eth_type, reverse.flow_match.eth_type);
    }
}

#[test]
fn classification_is_deterministic() {
    let classifier = FlowClassifier::default();
    let mut rng = rand::thread_rng();

    for _ in 0..500 {
        let (src, dst) = (random_addr(&mut rng), random_addr(&mut rng));
        assert_eq!(classifier.classify(src, dst), classifier.classify(src, dst));
    }
}

#[test]
fn top_talkers_are_bounded_and_sorted() {
    let mut rng = rand::thread_rng();

    for _ in 0..100 {
        let mut counters = TrafficCounters::new();
        let now = Instant::now();

        for _ in 0..rng.gen_range(0..20) {
            // Small ranges so ties are common.
            counters.record(Ipv4Addr::new(10, rng.gen_range(2..=6), 0, rng.gen()), rng.gen_range(0..5), now);
        }

        let top = counters.top(3);
        assert!(top.len() <= 3);

        for pair in top.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                a.packets() > b.packets()
                    || (a.packets() == b.packets() && a.address().to_string() < b.address().to_string()),
                "{a:?} ranked before {b:?}"
            );
        }
    }
}

#[test]
fn counters_never_decrease_without_eviction() {
    let mut rng = rand::thread_rng();
    let mut counters = TrafficCounters::new();
    let src = Ipv4Addr::new(10, 5, 0, 2);
    let now = Instant::now();

    let mut last = 0;
    for _ in 0..1_000 {
        counters.record(src, rng.gen_range(0..1_000), now);
        let current = counters.packets(src);
        assert!(current >= last);
        last = current;
    }
}

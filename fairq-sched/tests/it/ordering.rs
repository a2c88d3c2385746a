use std::collections::HashMap;

use fairq_sched::{Algorithm, Discipline, Scheduler, SchedulerConfig};
use fairq_wire::{Datagram, Header};
use rand::{seq::SliceRandom, Rng};

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Fifo,
    Algorithm::RoundRobin,
    Algorithm::DeficitRoundRobin,
    Algorithm::WeightedFair,
];

/// Random arrivals from several flows, interleaved with random dequeues. Whatever the
/// discipline, each flow's sequence numbers must come out in order and nothing may be lost.
#[test]
fn order_within_a_flow_is_preserved() {
    let _ = tracing_subscriber::fmt::try_init();
    let mut rng = rand::thread_rng();

    for algorithm in ALGORITHMS {
        let mut scheduler = Scheduler::new(&SchedulerConfig::new(algorithm).flow_capacity(4096));

        // (flow ID, weight, next sequence number to send)
        let mut flows: Vec<(u32, u32, u32)> =
            (1..=6).map(|id| (id, rng.gen_range(1..=5), 0)).collect();
        let mut expected: HashMap<u32, u32> = HashMap::new();
        let mut served = 0usize;
        let mut sent = 0usize;

        let mut check = |datagram: Datagram| {
            let next = expected.entry(datagram.flow_id()).or_default();
            assert_eq!(datagram.header().seq, Some(*next), "{algorithm}: flow {}", datagram.flow_id());
            *next += 1;
        };

        for _ in 0..2_000 {
            let (id, weight, seq) = flows.choose_mut(&mut rng).unwrap();
            let payload = vec![0u8; rng.gen_range(0..1400)];
            let datagram = Datagram::new(Header::new(*id, *weight).with_seq(*seq), payload).unwrap();
            assert!(scheduler.enqueue(datagram).is_accepted());
            *seq += 1;
            sent += 1;

            if rng.gen_bool(0.4) {
                if let Some(datagram) = scheduler.dequeue_next() {
                    check(datagram);
                    served += 1;
                }
            }
        }

        while scheduler.backlog() > 0 {
            if let Some(datagram) = scheduler.dequeue_next() {
                check(datagram);
                served += 1;
            }
        }

        assert_eq!(served, sent, "{algorithm}");
    }
}

#[test]
fn fifo_ignores_weights() {
    let mut scheduler = Scheduler::new(&SchedulerConfig::new(Algorithm::Fifo));
    for seq in 0..10 {
        let _ = scheduler.enqueue(Datagram::new(Header::new(1, 1).with_seq(seq), [0u8; 100]).unwrap());
        let _ = scheduler.enqueue(Datagram::new(Header::new(2, 2).with_seq(seq), [0u8; 100]).unwrap());
    }

    let served: Vec<_> = std::iter::from_fn(|| scheduler.dequeue_next())
        .map(|d| (d.flow_id(), d.header().seq.unwrap()))
        .collect();
    let arrivals: Vec<_> = (0..10).flat_map(|seq| [(1, seq), (2, seq)]).collect();

    assert_eq!(served, arrivals);
}

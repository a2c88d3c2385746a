use fairq_sched::{
    Algorithm, DeficitRoundRobin, Discipline, Fairness, Scheduler, SchedulerConfig, WeightedFair,
};
use fairq_wire::{Datagram, Header, MAX_DATAGRAM_SIZE};

const BACKLOG: usize = 2_000;

/// Keeps two flows backlogged, serves `turns` datagrams and returns the bytes served per flow.
fn serve_two_flows<D: Discipline>(discipline: &mut D, w1: u32, w2: u32, turns: usize) -> [usize; 2] {
    for _ in 0..BACKLOG {
        let _ = discipline.enqueue(Datagram::new(Header::new(1, w1), [0u8; 100]).unwrap());
        let _ = discipline.enqueue(Datagram::new(Header::new(2, w2), [0u8; 100]).unwrap());
    }

    let mut bytes = [0usize; 2];
    let mut served = 0;
    while served < turns {
        if let Some(datagram) = discipline.dequeue_next() {
            bytes[datagram.flow_id() as usize - 1] += datagram.size();
            served += 1;
        }
    }

    let flows = discipline.flows();
    assert!(flows.iter().all(|flow| flow.queued > 0), "both flows must stay backlogged");

    bytes
}

#[test]
fn drr_shares_bytes_by_weight() {
    let base_quantum = 1_500;
    let mut drr = DeficitRoundRobin::new(BACKLOG, base_quantum);

    let [b1, b2] = serve_two_flows(&mut drr, 1, 2, 2_500);

    // Off the 1:2 split by at most flow 2's quantum plus one datagram.
    let error = (b2 as i64 - 2 * b1 as i64).unsigned_abs() as usize;
    assert!(error <= 2 * base_quantum as usize + MAX_DATAGRAM_SIZE, "b1={b1} b2={b2}");

    for flow in drr.flows() {
        let Fairness::Deficit { deficit, quantum } = flow.fairness else {
            panic!("expected DRR state")
        };
        assert_eq!(quantum, base_quantum * flow.weight);
        assert!(deficit < 2 * quantum);
    }
}

#[test]
fn drr_shares_bytes_by_weight_three_to_one() {
    let mut drr = DeficitRoundRobin::new(BACKLOG, 1_500);
    let [b1, b2] = serve_two_flows(&mut drr, 3, 1, 2_000);

    let ratio = b1 as f64 / b2 as f64;
    assert!((ratio - 3.0).abs() < 0.2, "ratio {ratio}");
}

#[test]
fn wfq_shares_bytes_by_weight() {
    for (w1, w2) in [(1, 2), (1, 1), (3, 1), (2, 5)] {
        let mut wfq = WeightedFair::new(BACKLOG);
        let [b1, b2] = serve_two_flows(&mut wfq, w1, w2, 1_500);
        assert!(wfq.virtual_time() > 0.0);

        // Equal-size datagrams: off by at most one datagram per flow from the exact split.
        let expected = b1 as f64 * w2 as f64 / w1 as f64;
        assert!((b2 as f64 - expected).abs() <= 2.0 * 116.0 * w2 as f64, "{w1}:{w2} b1={b1} b2={b2}");
    }
}

#[test]
fn scheduler_enum_dispatches_to_the_chosen_discipline() {
    let config = SchedulerConfig::new(Algorithm::WeightedFair);
    let mut scheduler = Scheduler::new(&config);
    let [b1, b2] = serve_two_flows(&mut scheduler, 1, 2, 300);
    assert_eq!(b2, 2 * b1);

    assert!(matches!(scheduler.flows()[0].fairness, Fairness::VirtualFinish(_)));
}

use std::{collections::HashMap, net::SocketAddr, time::Duration};

use rand::seq::SliceRandom;
use tokio::{net::UdpSocket, time::timeout};
use tracing::info;

use fairq_router::{Router, RouterOptions};
use fairq_sched::{limiter::BURST_SECONDS, Algorithm, SchedulerConfig};
use fairq_wire::{Datagram, Format, Header, MAX_DATAGRAM_SIZE, MINIMAL_HEADER_LEN};

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Fifo,
    Algorithm::RoundRobin,
    Algorithm::DeficitRoundRobin,
    Algorithm::WeightedFair,
];

async fn receiver() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn spawn_router(destination: SocketAddr, options: RouterOptions) -> (Router, SocketAddr) {
    let mut router = Router::with_options(destination, options);
    router.bind("127.0.0.1:0").await.unwrap();
    let addr = router.local_addr().unwrap();
    (router, addr)
}

/// Receives `n` datagrams, failing the test if the stream stalls.
async fn collect(socket: &UdpSocket, n: usize, format: Format) -> Vec<Datagram> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE * 2];
    let mut received = Vec::with_capacity(n);

    while received.len() < n {
        let (len, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("receiver stalled")
            .unwrap();
        let frame = bytes::Bytes::copy_from_slice(&buf[..len]);
        received.push(Datagram::decode(frame, format).unwrap());
    }

    received
}

#[tokio::test(flavor = "multi_thread")]
async fn forwards_every_flow_in_order() {
    let _ = tracing_subscriber::fmt::try_init();

    for algorithm in ALGORITHMS {
        let (sink, sink_addr) = receiver().await;
        let options = RouterOptions::default()
            .scheduler(SchedulerConfig::new(algorithm))
            .format(Format::Extended)
            .without_stats_report();
        let (mut router, router_addr) = spawn_router(sink_addr, options).await;

        // Three flows, 50 datagrams each, interleaved at random.
        let mut order: Vec<u32> = (1..=3).flat_map(|flow_id| [flow_id; 50]).collect();
        order.shuffle(&mut rand::thread_rng());

        let collector = tokio::spawn(async move { collect(&sink, 150, Format::Extended).await });

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut seqs = [0u32; 4];
        for flow_id in order {
            let seq = seqs[flow_id as usize];
            seqs[flow_id as usize] += 1;

            let datagram =
                Datagram::new(Header::new(flow_id, flow_id).with_seq(seq), [flow_id as u8; 200])
                    .unwrap();
            sender.send_to(datagram.frame(), router_addr).await.unwrap();
            tokio::task::yield_now().await;
        }

        let received = collector.await.unwrap();

        let mut next: HashMap<u32, u32> = HashMap::new();
        for datagram in &received {
            let expected = next.entry(datagram.flow_id()).or_default();
            assert_eq!(datagram.header().seq, Some(*expected), "{algorithm}");
            assert!(datagram.payload().iter().all(|&b| b == datagram.flow_id() as u8));
            *expected += 1;
        }
        assert_eq!(next.len(), 3);
        assert!(next.values().all(|&n| n == 50));

        // Egress records a datagram after sending it; joining the tasks settles the counters.
        router.shutdown().await;

        let stats = router.stats();
        assert_eq!(stats.received(), 150);
        assert_eq!(stats.forwarded(), 150);
        assert_eq!(stats.dropped(), 0);

        let flows = router.flows();
        assert_eq!(flows.iter().map(|f| f.flow_id).collect::<Vec<_>>(), [1, 2, 3]);
        assert!(flows.iter().all(|f| f.forwarded == 50 && f.queued == 0));

        info!(%algorithm, "forwarded {} datagrams", stats.forwarded());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_datagrams_are_counted_not_forwarded() {
    let _ = tracing_subscriber::fmt::try_init();

    let (sink, sink_addr) = receiver().await;
    let (mut router, router_addr) =
        spawn_router(sink_addr, RouterOptions::default().without_stats_report()).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&[1, 2, 3], router_addr).await.unwrap();

    let valid = Datagram::new(Header::new(9, 1), b"hello").unwrap();
    sender.send_to(valid.frame(), router_addr).await.unwrap();

    let received = collect(&sink, 1, Format::Minimal).await;
    assert_eq!(received[0].flow_id(), 9);
    assert_eq!(&received[0].payload()[..], b"hello");

    router.shutdown().await;

    let stats = router.stats();
    assert_eq!(stats.received(), 2);
    assert_eq!(stats.malformed(), 1);
    assert_eq!(stats.forwarded(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn bandwidth_cap_paces_egress() {
    let _ = tracing_subscriber::fmt::try_init();

    // 20 kB/s with a 40 kB burst: 80 kB of traffic takes at least two seconds.
    const RATE: u64 = 20_000;
    const COUNT: usize = 80;
    const SIZE: usize = 1_000;

    let (sink, sink_addr) = receiver().await;
    let options = RouterOptions::default()
        .scheduler(SchedulerConfig::new(Algorithm::DeficitRoundRobin))
        .bandwidth(RATE)
        .without_stats_report();
    let (mut router, router_addr) = spawn_router(sink_addr, options).await;

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let datagram = Datagram::new(Header::new(1, 1), [0u8; SIZE - MINIMAL_HEADER_LEN]).unwrap();

    let collector = tokio::spawn(async move { collect(&sink, COUNT, Format::Minimal).await });

    let start = tokio::time::Instant::now();
    for i in 0..COUNT {
        sender.send_to(datagram.frame(), router_addr).await.unwrap();
        // Keep the burst within the ingress socket buffer.
        if i % 8 == 7 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(router.stats().received(), COUNT as u64, "datagrams lost before the router");

    let received = collector.await.unwrap();
    let elapsed = start.elapsed();
    assert_eq!(received.len(), COUNT);

    let bytes = (COUNT * SIZE) as f64;
    let burst = RATE as f64 * BURST_SECONDS;
    let expected = Duration::from_secs_f64((bytes - burst) / RATE as f64);
    assert!(elapsed >= expected, "finished too early: {elapsed:?} < {expected:?}");

    router.shutdown().await;
    assert_eq!(router.stats().bytes_tx(), (COUNT * SIZE) as u64);
}

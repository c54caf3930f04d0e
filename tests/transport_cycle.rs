//! Producer and processor on separate threads, each with its own mapping of
//! the segment.

use approx::assert_relative_eq;
use audio_shm::{
    pcm, AudioShmError, ProcessParams, Processor, Producer, Served, Status, StreamShape,
    TransportConfig,
};
use std::thread;
use std::time::Duration;

fn unique(name: &str) -> String {
    format!("it_{}_{}", name, std::process::id())
}

fn config(timeout: Duration) -> TransportConfig {
    TransportConfig::default()
        .with_timeout(timeout)
        .with_poll_interval(Duration::from_micros(20), Duration::from_millis(1))
}

#[test]
fn full_cycle_across_threads() {
    let name = unique("full");
    let shape = StreamShape::new(8_000, 2, 512);
    let mut producer = Producer::create(&name, shape, config(Duration::from_secs(10))).unwrap();
    assert_eq!(producer.status().unwrap(), Status::Idle);

    let peer_name = name.clone();
    let worker = thread::spawn(move || {
        let processor = Processor::open(&peer_name, config(Duration::from_secs(10))).unwrap();
        let mut served = Vec::new();
        for _ in 0..3 {
            match processor.wait_and_serve().unwrap() {
                Served::Done { elapsed_ns } => served.push(elapsed_ns),
                Served::Failed(e) => panic!("processor failed: {}", e),
            }
        }
        served
    });

    let input = pcm::generate_test_signal(8_000, 512, 2, 440.0);
    for gain in [0.5f32, 1.0, 2.0] {
        let done = producer
            .submit(&input, ProcessParams { gain, bypass: false })
            .unwrap();
        assert_eq!(done.samples.len(), input.len());
        assert!(done.elapsed_ns >= 0);
        for (o, x) in done.samples.iter().zip(&input) {
            assert_relative_eq!(*o, (x * gain).tanh());
            assert!(o.abs() <= 1.0);
        }
        // Never left in PROCESSING after a completed cycle
        assert_eq!(producer.status().unwrap(), Status::Idle);
    }

    let served = worker.join().unwrap();
    assert_eq!(served.len(), 3);
}

#[test]
fn bypass_returns_input_verbatim() {
    let name = unique("bypass");
    let shape = StreamShape::new(44_100, 1, 64);
    let mut producer = Producer::create(&name, shape, config(Duration::from_secs(10))).unwrap();

    let peer_name = name.clone();
    let worker = thread::spawn(move || {
        let processor = Processor::open(&peer_name, config(Duration::from_secs(10))).unwrap();
        processor.wait_and_serve().unwrap()
    });

    let input: Vec<f32> = (0..64).map(|i| (i as f32 - 32.0) * 0.1).collect();
    let done = producer
        .submit(&input, ProcessParams { gain: 50.0, bypass: true })
        .unwrap();
    assert_eq!(done.samples, input);
    assert!(matches!(worker.join().unwrap(), Served::Done { .. }));
}

#[test]
fn error_status_reaches_producer() {
    let name = unique("error");
    let shape = StreamShape::new(8_000, 1, 8);
    let mut producer = Producer::create(&name, shape, config(Duration::from_secs(10))).unwrap();

    let peer_name = name.clone();
    let worker = thread::spawn(move || {
        let processor = Processor::open(&peer_name, config(Duration::from_secs(10))).unwrap();
        processor.wait_and_serve().unwrap()
    });

    let err = producer
        .submit(&[0.1; 8], ProcessParams { gain: f32::INFINITY, bypass: false })
        .unwrap_err();
    assert!(matches!(err, AudioShmError::ProcessingFailure(_)));
    assert!(matches!(worker.join().unwrap(), Served::Failed(_)));
    assert_eq!(producer.status().unwrap(), Status::Idle);
}

#[test]
fn late_processor_after_timeout() {
    let name = unique("late");
    let shape = StreamShape::new(8_000, 1, 4);
    let mut producer = Producer::create(&name, shape, config(Duration::from_millis(20))).unwrap();
    let processor = Processor::open(&name, config(Duration::from_secs(10))).unwrap();

    let err = producer
        .submit(&[0.1, 0.2, 0.3, 0.4], ProcessParams::default())
        .unwrap_err();
    assert!(matches!(err, AudioShmError::Timeout { .. }));
    assert!(producer.is_stalled());

    let worker = thread::spawn(move || processor.wait_and_serve().unwrap());
    assert!(matches!(worker.join().unwrap(), Served::Done { .. }));

    assert_eq!(producer.status().unwrap(), Status::Done);
    assert!(producer.recover().unwrap());
    assert_eq!(producer.status().unwrap(), Status::Idle);
}

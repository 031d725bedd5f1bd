//! Ground-side binary (spec.md §5, §4.G-§4.H): any number of capture
//! threads feeding one shared `GroundRx`, a periodic `GroundTx` uplink
//! worker, and a stats/link-quality reporter.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use fpv_core::ground::tx::DEFAULT_CONFIG_DESCRIPTOR;
use fpv_core::ground::{GroundRx, GroundTx, PingTracker};
use fpv_core::stats::Stats;
use fpv_core::FpvError;
use fpv_fec::decoder::FecDecoder;
use fpv_fec::encoder::{EncodedSink, FecDescriptor, FecEncoder};
use fpv_radio::direction::Direction;
use fpv_radio::driver::{LoopbackRadio, RadioCapture, RadioInjector};
use fpv_wire::control::ConfigPacket;
use fpv_wire::video::{Air2GroundType, Resolution, VideoHeader, VIDEO_HEADER_LEN};

use cli::Args;

type DynInjector = Box<dyn RadioInjector + Send>;
type DynCapture = Box<dyn RadioCapture + Send>;

fn init_logging(args: &Args) {
    let level = match i16::from(args.verbose) - i16::from(args.quiet) {
        i16::MIN..=-2 => tracing::Level::ERROR,
        -1 => tracing::Level::WARN,
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        2..=i16::MAX => tracing::Level::TRACE,
    };
    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let _ = tracing_log::LogTracer::init();
}

fn now_us(epoch: Instant) -> u64 {
    epoch.elapsed().as_micros() as u64
}

#[cfg(feature = "pcap-capture")]
fn open_injector(iface: &str) -> Result<DynInjector, FpvError> {
    Ok(Box::new(
        fpv_radio::driver::PcapRadio::open(iface, 2048).map_err(|e| FpvError::RadioOpen(e.to_string()))?,
    ))
}

#[cfg(not(feature = "pcap-capture"))]
fn open_injector(_iface: &str) -> Result<DynInjector, FpvError> {
    Err(FpvError::RadioOpen(
        "built without the pcap-capture feature; pass --demo or rebuild with --features pcap-capture".into(),
    ))
}

#[cfg(feature = "pcap-capture")]
fn open_capture(iface: &str) -> Result<DynCapture, FpvError> {
    Ok(Box::new(
        fpv_radio::driver::PcapRadio::open(iface, 2048).map_err(|e| FpvError::RadioOpen(e.to_string()))?,
    ))
}

#[cfg(not(feature = "pcap-capture"))]
fn open_capture(_iface: &str) -> Result<DynCapture, FpvError> {
    Err(FpvError::RadioOpen(
        "built without the pcap-capture feature; pass --demo or rebuild with --features pcap-capture".into(),
    ))
}

/// Wraps one already-sealed transport frame in the fixed IEEE 802.11 header
/// for `direction` and hands it to `injector` (spec §6).
struct InjectSink<'a, T: RadioInjector> {
    injector: &'a mut T,
    direction: Direction,
}

impl<T: RadioInjector> EncodedSink for InjectSink<'_, T> {
    fn on_encoded(&mut self, frame: &[u8]) {
        let mut wire = fpv_radio::radiotap::build_tx(None);
        wire.extend_from_slice(&self.direction.header_template());
        wire.extend_from_slice(frame);
        let _ = self.injector.inject(&wire);
    }
}

fn capture_worker(
    iface_label: String,
    mut capture: DynCapture,
    ground_rx: Arc<GroundRx>,
    ping: Arc<PingTracker>,
    stats: Arc<Stats>,
    epoch: Instant,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        match capture.capture(Duration::from_millis(30)) {
            Ok(Some(frame)) => {
                for video_frame in ground_rx.ingest_captured(&frame, now_us(epoch), &ping, &stats) {
                    stats.video_frames.inc();
                    tracing::debug!(
                        interface = %iface_label,
                        frame_index = video_frame.frame_index,
                        bytes = video_frame.bytes.len(),
                        resolution = ?video_frame.resolution,
                        "assembled video frame"
                    );
                }
            }
            Ok(None) => continue,
            Err(_) => stats.malformed_wire_frame.inc(),
        }
    }
}

fn uplink_worker(mut tx: GroundTx, mut injector: DynInjector, ping: Arc<PingTracker>, epoch: Instant, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(10));
        let mut sink = InjectSink { injector: &mut injector, direction: Direction::GroundToAir };
        tx.tick(now_us(epoch), &ping, &mut sink);
    }
}

fn stats_reporter(ground_rx: Arc<GroundRx>, ping: Arc<PingTracker>, stats: Arc<Stats>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        tracing::info!(
            snapshot = ?stats.snapshot(),
            link_quality = ?ground_rx.sample_link_quality(),
            rtt_us = ?ping.last_rtt().map(|d| d.as_micros()),
            "ground stats"
        );
    }
}

/// A self-contained demo air side: periodically injects a synthetic video
/// frame and logs whatever control uplink arrives, so `--demo` exercises
/// the full ground pipeline without a second process or real hardware.
fn demo_toy_air_video(mut injector: LoopbackRadio, descriptor: FecDescriptor, running: Arc<AtomicBool>) {
    let mut encoder = FecEncoder::new(descriptor).expect("demo video FEC shape is valid");
    let mut frame_index: u32 = 0;
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
        let body: &[u8] = b"demo-jpeg-bytes";
        let header = VideoHeader {
            packet_type: Air2GroundType::Video,
            total_size: (VIDEO_HEADER_LEN + body.len()) as u32,
            pong: 0,
            resolution: Resolution::Vga,
            part_index: 0,
            last_part: true,
            frame_index,
        };
        frame_index = frame_index.wrapping_add(1);

        let mut hdr_bytes = [0u8; VIDEO_HEADER_LEN];
        header.pack(&mut hdr_bytes);
        let mut bytes = hdr_bytes.to_vec();
        bytes.extend_from_slice(body);

        let mut sink = InjectSink { injector: &mut injector, direction: Direction::AirToGround };
        let _ = encoder.encode_stream(&bytes, &mut sink);
        let _ = encoder.flush_packet(&mut sink);
    }
}

fn demo_toy_air_control(mut capture: LoopbackRadio, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        if let Ok(Some(frame)) = capture.capture(Duration::from_millis(200)) {
            tracing::debug!(bytes = frame.payload.len(), "demo air: received control uplink frame");
        }
    }
}

fn main() -> Result<(), FpvError> {
    let args = Args::parse();
    init_logging(&args);

    if !args.demo && (args.capture.is_empty() || args.inject.is_none()) {
        return Err(FpvError::InvalidConfig(
            "--capture (at least one) and --inject are required unless --demo is passed",
        ));
    }

    let video_descriptor = FecDescriptor { k: args.fec_k, n: args.fec_n, mtu: args.mtu };
    let ground_rx = Arc::new(GroundRx::new(FecDecoder::new(video_descriptor)?));
    let ground_tx = GroundTx::new(DEFAULT_CONFIG_DESCRIPTOR, ConfigPacket::default())?;
    let ping = Arc::new(PingTracker::new());

    let stats = Arc::new(Stats::default());
    let running = Arc::new(AtomicBool::new(true));
    let epoch = Instant::now();

    let mut handles = Vec::new();

    if args.demo {
        tracing::info!("running in --demo mode against in-process loopback radio pairs");
        let (toy_air_video_inject, ground_video_capture) = LoopbackRadio::pair("toy-air-video", "ground-video");
        let (ground_control_inject, toy_air_control_capture) = LoopbackRadio::pair("ground-control", "toy-air-control");

        handles.push(std::thread::spawn({
            let running = running.clone();
            move || demo_toy_air_video(toy_air_video_inject, video_descriptor, running)
        }));
        handles.push(std::thread::spawn({
            let running = running.clone();
            move || demo_toy_air_control(toy_air_control_capture, running)
        }));
        handles.push(std::thread::spawn({
            let ground_rx = ground_rx.clone();
            let ping = ping.clone();
            let stats = stats.clone();
            let running = running.clone();
            move || {
                capture_worker(
                    "demo-video".to_string(),
                    Box::new(ground_video_capture),
                    ground_rx,
                    ping,
                    stats,
                    epoch,
                    running,
                )
            }
        }));
        handles.push(std::thread::spawn({
            let ping = ping.clone();
            let running = running.clone();
            move || uplink_worker(ground_tx, Box::new(ground_control_inject), ping, epoch, running)
        }));
    } else {
        let injector = open_injector(args.inject.as_deref().unwrap())?;
        for iface in &args.capture {
            let capture = open_capture(iface)?;
            handles.push(std::thread::spawn({
                let iface = iface.clone();
                let ground_rx = ground_rx.clone();
                let ping = ping.clone();
                let stats = stats.clone();
                let running = running.clone();
                move || capture_worker(iface, capture, ground_rx, ping, stats, epoch, running)
            }));
        }
        handles.push(std::thread::spawn({
            let ping = ping.clone();
            let running = running.clone();
            move || uplink_worker(ground_tx, injector, ping, epoch, running)
        }));
    }

    handles.push(std::thread::spawn({
        let ground_rx = ground_rx.clone();
        let ping = ping.clone();
        let stats = stats.clone();
        let running = running.clone();
        move || stats_reporter(ground_rx, ping, stats, running)
    }));

    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}

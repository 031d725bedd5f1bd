//! Air-side binary (spec.md §5): a dedicated camera/pump thread, a
//! radio-RX thread decoding the ground→air control channel, a radio-TX
//! worker draining sealed video transport frames onto the air, a three-stage
//! DVR pipeline, and a stats reporter — standing in for the original
//! firmware's two FreeRTOS cores with one OS thread apiece (SPEC_FULL.md §5).

mod camera;
mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};

use fpv_core::air::{AirRx, AirTx, DvrTap};
use fpv_core::dvr::{open_fs_dvr, Dvr, FsDvrStorage};
use fpv_core::ground::tx::DEFAULT_CONFIG_DESCRIPTOR;
use fpv_core::stats::Stats;
use fpv_core::FpvError;
use fpv_fec::decoder::{DecodedSink, FecDecoder};
use fpv_fec::encoder::{EncodedSink, FecDescriptor, FecEncoder};
use fpv_radio::direction::Direction;
use fpv_radio::driver::{LoopbackRadio, RadioCapture, RadioInjector};
use fpv_radio::rate::{NotSupported, RateSetter, WifiRate};
use fpv_wire::control::ConfigPacket;

use camera::SharedCamera;
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
    // Bridges `fpv-core`/`fpv-fec`/`fpv-radio`'s `log`-facade output (the
    // crates that also target `no_std`/`defmt`) into this binary's own
    // `tracing` subscriber.
    let _ = tracing_log::LogTracer::init();
}

/// The air side never throttles its own transmit rate (spec §1: the radio
/// driver, real or simulated, is an external collaborator); this stub
/// satisfies `AirRx::ingest`'s `RateSetter` boundary without a real radio.
struct SimulatedRate;

impl RateSetter for SimulatedRate {
    fn set_rate(&mut self, _rate: WifiRate) -> Result<(), NotSupported> {
        Ok(())
    }
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

struct ChannelSink {
    tx: Sender<Vec<u8>>,
    stats: Arc<Stats>,
}

impl EncodedSink for ChannelSink {
    fn on_encoded(&mut self, frame: &[u8]) {
        self.stats.bytes_sent.add(frame.len() as u64);
        let _ = self.tx.send(frame.to_vec());
    }
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

fn radio_tx_worker(rx: Receiver<Vec<u8>>, mut injector: DynInjector, stats: Arc<Stats>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(transport_frame) => {
                let mut wire = fpv_radio::radiotap::build_tx(None);
                wire.extend_from_slice(&Direction::AirToGround.header_template());
                wire.extend_from_slice(&transport_frame);
                if injector.inject(&wire).is_err() {
                    stats.radio_inject_failure.inc();
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn camera_worker(
    air_tx: Arc<Mutex<AirTx>>,
    mut source: camera::SimulatedCameraSource,
    sink_tx: Sender<Vec<u8>>,
    dvr: Option<Arc<Mutex<Dvr<FsDvrStorage>>>>,
    dvr_record: Arc<AtomicBool>,
    stats: Arc<Stats>,
    epoch: Instant,
    running: Arc<AtomicBool>,
) {
    let mut sink = ChannelSink { tx: sink_tx, stats: stats.clone() };
    while running.load(Ordering::Relaxed) {
        let now = now_us(epoch);
        let recording = dvr.is_some() && dvr_record.load(Ordering::Relaxed);

        let dvr_for_tap = dvr.clone();
        let stats_for_tap = stats.clone();
        let mut tap_closure = move |bytes: &[u8]| {
            let Some(dvr) = dvr_for_tap.as_ref() else { return };
            match dvr.lock().unwrap().push(bytes) {
                Ok(()) => stats_for_tap.dvr_bytes.add(bytes.len() as u64),
                Err(_) => stats_for_tap.dvr_drops.inc(),
            }
        };
        let tap: DvrTap = if recording { Some(&mut tap_closure) } else { None };

        let mut tx_guard = air_tx.lock().unwrap();
        let more = tx_guard.pump(&mut source, now, &mut sink, tap);
        drop(tx_guard);
        if !more {
            break;
        }
    }
}

struct AirControlSink<'a> {
    air_rx: &'a mut AirRx,
    air_tx: &'a Mutex<AirTx>,
    camera: &'a mut camera::SimulatedCameraController,
    dvr_record: &'a AtomicBool,
    dvr: Option<&'a Mutex<Dvr<FsDvrStorage>>>,
    stats: &'a Stats,
}

impl DecodedSink for AirControlSink<'_> {
    fn on_decoded(&mut self, payload: &[u8]) {
        let mut dvr_flag = self.dvr_record.load(Ordering::Relaxed);
        let mut radio = SimulatedRate;
        let mut tx_guard = self.air_tx.lock().unwrap();
        let pong = self.air_rx.ingest(payload, &mut tx_guard, &mut radio, self.camera, &mut dvr_flag);
        drop(tx_guard);

        if pong.is_none() {
            self.stats.malformed_wire_frame.inc();
            return;
        }

        let was_recording = self.dvr_record.swap(dvr_flag, Ordering::Relaxed);
        if was_recording != dvr_flag {
            if let Some(dvr) = self.dvr {
                let mut dvr = dvr.lock().unwrap();
                if dvr_flag {
                    let _ = dvr.start_session();
                } else {
                    dvr.end_session();
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn control_rx_worker(
    mut capture: DynCapture,
    air_tx: Arc<Mutex<AirTx>>,
    mut air_rx: AirRx,
    mut camera_ctrl: camera::SimulatedCameraController,
    dvr_record: Arc<AtomicBool>,
    dvr: Option<Arc<Mutex<Dvr<FsDvrStorage>>>>,
    stats: Arc<Stats>,
    running: Arc<AtomicBool>,
) {
    let mut decoder = FecDecoder::new(DEFAULT_CONFIG_DESCRIPTOR).expect("default control FEC shape is valid");

    while running.load(Ordering::Relaxed) {
        match capture.capture(Duration::from_millis(30)) {
            Ok(Some(frame)) => {
                if frame.radiotap.bad_fcs() {
                    stats.malformed_wire_frame.inc();
                    continue;
                }
                if Direction::from_payload(&frame.payload) != Some(Direction::GroundToAir) {
                    continue;
                }
                stats.bytes_received.add(frame.payload.len() as u64);

                let wire = &frame.payload[fpv_radio::IEEE80211_HEADER_LEN..];
                let mut sink = AirControlSink {
                    air_rx: &mut air_rx,
                    air_tx: &air_tx,
                    camera: &mut camera_ctrl,
                    dvr_record: &dvr_record,
                    dvr: dvr.as_deref(),
                    stats: &stats,
                };
                if decoder.ingest_frame(wire, &mut sink).is_err() {
                    stats.malformed_wire_frame.inc();
                }
            }
            Ok(None) => continue,
            Err(_) => stats.malformed_wire_frame.inc(),
        }
    }
}

fn dvr_drain_worker(dvr: Arc<Mutex<Dvr<FsDvrStorage>>>, stats: Arc<Stats>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(20));
        let mut dvr = dvr.lock().unwrap();
        if dvr.drain_ram_to_bulk().is_err() {
            stats.dvr_drops.inc();
        }
        if let Err(e) = dvr.drain_bulk_to_file() {
            stats.dvr_write_error.inc();
            tracing::warn!(error = %e, "dvr write failed");
        }
    }
}

fn stats_reporter(stats: Arc<Stats>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_secs(1));
        tracing::info!(snapshot = ?stats.snapshot(), "air stats");
    }
}

/// A self-contained demo ground station: captures whatever `fpv-air` injects
/// as video and logs its size, and periodically injects a `ConfigPacket`
/// uplink toggling `dvr_record`, so `--demo` exercises the full pipeline
/// without a second process or real hardware.
fn demo_toy_ground(mut capture: LoopbackRadio, running: Arc<AtomicBool>) {
    let mut frames = 0u64;
    while running.load(Ordering::Relaxed) {
        if let Ok(Some(frame)) = capture.capture(Duration::from_millis(200)) {
            frames += 1;
            tracing::debug!(frames, bytes = frame.payload.len(), "demo ground: received video transport frame");
        }
    }
}

fn demo_toy_operator(mut injector: LoopbackRadio, running: Arc<AtomicBool>) {
    let mut encoder = FecEncoder::new(DEFAULT_CONFIG_DESCRIPTOR).expect("default control FEC shape is valid");
    let mut toggle = false;
    let mut ping: u8 = 0;
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(500));
        toggle = !toggle;
        let packet = ConfigPacket { ping, dvr_record: toggle, ..ConfigPacket::default() };
        ping = ping.wrapping_add(1);

        let mut bytes = [0u8; fpv_wire::control::CONFIG_PACKET_LEN];
        packet.pack(&mut bytes);
        let mut sink = InjectSink { injector: &mut injector, direction: Direction::GroundToAir };
        let _ = encoder.encode_stream(&bytes, &mut sink);
        let _ = encoder.flush_packet(&mut sink);
        tracing::debug!(toggle, "demo operator: sent config uplink");
    }
}

fn main() -> Result<(), FpvError> {
    let args = Args::parse();
    init_logging(&args);

    if !args.demo && (args.inject.is_none() || args.capture.is_none()) {
        return Err(FpvError::InvalidConfig(
            "--inject and --capture are required unless --demo is passed",
        ));
    }

    let descriptor = FecDescriptor { k: args.fec_k, n: args.fec_n, mtu: args.mtu };
    let initial_config = ConfigPacket {
        fec_k: args.fec_k,
        fec_n: args.fec_n,
        fec_mtu: args.mtu as u16,
        ..ConfigPacket::default()
    };

    let air_tx = Arc::new(Mutex::new(AirTx::new(descriptor)?));
    {
        let mut tx = air_tx.lock().unwrap();
        tx.set_fps_limit(args.fps_limit);
    }
    let air_rx = AirRx::new(initial_config);

    let camera = SharedCamera::new(initial_config.camera);

    let dvr = match &args.dvr_dir {
        Some(dir) => Some(Arc::new(Mutex::new(
            open_fs_dvr(dir).map_err(|e| FpvError::RadioOpen(format!("dvr dir open failed: {e}")))?,
        ))),
        None => None,
    };
    let dvr_record = Arc::new(AtomicBool::new(false));

    let stats = Arc::new(Stats::default());
    let running = Arc::new(AtomicBool::new(true));
    let epoch = Instant::now();

    let (sink_tx, sink_rx) = bounded::<Vec<u8>>(64);

    let mut handles = Vec::new();

    if args.demo {
        tracing::info!("running in --demo mode against an in-process loopback radio pair");
        let (air_inject, toy_ground_capture) = LoopbackRadio::pair("air-inject", "toy-ground");
        let (toy_operator_inject, air_capture) = LoopbackRadio::pair("toy-operator", "air-capture");

        handles.push(std::thread::spawn({
            let running = running.clone();
            move || demo_toy_ground(toy_ground_capture, running)
        }));
        handles.push(std::thread::spawn({
            let running = running.clone();
            move || demo_toy_operator(toy_operator_inject, running)
        }));
        handles.push(std::thread::spawn({
            let stats = stats.clone();
            let running = running.clone();
            move || radio_tx_worker(sink_rx, Box::new(air_inject), stats, running)
        }));
        handles.push(std::thread::spawn({
            let air_tx = air_tx.clone();
            let dvr = dvr.clone();
            let dvr_record = dvr_record.clone();
            let stats = stats.clone();
            let running = running.clone();
            let camera_ctrl = camera.controller();
            move || control_rx_worker(Box::new(air_capture), air_tx, air_rx, camera_ctrl, dvr_record, dvr, stats, running)
        }));
    } else {
        let injector = open_injector(args.inject.as_deref().unwrap())?;
        let capture = open_capture(args.capture.as_deref().unwrap())?;

        handles.push(std::thread::spawn({
            let stats = stats.clone();
            let running = running.clone();
            move || radio_tx_worker(sink_rx, injector, stats, running)
        }));
        handles.push(std::thread::spawn({
            let air_tx = air_tx.clone();
            let dvr = dvr.clone();
            let dvr_record = dvr_record.clone();
            let stats = stats.clone();
            let running = running.clone();
            let camera_ctrl = camera.controller();
            move || control_rx_worker(capture, air_tx, air_rx, camera_ctrl, dvr_record, dvr, stats, running)
        }));
    }

    handles.push(std::thread::spawn({
        let air_tx = air_tx.clone();
        let dvr = dvr.clone();
        let dvr_record = dvr_record.clone();
        let stats = stats.clone();
        let running = running.clone();
        let source = camera.source();
        move || camera_worker(air_tx, source, sink_tx, dvr, dvr_record, stats, epoch, running)
    }));

    if let Some(dvr) = dvr.clone() {
        handles.push(std::thread::spawn({
            let stats = stats.clone();
            let running = running.clone();
            move || dvr_drain_worker(dvr, stats, running)
        }));
    }

    handles.push(std::thread::spawn({
        let stats = stats.clone();
        let running = running.clone();
        move || stats_reporter(stats, running)
    }));

    for handle in handles {
        let _ = handle.join();
    }

    Ok(())
}

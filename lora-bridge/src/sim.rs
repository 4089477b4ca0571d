//! An in-process stand-in for the native driver.
//!
//! `SimDriver` keeps the driver's observable state (initialized flag, pending
//! packets, registered notification) and records every call so tests can check
//! exactly what reached the driver. Packets injected with [`SimDriver::inject`]
//! arrive on a separate thread, the way the native driver's interrupt thread
//! delivers them.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::conf::PinConfig;
use crate::driver::{Driver, ReceiveHandler};

/// A call that reached the simulated driver. Predicates (`initialized`,
/// `received`) are not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    SetPins(PinConfig),
    Init,
    Close,
    Reset,
    ExplicitHeaderMode,
    ImplicitHeaderMode(i32),
    Idle,
    Sleep,
    Receive,
    SetTxPower(i32),
    SetFrequency(i64),
    SetSpreadingFactor(i32),
    SetBandwidth(i64),
    SetCodingRate(i32),
    SetPreambleLength(i64),
    SetSyncWord(i32),
    EnableCrc,
    DisableCrc,
    SendPacket(Vec<u8>),
    ReceivePacket,
    /// `true` when a handler was installed, `false` when it was removed.
    OnReceive(bool),
    WaitForPacket(i32),
    PacketRssi,
    PacketSnr,
}

struct State {
    initialized: bool,
    init_status: i32,
    pins: PinConfig,
    pending: VecDeque<Vec<u8>>,
    reported_len: Option<i32>,
    handler: Option<ReceiveHandler>,
    rssi: i32,
    snr: f32,
    tx_delay: Duration,
    calls: Vec<SimCall>,
}

struct Shared {
    state: Mutex<State>,
    arrived: Condvar,
}

/// Simulated LoRa driver. Clones share the same radio.
#[derive(Clone)]
pub struct SimDriver {
    shared: Arc<Shared>,
}

impl SimDriver {
    /// A fresh, uninitialized radio whose `init` reports status `1`.
    pub fn new() -> Self {
        let state = State {
            initialized: false,
            init_status: 1,
            pins: PinConfig::default(),
            pending: VecDeque::new(),
            reported_len: None,
            handler: None,
            rssi: -120,
            snr: 0.0,
            tx_delay: Duration::ZERO,
            calls: Vec::new(),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                arrived: Condvar::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: SimCall) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    /// Status returned by the next `init`. A non-zero status marks the radio initialized.
    pub fn set_init_status(&self, status: i32) {
        self.state().init_status = status;
    }

    /// How long `send_packet` blocks.
    pub fn set_tx_delay(&self, delay: Duration) {
        self.state().tx_delay = delay;
    }

    /// Values returned by `packet_rssi` and `packet_snr`.
    pub fn set_packet_status(&self, rssi: i32, snr: f32) {
        let mut state = self.state();
        state.rssi = rssi;
        state.snr = snr;
    }

    /// Makes the next `receive_packet` report `len` instead of the real length.
    pub fn override_reported_len(&self, len: Option<i32>) {
        self.state().reported_len = len;
    }

    /// Pins passed to the last `set_pins`.
    pub fn pins(&self) -> PinConfig {
        self.state().pins.clone()
    }

    /// Whether a packet-received handler is installed.
    pub fn has_handler(&self) -> bool {
        self.state().handler.is_some()
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<SimCall> {
        self.state().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Payloads passed to `send_packet`, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                SimCall::SendPacket(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queues a packet and wakes waiters without raising the notification.
    pub fn queue_packet(&self, payload: &[u8]) {
        self.state().pending.push_back(payload.to_vec());
        self.shared.arrived.notify_all();
    }

    /// Delivers a packet from a separate "interrupt" thread: queues it, wakes
    /// waiters and calls the installed handler, if any.
    pub fn inject(&self, payload: &[u8]) -> io::Result<JoinHandle<()>> {
        let sim = self.clone();
        let payload = payload.to_vec();
        thread::Builder::new()
            .name("lora-irq".into())
            .spawn(move || {
                let handler = {
                    let mut state = sim.state();
                    state.pending.push_back(payload);
                    state.handler
                };
                sim.shared.arrived.notify_all();
                if let Some(handler) = handler {
                    handler();
                }
            })
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SimDriver {
    fn set_pins(&self, pins: &PinConfig) {
        let mut state = self.record(SimCall::SetPins(pins.clone()));
        state.pins = pins.clone();
    }

    fn init(&self) -> i32 {
        let mut state = self.record(SimCall::Init);
        state.initialized = state.init_status != 0;
        state.init_status
    }

    fn initialized(&self) -> bool {
        self.state().initialized
    }

    fn close(&self) {
        self.record(SimCall::Close).initialized = false;
    }

    fn reset(&self) {
        self.record(SimCall::Reset);
    }

    fn explicit_header_mode(&self) {
        self.record(SimCall::ExplicitHeaderMode);
    }

    fn implicit_header_mode(&self, size: i32) {
        self.record(SimCall::ImplicitHeaderMode(size));
    }

    fn idle(&self) {
        self.record(SimCall::Idle);
    }

    fn sleep(&self) {
        self.record(SimCall::Sleep);
    }

    fn receive(&self) {
        self.record(SimCall::Receive);
    }

    fn set_tx_power(&self, level: i32) {
        self.record(SimCall::SetTxPower(level));
    }

    fn set_frequency(&self, frequency: i64) {
        self.record(SimCall::SetFrequency(frequency));
    }

    fn set_spreading_factor(&self, sf: i32) {
        self.record(SimCall::SetSpreadingFactor(sf));
    }

    fn set_bandwidth(&self, bandwidth: i64) {
        self.record(SimCall::SetBandwidth(bandwidth));
    }

    fn set_coding_rate(&self, denominator: i32) {
        self.record(SimCall::SetCodingRate(denominator));
    }

    fn set_preamble_length(&self, length: i64) {
        self.record(SimCall::SetPreambleLength(length));
    }

    fn set_sync_word(&self, word: i32) {
        self.record(SimCall::SetSyncWord(word));
    }

    fn enable_crc(&self) {
        self.record(SimCall::EnableCrc);
    }

    fn disable_crc(&self) {
        self.record(SimCall::DisableCrc);
    }

    fn send_packet(&self, data: &[u8]) {
        let delay = self.record(SimCall::SendPacket(data.to_vec())).tx_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    fn received(&self) -> bool {
        !self.state().pending.is_empty()
    }

    fn receive_packet(&self, buf: &mut [u8]) -> i32 {
        let mut state = self.record(SimCall::ReceivePacket);
        let override_len = state.reported_len.take();
        let Some(packet) = state.pending.pop_front() else {
            return override_len.unwrap_or(0);
        };
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        override_len.unwrap_or(len as i32)
    }

    fn on_receive(&self, handler: Option<ReceiveHandler>) {
        let mut state = self.record(SimCall::OnReceive(handler.is_some()));
        state.handler = handler;
    }

    fn wait_for_packet(&self, timeout_ms: i32) {
        let state = self.record(SimCall::WaitForPacket(timeout_ms));
        let arrived = &self.shared.arrived;
        let _state = match u64::try_from(timeout_ms) {
            Ok(ms) => {
                arrived
                    .wait_timeout_while(state, Duration::from_millis(ms), |s| {
                        s.pending.is_empty()
                    })
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            Err(_) => arrived
                .wait_while(state, |s| s.pending.is_empty())
                .unwrap_or_else(PoisonError::into_inner),
        };
    }

    fn packet_rssi(&self) -> i32 {
        self.record(SimCall::PacketRssi).rssi
    }

    fn packet_snr(&self) -> f32 {
        self.record(SimCall::PacketSnr).snr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn init_status_drives_initialized_flag() {
        let sim = SimDriver::new();
        sim.set_init_status(0);
        assert_eq!(sim.init(), 0);
        assert!(!sim.initialized());
        sim.set_init_status(1);
        assert_eq!(sim.init(), 1);
        assert!(sim.initialized());
        sim.close();
        assert!(!sim.initialized());
    }

    #[test]
    fn packets_are_delivered_in_order() {
        let sim = SimDriver::new();
        sim.queue_packet(b"one");
        sim.queue_packet(b"two");
        let mut buf = [0u8; 8];
        assert_eq!(sim.receive_packet(&mut buf), 3);
        assert_eq!(&buf[..3], b"one");
        assert_eq!(sim.receive_packet(&mut buf), 3);
        assert_eq!(&buf[..3], b"two");
        assert!(!sim.received());
    }

    #[test]
    fn wait_times_out_without_packet() {
        let sim = SimDriver::new();
        let start = Instant::now();
        sim.wait_for_packet(30);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_returns_early_on_pending_packet() {
        let sim = SimDriver::new();
        sim.queue_packet(b"x");
        let start = Instant::now();
        sim.wait_for_packet(10_000);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    static HITS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn count_hit() {
        HITS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn inject_calls_handler_from_another_thread() {
        let sim = SimDriver::new();
        sim.on_receive(Some(count_hit));
        sim.inject(b"ping").unwrap().join().unwrap();
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
        assert!(sim.received());

        sim.on_receive(None);
        sim.inject(b"pong").unwrap().join().unwrap();
        assert_eq!(HITS.load(Ordering::SeqCst), 1);
    }
}

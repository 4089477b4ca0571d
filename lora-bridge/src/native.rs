//! [`Driver`] over the native library, through `lora-sys`.

use std::ffi::{c_char, c_int, c_long, CString};
use std::sync::{Mutex, PoisonError};

use crate::conf::PinConfig;
use crate::driver::{Driver, ReceiveHandler};

/// The native driver. Its state lives in the C library's globals, so every
/// `NativeDriver` talks to the same radio.
#[derive(Default)]
pub struct NativeDriver {
    // The driver may keep the pointer passed to `lora_set_pins`.
    spi_device: Mutex<Option<CString>>,
}

impl NativeDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn c_len(len: usize) -> c_int {
    c_int::try_from(len).unwrap_or(c_int::MAX)
}

impl Driver for NativeDriver {
    fn set_pins(&self, pins: &PinConfig) {
        let mut spi_device = self
            .spi_device
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // NUL bytes are rejected before the call reaches the driver.
        *spi_device = pins
            .spi_device
            .as_deref()
            .and_then(|dev| CString::new(dev).ok());
        let dev = spi_device
            .as_ref()
            .map_or(std::ptr::null(), |dev| dev.as_ptr());
        unsafe { lora_sys::lora_set_pins(dev, pins.cs_pin, pins.rst_pin, pins.irq_pin) }
    }

    fn init(&self) -> i32 {
        unsafe { lora_sys::lora_init() }
    }

    fn initialized(&self) -> bool {
        unsafe { lora_sys::lora_initialized() != 0 }
    }

    fn close(&self) {
        unsafe { lora_sys::lora_close() }
    }

    fn reset(&self) {
        unsafe { lora_sys::lora_reset() }
    }

    fn explicit_header_mode(&self) {
        unsafe { lora_sys::lora_explicit_header_mode() }
    }

    fn implicit_header_mode(&self, size: i32) {
        unsafe { lora_sys::lora_implicit_header_mode(size) }
    }

    fn idle(&self) {
        unsafe { lora_sys::lora_idle() }
    }

    fn sleep(&self) {
        unsafe { lora_sys::lora_sleep() }
    }

    fn receive(&self) {
        unsafe { lora_sys::lora_receive() }
    }

    fn set_tx_power(&self, level: i32) {
        unsafe { lora_sys::lora_set_tx_power(level) }
    }

    fn set_frequency(&self, frequency: i64) {
        unsafe { lora_sys::lora_set_frequency(frequency as c_long) }
    }

    fn set_spreading_factor(&self, sf: i32) {
        unsafe { lora_sys::lora_set_spreading_factor(sf) }
    }

    fn set_bandwidth(&self, bandwidth: i64) {
        unsafe { lora_sys::lora_set_bandwidth(bandwidth as c_long) }
    }

    fn set_coding_rate(&self, denominator: i32) {
        unsafe { lora_sys::lora_set_coding_rate(denominator) }
    }

    fn set_preamble_length(&self, length: i64) {
        unsafe { lora_sys::lora_set_preamble_length(length as c_long) }
    }

    fn set_sync_word(&self, word: i32) {
        unsafe { lora_sys::lora_set_sync_word(word) }
    }

    fn enable_crc(&self) {
        unsafe { lora_sys::lora_enable_crc() }
    }

    fn disable_crc(&self) {
        unsafe { lora_sys::lora_disable_crc() }
    }

    fn send_packet(&self, data: &[u8]) {
        // The C side takes a mutable pointer; never hand it the caller's memory.
        let mut buf = data.to_vec();
        unsafe { lora_sys::lora_send_packet(buf.as_mut_ptr(), c_len(buf.len())) }
    }

    fn received(&self) -> bool {
        unsafe { lora_sys::lora_received() != 0 }
    }

    fn receive_packet(&self, buf: &mut [u8]) -> i32 {
        let len = c_len(buf.len());
        unsafe { lora_sys::lora_receive_packet(buf.as_mut_ptr().cast::<c_char>(), len) }
    }

    fn on_receive(&self, handler: Option<ReceiveHandler>) {
        let handler = handler.map(|h| h as unsafe extern "C" fn());
        unsafe { lora_sys::lora_on_receive(handler) }
    }

    fn wait_for_packet(&self, timeout_ms: i32) {
        unsafe { lora_sys::lora_wait_for_packet(timeout_ms) }
    }

    fn packet_rssi(&self) -> i32 {
        unsafe { lora_sys::lora_packet_rssi() }
    }

    fn packet_snr(&self) -> f32 {
        unsafe { lora_sys::lora_packet_snr() }
    }
}

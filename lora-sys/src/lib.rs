//! Raw bindings to the native LoRa modem driver.
//!
//! These are the entry points declared in the driver's `lora.h`. The driver
//! keeps all of its state in globals, so none of the functions take a handle.
//! Nothing here is safe to call before `lora_set_pins`/`lora_init` have run
//! except the functions documented otherwise; see the `lora-bridge` crate for
//! a checked interface.

#![no_std]
#![allow(non_camel_case_types)]

use core::ffi::{c_char, c_float, c_int, c_long};

/// Callback invoked by the driver from its interrupt path when a packet arrives.
pub type lora_rx_callback_t = Option<unsafe extern "C" fn()>;

#[link(name = "lora")]
extern "C" {
    /// Selects the SPI device node and GPIO pins. Must be called before `lora_init`.
    /// A null `spidev` or a `-1` pin keeps the driver's default.
    pub fn lora_set_pins(spidev: *const c_char, cs: c_int, rst: c_int, irq: c_int);
    /// Opens the bus and probes the modem. Returns the driver's status code.
    pub fn lora_init() -> c_int;
    /// Non-zero once `lora_init` succeeded and `lora_close` has not been called.
    pub fn lora_initialized() -> c_int;
    pub fn lora_close();
    pub fn lora_reset();

    pub fn lora_explicit_header_mode();
    pub fn lora_implicit_header_mode(size: c_int);
    pub fn lora_idle();
    pub fn lora_sleep();
    /// Enters continuous receive mode.
    pub fn lora_receive();

    pub fn lora_set_tx_power(level: c_int);
    pub fn lora_set_frequency(frequency: c_long);
    pub fn lora_set_spreading_factor(sf: c_int);
    pub fn lora_set_bandwidth(sbw: c_long);
    pub fn lora_set_coding_rate(denominator: c_int);
    pub fn lora_set_preamble_length(length: c_long);
    pub fn lora_set_sync_word(sw: c_int);
    pub fn lora_enable_crc();
    pub fn lora_disable_crc();

    /// Blocks until the packet has been transmitted.
    pub fn lora_send_packet(buf: *mut u8, size: c_int);
    /// Non-zero when a received packet is waiting in the modem FIFO.
    pub fn lora_received() -> c_int;
    /// Copies at most `size` bytes of the pending packet into `buf` and returns its length.
    pub fn lora_receive_packet(buf: *mut c_char, size: c_int) -> c_int;
    /// Installs (or removes, with `None`) the packet-received callback.
    pub fn lora_on_receive(cb: lora_rx_callback_t);
    /// Blocks until a packet arrives or `timeout` milliseconds elapse. Negative waits forever.
    pub fn lora_wait_for_packet(timeout: c_int);

    pub fn lora_packet_rssi() -> c_int;
    pub fn lora_packet_snr() -> c_float;
}

//! The seam between the binding layer and the radio driver.

use crate::conf::PinConfig;

/// Function the driver calls, possibly from its interrupt thread, when a packet arrives.
pub type ReceiveHandler = extern "C" fn();

/// The operations of the native LoRa driver, one method per header entry point.
///
/// The native driver keeps its state in globals and may be called from any
/// thread, so every method takes `&self` and implementations must be `Sync`.
/// Implementations do not validate arguments; that is the driver's business.
pub trait Driver: Send + Sync {
    /// Selects SPI device and pins. Only meaningful before [`Driver::init`].
    fn set_pins(&self, pins: &PinConfig);
    /// Opens the bus and probes the modem, returning the driver's status code.
    fn init(&self) -> i32;
    /// Whether `init` has run and `close` has not.
    fn initialized(&self) -> bool;
    /// Releases the bus.
    fn close(&self);
    /// Pulses the reset line.
    fn reset(&self);

    /// Switches to explicit header mode.
    fn explicit_header_mode(&self);
    /// Switches to implicit header mode with a fixed payload size.
    fn implicit_header_mode(&self, size: i32);
    /// Enters standby.
    fn idle(&self);
    /// Enters sleep.
    fn sleep(&self);
    /// Enters continuous receive mode.
    fn receive(&self);

    /// Sets the transmit power.
    fn set_tx_power(&self, level: i32);
    /// Sets the carrier frequency in Hz.
    fn set_frequency(&self, frequency: i64);
    /// Sets the spreading factor.
    fn set_spreading_factor(&self, sf: i32);
    /// Sets the signal bandwidth in Hz.
    fn set_bandwidth(&self, bandwidth: i64);
    /// Sets the coding rate denominator.
    fn set_coding_rate(&self, denominator: i32);
    /// Sets the preamble length in symbols.
    fn set_preamble_length(&self, length: i64);
    /// Sets the sync word.
    fn set_sync_word(&self, word: i32);
    /// Enables the payload CRC.
    fn enable_crc(&self);
    /// Disables the payload CRC.
    fn disable_crc(&self);

    /// Transmits `data`, blocking until the modem reports completion.
    fn send_packet(&self, data: &[u8]);
    /// Whether a received packet is pending.
    fn received(&self) -> bool;
    /// Copies the pending packet into `buf` and returns the length the driver reports.
    ///
    /// The reported length is not guaranteed to fit `buf`; callers must clamp it.
    fn receive_packet(&self, buf: &mut [u8]) -> i32;
    /// Installs or removes the packet-received notification.
    fn on_receive(&self, handler: Option<ReceiveHandler>);
    /// Blocks until a packet arrives or `timeout_ms` elapses. Negative waits forever.
    fn wait_for_packet(&self, timeout_ms: i32);

    /// RSSI of the last packet in dBm.
    fn packet_rssi(&self) -> i32;
    /// SNR of the last packet in dB.
    fn packet_snr(&self) -> f32;
}

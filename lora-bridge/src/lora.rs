//! The checked interface over a [`Driver`].

use std::time::Duration;

use crate::callback::{self, Callback};
use crate::conf::{HeaderMode, PinConfig, RadioConfig, MAX_PAYLOAD};
use crate::driver::Driver;
use crate::err::{Error, Result};
use crate::host;

/// Guarded pass-through to the LoRa driver.
///
/// Every operation that depends on driver state fails with
/// [`Error::NotInitialized`] until [`Lora::init`] has succeeded, and then does
/// nothing more than forward its arguments. `send_packet` and
/// `wait_for_packet` release the host execution lock while the driver blocks.
pub struct Lora<D: Driver> {
    driver: D,
}

impl<D: Driver> Lora<D> {
    /// Wraps a driver.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Whether the driver reports itself initialized.
    pub fn is_initialized(&self) -> bool {
        self.driver.initialized()
    }

    /// Runs `f` against the driver if it is initialized.
    fn guarded<T>(&self, op: &'static str, f: impl FnOnce(&D) -> T) -> Result<T> {
        if !self.driver.initialized() {
            log::warn!("lora::{op} called before init");
            return Err(Error::NotInitialized);
        }
        log::trace!("lora::{op}");
        Ok(f(&self.driver))
    }

    /// Assigns SPI device and pins. Rejected once the bus is open.
    pub fn set_pins(&self, pins: &PinConfig) -> Result<()> {
        if self.driver.initialized() {
            log::warn!("lora::set_pins called after init");
            return Err(Error::PinsLocked);
        }
        if pins
            .spi_device
            .as_deref()
            .is_some_and(|dev| dev.contains('\0'))
        {
            return Err(Error::argument("set_pins", "spi_device contains a NUL byte"));
        }
        log::trace!("lora::set_pins {pins:?}");
        self.driver.set_pins(pins);
        Ok(())
    }

    /// Initializes the driver and returns its raw status code.
    ///
    /// The meaning of the code is the driver's convention and is not interpreted.
    pub fn init(&self) -> i32 {
        let status = self.driver.init();
        log::debug!("lora::init status {status}");
        status
    }

    /// Shuts the driver down. Valid in any state.
    pub fn close(&self) {
        log::debug!("lora::close");
        self.driver.close();
    }

    /// Resets the modem.
    pub fn reset(&self) -> Result<()> {
        self.guarded("reset", |d| d.reset())
    }

    /// Switches to explicit header mode.
    pub fn explicit_header_mode(&self) -> Result<()> {
        self.guarded("explicit_header_mode", |d| d.explicit_header_mode())
    }

    /// Switches to implicit header mode with a fixed payload size.
    pub fn implicit_header_mode(&self, size: i32) -> Result<()> {
        self.guarded("implicit_header_mode", |d| d.implicit_header_mode(size))
    }

    /// Applies a [`HeaderMode`].
    pub fn set_header_mode(&self, mode: HeaderMode) -> Result<()> {
        match mode {
            HeaderMode::Explicit => self.explicit_header_mode(),
            HeaderMode::Implicit { size } => self.implicit_header_mode(size),
        }
    }

    /// Enters standby.
    pub fn idle(&self) -> Result<()> {
        self.guarded("idle", |d| d.idle())
    }

    /// Enters sleep.
    pub fn sleep(&self) -> Result<()> {
        self.guarded("sleep", |d| d.sleep())
    }

    /// Enters continuous receive mode.
    pub fn receive(&self) -> Result<()> {
        self.guarded("receive", |d| d.receive())
    }

    /// Sets the transmit power level.
    pub fn set_tx_power(&self, level: i32) -> Result<()> {
        self.guarded("set_tx_power", |d| d.set_tx_power(level))
    }

    /// Sets the carrier frequency in Hz.
    pub fn set_frequency(&self, frequency: i64) -> Result<()> {
        self.guarded("set_frequency", |d| d.set_frequency(frequency))
    }

    /// Sets the spreading factor.
    pub fn set_spreading_factor(&self, sf: i32) -> Result<()> {
        self.guarded("set_spreading_factor", |d| d.set_spreading_factor(sf))
    }

    /// Sets the signal bandwidth in Hz.
    pub fn set_bandwidth(&self, bandwidth: i64) -> Result<()> {
        self.guarded("set_bandwidth", |d| d.set_bandwidth(bandwidth))
    }

    /// Sets the coding rate denominator (4/x).
    pub fn set_coding_rate(&self, denominator: i32) -> Result<()> {
        self.guarded("set_coding_rate", |d| d.set_coding_rate(denominator))
    }

    /// Sets the preamble length in symbols.
    pub fn set_preamble_length(&self, length: i64) -> Result<()> {
        self.guarded("set_preamble_length", |d| d.set_preamble_length(length))
    }

    /// Sets the sync word.
    pub fn set_sync_word(&self, word: i32) -> Result<()> {
        self.guarded("set_sync_word", |d| d.set_sync_word(word))
    }

    /// Turns on the payload CRC.
    pub fn enable_crc(&self) -> Result<()> {
        self.guarded("enable_crc", |d| d.enable_crc())
    }

    /// Turns off the payload CRC.
    pub fn disable_crc(&self) -> Result<()> {
        self.guarded("disable_crc", |d| d.disable_crc())
    }

    /// Applies every field of `conf`. Stops at the first error.
    pub fn configure(&self, conf: &RadioConfig) -> Result<()> {
        self.set_header_mode(conf.header_mode)?;
        self.set_tx_power(conf.tx_power)?;
        self.set_frequency(conf.frequency)?;
        self.set_spreading_factor(conf.spreading_factor)?;
        self.set_bandwidth(conf.bandwidth)?;
        self.set_coding_rate(conf.coding_rate)?;
        self.set_preamble_length(conf.preamble_length)?;
        self.set_sync_word(conf.sync_word)?;
        if conf.crc {
            self.enable_crc()
        } else {
            self.disable_crc()
        }
    }

    /// RSSI of the last received packet.
    pub fn packet_rssi(&self) -> Result<i32> {
        self.guarded("packet_rssi", |d| d.packet_rssi())
    }

    /// SNR of the last received packet.
    pub fn packet_snr(&self) -> Result<f32> {
        self.guarded("packet_snr", |d| d.packet_snr())
    }

    /// Transmits `data`. Blocks until the driver is done, with the host lock released.
    pub fn send_packet(&self, data: &[u8]) -> Result<()> {
        self.guarded("send_packet", |d| {
            log::trace!("lora::send_packet len={}", data.len());
            host::global().allow_threads(|| d.send_packet(data));
        })
    }

    /// Whether a received packet is waiting. `false` while uninitialized.
    pub fn packet_available(&self) -> bool {
        self.driver.initialized() && self.driver.received()
    }

    /// Takes the pending packet, or `None` if there is none.
    pub fn receive_packet(&self) -> Result<Option<Vec<u8>>> {
        if !self.packet_available() {
            return Ok(None);
        }

        let mut scratch = Vec::new();
        scratch.try_reserve_exact(MAX_PAYLOAD)?;
        scratch.resize(MAX_PAYLOAD, 0u8);

        let reported = self.driver.receive_packet(&mut scratch);
        let len = match usize::try_from(reported) {
            Ok(len) if len <= MAX_PAYLOAD => len,
            Ok(len) => {
                log::warn!("lora::receive_packet driver reported {len} bytes, truncating");
                MAX_PAYLOAD
            }
            Err(_) => {
                log::warn!("lora::receive_packet driver reported length {reported}");
                0
            }
        };
        log::trace!("lora::receive_packet len={len}");

        let mut packet = Vec::new();
        packet.try_reserve_exact(len)?;
        packet.extend_from_slice(&scratch[..len]);
        Ok(Some(packet))
    }

    /// Registers `callback` to run on every received packet, or unregisters with `None`.
    ///
    /// The previous callback, if any, is released.
    pub fn on_receive(&self, callback: Option<Callback>) -> Result<()> {
        self.guarded("on_receive", |d| {
            let previous = match callback {
                Some(callback) => {
                    let previous = callback::install(Some(callback));
                    d.on_receive(Some(callback::packet_received));
                    log::debug!("lora::on_receive callback installed");
                    previous
                }
                None => {
                    let previous = callback::install(None);
                    d.on_receive(None);
                    log::debug!("lora::on_receive callback cleared");
                    previous
                }
            };
            drop(previous);
        })
    }

    /// Blocks until a packet arrives or `timeout` elapses. `None` waits forever.
    pub fn wait_for_packet(&self, timeout: Option<Duration>) -> Result<()> {
        let timeout_ms = timeout_millis(timeout);
        self.guarded("wait_for_packet", |d| {
            host::global().allow_threads(|| d.wait_for_packet(timeout_ms));
        })
    }
}

/// Driver timeout argument for `timeout`: milliseconds, saturated, `-1` for forever.
fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(timeout) => i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX),
        None => -1,
    }
}

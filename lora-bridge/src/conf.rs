//! Configuration passed through to the driver.
//!
//! None of these values are validated here. Range checking, clamping and the
//! actual register encoding belong to the driver.

/// Largest payload a LoRa packet can carry, and the size of the receive scratch buffer.
pub const MAX_PAYLOAD: usize = 255;

/// Bus and pin assignment. Must be applied before `init()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    /// SPI device node, e.g. `/dev/spidev0.0`. `None` keeps the driver default.
    pub spi_device: Option<String>,
    /// Chip-select pin number.
    pub cs_pin: i32,
    /// Reset pin number.
    pub rst_pin: i32,
    /// DIO0 interrupt pin number.
    pub irq_pin: i32,
}

impl PinConfig {
    /// Sentinel for a pin the driver should leave at its default.
    pub const UNSET: i32 = -1;

    /// Sets the SPI device node.
    pub fn set_spi_device(mut self, spi_device: impl Into<String>) -> Self {
        self.spi_device = Some(spi_device.into());
        self
    }

    /// Sets the chip-select pin.
    pub fn set_cs_pin(mut self, cs_pin: i32) -> Self {
        self.cs_pin = cs_pin;
        self
    }

    /// Sets the reset pin.
    pub fn set_rst_pin(mut self, rst_pin: i32) -> Self {
        self.rst_pin = rst_pin;
        self
    }

    /// Sets the interrupt pin.
    pub fn set_irq_pin(mut self, irq_pin: i32) -> Self {
        self.irq_pin = irq_pin;
        self
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            spi_device: None,
            cs_pin: Self::UNSET,
            rst_pin: Self::UNSET,
            irq_pin: Self::UNSET,
        }
    }
}

/// LoRa header mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMode {
    /// Variable length packets, length carried in the header.
    Explicit,
    /// Fixed length packets with no header.
    Implicit {
        /// Declared payload size in bytes.
        size: i32,
    },
}

/// Radio parameters applied in one go by [`Lora::configure`](crate::Lora::configure).
#[derive(Debug, Clone, PartialEq)]
pub struct RadioConfig {
    /// Header mode
    pub header_mode: HeaderMode,
    /// Transmit power in dBm
    pub tx_power: i32,
    /// Carrier frequency in Hz
    pub frequency: i64,
    /// Spreading factor (6..=12 on SX127x)
    pub spreading_factor: i32,
    /// Signal bandwidth in Hz
    pub bandwidth: i64,
    /// Coding rate denominator (5..=8 for 4/5..4/8)
    pub coding_rate: i32,
    /// Preamble length in symbols
    pub preamble_length: i64,
    /// Sync word
    pub sync_word: i32,
    /// Payload CRC
    pub crc: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            header_mode: HeaderMode::Explicit,
            tx_power: 17,
            frequency: 868_000_000,
            spreading_factor: 7,
            bandwidth: 125_000,
            coding_rate: 5,
            preamble_length: 8,
            sync_word: 0x12, // private network
            crc: true,
        }
    }
}

impl RadioConfig {
    /// Sets the header mode.
    pub fn set_header_mode(mut self, header_mode: HeaderMode) -> Self {
        self.header_mode = header_mode;
        self
    }

    /// Sets the transmit power.
    pub fn set_tx_power(mut self, tx_power: i32) -> Self {
        self.tx_power = tx_power;
        self
    }

    /// Sets the carrier frequency.
    pub fn set_frequency(mut self, frequency: i64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Sets the spreading factor.
    pub fn set_spreading_factor(mut self, spreading_factor: i32) -> Self {
        self.spreading_factor = spreading_factor;
        self
    }

    /// Sets the bandwidth.
    pub fn set_bandwidth(mut self, bandwidth: i64) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Sets the coding rate denominator.
    pub fn set_coding_rate(mut self, coding_rate: i32) -> Self {
        self.coding_rate = coding_rate;
        self
    }

    /// Sets the preamble length.
    pub fn set_preamble_length(mut self, preamble_length: i64) -> Self {
        self.preamble_length = preamble_length;
        self
    }

    /// Sets the sync word.
    pub fn set_sync_word(mut self, sync_word: i32) -> Self {
        self.sync_word = sync_word;
        self
    }

    /// Enables or disables the payload CRC.
    pub fn set_crc(mut self, crc: bool) -> Self {
        self.crc = crc;
        self
    }
}

//! Binding layer between a scripting host and the native LoRa modem driver.
//!
//! The driver (`liblora`, see the `lora-sys` crate) owns everything about the
//! radio: register access, timing, modulation, framing. This crate only
//! forwards calls to it, with three bits of behaviour of its own:
//!
//! * every driver-dependent call is refused with [`Error::NotInitialized`]
//!   until `init()` has run;
//! * the two calls that block in the driver, `send_packet` and
//!   `wait_for_packet`, release the host's global execution lock
//!   ([`host::ExecutionLock`]) for their duration;
//! * a host callback can be registered for packet arrival. The driver calls a
//!   fixed trampoline ([`callback::packet_received`]) from its interrupt
//!   thread, which takes the execution lock and runs the callback.
//!
//! [`Lora`] is the typed interface. [`Module`] is what a host loads: a table
//! of named functions taking and returning [`Value`]s.
//!
//! # Usage
//!
//! ```
//! use lora_bridge::sim::SimDriver;
//! use lora_bridge::{Lora, PinConfig, RadioConfig};
//!
//! let sim = SimDriver::new();
//! let lora = Lora::new(sim.clone());
//!
//! lora.set_pins(&PinConfig::default().set_spi_device("/dev/spidev0.0")).unwrap();
//! lora.init();
//! lora.configure(&RadioConfig::default()).unwrap();
//!
//! lora.send_packet(b"Hello LoRa!").unwrap();
//! assert_eq!(sim.sent(), vec![b"Hello LoRa!".to_vec()]);
//!
//! sim.queue_packet(b"pong");
//! assert_eq!(lora.receive_packet().unwrap(), Some(b"pong".to_vec()));
//! ```
//!
//! With the `native` feature, `NativeDriver` talks to the real library.

pub mod callback;
pub mod conf;
pub mod driver;
mod err;
pub mod host;
mod lora;
pub mod module;
#[cfg(feature = "native")]
mod native;
pub mod sim;
pub mod value;

pub use callback::Callback;
pub use conf::{HeaderMode, PinConfig, RadioConfig, MAX_PAYLOAD};
pub use driver::Driver;
pub use err::{Error, ErrorKind, Result};
pub use lora::Lora;
pub use module::Module;
#[cfg(feature = "native")]
pub use native::NativeDriver;
pub use value::Value;

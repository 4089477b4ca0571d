//! The exported method table.
//!
//! A scripting host sees the module as a flat set of named functions. Each
//! entry of [`METHODS`] maps one name to a [`Lora`] operation, states what
//! argument shapes it accepts and whether it needs an initialized driver.
//! [`Module::call`] checks the initialization requirement once for every
//! guarded entry, then unpacks the host [`Value`]s and converts the result
//! back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::callback;
use crate::conf::PinConfig;
use crate::driver::Driver;
use crate::err::{Error, Result};
use crate::lora::Lora;
use crate::value::Value;

/// Argument convention of an exported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// No arguments at all.
    NoArgs,
    /// Positional arguments only.
    VarArgs,
    /// Positional and keyword arguments.
    Keywords,
}

/// The operation behind a method table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reset,
    ExplicitHeaderMode,
    ImplicitHeaderMode,
    Idle,
    Sleep,
    Receive,
    SetTxPower,
    SetFrequency,
    SetSpreadingFactor,
    SetBandwidth,
    SetCodingRate,
    SetPreambleLength,
    SetSyncWord,
    EnableCrc,
    DisableCrc,
    SetPins,
    Init,
    PacketRssi,
    PacketSnr,
    Close,
    SendPacket,
    PacketAvailable,
    ReceivePacket,
    OnReceive,
    WaitForPacket,
}

/// One exported function.
#[derive(Debug, Clone, Copy)]
pub struct MethodDef {
    pub name: &'static str,
    pub op: Op,
    pub signature: Signature,
    /// Fails with [`Error::NotInitialized`] before `init()`.
    pub requires_init: bool,
}

const fn def(
    name: &'static str,
    op: Op,
    signature: Signature,
    requires_init: bool,
) -> MethodDef {
    MethodDef {
        name,
        op,
        signature,
        requires_init,
    }
}

use Signature::{Keywords, NoArgs, VarArgs};

/// Every function the module exports.
pub const METHODS: &[MethodDef] = &[
    def("reset", Op::Reset, NoArgs, true),
    def("explicit_header_mode", Op::ExplicitHeaderMode, NoArgs, true),
    def("implicit_header_mode", Op::ImplicitHeaderMode, VarArgs, true),
    def("idle", Op::Idle, NoArgs, true),
    def("sleep", Op::Sleep, NoArgs, true),
    def("receive", Op::Receive, NoArgs, true),
    def("set_tx_power", Op::SetTxPower, VarArgs, true),
    def("set_frequency", Op::SetFrequency, VarArgs, true),
    def("set_spreading_factor", Op::SetSpreadingFactor, VarArgs, true),
    def("set_bandwidth", Op::SetBandwidth, VarArgs, true),
    def("set_coding_rate", Op::SetCodingRate, VarArgs, true),
    def("set_preamble_length", Op::SetPreambleLength, VarArgs, true),
    def("set_sync_word", Op::SetSyncWord, VarArgs, true),
    def("enable_crc", Op::EnableCrc, NoArgs, true),
    def("disable_crc", Op::DisableCrc, NoArgs, true),
    def("set_pins", Op::SetPins, Keywords, false),
    def("init", Op::Init, NoArgs, false),
    def("packet_rssi", Op::PacketRssi, NoArgs, true),
    def("packet_snr", Op::PacketSnr, NoArgs, true),
    def("close", Op::Close, NoArgs, false),
    def("send_packet", Op::SendPacket, VarArgs, true),
    def("packet_available", Op::PacketAvailable, NoArgs, false),
    def("receive_packet", Op::ReceivePacket, NoArgs, false),
    def("on_receive", Op::OnReceive, VarArgs, true),
    def("wait_for_packet", Op::WaitForPacket, VarArgs, true),
];

/// Looks up a method table entry by exported name.
pub fn lookup(name: &str) -> Option<&'static MethodDef> {
    METHODS.iter().find(|def| def.name == name)
}

const SET_PINS_KEYWORDS: [&str; 4] = ["spi_device", "cs_pin", "rst_pin", "irq_pin"];

/// Arguments of one call, already checked against the entry's [`Signature`].
struct Args<'a> {
    method: &'static str,
    positional: &'a [Value],
    keywords: &'a [(&'a str, Value)],
}

impl<'a> Args<'a> {
    fn new(
        def: &MethodDef,
        positional: &'a [Value],
        keywords: &'a [(&'a str, Value)],
    ) -> Result<Self> {
        let method = def.name;
        match def.signature {
            NoArgs if !positional.is_empty() || !keywords.is_empty() => {
                return Err(Error::argument(
                    method,
                    format!(
                        "takes no arguments ({} given)",
                        positional.len() + keywords.len()
                    ),
                ));
            }
            VarArgs if !keywords.is_empty() => {
                return Err(Error::argument(method, "takes no keyword arguments"));
            }
            _ => {}
        }
        Ok(Self {
            method,
            positional,
            keywords,
        })
    }

    fn count(&self, min: usize, max: usize) -> Result<()> {
        let given = self.positional.len();
        if (min..=max).contains(&given) {
            return Ok(());
        }
        let expected = if min == max {
            format!("exactly {min}")
        } else {
            format!("at most {max}")
        };
        Err(Error::argument(
            self.method,
            format!("takes {expected} argument(s) ({given} given)"),
        ))
    }

    fn int<T: TryFrom<i64>>(&self, value: &Value) -> Result<T> {
        let n = match value {
            Value::Int(n) => *n,
            Value::Bool(b) => i64::from(*b),
            other => {
                return Err(Error::argument(
                    self.method,
                    format!("an integer is required (got type {})", other.type_name()),
                ))
            }
        };
        T::try_from(n).map_err(|_| {
            Error::argument(self.method, format!("integer {n} out of range for C type"))
        })
    }

    /// The single positional integer of a one-argument setter.
    fn single_int<T: TryFrom<i64>>(&self) -> Result<T> {
        self.count(1, 1)?;
        self.int(&self.positional[0])
    }

    fn set_pins(&self) -> Result<PinConfig> {
        self.count(0, SET_PINS_KEYWORDS.len())?;
        let mut slots: [Option<&Value>; 4] = [None; 4];
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (key, value) in self.keywords {
            let Some(idx) = SET_PINS_KEYWORDS.iter().position(|k| k == key) else {
                return Err(Error::argument(
                    self.method,
                    format!("'{key}' is an invalid keyword argument"),
                ));
            };
            if slots[idx].is_some() {
                return Err(Error::argument(
                    self.method,
                    format!("argument '{key}' given by name and position"),
                ));
            }
            slots[idx] = Some(value);
        }

        let mut pins = PinConfig::default();
        if let Some(value) = slots[0] {
            match value {
                Value::Str(dev) => pins.spi_device = Some(dev.clone()),
                other => {
                    return Err(Error::argument(
                        self.method,
                        format!("spi_device must be str, not {}", other.type_name()),
                    ))
                }
            }
        }
        let pin = |idx: usize, default: i32| slots[idx].map_or(Ok(default), |v| self.int(v));
        pins.cs_pin = pin(1, pins.cs_pin)?;
        pins.rst_pin = pin(2, pins.rst_pin)?;
        pins.irq_pin = pin(3, pins.irq_pin)?;
        Ok(pins)
    }
}

/// The module as a scripting host loads it: one driver, one method table.
///
/// Dropping the module clears the receive callback it registered, unless
/// another registration has replaced it since.
pub struct Module<D: Driver> {
    lora: Lora<D>,
    // Last callback this module registered.
    registered: Mutex<Option<Weak<dyn Fn() + Send + Sync>>>,
}

impl<D: Driver> Module<D> {
    /// Loads the module over `driver`.
    pub fn new(driver: D) -> Self {
        Self {
            lora: Lora::new(driver),
            registered: Mutex::new(None),
        }
    }

    fn registered(&self) -> MutexGuard<'_, Option<Weak<dyn Fn() + Send + Sync>>> {
        self.registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The typed interface behind the table.
    pub fn lora(&self) -> &Lora<D> {
        &self.lora
    }

    /// Calls the exported function `name`.
    pub fn call(&self, name: &str, args: &[Value], kwargs: &[(&str, Value)]) -> Result<Value> {
        let def = lookup(name).ok_or_else(|| Error::UnknownMethod(name.to_owned()))?;
        if def.requires_init && !self.lora.is_initialized() {
            log::warn!("lora::{} called before init", def.name);
            return Err(Error::NotInitialized);
        }
        let args = Args::new(def, args, kwargs)?;
        self.dispatch(def.op, &args)
    }

    fn dispatch(&self, op: Op, args: &Args<'_>) -> Result<Value> {
        let lora = &self.lora;
        let unit = |result: Result<()>| result.map(|()| Value::None);
        match op {
            Op::Reset => unit(lora.reset()),
            Op::ExplicitHeaderMode => unit(lora.explicit_header_mode()),
            Op::ImplicitHeaderMode => unit(lora.implicit_header_mode(args.single_int()?)),
            Op::Idle => unit(lora.idle()),
            Op::Sleep => unit(lora.sleep()),
            Op::Receive => unit(lora.receive()),
            Op::SetTxPower => unit(lora.set_tx_power(args.single_int()?)),
            Op::SetFrequency => unit(lora.set_frequency(args.single_int()?)),
            Op::SetSpreadingFactor => unit(lora.set_spreading_factor(args.single_int()?)),
            Op::SetBandwidth => unit(lora.set_bandwidth(args.single_int()?)),
            Op::SetCodingRate => unit(lora.set_coding_rate(args.single_int()?)),
            Op::SetPreambleLength => unit(lora.set_preamble_length(args.single_int()?)),
            Op::SetSyncWord => unit(lora.set_sync_word(args.single_int()?)),
            Op::EnableCrc => unit(lora.enable_crc()),
            Op::DisableCrc => unit(lora.disable_crc()),
            Op::SetPins => {
                // The lock is reported before any complaint about the arguments.
                if lora.is_initialized() {
                    return Err(Error::PinsLocked);
                }
                unit(lora.set_pins(&args.set_pins()?))
            }
            Op::Init => Ok(Value::Int(lora.init().into())),
            Op::PacketRssi => lora.packet_rssi().map(|rssi| Value::Int(rssi.into())),
            Op::PacketSnr => lora.packet_snr().map(Value::from),
            Op::Close => {
                lora.close();
                Ok(Value::None)
            }
            Op::SendPacket => {
                if args.positional.len() != 1 {
                    return Err(Error::argument(args.method, "Packet data not provided"));
                }
                let data = args.positional[0]
                    .as_byte_buffer()
                    .map_err(|reason| Error::argument(args.method, reason))?;
                unit(lora.send_packet(&data))
            }
            Op::PacketAvailable => Ok(lora.packet_available().into()),
            Op::ReceivePacket => Ok(lora
                .receive_packet()?
                .map_or(Value::None, Value::ByteArray)),
            Op::OnReceive => {
                args.count(1, 1)?;
                match &args.positional[0] {
                    Value::None => {
                        lora.on_receive(None)?;
                        *self.registered() = None;
                        Ok(Value::None)
                    }
                    Value::Callable(cb) => {
                        lora.on_receive(Some(cb.clone()))?;
                        *self.registered() = Some(Arc::downgrade(cb));
                        Ok(Value::None)
                    }
                    _ => Err(Error::argument(
                        args.method,
                        "Parameter for on_receive() must be callable",
                    )),
                }
            }
            Op::WaitForPacket => {
                args.count(0, 1)?;
                let timeout = match args.positional.first() {
                    Some(value) => {
                        let ms: i32 = args.int(value)?;
                        u64::try_from(ms).ok().map(Duration::from_millis)
                    }
                    None => None,
                };
                unit(lora.wait_for_packet(timeout))
            }
        }
    }
}

impl<D: Driver> Drop for Module<D> {
    fn drop(&mut self) {
        let registered = self.registered().take();
        if let Some(cb) = registered.and_then(|weak| weak.upgrade()) {
            callback::release(&cb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::serial;
    use crate::err::ErrorKind;
    use crate::sim::{SimCall, SimDriver};

    fn module() -> (Module<SimDriver>, SimDriver) {
        let sim = SimDriver::new();
        (Module::new(sim.clone()), sim)
    }

    #[test]
    fn table_names_are_unique() {
        for (i, a) in METHODS.iter().enumerate() {
            assert!(
                METHODS[i + 1..].iter().all(|b| b.name != a.name),
                "duplicate {}",
                a.name
            );
        }
        assert_eq!(METHODS.len(), 25);
    }

    #[test]
    fn only_lifecycle_and_polling_are_unguarded() {
        let unguarded: Vec<_> = METHODS
            .iter()
            .filter(|def| !def.requires_init)
            .map(|def| def.name)
            .collect();
        assert_eq!(
            unguarded,
            ["set_pins", "init", "close", "packet_available", "receive_packet"]
        );
    }

    #[test]
    fn guarded_methods_fail_before_init() {
        let _serial = serial();
        let (module, sim) = module();
        for def in METHODS.iter().filter(|def| def.requires_init) {
            let err = module.call(def.name, &[], &[]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config, "{}", def.name);
        }
        // Argument shape is not looked at before the guard.
        let err = module
            .call("set_tx_power", &[Value::from("x")], &[])
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn unguarded_methods_work_before_init() {
        let _serial = serial();
        let (module, _sim) = module();
        assert_eq!(
            module.call("packet_available", &[], &[]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            module.call("receive_packet", &[], &[]).unwrap(),
            Value::None
        );
        assert_eq!(module.call("close", &[], &[]).unwrap(), Value::None);
        assert_eq!(module.call("init", &[], &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn unknown_method() {
        let _serial = serial();
        let (module, _sim) = module();
        assert!(matches!(
            module.call("transmit", &[], &[]),
            Err(Error::UnknownMethod(name)) if name == "transmit"
        ));
    }

    #[test]
    fn argument_shapes_are_checked() {
        let _serial = serial();
        let (module, sim) = module();
        module.call("init", &[], &[]).unwrap();
        sim.clear_calls();

        let kind = |r: Result<Value>| r.unwrap_err().kind();
        assert_eq!(
            kind(module.call("idle", &[Value::Int(1)], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("set_tx_power", &[], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("set_tx_power", &[Value::Int(1), Value::Int(2)], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("set_tx_power", &[Value::Float(1.0)], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("set_sync_word", &[Value::Int(1 << 40)], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("set_tx_power", &[], &[("level", Value::Int(1))])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("on_receive", &[Value::Int(3)], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("on_receive", &[], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("send_packet", &[], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("send_packet", &[Value::from("text")], &[])),
            ErrorKind::Argument
        );
        assert_eq!(
            kind(module.call("wait_for_packet", &[Value::Int(1), Value::Int(2)], &[])),
            ErrorKind::Argument
        );
        assert!(sim.calls().is_empty());
    }

    #[test]
    fn setters_forward_ints() {
        let _serial = serial();
        let (module, sim) = module();
        module.call("init", &[], &[]).unwrap();
        sim.clear_calls();
        module.call("set_frequency", &[Value::Int(433_000_000)], &[]).unwrap();
        module.call("implicit_header_mode", &[Value::Int(32)], &[]).unwrap();
        module.call("enable_crc", &[], &[]).unwrap();
        module.call("set_coding_rate", &[Value::Bool(true)], &[]).unwrap();
        assert_eq!(
            sim.calls(),
            vec![
                SimCall::SetFrequency(433_000_000),
                SimCall::ImplicitHeaderMode(32),
                SimCall::EnableCrc,
                SimCall::SetCodingRate(1),
            ]
        );
    }

    #[test]
    fn set_pins_positional_and_keywords() {
        let _serial = serial();
        let (module, sim) = module();
        module
            .call(
                "set_pins",
                &[Value::from("/dev/spidev1.0")],
                &[("irq_pin", Value::Int(25)), ("rst_pin", Value::Int(17))],
            )
            .unwrap();
        assert_eq!(
            sim.pins(),
            PinConfig::default()
                .set_spi_device("/dev/spidev1.0")
                .set_rst_pin(17)
                .set_irq_pin(25)
        );

        module.call("set_pins", &[], &[]).unwrap();
        assert_eq!(sim.pins(), PinConfig::default());

        let dup = module.call(
            "set_pins",
            &[Value::from("/dev/x")],
            &[("spi_device", Value::from("/dev/y"))],
        );
        assert_eq!(dup.unwrap_err().kind(), ErrorKind::Argument);
        let unknown = module.call("set_pins", &[], &[("busy_pin", Value::Int(3))]);
        assert_eq!(unknown.unwrap_err().kind(), ErrorKind::Argument);
        let not_str = module.call("set_pins", &[Value::Int(0)], &[]);
        assert_eq!(not_str.unwrap_err().kind(), ErrorKind::Argument);
    }

    #[test]
    fn set_pins_after_init_is_a_config_error() {
        let _serial = serial();
        let (module, _sim) = module();
        module.call("init", &[], &[]).unwrap();
        for args in [vec![], vec![Value::from("/dev/spidev0.0")]] {
            let err = module.call("set_pins", &args, &[]).unwrap_err();
            assert!(matches!(err, Error::PinsLocked));
        }
        // Even with bad arguments the lock wins.
        let err = module.call("set_pins", &[], &[("nope", Value::None)]).unwrap_err();
        assert!(matches!(err, Error::PinsLocked));
    }

    #[test]
    fn diagnostics_convert_results() {
        let _serial = serial();
        let (module, sim) = module();
        module.call("init", &[], &[]).unwrap();
        sim.set_packet_status(-87, 9.5);
        assert_eq!(
            module.call("packet_rssi", &[], &[]).unwrap(),
            Value::Int(-87)
        );
        assert_eq!(
            module.call("packet_snr", &[], &[]).unwrap(),
            Value::Float(9.5)
        );
    }

    #[test]
    fn receive_packet_returns_bytearray() {
        let _serial = serial();
        let (module, sim) = module();
        module.call("init", &[], &[]).unwrap();
        sim.queue_packet(b"hello");
        assert_eq!(
            module.call("packet_available", &[], &[]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            module.call("receive_packet", &[], &[]).unwrap(),
            Value::ByteArray(b"hello".to_vec())
        );
        assert_eq!(
            module.call("receive_packet", &[], &[]).unwrap(),
            Value::None
        );
    }

    #[test]
    fn wait_for_packet_timeouts() {
        let _serial = serial();
        let (module, sim) = module();
        module.call("init", &[], &[]).unwrap();
        sim.clear_calls();
        module.call("wait_for_packet", &[Value::Int(5)], &[]).unwrap();
        sim.queue_packet(b"x");
        module.call("wait_for_packet", &[], &[]).unwrap();
        module.call("wait_for_packet", &[Value::Int(-20)], &[]).unwrap();
        assert_eq!(
            sim.calls(),
            vec![
                SimCall::WaitForPacket(5),
                SimCall::WaitForPacket(-1),
                SimCall::WaitForPacket(-1),
            ]
        );
    }

    #[test]
    fn drop_clears_callback() {
        let _serial = serial();
        let (module, _sim) = module();
        module.call("init", &[], &[]).unwrap();
        module
            .call("on_receive", &[Value::callable(|| {})], &[])
            .unwrap();
        assert!(callback::is_registered());
        drop(module);
        assert!(!callback::is_registered());
    }
}

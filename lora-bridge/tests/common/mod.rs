#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, PoisonError};

use lora_bridge::sim::SimDriver;
use lora_bridge::Module;

/// The receive callback slot is process-wide; tests that load a module take turns.
pub fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = env_logger::builder().is_test(true).try_init();
    guard
}

/// A loaded module over a fresh simulated radio, already initialized.
pub fn initialized_module() -> (Module<SimDriver>, SimDriver) {
    let sim = SimDriver::new();
    let module = Module::new(sim.clone());
    module.call("init", &[], &[]).expect("init");
    sim.clear_calls();
    (module, sim)
}

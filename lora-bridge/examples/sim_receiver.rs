use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lora_bridge::sim::SimDriver;
use lora_bridge::{host, Callback, Lora, PinConfig, RadioConfig};
use log::{info, warn};

const MESSAGES: [&[u8]; 3] = [b"Hello LoRa!", b"ping", &[0xde, 0xad, 0xbe, 0xef]];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .init();

    let sim = SimDriver::new();
    let lora = Lora::new(sim.clone());

    let pins = PinConfig::default()
        .set_spi_device("/dev/spidev0.0")
        .set_irq_pin(25);
    lora.set_pins(&pins)?;
    let status = lora.init();
    if status == 0 {
        warn!("radio did not come up");
        return Ok(());
    }
    info!("radio initialized, status {status}");
    lora.configure(&RadioConfig::default().set_frequency(433_000_000))?;

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let callback: Callback = Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    lora.on_receive(Some(callback))?;
    lora.receive()?;

    // Stand-in for the remote transmitter.
    let transmitter = {
        let sim = sim.clone();
        thread::spawn(move || {
            for msg in MESSAGES {
                thread::sleep(Duration::from_millis(200));
                if let Ok(irq) = sim.inject(msg) {
                    let _ = irq.join();
                }
            }
        })
    };

    let guard = host::acquire();
    let mut received = 0;
    while received < MESSAGES.len() {
        info!("Waiting for LoRa message");
        lora.wait_for_packet(Some(Duration::from_secs(1)))?;
        while let Some(packet) = lora.receive_packet()? {
            received += 1;
            info!(
                "LoRa message received: {:?} (rssi {}, snr {})",
                packet,
                lora.packet_rssi()?,
                lora.packet_snr()?
            );
            if let Ok(s) = std::str::from_utf8(&packet) {
                info!("As string: {s}");
            }
        }
    }
    drop(guard);

    let _ = transmitter.join();
    lora.on_receive(None)?;
    lora.close();
    info!("{} arrival notifications", notified.load(Ordering::SeqCst));
    Ok(())
}

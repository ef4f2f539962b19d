//! Periodically reads temperature and humidity, reconnecting whenever the adapter goes away.
//! Pass the refresh interval in seconds as command line argument (defaults to 2).
//!
//! ```
//! $ RUST_LOG=debug cargo run --example htu21d 5
//! 22.1 °C  41 %
//! 22.2 °C  41 %
//! ```

use htu21d_cp2112::{rusb, Sensor, UsbBridge};
use std::error::Error;
use std::thread::sleep;
use std::time::Duration;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let interval = match std::env::args().nth(1) {
        Some(val) => Duration::from_secs(val.parse::<u64>()?),
        None => Duration::from_secs(2),
    };

    let mut sensor = Sensor::new(UsbBridge::new());
    loop {
        if !sensor.connected() {
            if let Err(e) = sensor.connect() {
                eprintln!("connection failed: {e}");
            }
        }

        if sensor.connected() {
            match sensor.read() {
                Ok(m) => println!("{:.1} °C  {:.0} %", m.temperature, m.humidity),
                Err(e) => {
                    eprintln!("Oops! {e}");
                    // unplugged adapters only show up as failing transfers
                    if e.usb_error() == Some(rusb::Error::NoDevice) {
                        sensor.close();
                    }
                }
            }
        }

        sleep(interval);
    }
}

//! Reads the HTU21D user register through the generic I2C interface.
//!
//! ```
//! $ cargo run --example user-register
//! user register: 0x02 (resolution RH 12 bit, T 14 bit, heater off)
//! ```

use i2c::Address;
use std::io::{Read, Write};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const I2C_ADDR: u16 = 0x40;
const CMD_READ_USER: u8 = 0xe7;

pub fn main() -> Result<()> {
    env_logger::init();

    let mut bus = htu21d_cp2112::I2c::open_single_device()?;
    bus.set_slave_address(I2C_ADDR, false)?;

    let mut buf = [0u8; 1];
    bus.write_all(&[CMD_READ_USER])?;
    bus.read_exact(&mut buf)?;

    let resolution = match buf[0] & 0x81 {
        0x00 => "RH 12 bit, T 14 bit",
        0x01 => "RH 8 bit, T 12 bit",
        0x80 => "RH 10 bit, T 13 bit",
        _ => "RH 11 bit, T 11 bit",
    };
    let heater = if buf[0] & 0x04 != 0 { "on" } else { "off" };
    println!("user register: {:#04x} (resolution {}, heater {})", buf[0], resolution, heater);

    Ok(())
}

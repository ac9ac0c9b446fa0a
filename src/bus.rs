//! The two-wire bus seam. The LCD protocol layer only ever needs to open a session to the
//! expander, push bytes into it, and close it again. `TwoWireBus` captures exactly that, so
//! a bare-metal TWI driver can be plugged in directly, while `EmbeddedHalBus` lets any
//! `embedded_hal::i2c::I2c` implementation be used.

use embedded_hal::i2c;

/// Low level I2C master primitives consumed by the display driver.
pub trait TwoWireBus {
    type Error: core::fmt::Debug;

    /// Start a session with the device at the full 8-bit `address`. Blocks until the bus
    /// is free.
    fn start_wait(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Write one byte to the device addressed by the current session.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Release the bus.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Adapts an `embedded_hal::i2c::I2c` bus to `TwoWireBus`. Each byte becomes its own
/// one-byte write; the PCF8574 latches every byte onto its pins regardless of how the
/// bytes are framed on the wire.
///
/// `start_wait` only records the address and `stop` is a no-op, so a session is not one
/// bus transaction. Another device sharing the bus (through `embedded-hal-bus` or similar)
/// can get its transfers in between two bytes of the same session. Exclusive access to the
/// bus has to be arranged by the caller if that matters.
pub struct EmbeddedHalBus<I2C>
where
    I2C: i2c::I2c,
{
    i2c: I2C,
    address: u8,
}

impl<I2C> EmbeddedHalBus<I2C>
where
    I2C: i2c::I2c,
{
    pub fn new(i2c: I2C) -> Self {
        Self { i2c, address: 0 }
    }

    /// 7-bit address of the current (or last) session
    pub fn address(&self) -> u8 {
        self.address
    }

    /// returns the wrapped I2C object. mostly used for testing
    pub fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C> TwoWireBus for EmbeddedHalBus<I2C>
where
    I2C: i2c::I2c,
{
    type Error = I2C::Error;

    fn start_wait(&mut self, address: u8) -> Result<(), Self::Error> {
        // embedded-hal takes 7-bit addresses and adds the direction bit itself
        self.address = address >> 1;
        Ok(())
    }

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.i2c.write(self.address, &[byte])
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

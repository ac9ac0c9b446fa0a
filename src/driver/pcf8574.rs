use bitfield::bitfield;
use embedded_hal::delay::DelayNs;

use crate::{bus::TwoWireBus, BusErrorPolicy, CharacterDisplayError, DeviceSetupConfig};

/// Settle time after every enable pulse
const PUSH_SETTLE_US: u32 = 100;

// Pin wiring of the common PCF8574 LCD backpack: P0-P3 control, P4-P7 to D4-D7 of the HD44780
bitfield! {
    #[derive(Clone, Copy, PartialEq)]
    pub struct ExpanderBits(u8);
    impl Debug;
    pub rs, set_rs: 0, 0;
    pub rw, set_rw: 1, 1;
    pub enable, set_enable: 2, 2;
    pub backlight, set_backlight: 3, 3;
    pub data, set_data: 7, 4;
}

/// PCF8574 GPIO expander driving the 4-bit interface of an HD44780 controller. Owns the bus
/// and delay, and the backlight state which rides along on every byte pushed to the pins.
pub struct Pcf8574Expander<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    config: DeviceSetupConfig<BUS, DELAY>,
    backlight: bool,
}

impl<BUS, DELAY> Pcf8574Expander<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    pub fn new(config: DeviceSetupConfig<BUS, DELAY>) -> Self {
        Self {
            config,
            backlight: false,
        }
    }

    pub fn i2c_address(&self) -> u8 {
        self.config.address
    }

    pub fn error_policy(&self) -> BusErrorPolicy {
        self.config.error_policy
    }

    pub fn set_error_policy(&mut self, policy: BusErrorPolicy) {
        self.config.error_policy = policy;
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    /// Only updates the stored state. The new value reaches the pins with the next push.
    pub fn set_backlight(&mut self, on: bool) {
        self.backlight = on;
    }

    pub fn delay(&mut self) -> &mut DELAY {
        &mut self.config.delay
    }

    /// returns the bus object. mostly used for testing
    #[cfg(test)]
    pub fn bus(&mut self) -> &mut BUS {
        &mut self.config.bus
    }

    pub fn release(self) -> (BUS, DELAY) {
        (self.config.bus, self.config.delay)
    }

    /// Runs `f` inside one bus session. The bus is always released, even if `f` failed, and the
    /// first error wins.
    pub fn session<F>(&mut self, f: F) -> Result<(), CharacterDisplayError<BUS>>
    where
        F: FnOnce(&mut Self) -> Result<(), CharacterDisplayError<BUS>>,
    {
        // the low bit of the 8-bit address selects read, we only ever write
        let address = self.config.address & !0x01;
        let started = self.config.bus.start_wait(address);
        self.check(started)?;
        let result = f(self);
        let stopped = self.config.bus.stop();
        let stopped = self.check(stopped);
        result.and(stopped)
    }

    /// Latches `value` into the controller. `value` carries the nibble in the upper four bits
    /// plus RS; enable and backlight are always overwritten here.
    pub fn push(&mut self, value: u8) -> Result<(), CharacterDisplayError<BUS>> {
        let mut bits = ExpanderBits(value);
        bits.set_backlight(self.backlight as u8);
        bits.set_enable(1);
        self.write_bits_to_gpio(bits)?;
        bits.set_enable(0);
        self.write_bits_to_gpio(bits)?;
        self.config.delay.delay_us(PUSH_SETTLE_US);
        Ok(())
    }

    /// Sends an instruction byte as two nibbles, high nibble first.
    pub fn write_command(&mut self, command: u8) -> Result<(), CharacterDisplayError<BUS>> {
        self.write_byte(false, command)
    }

    /// Sends a data byte (DDRAM or CGRAM, depending on the last address command) as two nibbles.
    pub fn write_data(&mut self, data: u8) -> Result<(), CharacterDisplayError<BUS>> {
        self.write_byte(true, data)
    }

    /// Sends only the high nibble of `command`. The controller is still in 8-bit mode during the
    /// first steps of initialization and latches a full instruction from a single transfer.
    pub fn write_command_8bit(&mut self, command: u8) -> Result<(), CharacterDisplayError<BUS>> {
        let mut bits = ExpanderBits(0);
        bits.set_data(command >> 4);
        self.push(bits.0)
    }

    fn write_byte(&mut self, rs_setting: bool, value: u8) -> Result<(), CharacterDisplayError<BUS>> {
        let mut bits = ExpanderBits(0);
        bits.set_rs(rs_setting as u8);
        bits.set_data(value >> 4);
        self.push(bits.0)?;
        bits.set_data(value & 0x0F);
        self.push(bits.0)
    }

    fn write_bits_to_gpio(&mut self, bits: ExpanderBits) -> Result<(), CharacterDisplayError<BUS>> {
        let written = self.config.bus.write(bits.0);
        self.check(written)
    }

    fn check(&self, result: Result<(), BUS::Error>) -> Result<(), CharacterDisplayError<BUS>> {
        match (result, self.config.error_policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), BusErrorPolicy::Propagate) => Err(CharacterDisplayError::BusError(e)),
            (Err(_e), BusErrorPolicy::Ignore) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("I2C error ignored");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use crate::test_support::{BusEvent, RecordingBus, RecordingDelay};
    use embedded_hal_mock::eh1::delay::NoopDelay;

    fn expander(policy: BusErrorPolicy) -> Pcf8574Expander<RecordingBus, RecordingDelay> {
        let bus = RecordingBus::new();
        let delay = RecordingDelay::new(&bus);
        Pcf8574Expander::new(DeviceSetupConfig {
            bus,
            address: 0x4E,
            delay,
            error_policy: policy,
        })
    }

    #[test]
    fn test_expander_bits_layout() {
        let mut bits = ExpanderBits(0);
        bits.set_rs(1);
        bits.set_rw(0);
        bits.set_enable(1);
        bits.set_backlight(1);
        bits.set_data(0b1010);
        assert_eq!(bits.0, 0b1010_1101);

        bits.set_rs(0);
        bits.set_rw(1);
        bits.set_enable(0);
        bits.set_backlight(0);
        bits.set_data(0b0101);
        assert_eq!(bits.0, 0b0101_0010);
    }

    #[test]
    fn test_push_pulses_enable_and_settles() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        expander.set_backlight(true);
        assert!(expander.push(0b1010_0001).is_ok());
        assert_eq!(
            expander.bus().events(),
            std::vec![
                BusEvent::Write(0b1010_1101),
                BusEvent::Write(0b1010_1001),
                BusEvent::DelayNs(100_000),
            ]
        );
    }

    #[test]
    fn test_push_overrides_requested_backlight_and_enable() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        expander.set_backlight(false);
        assert!(expander.push(0b0110_1100).is_ok());
        assert_eq!(expander.bus().writes(), std::vec![0b0110_0100, 0b0110_0000]);
    }

    #[test]
    fn test_command_nibble_split() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        assert!(expander.write_command(0xA5).is_ok());
        // enable high then low for each nibble, RS cleared
        assert_eq!(
            expander.bus().writes(),
            std::vec![0xA4, 0xA0, 0x54, 0x50]
        );
    }

    #[test]
    fn test_data_nibble_split_sets_rs() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        expander.set_backlight(true);
        assert!(expander.write_data(0x48).is_ok());
        assert_eq!(
            expander.bus().writes(),
            std::vec![0x4D, 0x49, 0x8D, 0x89]
        );
    }

    #[test]
    fn test_command_8bit_sends_high_nibble_only() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        assert!(expander.write_command_8bit(0x30).is_ok());
        assert_eq!(expander.bus().writes(), std::vec![0x34, 0x30]);
    }

    #[test]
    fn test_session_brackets_with_write_address() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        let result = expander.session(|e| e.write_command(0x01));
        assert!(result.is_ok());
        let events = expander.bus().events();
        assert_eq!(events.first(), Some(&BusEvent::Start(0x4E)));
        assert_eq!(events.last(), Some(&BusEvent::Stop));
    }

    #[test]
    fn test_session_propagates_error_and_still_stops() {
        let mut expander = expander(BusErrorPolicy::Propagate);
        expander.bus().fail_writes_after(1);
        let result = expander.session(|e| e.write_command(0x01));
        assert_eq!(
            result,
            Err(CharacterDisplayError::BusError(crate::test_support::BusFault))
        );
        // the failing write is the last one on the wire
        assert_eq!(
            expander.bus().events(),
            std::vec![
                BusEvent::Start(0x4E),
                BusEvent::Write(0x04),
                BusEvent::Write(0x00),
                BusEvent::Stop
            ]
        );
    }

    #[test]
    fn test_session_ignores_errors_when_asked() {
        let mut expander = expander(BusErrorPolicy::Ignore);
        expander.bus().fail_writes_after(0);
        let result = expander.session(|e| e.write_command(0x01));
        assert!(result.is_ok());
        // all four writes were still attempted
        assert_eq!(expander.bus().writes().len(), 4);
    }

    #[test]
    fn test_release_returns_bus_and_delay() {
        let config = DeviceSetupConfig {
            bus: RecordingBus::new(),
            address: 0x4E,
            delay: NoopDelay::new(),
            error_policy: BusErrorPolicy::Propagate,
        };
        let expander = Pcf8574Expander::new(config);
        let (bus, _delay) = expander.release();
        assert!(bus.events().is_empty());
    }
}

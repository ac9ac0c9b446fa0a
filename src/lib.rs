//! This Rust `embedded-hal`-based library drives a [HD44780](https://en.wikipedia.org/wiki/Hitachi_HD44780_LCD_controller)
//! compatible character display through a PCF8574 I2C GPIO expander in an embedded, `no_std` environment. These expanders are
//! ubiquitous as "I2C backpacks" soldered to the back of 16x2 and 20x4 displays. The expander's P4-P7 pins carry the 4-bit data
//! bus of the HD44780, P0-P3 carry RS, RW, enable and the backlight transistor.
//!
//! Key features include:
//! - Convenient high-level API for controlling the display
//! - Support for custom characters
//! - Backlight control
//! - `core::fmt::Write` implementation for easy use with the `write!` macro
//! - Works with any `embedded-hal` v1.0 I2C bus, or with a bare two-wire bus driver through the `TwoWireBus` trait
//! - Optional support for the `defmt` and `ufmt` logging frameworks
//!
//! ## Usage
//! Add this to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! pcf8574-hd44780-lcd = { version = "0.1", features = ["defmt"] }
//! ```
//! The `features = ["defmt"]` line is optional and enables the `defmt` feature, which allows the library's errors to be used with the `defmt` logging
//! framework. Another optional feature is `features = ["ufmt"]`, which enables the `ufmt` feature, allowing the `uwriteln!` and `uwrite!` macros to be used.
//!
//! Create the display and initialize it with its dimensions:
//! ```rust
//! use pcf8574_hd44780_lcd::{CharacterDisplayPCF8574T, EmbeddedHalBus};
//!
//! // board setup
//! let i2c = ...; // I2C peripheral
//! let delay = ...; // DelayNs implementation
//!
//! let mut lcd = CharacterDisplayPCF8574T::new(EmbeddedHalBus::new(i2c), delay);
//! if let Err(e) = lcd.init(16, 2) {
//!    panic!("Error initializing LCD: {}", e);
//! }
//! ```
//! Addresses are given in their full 8-bit form, the default is `0x4E` (7-bit `0x27`). Use `new_with_address` for modules with
//! the address jumpers set differently.
//!
//! Use the display:
//! ```rust
//! lcd.clear()?.home()?.print("Hello, world!")?;
//! // can also use the `core::fmt::write!` macro
//! use core::fmt::Write;
//!
//! write!(lcd, "Hello, world!")?;
//! ```
//! Columns and rows are one-indexed, and positions past the edge of the display are clamped to the last column or row:
//! ```rust
//! lcd.set_cursor(1, 2)?.print("second row")?;
//! ```
//! Several raw operations can share one bus session:
//! ```rust
//! lcd.session(|s| {
//!     s.set_cursor(1, 1)?.print("T=")?.print_char(0)?;
//!     Ok(())
//! })?;
//! ```
//!
//! ### Bus errors
//! By default the first failed I2C write aborts the operation and is returned. Old firmware that ignored acknowledgement
//! failures can keep that behavior with `with_error_policy(BusErrorPolicy::Ignore)`; the display then simply stays unchanged
//! or garbled when a transfer is lost.
//!
#![no_std]
#![allow(non_upper_case_globals)]
use core::fmt::Display;

use embedded_hal::delay::DelayNs;

mod bus;
mod driver;
#[cfg(test)]
mod test_support;

pub use bus::{EmbeddedHalBus, TwoWireBus};
pub use driver::hd44780::{CharacterFont, DisplayGeometry, Session, TextDirection};

use driver::{hd44780::HD44780, pcf8574::Pcf8574Expander};

/// HD44780 based character display using a PCF8574T expander on an `embedded-hal` I2C bus.
pub type CharacterDisplayPCF8574T<I2C, DELAY> = CharacterDisplay<EmbeddedHalBus<I2C>, DELAY>;

/// Full 8-bit address of a PCF8574 with all address jumpers open
pub const DEFAULT_I2C_ADDRESS: u8 = 0x4E;

/// Errors that can occur when using the display
pub enum CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
{
    /// Error returned from the underlying bus implementation
    BusError(BUS::Error),
    /// An operation was attempted before `init` completed
    NotInitialized,
    /// Columns and rows do not describe a display a single HD44780 can drive
    UnsupportedDimensions,
    /// Formatting error
    FormattingError(core::fmt::Error),
}

impl<BUS> core::fmt::Debug for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CharacterDisplayError::BusError(e) => f.debug_tuple("BusError").field(e).finish(),
            CharacterDisplayError::NotInitialized => write!(f, "NotInitialized"),
            CharacterDisplayError::UnsupportedDimensions => write!(f, "UnsupportedDimensions"),
            CharacterDisplayError::FormattingError(e) => {
                f.debug_tuple("FormattingError").field(e).finish()
            }
        }
    }
}

impl<BUS> PartialEq for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
    BUS::Error: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CharacterDisplayError::BusError(a), CharacterDisplayError::BusError(b)) => a == b,
            (CharacterDisplayError::NotInitialized, CharacterDisplayError::NotInitialized) => true,
            (
                CharacterDisplayError::UnsupportedDimensions,
                CharacterDisplayError::UnsupportedDimensions,
            ) => true,
            (CharacterDisplayError::FormattingError(a), CharacterDisplayError::FormattingError(b)) => {
                a == b
            }
            _ => false,
        }
    }
}

impl<BUS> Clone for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
    BUS::Error: Clone,
{
    fn clone(&self) -> Self {
        match self {
            CharacterDisplayError::BusError(e) => CharacterDisplayError::BusError(e.clone()),
            CharacterDisplayError::NotInitialized => CharacterDisplayError::NotInitialized,
            CharacterDisplayError::UnsupportedDimensions => {
                CharacterDisplayError::UnsupportedDimensions
            }
            CharacterDisplayError::FormattingError(e) => CharacterDisplayError::FormattingError(*e),
        }
    }
}

impl<BUS> From<core::fmt::Error> for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
{
    fn from(err: core::fmt::Error) -> Self {
        CharacterDisplayError::FormattingError(err)
    }
}

impl<BUS> From<&CharacterDisplayError<BUS>> for &'static str
where
    BUS: TwoWireBus,
{
    fn from(err: &CharacterDisplayError<BUS>) -> Self {
        match err {
            CharacterDisplayError::BusError(_) => "I2C error",
            CharacterDisplayError::NotInitialized => "Display not initialized",
            CharacterDisplayError::UnsupportedDimensions => "Unsupported display dimensions",
            CharacterDisplayError::FormattingError(_) => "Formatting error",
        }
    }
}

#[cfg(feature = "defmt")]
impl<BUS> defmt::Format for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
{
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl<BUS> ufmt::uDisplay for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
{
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl<BUS> Display for CharacterDisplayError<BUS>
where
    BUS: TwoWireBus,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

/// What to do when the bus reports a failed start or write.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum BusErrorPolicy {
    /// Abort the operation and return the error. The bus session is still closed.
    #[default]
    Propagate,
    /// Keep sending the rest of the operation as if the transfer succeeded.
    Ignore,
}

#[derive(Debug, PartialEq, Clone, Copy)]
/// Common display sizes. Used to look up the number of rows and columns.
pub enum LcdDisplayType {
    /// 8x2 display
    Lcd8x2,
    /// 16x1 display
    Lcd16x1,
    /// 16x2 display
    Lcd16x2,
    /// 16x4 display
    Lcd16x4,
    /// 20x2 display
    Lcd20x2,
    /// 20x4 display
    Lcd20x4,
    /// 40x2 display
    Lcd40x2,
    /// 80x1 display
    Lcd80x1,
}

impl From<&LcdDisplayType> for &'static str {
    fn from(display_type: &LcdDisplayType) -> Self {
        match display_type {
            LcdDisplayType::Lcd8x2 => "8x2",
            LcdDisplayType::Lcd16x1 => "16x1",
            LcdDisplayType::Lcd16x2 => "16x2",
            LcdDisplayType::Lcd16x4 => "16x4",
            LcdDisplayType::Lcd20x2 => "20x2",
            LcdDisplayType::Lcd20x4 => "20x4",
            LcdDisplayType::Lcd40x2 => "40x2",
            LcdDisplayType::Lcd80x1 => "80x1",
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LcdDisplayType {
    fn format(&self, fmt: defmt::Formatter) {
        let msg: &'static str = From::from(self);
        defmt::write!(fmt, "{}", msg);
    }
}

#[cfg(feature = "ufmt")]
impl ufmt::uDisplay for LcdDisplayType {
    fn fmt<W>(&self, w: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let msg: &'static str = From::from(self);
        ufmt::uwrite!(w, "{}", msg)
    }
}

impl Display for LcdDisplayType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg: &'static str = From::from(self);
        write!(f, "{}", msg)
    }
}

impl LcdDisplayType {
    /// Get the number of rows for the display type
    pub const fn rows(&self) -> u8 {
        match self {
            LcdDisplayType::Lcd8x2 => 2,
            LcdDisplayType::Lcd16x1 => 1,
            LcdDisplayType::Lcd16x2 => 2,
            LcdDisplayType::Lcd16x4 => 4,
            LcdDisplayType::Lcd20x2 => 2,
            LcdDisplayType::Lcd20x4 => 4,
            LcdDisplayType::Lcd40x2 => 2,
            LcdDisplayType::Lcd80x1 => 1,
        }
    }

    /// Get the number of columns for the display type
    pub const fn cols(&self) -> u8 {
        match self {
            LcdDisplayType::Lcd8x2 => 8,
            LcdDisplayType::Lcd16x1 => 16,
            LcdDisplayType::Lcd16x2 => 16,
            LcdDisplayType::Lcd16x4 => 16,
            LcdDisplayType::Lcd20x2 => 20,
            LcdDisplayType::Lcd20x4 => 20,
            LcdDisplayType::Lcd40x2 => 40,
            LcdDisplayType::Lcd80x1 => 80,
        }
    }

    /// Get the row offsets for the display type. This always returns an array of length 4.
    /// For displays with less than 4 rows, the unused rows continue past the visible columns.
    pub const fn row_offsets(&self) -> [u8; 4] {
        DisplayGeometry::default_row_offsets(self.cols())
    }
}

pub struct DeviceSetupConfig<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    bus: BUS,
    address: u8,
    delay: DELAY,
    error_policy: BusErrorPolicy,
}

pub struct CharacterDisplay<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    expander: Pcf8574Expander<BUS, DELAY>,
    controller: HD44780,
}

impl<BUS, DELAY> CharacterDisplay<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    /// Create a new character display object with the default I2C address for the expander.
    pub fn new(bus: BUS, delay: DELAY) -> Self {
        Self::new_with_address(bus, DEFAULT_I2C_ADDRESS, delay)
    }

    /// Create a new character display object with a specific 8-bit I2C address for the expander.
    pub fn new_with_address(bus: BUS, address: u8, delay: DELAY) -> Self {
        Self {
            expander: Pcf8574Expander::new(DeviceSetupConfig {
                bus,
                address,
                delay,
                error_policy: BusErrorPolicy::default(),
            }),
            controller: HD44780::new(CharacterFont::default()),
        }
    }

    /// Select the character font. Takes effect with the next `init`.
    pub fn with_font(mut self, font: CharacterFont) -> Self {
        self.controller.set_font(font);
        self
    }

    /// Select how bus errors are handled.
    pub fn with_error_policy(mut self, policy: BusErrorPolicy) -> Self {
        self.expander.set_error_policy(policy);
        self
    }

    /// Initialize the display for `columns` x `rows` characters. This must be called before using the display.
    /// Turns the backlight on.
    pub fn init(&mut self, columns: u8, rows: u8) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.init(&mut self.expander, columns, rows)?;
        Ok(self)
    }

    /// Initialize the display using the dimensions of a common display type.
    pub fn init_display_type(
        &mut self,
        display_type: LcdDisplayType,
    ) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.init(display_type.cols(), display_type.rows())
    }

    /// returns a reference to the bus. mostly needed for testing
    #[cfg(test)]
    fn bus(&mut self) -> &mut BUS {
        self.expander.bus()
    }

    /// Gives back the bus and delay.
    pub fn release(self) -> (BUS, DELAY) {
        self.expander.release()
    }

    /// Dimensions and row offsets, once initialized.
    pub fn geometry(&self) -> Option<&DisplayGeometry> {
        self.controller.geometry()
    }

    /// The display control flags as last sent to the controller.
    pub fn display_control(&self) -> u8 {
        self.controller.display_control()
    }

    /// The entry mode flags as last sent to the controller.
    pub fn entry_mode(&self) -> u8 {
        self.controller.display_mode()
    }

    pub fn backlight_enabled(&self) -> bool {
        self.expander.backlight()
    }

    pub fn i2c_address(&self) -> u8 {
        self.expander.i2c_address()
    }

    pub fn error_policy(&self) -> BusErrorPolicy {
        self.expander.error_policy()
    }

    //--------------------------------------------------------------------------------------------------
    // high level commands, for the user!
    //--------------------------------------------------------------------------------------------------

    /// Clear the display
    pub fn clear(&mut self) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.clear(&mut self.expander)?;
        Ok(self)
    }

    /// Set the cursor to the home position.
    pub fn home(&mut self) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.home(&mut self.expander)?;
        Ok(self)
    }

    /// Set the cursor position at specified column and row. Columns and rows are one-indexed,
    /// values outside the display are clamped.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.set_cursor(&mut self.expander, col, row)?;
        Ok(self)
    }

    /// Runs several operations in a single bus session. The operations available on
    /// `Session` send their bytes without starting or stopping the bus themselves.
    pub fn session<F>(&mut self, f: F) -> Result<&mut Self, CharacterDisplayError<BUS>>
    where
        F: FnOnce(&mut Session<'_, BUS, DELAY>) -> Result<(), CharacterDisplayError<BUS>>,
    {
        self.controller.session(&mut self.expander, f)?;
        Ok(self)
    }

    /// Set the cursor visibility.
    pub fn show_cursor(&mut self, show_cursor: bool) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.show_cursor(&mut self.expander, show_cursor)?;
        Ok(self)
    }

    /// Set the cursor blinking.
    pub fn blink_cursor(
        &mut self,
        blink_cursor: bool,
    ) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.blink_cursor(&mut self.expander, blink_cursor)?;
        Ok(self)
    }

    /// Set the display visibility.
    pub fn show_display(
        &mut self,
        show_display: bool,
    ) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.show_display(&mut self.expander, show_display)?;
        Ok(self)
    }

    /// Scroll the display to the left.
    pub fn scroll_display_left(&mut self) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.scroll_display_left(&mut self.expander)?;
        Ok(self)
    }

    /// Scroll the display to the right.
    pub fn scroll_display_right(&mut self) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.scroll_display_right(&mut self.expander)?;
        Ok(self)
    }

    /// Set the text flow direction.
    pub fn set_text_direction(
        &mut self,
        direction: TextDirection,
    ) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller
            .set_text_direction(&mut self.expander, direction)?;
        Ok(self)
    }

    /// Set the text flow direction to left to right.
    pub fn left_to_right(&mut self) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.set_text_direction(TextDirection::LeftToRight)
    }

    /// Set the text flow direction to right to left.
    pub fn right_to_left(&mut self) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.set_text_direction(TextDirection::RightToLeft)
    }

    /// Set the auto scroll mode.
    pub fn autoscroll(&mut self, autoscroll: bool) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.autoscroll(&mut self.expander, autoscroll)?;
        Ok(self)
    }

    /// Create a new custom character in CGRAM slot `location` (0-7).
    pub fn create_char(
        &mut self,
        location: u8,
        charmap: [u8; 8],
    ) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller
            .create_char(&mut self.expander, location, charmap)?;
        Ok(self)
    }

    /// Prints a string to the LCD at the current cursor position.
    pub fn print(&mut self, text: &str) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.print_bytes(text.as_bytes())
    }

    /// Prints raw character codes, including custom characters 0-7.
    pub fn print_bytes(&mut self, text: &[u8]) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.print(&mut self.expander, text)?;
        Ok(self)
    }

    /// Prints a single character code.
    pub fn print_char(&mut self, c: u8) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.print_char(&mut self.expander, c)?;
        Ok(self)
    }

    /// Turn the backlight on or off
    pub fn backlight(&mut self, on: bool) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller.backlight(&mut self.expander, on)?;
        Ok(self)
    }

    /// Override the DDRAM start address of each row, for displays with unusual addressing.
    pub fn set_row_offsets(
        &mut self,
        row0: u8,
        row1: u8,
        row2: u8,
        row3: u8,
    ) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.controller
            .set_row_offsets::<BUS>([row0, row1, row2, row3])?;
        Ok(self)
    }
}

/// Implement the `core::fmt::Write` trait for the display, allowing it to be used with the `write!` macro.
impl<BUS, DELAY> core::fmt::Write for CharacterDisplay<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
        if let Err(_e) = self.print(s) {
            return Err(core::fmt::Error);
        }
        Ok(())
    }
}

#[cfg(feature = "ufmt")]
/// Implement the `ufmt::uWrite` trait for the display, allowing it to be used with the `uwriteln!` and `uwrite!` macros.
impl<BUS, DELAY> ufmt::uWrite for CharacterDisplay<BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    fn write_str(&mut self, s: &str) -> Result<(), CharacterDisplayError<BUS>> {
        self.print(s)?;
        Ok(())
    }

    type Error = CharacterDisplayError<BUS>;
}

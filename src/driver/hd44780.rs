// HD44780 Support
// The HD44780 struct holds the modal state of the controller (function set, display control,
// entry mode) and the display geometry. Every operation that changes a flag updates the stored
// byte first and then sends the whole byte with its opcode, since the instruction set has no
// way to change a single flag. All bus traffic goes through the Pcf8574Expander, one session
// per operation.

use embedded_hal::delay::DelayNs;

use crate::{bus::TwoWireBus, driver::pcf8574::Pcf8574Expander, CharacterDisplayError};

// commands
pub const LCD_CMD_CLEARDISPLAY: u8 = 0x01; //  Clear display, set cursor position to zero
pub const LCD_CMD_ENTRYMODESET: u8 = 0x04; //  Sets the entry mode
pub const LCD_CMD_DISPLAYCONTROL: u8 = 0x08; //  Controls the display; does stuff like turning it off and on
pub const LCD_CMD_CURSORSHIFT: u8 = 0x10; //  Lets you move the cursor
pub const LCD_CMD_FUNCTIONSET: u8 = 0x20; //  Used to send the function to set to the display
pub const LCD_CMD_SETCGRAMADDR: u8 = 0x40; //  Used to set the CGRAM (character generator RAM) with characters
pub const LCD_CMD_SETDDRAMADDR: u8 = 0x80; //  Used to set the DDRAM (Display Data RAM)

// flags for display entry mode
pub const LCD_FLAG_ENTRYLEFT: u8 = 0x02; //  Used to set text to flow from left to right
pub const LCD_FLAG_ENTRYSHIFTINCREMENT: u8 = 0x01; //  Used to 'right justify' text from the cursor
pub const LCD_FLAG_ENTRYSHIFTDECREMENT: u8 = 0x00; //  Used to 'left justify' text from the cursor

// flags for display on/off control
pub const LCD_FLAG_DISPLAYON: u8 = 0x04; //  Turns the display on
pub const LCD_FLAG_CURSORON: u8 = 0x02; //  Turns the cursor on
pub const LCD_FLAG_BLINKON: u8 = 0x01; //  Turns on the blinking cursor

// flags for display/cursor shift
pub const LCD_FLAG_DISPLAYMOVE: u8 = 0x08; //  Flag for moving the display
pub const LCD_FLAG_MOVERIGHT: u8 = 0x04; //  Flag for moving right
pub const LCD_FLAG_MOVELEFT: u8 = 0x00; //  Flag for moving left

// flags for function set
pub const LCD_FLAG_8BITMODE: u8 = 0x10; //  LCD 8 bit mode
pub const LCD_FLAG_4BITMODE: u8 = 0x00; //  LCD 4 bit mode
pub const LCD_FLAG_2LINE: u8 = 0x08; //  LCD 2 line mode
pub const LCD_FLAG_5x10_DOTS: u8 = 0x04; //  10 pixel high font mode

/// Characters the DDRAM of a single HD44780 can hold
pub const MAX_CHARACTERS: u16 = 80;

// settle times
const POWER_ON_DELAY_MS: u32 = 40;
const FIRST_RESET_DELAY_US: u32 = 4500;
const SECOND_RESET_DELAY_US: u32 = 150;
const CLEAR_DELAY_US: u32 = 2000;

/// Font used for the character cells.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum CharacterFont {
    #[default]
    Dots5x8,
    /// Only honored on single-row displays.
    Dots5x10,
}

/// Direction the cursor moves after a character is written.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TextDirection {
    LeftToRight,
    RightToLeft,
}

/// Columns, rows and DDRAM row start addresses of the attached display.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DisplayGeometry {
    columns: u8,
    rows: u8,
    row_offsets: [u8; 4],
}

impl DisplayGeometry {
    /// Returns `None` unless `rows` is 1, 2 or 4, `columns` is at least 1 and the display fits
    /// the 80 character DDRAM.
    pub fn new(columns: u8, rows: u8) -> Option<Self> {
        if columns == 0 || !matches!(rows, 1 | 2 | 4) {
            return None;
        }
        if columns as u16 * rows as u16 > MAX_CHARACTERS {
            return None;
        }
        Some(Self {
            columns,
            rows,
            row_offsets: Self::default_row_offsets(columns),
        })
    }

    /// Standard HD44780 addressing: rows 3 and 4 continue where rows 1 and 2 end.
    pub const fn default_row_offsets(columns: u8) -> [u8; 4] {
        [0x00, 0x40, columns, 0x40u8.wrapping_add(columns)]
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn row_offsets(&self) -> [u8; 4] {
        self.row_offsets
    }

    pub fn set_row_offsets(&mut self, row_offsets: [u8; 4]) {
        self.row_offsets = row_offsets;
    }

    /// DDRAM address of the 1-based `col` and `row`. Out of range coordinates are clamped to
    /// the nearest cell on the display.
    pub fn ddram_address(&self, col: u8, row: u8) -> u8 {
        let col = col.clamp(1, self.columns);
        let row = row.clamp(1, self.rows);
        (col - 1).wrapping_add(self.row_offsets[row as usize - 1])
    }
}

/// Operations for a caller that already holds the bus. Obtained from
/// `CharacterDisplay::session`; nothing here starts or stops a bus session.
pub struct Session<'a, BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    expander: &'a mut Pcf8574Expander<BUS, DELAY>,
    geometry: &'a DisplayGeometry,
}

impl<'a, BUS, DELAY> Session<'a, BUS, DELAY>
where
    BUS: TwoWireBus,
    DELAY: DelayNs,
{
    /// Set the cursor position. Columns and rows are one-indexed and clamped to the display.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        let address = self.geometry.ddram_address(col, row);
        self.expander.write_command(LCD_CMD_SETDDRAMADDR | address)?;
        Ok(self)
    }

    pub fn print(&mut self, text: &str) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.print_bytes(text.as_bytes())
    }

    /// Writes each byte as character data, in order.
    pub fn print_bytes(&mut self, text: &[u8]) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        for c in text {
            self.expander.write_data(*c)?;
        }
        Ok(self)
    }

    /// Writes one character, ASCII or a custom character slot 0-7.
    pub fn print_char(&mut self, c: u8) -> Result<&mut Self, CharacterDisplayError<BUS>> {
        self.expander.write_data(c)?;
        Ok(self)
    }
}

/// Modal state of an HD44780 controller. `geometry` is `None` until `init` completes.
#[derive(Debug, Default)]
pub struct HD44780 {
    display_function: u8,
    display_control: u8,
    display_mode: u8,
    font: CharacterFont,
    geometry: Option<DisplayGeometry>,
}

impl HD44780 {
    pub fn new(font: CharacterFont) -> Self {
        Self {
            font,
            ..Default::default()
        }
    }

    pub fn set_font(&mut self, font: CharacterFont) {
        self.font = font;
    }

    pub fn geometry(&self) -> Option<&DisplayGeometry> {
        self.geometry.as_ref()
    }

    #[cfg(test)]
    pub fn display_function(&self) -> u8 {
        self.display_function
    }

    pub fn display_control(&self) -> u8 {
        self.display_control
    }

    pub fn display_mode(&self) -> u8 {
        self.display_mode
    }

    fn ready<BUS>(&self) -> Result<&DisplayGeometry, CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
    {
        self.geometry
            .as_ref()
            .ok_or(CharacterDisplayError::NotInitialized)
    }

    /// Runs the power-on initialization sequence for 4-bit operation and leaves the display on,
    /// cleared, with cursor and blink off and left to right entry.
    pub fn init<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        columns: u8,
        rows: u8,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        let geometry =
            DisplayGeometry::new(columns, rows).ok_or(CharacterDisplayError::<BUS>::UnsupportedDimensions)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("Initializing {}x{} display", columns, rows);

        // no longer valid until the sequence completes
        self.geometry = None;
        self.display_function = LCD_FLAG_4BITMODE;
        if rows > 1 {
            self.display_function |= LCD_FLAG_2LINE;
        } else if self.font == CharacterFont::Dots5x10 {
            self.display_function |= LCD_FLAG_5x10_DOTS;
        }
        self.display_control = LCD_FLAG_DISPLAYON;
        self.display_mode = LCD_FLAG_ENTRYLEFT | LCD_FLAG_ENTRYSHIFTDECREMENT;

        expander.set_backlight(true);
        expander.delay().delay_ms(POWER_ON_DELAY_MS);

        let display_function = self.display_function;
        let display_control = self.display_control;
        let display_mode = self.display_mode;
        expander.session(|e| {
            // the controller may be in 8-bit or either half of a 4-bit transfer, three
            // 8-bit function sets bring it into a known state
            e.write_command_8bit(LCD_CMD_FUNCTIONSET | LCD_FLAG_8BITMODE)?;
            e.delay().delay_us(FIRST_RESET_DELAY_US);
            e.write_command_8bit(LCD_CMD_FUNCTIONSET | LCD_FLAG_8BITMODE)?;
            e.delay().delay_us(SECOND_RESET_DELAY_US);
            e.write_command_8bit(LCD_CMD_FUNCTIONSET | LCD_FLAG_8BITMODE)?;
            e.write_command_8bit(LCD_CMD_FUNCTIONSET | LCD_FLAG_4BITMODE)?;

            e.write_command(LCD_CMD_FUNCTIONSET | display_function)?;
            e.write_command(LCD_CMD_DISPLAYCONTROL | display_control)?;
            e.write_command(LCD_CMD_CLEARDISPLAY)?;
            e.delay().delay_us(CLEAR_DELAY_US);
            e.write_command(LCD_CMD_ENTRYMODESET | display_mode)
        })?;

        self.geometry = Some(geometry);
        Ok(())
    }

    /// Runs `f` with a `Session` inside one bus session.
    pub fn session<BUS, DELAY, F>(
        &self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        f: F,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
        F: FnOnce(&mut Session<'_, BUS, DELAY>) -> Result<(), CharacterDisplayError<BUS>>,
    {
        let geometry = self.ready::<BUS>()?;
        expander.session(|e| {
            let mut session = Session {
                expander: e,
                geometry,
            };
            f(&mut session)
        })
    }

    fn send_command<BUS, DELAY>(
        &self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        command: u8,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.ready::<BUS>()?;
        expander.session(|e| e.write_command(command))
    }

    pub fn clear<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.ready::<BUS>()?;
        expander.session(|e| {
            e.write_command(LCD_CMD_CLEARDISPLAY)?;
            e.delay().delay_us(CLEAR_DELAY_US);
            Ok(())
        })
    }

    /// Moves the cursor to column 1, row 1.
    pub fn home<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.set_cursor(expander, 1, 1)
    }

    pub fn set_cursor<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        col: u8,
        row: u8,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.session(expander, |s| s.set_cursor(col, row).map(|_| ()))
    }

    pub fn print<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        text: &[u8],
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.session(expander, |s| s.print_bytes(text).map(|_| ()))
    }

    pub fn print_char<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        c: u8,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.session(expander, |s| s.print_char(c).map(|_| ()))
    }

    fn update_display_control<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        flag: u8,
        on: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.ready::<BUS>()?;
        let mut display_control = self.display_control & !flag;
        if on {
            display_control |= flag;
        }
        // stored only once the controller has it
        self.send_command(expander, LCD_CMD_DISPLAYCONTROL | display_control)?;
        self.display_control = display_control;
        Ok(())
    }

    fn update_display_mode<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        flag: u8,
        on: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.ready::<BUS>()?;
        let mut display_mode = self.display_mode & !flag;
        if on {
            display_mode |= flag;
        }
        // stored only once the controller has it
        self.send_command(expander, LCD_CMD_ENTRYMODESET | display_mode)?;
        self.display_mode = display_mode;
        Ok(())
    }

    pub fn show_display<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        show_display: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.update_display_control(expander, LCD_FLAG_DISPLAYON, show_display)
    }

    pub fn show_cursor<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        show_cursor: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.update_display_control(expander, LCD_FLAG_CURSORON, show_cursor)
    }

    pub fn blink_cursor<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        blink_cursor: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.update_display_control(expander, LCD_FLAG_BLINKON, blink_cursor)
    }

    /// The backlight has no instruction of its own. The display control byte is resent so the
    /// new backlight bit is pushed to the expander.
    pub fn backlight<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        on: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.ready::<BUS>()?;
        let previous = expander.backlight();
        expander.set_backlight(on);
        let sent = self.send_command(expander, LCD_CMD_DISPLAYCONTROL | self.display_control);
        if sent.is_err() {
            expander.set_backlight(previous);
        }
        sent
    }

    pub fn set_text_direction<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        direction: TextDirection,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        let left = match direction {
            TextDirection::LeftToRight => true,
            TextDirection::RightToLeft => false,
        };
        self.update_display_mode(expander, LCD_FLAG_ENTRYLEFT, left)
    }

    /// With autoscroll on, the display shifts on every write so the cursor appears fixed.
    pub fn autoscroll<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        autoscroll: bool,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.update_display_mode(expander, LCD_FLAG_ENTRYSHIFTINCREMENT, autoscroll)
    }

    pub fn scroll_display_left<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.send_command(
            expander,
            LCD_CMD_CURSORSHIFT | LCD_FLAG_DISPLAYMOVE | LCD_FLAG_MOVELEFT,
        )
    }

    pub fn scroll_display_right<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.send_command(
            expander,
            LCD_CMD_CURSORSHIFT | LCD_FLAG_DISPLAYMOVE | LCD_FLAG_MOVERIGHT,
        )
    }

    /// Stores a 5x8 glyph in one of the 8 CGRAM slots. Only the low 3 bits of `location` and the
    /// low 5 bits of each row are used.
    pub fn create_char<BUS, DELAY>(
        &mut self,
        expander: &mut Pcf8574Expander<BUS, DELAY>,
        location: u8,
        charmap: [u8; 8],
    ) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
        DELAY: DelayNs,
    {
        self.ready::<BUS>()?;
        expander.session(|e| {
            e.write_command(LCD_CMD_SETCGRAMADDR | ((location & 0x7) << 3))?;
            for row in charmap {
                e.write_data(row & 0x1F)?;
            }
            Ok(())
        })
    }

    /// Replaces the DDRAM start address of each row. No bus traffic.
    pub fn set_row_offsets<BUS>(&mut self, row_offsets: [u8; 4]) -> Result<(), CharacterDisplayError<BUS>>
    where
        BUS: TwoWireBus,
    {
        let geometry = self
            .geometry
            .as_mut()
            .ok_or(CharacterDisplayError::<BUS>::NotInitialized)?;
        geometry.set_row_offsets(row_offsets);
        #[cfg(feature = "defmt")]
        defmt::debug!("Row offsets set to {:?}", row_offsets);
        Ok(())
    }
}

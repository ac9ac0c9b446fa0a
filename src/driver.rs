// Controller and expander layers. `pcf8574` turns nibbles into expander pin states on the bus,
// `hd44780` keeps the controller's modal state and builds the instruction stream on top of it.
pub mod hd44780;
pub mod pcf8574;

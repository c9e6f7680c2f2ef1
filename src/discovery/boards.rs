//! Known-board tables.
//!
//! A product id of `None` matches every product of that vendor.

/// USB identity of a supported board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardDescriptor {
    /// USB Vendor ID.
    pub vendor_id: u16,

    /// USB Product ID, or `None` for a vendor-wide match.
    pub product_id: Option<u16>,

    /// Human-readable board name.
    pub name: &'static str,
}

impl BoardDescriptor {
    /// Whether a port reporting `vid`/`pid` is this board.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vendor_id == vid && self.product_id.map_or(true, |p| p == pid)
    }
}

/// Boards driven by the generic MicroPython mode.
pub const MICROPYTHON_BOARDS: &[BoardDescriptor] = &[
    BoardDescriptor {
        vendor_id: 0x0D28,
        product_id: Some(0x0204),
        name: "BBC micro:bit",
    },
    BoardDescriptor {
        vendor_id: 0x239A,
        product_id: Some(0x800B),
        name: "Adafruit Feather M0 (CDC)",
    },
    BoardDescriptor {
        vendor_id: 0x239A,
        product_id: Some(0x8016),
        name: "Adafruit Feather M0 (CDC + MSC)",
    },
    BoardDescriptor {
        vendor_id: 0x239A,
        product_id: Some(0x8014),
        name: "Adafruit Metro M0",
    },
    BoardDescriptor {
        vendor_id: 0x239A,
        product_id: Some(0x8019),
        name: "Adafruit Circuit Playground M0",
    },
    BoardDescriptor {
        vendor_id: 0x239A,
        product_id: Some(0x8015),
        name: "Adafruit Circuit Playground M0 (prototype)",
    },
    BoardDescriptor {
        vendor_id: 0x239A,
        product_id: Some(0x801B),
        name: "Adafruit Feather M0 Express",
    },
];

/// Studuino:bit (ESP32 based).
pub const STUDUINOBIT_BOARDS: &[BoardDescriptor] = &[BoardDescriptor {
    vendor_id: 0x20A0,
    product_id: Some(0x4269),
    name: "Artec Studuino:bit",
}];

/// First entry of `table` matching `vid`/`pid`.
pub fn lookup(
    table: &'static [BoardDescriptor],
    vid: u16,
    pid: u16,
) -> Option<&'static BoardDescriptor> {
    table.iter().find(|b| b.matches(vid, pid))
}

//! BeagleBone P8/P9 header pinout.
//!
//! Row `n` describes header pin `n`; row 0 is unused. The P9 table carries two
//! extra rows for the second SoC ball wired to P9.41 (row 47) and P9.42
//! (row 48).

use crate::unit::PruUnit::{self, Pru0, Pru1};

/// One PRU-direct channel: a bit of the PRU `r30` (output) or `r31` (input)
/// register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PruChannel {
    /// Owning PRU core.
    pub unit: PruUnit,
    /// Register bit.
    pub bit: u8,
}

/// Capabilities of one header pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPin {
    /// SoC GPIO number (`bank * 32 + bit`).
    pub gpio: Option<u8>,
    /// PRU output channel.
    pub pru_out: Option<PruChannel>,
    /// PRU input channel.
    pub pru_in: Option<PruChannel>,
}

const fn none() -> HeaderPin {
    HeaderPin {
        gpio: None,
        pru_out: None,
        pru_in: None,
    }
}

const fn gpio(n: u8) -> HeaderPin {
    HeaderPin {
        gpio: Some(n),
        pru_out: None,
        pru_in: None,
    }
}

const fn pru(n: u8, unit: PruUnit, bit: u8) -> HeaderPin {
    HeaderPin {
        gpio: Some(n),
        pru_out: Some(PruChannel { unit, bit }),
        pru_in: Some(PruChannel { unit, bit }),
    }
}

const fn pru_out(n: u8, unit: PruUnit, bit: u8) -> HeaderPin {
    HeaderPin {
        gpio: Some(n),
        pru_out: Some(PruChannel { unit, bit }),
        pru_in: None,
    }
}

const fn pru_in(n: u8, unit: PruUnit, bit: u8) -> HeaderPin {
    HeaderPin {
        gpio: Some(n),
        pru_out: None,
        pru_in: Some(PruChannel { unit, bit }),
    }
}

/// Number of rows in [`P8`].
pub const P8_ROWS: usize = 47;

/// Number of rows in [`P9`].
pub const P9_ROWS: usize = 49;

/// P8 header.
pub const P8: [HeaderPin; P8_ROWS] = [
    none(),               // 0
    none(),               // 1 GND
    none(),               // 2 GND
    gpio(38),             // 3
    gpio(39),             // 4
    gpio(34),             // 5
    gpio(35),             // 6
    gpio(66),             // 7
    gpio(67),             // 8
    gpio(69),             // 9
    gpio(68),             // 10
    pru_out(45, Pru0, 15), // 11
    pru_out(44, Pru0, 14), // 12
    gpio(23),             // 13
    gpio(26),             // 14
    pru_in(47, Pru0, 15), // 15
    pru_in(46, Pru0, 14), // 16
    gpio(27),             // 17
    gpio(65),             // 18
    gpio(22),             // 19
    pru(63, Pru1, 13),    // 20
    pru(62, Pru1, 12),    // 21
    gpio(37),             // 22
    gpio(36),             // 23
    gpio(33),             // 24
    gpio(32),             // 25
    gpio(61),             // 26
    pru(86, Pru1, 8),     // 27
    pru(88, Pru1, 10),    // 28
    pru(87, Pru1, 9),     // 29
    pru(89, Pru1, 11),    // 30
    gpio(10),             // 31
    gpio(11),             // 32
    gpio(9),              // 33
    gpio(81),             // 34
    gpio(8),              // 35
    gpio(80),             // 36
    gpio(78),             // 37
    gpio(79),             // 38
    pru(76, Pru1, 6),     // 39
    pru(77, Pru1, 7),     // 40
    pru(74, Pru1, 4),     // 41
    pru(75, Pru1, 5),     // 42
    pru(72, Pru1, 2),     // 43
    pru(73, Pru1, 3),     // 44
    pru(70, Pru1, 0),     // 45
    pru(71, Pru1, 1),     // 46
];

/// P9 header, with the second balls of P9.41 and P9.42 appended.
pub const P9: [HeaderPin; P9_ROWS] = [
    none(),               // 0
    none(),               // 1 GND
    none(),               // 2 GND
    none(),               // 3 3V3
    none(),               // 4 3V3
    none(),               // 5 VDD_5V
    none(),               // 6 VDD_5V
    none(),               // 7 SYS_5V
    none(),               // 8 SYS_5V
    none(),               // 9 PWR_BUT
    none(),               // 10 SYS_RESETN
    gpio(30),             // 11
    gpio(60),             // 12
    gpio(31),             // 13
    gpio(50),             // 14
    gpio(48),             // 15
    gpio(51),             // 16
    gpio(5),              // 17
    gpio(4),              // 18
    gpio(13),             // 19
    gpio(12),             // 20
    gpio(3),              // 21
    gpio(2),              // 22
    gpio(49),             // 23
    pru_in(15, Pru0, 16), // 24
    pru(117, Pru0, 7),    // 25
    pru_in(14, Pru1, 16), // 26
    pru(115, Pru0, 5),    // 27
    pru(113, Pru0, 3),    // 28
    pru(111, Pru0, 1),    // 29
    pru(112, Pru0, 2),    // 30
    pru(110, Pru0, 0),    // 31
    none(),               // 32 VADC
    none(),               // 33 AIN4
    none(),               // 34 AGND
    none(),               // 35 AIN6
    none(),               // 36 AIN5
    none(),               // 37 AIN2
    none(),               // 38 AIN3
    none(),               // 39 AIN0
    none(),               // 40 AIN1
    gpio(20),             // 41
    gpio(7),              // 42
    none(),               // 43 GND
    none(),               // 44 GND
    none(),               // 45 GND
    none(),               // 46 GND
    pru(116, Pru0, 6),    // 47 = P9.91, second ball of P9.41
    pru(114, Pru0, 4),    // 48 = P9.92, second ball of P9.42
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_pins_have_no_capability() {
        for row in [1, 2, 3, 10, 32, 40, 43, 46] {
            assert_eq!(P9[row], none(), "P9.{row}");
        }
        assert_eq!(P8[1], none());
        assert_eq!(P8[2], none());
    }

    #[test]
    fn gpio_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for pin in P8.iter().chain(P9.iter()) {
            if let Some(n) = pin.gpio {
                assert!(seen.insert(n), "gpio {n} listed twice");
                assert!(n < 128);
            }
        }
    }
}

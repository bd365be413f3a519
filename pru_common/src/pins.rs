//! Logical pin ids and the pin resolver.
//!
//! A configured pin is either a raw SoC GPIO number or a BeagleBone header
//! position together with the capability it is used for. [`resolve`] maps
//! it to a GPIO bank/bit, a PRU-direct channel, or [`PinTarget::Unusable`].
//!
//! Accepted text forms:
//!
//! | Text             | Meaning                          |
//! |------------------|----------------------------------|
//! | `P8.11`          | header pin as GPIO               |
//! | `pru-out:P9.29`  | header pin as PRU output         |
//! | `pru-in:P9.29`   | header pin as PRU input          |
//! | `gpio:37`        | raw SoC GPIO number              |
//! | `811`, `1929`    | legacy integer notation          |
//!
//! Legacy integers below 128 are raw GPIO numbers. Above that,
//! `id / 100` selects the kind (8/9 GPIO, 18/19 PRU out, 28/29 PRU in),
//! `(id % 1000) / 100` the connector and `id % 100` the header index.

pub mod table;

use crate::unit::PruUnit;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use table::{HeaderPin, PruChannel};

/// Bits per GPIO bank.
pub const BANK_SIZE: u32 = 32;

/// Number of GPIO banks.
pub const BANK_COUNT: u32 = 4;

/// Wire pin flag selecting a PRU-direct channel.
pub const PRU_DIRECT_FLAG: u8 = 0x80;

/// Wire pin used for unconfigured outputs: a PRU output bit that does not
/// leave the chip.
pub const DEFAULT_WIRE_PIN: u8 = PRU_DIRECT_FLAG | 17;

/// Header positions that select the second SoC ball of a shared pin.
const REMAPS: [(Connector, u8, usize); 2] = [(Connector::P9, 91, 47), (Connector::P9, 92, 48)];

/// Highest regular header index.
const MAX_HEADER_INDEX: u8 = 46;

/// Pin resolution and claiming errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    /// Pin does not resolve to anything usable for the requested role.
    #[error("Pin {0} is not usable")]
    Unusable(LogicalPin),

    /// PRU-direct pin belongs to the other PRU core.
    #[error("Pin {pin} is wired to {found}, but the driver runs on {expected}")]
    WrongUnit {
        /// Offending pin.
        pin: LogicalPin,
        /// Core the pin belongs to.
        found: PruUnit,
        /// Core the driver runs on.
        expected: PruUnit,
    },

    /// Pin already claimed by another signal.
    #[error("Pin {pin} requested by {claimant} is already used by {owner}")]
    AlreadyClaimed {
        /// Offending pin.
        pin: LogicalPin,
        /// Current owner.
        owner: String,
        /// Second claimant.
        claimant: String,
    },

    /// Pin text could not be parsed.
    #[error("Invalid pin syntax: {0}")]
    Syntax(String),

    /// Legacy integer outside every documented range.
    #[error("Unknown legacy pin encoding: {0}")]
    UnknownEncoding(u32),

    /// A header position was required, a raw GPIO number was given.
    #[error("Pin {0} must be given as a header position")]
    NotHeaderPin(LogicalPin),
}

/// Expansion header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connector {
    /// P8 header.
    P8,
    /// P9 header.
    P9,
}

impl Connector {
    /// Header number as printed on the board.
    pub const fn number(self) -> u8 {
        match self {
            Self::P8 => 8,
            Self::P9 => 9,
        }
    }

    const fn from_number(n: u32) -> Option<Self> {
        match n {
            8 => Some(Self::P8),
            9 => Some(Self::P9),
            _ => None,
        }
    }
}

/// Capability a header pin is used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinKind {
    /// SoC GPIO.
    Gpio,
    /// PRU `r30` output bit.
    PruOut,
    /// PRU `r31` input bit.
    PruIn,
}

/// Logical pin as written in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PinSpec", into = "String")]
pub enum LogicalPin {
    /// Raw SoC GPIO number.
    Raw(u32),
    /// Header position.
    Header {
        /// Capability used.
        kind: PinKind,
        /// Header.
        connector: Connector,
        /// 1-based header index (91/92 select the second ball of P9.41/42).
        index: u8,
    },
}

/// Physical destination of a logical pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinTarget {
    /// SoC GPIO bank and bit.
    Bank {
        /// Bank number (0..4).
        bank: u8,
        /// Bit inside the bank (0..32).
        bit: u8,
    },
    /// PRU-direct output channel.
    PruOutput(PruChannel),
    /// PRU-direct input channel.
    PruInput(PruChannel),
    /// Nothing usable.
    Unusable,
}

impl PinTarget {
    /// Byte the firmware uses to address this pin.
    ///
    /// GPIO pins encode as `bank * 32 + bit`, PRU-direct channels as
    /// `0x80 | bit`. Returns `None` for [`PinTarget::Unusable`].
    pub fn wire_pin(&self) -> Option<u8> {
        match *self {
            Self::Bank { bank, bit } => Some(bank * BANK_SIZE as u8 + bit),
            Self::PruOutput(ch) | Self::PruInput(ch) => Some(PRU_DIRECT_FLAG | ch.bit),
            Self::Unusable => None,
        }
    }

    /// PRU core a direct channel belongs to.
    pub fn unit(&self) -> Option<PruUnit> {
        match *self {
            Self::PruOutput(ch) | Self::PruInput(ch) => Some(ch.unit),
            _ => None,
        }
    }
}

/// Resolve a logical pin. Total and pure.
pub fn resolve(pin: LogicalPin) -> PinTarget {
    match pin {
        LogicalPin::Raw(id) => {
            if id < BANK_COUNT * BANK_SIZE {
                PinTarget::Bank {
                    bank: (id / BANK_SIZE) as u8,
                    bit: (id % BANK_SIZE) as u8,
                }
            } else {
                PinTarget::Unusable
            }
        }
        LogicalPin::Header {
            kind,
            connector,
            index,
        } => {
            let Some(entry) = header_entry(connector, index) else {
                return PinTarget::Unusable;
            };
            let target = match kind {
                PinKind::Gpio => entry.gpio.map(|n| PinTarget::Bank {
                    bank: n / BANK_SIZE as u8,
                    bit: n % BANK_SIZE as u8,
                }),
                PinKind::PruOut => entry.pru_out.map(PinTarget::PruOutput),
                PinKind::PruIn => entry.pru_in.map(PinTarget::PruInput),
            };
            target.unwrap_or(PinTarget::Unusable)
        }
    }
}

/// Resolve a legacy integer id; anything undecodable is unusable.
pub fn resolve_legacy(id: u32) -> PinTarget {
    LogicalPin::from_legacy(id)
        .map(resolve)
        .unwrap_or(PinTarget::Unusable)
}

/// Resolve a pin for use by the driver running on `unit`.
///
/// # Errors
/// `Unusable` when nothing backs the pin, `WrongUnit` when a PRU-direct
/// channel belongs to the other core.
pub fn resolve_for(pin: LogicalPin, unit: PruUnit) -> Result<PinTarget, PinError> {
    let target = resolve(pin);
    match target {
        PinTarget::Unusable => Err(PinError::Unusable(pin)),
        _ => match target.unit() {
            Some(found) if found != unit => Err(PinError::WrongUnit {
                pin,
                found,
                expected: unit,
            }),
            _ => Ok(target),
        },
    }
}

fn header_entry(connector: Connector, index: u8) -> Option<&'static HeaderPin> {
    let row = REMAPS
        .iter()
        .find(|(c, i, _)| *c == connector && *i == index)
        .map(|(_, _, row)| *row)
        .or_else(|| (index <= MAX_HEADER_INDEX).then_some(index as usize))?;
    match connector {
        Connector::P8 => table::P8.get(row),
        Connector::P9 => table::P9.get(row),
    }
}

impl LogicalPin {
    /// Header pin of the given kind.
    pub const fn header(kind: PinKind, connector: Connector, index: u8) -> Self {
        Self::Header {
            kind,
            connector,
            index,
        }
    }

    /// Decode the legacy integer notation.
    ///
    /// # Errors
    /// `UnknownEncoding` when the kind or connector digits are not defined.
    pub fn from_legacy(id: u32) -> Result<Self, PinError> {
        if id < BANK_COUNT * BANK_SIZE {
            return Ok(Self::Raw(id));
        }
        let kind = match id / 100 {
            8 | 9 => PinKind::Gpio,
            18 | 19 => PinKind::PruOut,
            28 | 29 => PinKind::PruIn,
            _ => return Err(PinError::UnknownEncoding(id)),
        };
        let connector =
            Connector::from_number((id % 1000) / 100).ok_or(PinError::UnknownEncoding(id))?;
        Ok(Self::Header {
            kind,
            connector,
            index: (id % 100) as u8,
        })
    }
}

impl fmt::Display for LogicalPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Raw(id) => write!(f, "gpio:{id}"),
            Self::Header {
                kind,
                connector,
                index,
            } => {
                let prefix = match kind {
                    PinKind::Gpio => "",
                    PinKind::PruOut => "pru-out:",
                    PinKind::PruIn => "pru-in:",
                };
                write!(f, "{prefix}P{}.{index}", connector.number())
            }
        }
    }
}

impl FromStr for LogicalPin {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if let Some(rest) = strip_prefix_ignore_case(text, "pru-out:") {
            return parse_header(PinKind::PruOut, rest, s);
        }
        if let Some(rest) = strip_prefix_ignore_case(text, "pru-in:") {
            return parse_header(PinKind::PruIn, rest, s);
        }
        if let Some(rest) = strip_prefix_ignore_case(text, "gpio:") {
            return match rest.parse::<u32>() {
                Ok(id) => Ok(Self::Raw(id)),
                Err(_) => parse_header(PinKind::Gpio, rest, s),
            };
        }
        if let Ok(id) = text.parse::<u32>() {
            return Self::from_legacy(id);
        }
        parse_header(PinKind::Gpio, text, s)
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

fn parse_header(kind: PinKind, text: &str, original: &str) -> Result<LogicalPin, PinError> {
    let syntax = || PinError::Syntax(original.to_string());
    let rest = text
        .strip_prefix('P')
        .or_else(|| text.strip_prefix('p'))
        .ok_or_else(syntax)?;
    let (connector, index) = rest.split_once(['.', '_']).ok_or_else(syntax)?;
    let connector = connector
        .parse::<u32>()
        .ok()
        .and_then(Connector::from_number)
        .ok_or_else(syntax)?;
    let index = index.parse::<u8>().map_err(|_| syntax())?;
    Ok(LogicalPin::Header {
        kind,
        connector,
        index,
    })
}

/// Pin as found in TOML: a legacy integer or a text form.
#[derive(Deserialize)]
#[serde(untagged)]
enum PinSpec {
    Legacy(u32),
    Text(String),
}

impl TryFrom<PinSpec> for LogicalPin {
    type Error = PinError;

    fn try_from(spec: PinSpec) -> Result<Self, Self::Error> {
        match spec {
            PinSpec::Legacy(id) => Self::from_legacy(id),
            PinSpec::Text(text) => text.parse(),
        }
    }
}

impl From<LogicalPin> for String {
    fn from(pin: LogicalPin) -> Self {
        pin.to_string()
    }
}

/// What a claim reserves.
///
/// A header pad has one pinmux function, so every capability of the pad
/// shares its SoC ball. PRU-direct channels are reserved as well: two
/// balls may never drive the same register bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ClaimKey {
    /// SoC ball, named by its GPIO number.
    Ball(u8),
    /// PRU `r30`/`r31` bit.
    Channel(PinTarget),
}

/// SoC ball behind a logical pin, named by the GPIO number of the pad.
pub fn ball(pin: LogicalPin) -> Option<u8> {
    match pin {
        LogicalPin::Raw(id) => u8::try_from(id)
            .ok()
            .filter(|n| u32::from(*n) < BANK_COUNT * BANK_SIZE),
        LogicalPin::Header {
            connector, index, ..
        } => header_entry(connector, index).and_then(|entry| entry.gpio),
    }
}

fn claim_keys(pin: LogicalPin, target: PinTarget) -> Vec<ClaimKey> {
    let mut keys = Vec::with_capacity(2);
    if let Some(n) = ball(pin) {
        keys.push(ClaimKey::Ball(n));
    }
    match target {
        PinTarget::PruOutput(_) | PinTarget::PruInput(_) => keys.push(ClaimKey::Channel(target)),
        PinTarget::Bank { bank, bit } if keys.is_empty() => {
            keys.push(ClaimKey::Ball(bank * BANK_SIZE as u8 + bit))
        }
        _ => {}
    }
    keys
}

/// Record of which signal owns which physical pin.
#[derive(Debug, Default)]
pub struct PinClaims {
    owners: Vec<(LogicalPin, String)>,
    claimed: HashMap<ClaimKey, usize>,
}

impl PinClaims {
    /// Create an empty claim table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pad of `pin` (resolved to `target`) for `owner`.
    ///
    /// # Errors
    /// `AlreadyClaimed` when another owner holds the same pad or PRU
    /// channel, whatever capability it was claimed with.
    pub fn claim(
        &mut self,
        pin: LogicalPin,
        target: PinTarget,
        owner: &str,
    ) -> Result<(), PinError> {
        let keys = claim_keys(pin, target);
        if let Some(&held) = keys.iter().find_map(|key| self.claimed.get(key)) {
            return Err(PinError::AlreadyClaimed {
                pin,
                owner: self.owners[held].1.clone(),
                claimant: owner.to_string(),
            });
        }
        let slot = self.owners.len();
        self.owners.push((pin, owner.to_string()));
        for key in keys {
            self.claimed.insert(key, slot);
        }
        Ok(())
    }

    /// Number of claimed pins.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// True when nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpio_pin(connector: Connector, index: u8) -> LogicalPin {
        LogicalPin::header(PinKind::Gpio, connector, index)
    }

    #[test]
    fn raw_ids_map_to_banks() {
        assert_eq!(resolve(LogicalPin::Raw(37)), PinTarget::Bank { bank: 1, bit: 5 });
        assert_eq!(resolve(LogicalPin::Raw(0)), PinTarget::Bank { bank: 0, bit: 0 });
        assert_eq!(resolve(LogicalPin::Raw(127)), PinTarget::Bank { bank: 3, bit: 31 });
        assert_eq!(resolve(LogicalPin::Raw(128)), PinTarget::Unusable);
    }

    #[test]
    fn header_gpio_lookup() {
        // P8.11 is gpio1_13.
        assert_eq!(
            resolve(gpio_pin(Connector::P8, 11)),
            PinTarget::Bank { bank: 1, bit: 13 }
        );
        assert_eq!(resolve(gpio_pin(Connector::P8, 1)), PinTarget::Unusable);
        assert_eq!(resolve(gpio_pin(Connector::P8, 47)), PinTarget::Unusable);
        assert_eq!(resolve(gpio_pin(Connector::P9, 0)), PinTarget::Unusable);
    }

    #[test]
    fn shared_p9_balls_are_distinct() {
        let p9_41 = resolve(gpio_pin(Connector::P9, 41));
        let p9_91 = resolve(gpio_pin(Connector::P9, 91));
        let p9_42 = resolve(gpio_pin(Connector::P9, 42));
        let p9_92 = resolve(gpio_pin(Connector::P9, 92));
        assert_eq!(p9_41, PinTarget::Bank { bank: 0, bit: 20 });
        assert_eq!(p9_91, PinTarget::Bank { bank: 3, bit: 20 });
        assert_eq!(p9_42, PinTarget::Bank { bank: 0, bit: 7 });
        assert_eq!(p9_92, PinTarget::Bank { bank: 3, bit: 18 });
        assert_eq!(
            resolve(LogicalPin::header(PinKind::PruOut, Connector::P9, 91)),
            PinTarget::PruOutput(PruChannel {
                unit: PruUnit::Pru0,
                bit: 6
            })
        );
        assert_eq!(resolve(gpio_pin(Connector::P8, 91)), PinTarget::Unusable);
        assert_eq!(resolve(gpio_pin(Connector::P9, 93)), PinTarget::Unusable);
    }

    #[test]
    fn missing_capability_is_unusable() {
        // P8.11 has a PRU0 output but no PRU input.
        assert_eq!(
            resolve(LogicalPin::header(PinKind::PruIn, Connector::P8, 11)),
            PinTarget::Unusable
        );
        assert_eq!(
            resolve(LogicalPin::header(PinKind::PruOut, Connector::P9, 12)),
            PinTarget::Unusable
        );
    }

    #[test]
    fn wire_pin_encoding() {
        assert_eq!(PinTarget::Bank { bank: 1, bit: 5 }.wire_pin(), Some(37));
        let ch = PruChannel {
            unit: PruUnit::Pru1,
            bit: 13,
        };
        assert_eq!(PinTarget::PruOutput(ch).wire_pin(), Some(0x8D));
        assert_eq!(PinTarget::Unusable.wire_pin(), None);
        assert_eq!(DEFAULT_WIRE_PIN, 0x91);
    }

    #[test]
    fn legacy_decoding() {
        assert_eq!(LogicalPin::from_legacy(37), Ok(LogicalPin::Raw(37)));
        assert_eq!(
            LogicalPin::from_legacy(811),
            Ok(gpio_pin(Connector::P8, 11))
        );
        assert_eq!(
            LogicalPin::from_legacy(1929),
            Ok(LogicalPin::header(PinKind::PruOut, Connector::P9, 29))
        );
        assert_eq!(
            LogicalPin::from_legacy(2991),
            Ok(LogicalPin::header(PinKind::PruIn, Connector::P9, 91))
        );
        assert_eq!(
            LogicalPin::from_legacy(500),
            Err(PinError::UnknownEncoding(500))
        );
        assert_eq!(resolve_legacy(3811), PinTarget::Unusable);
    }

    #[test]
    fn text_forms_parse() {
        assert_eq!("P8.11".parse(), Ok(gpio_pin(Connector::P8, 11)));
        assert_eq!("p9_41".parse(), Ok(gpio_pin(Connector::P9, 41)));
        assert_eq!(
            "PRU-OUT:P9.29".parse(),
            Ok(LogicalPin::header(PinKind::PruOut, Connector::P9, 29))
        );
        assert_eq!("gpio:37".parse(), Ok(LogicalPin::Raw(37)));
        assert_eq!("1929".parse::<LogicalPin>(), LogicalPin::from_legacy(1929));
        assert!(matches!(
            "P7.11".parse::<LogicalPin>(),
            Err(PinError::Syntax(_))
        ));
        assert!(matches!("".parse::<LogicalPin>(), Err(PinError::Syntax(_))));
    }

    #[test]
    fn display_round_trips() {
        for pin in [
            LogicalPin::Raw(37),
            gpio_pin(Connector::P8, 11),
            LogicalPin::header(PinKind::PruIn, Connector::P9, 91),
        ] {
            assert_eq!(pin.to_string().parse(), Ok(pin));
        }
    }

    #[test]
    fn resolve_for_rejects_other_unit() {
        let pin = LogicalPin::header(PinKind::PruOut, Connector::P8, 45);
        assert!(resolve_for(pin, PruUnit::Pru1).is_ok());
        assert_eq!(
            resolve_for(pin, PruUnit::Pru0),
            Err(PinError::WrongUnit {
                pin,
                found: PruUnit::Pru1,
                expected: PruUnit::Pru0
            })
        );
        assert_eq!(
            resolve_for(LogicalPin::Raw(200), PruUnit::Pru0),
            Err(PinError::Unusable(LogicalPin::Raw(200)))
        );
    }

    #[test]
    fn double_claim_is_rejected() {
        let mut claims = PinClaims::new();
        let pin = gpio_pin(Connector::P8, 22);
        let target = resolve(pin);
        claims.claim(pin, target, "stepgen.00.step").unwrap();
        // gpio:37 is the same physical pin as P8.22.
        let err = claims
            .claim(LogicalPin::Raw(37), resolve(LogicalPin::Raw(37)), "gpio.out")
            .unwrap_err();
        assert!(matches!(err, PinError::AlreadyClaimed { ref owner, .. } if owner == "stepgen.00.step"));
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn one_pad_one_claim_across_capabilities() {
        let mut claims = PinClaims::new();
        let pru = LogicalPin::header(PinKind::PruOut, Connector::P8, 45);
        claims.claim(pru, resolve(pru), "stepgen.00.steppin").unwrap();

        let gpio = gpio_pin(Connector::P8, 45);
        let err = claims.claim(gpio, resolve(gpio), "gpio.out").unwrap_err();
        assert!(matches!(err, PinError::AlreadyClaimed { ref owner, .. } if owner == "stepgen.00.steppin"));

        let input = LogicalPin::header(PinKind::PruIn, Connector::P8, 45);
        assert!(claims.claim(input, resolve(input), "encoder").is_err());
        assert_eq!(claims.len(), 1);
    }

    #[test]
    fn second_ball_of_shared_pin_is_separate() {
        let mut claims = PinClaims::new();
        for (index, owner) in [(41, "a"), (91, "b"), (42, "c"), (92, "d")] {
            let pin = gpio_pin(Connector::P9, index);
            claims.claim(pin, resolve(pin), owner).unwrap();
        }
        assert_eq!(claims.len(), 4);
        assert_eq!(ball(gpio_pin(Connector::P9, 41)), Some(20));
        assert_eq!(ball(gpio_pin(Connector::P9, 91)), Some(116));
        assert_eq!(ball(LogicalPin::Raw(128)), None);
    }
}

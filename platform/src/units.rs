use jzon::JsonValue;

/// A clock frequency.  The unit is Hz.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Frequency(pub u64);

/// A decimal number as written in vendor parameters and attributes, eg. `"12.288"` or `"2.0"`.
/// Stored as `mantissa / 10^scale`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decimal {
    pub mantissa: u64,
    pub scale: u32,
}

impl Decimal {
    pub fn parse(s: &str) -> Option<Decimal> {
        let (int, frac) = match s.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (s, ""),
        };
        if int.is_empty() || !int.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let scale = frac.len() as u32;
        let mantissa = format!("{int}{frac}").parse().ok()?;
        Some(Decimal { mantissa, scale })
    }

    pub fn is_zero(self) -> bool {
        self.mantissa == 0
    }
}

impl Frequency {
    pub const fn from_hz(hz: u64) -> Self {
        Frequency(hz)
    }

    pub const fn from_mhz(mhz: u64) -> Self {
        Frequency(mhz * 1_000_000)
    }

    /// Parses a frequency given in MHz, as in `FREQUENCY_PIN_*` attributes.
    pub fn parse_mhz(s: &str) -> Option<Self> {
        let d = Decimal::parse(s)?;
        let hz = u128::from(d.mantissa) * 1_000_000 / 10u128.checked_pow(d.scale)?;
        Some(Frequency(hz.try_into().ok()?))
    }

    pub fn hz(self) -> u64 {
        self.0
    }

    /// Divides by a decimal ratio, truncating to whole Hz.
    pub fn div_decimal(self, div: Decimal) -> Option<Self> {
        if div.is_zero() {
            return None;
        }
        let scaled = u128::from(self.0) * 10u128.checked_pow(div.scale)?;
        let hz = scaled / u128::from(div.mantissa);
        Some(Frequency(hz.try_into().ok()?))
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mhz = self.0 / 1_000_000;
        let frac = self.0 % 1_000_000;
        if frac == 0 {
            write!(f, "{mhz} MHz")
        } else {
            let frac = format!("{frac:06}");
            write!(f, "{mhz}.{frac} MHz", frac = frac.trim_end_matches('0'))
        }
    }
}

impl From<Frequency> for JsonValue {
    fn from(value: Frequency) -> Self {
        value.0.into()
    }
}

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrequencyParseError {
    #[error("'{0}' is not a frequency, expected e.g. 133MHz, 48000kHz or 12000000")]
    Malformed(String),
    #[error("'{0}' does not fit in 32 bits of Hz")]
    OutOfRange(String),
}

/// Parses a clock frequency with an optional `Hz`, `kHz`, `MHz` or `GHz`
/// suffix into Hz. Fractions are allowed as long as they land on a whole Hz.
pub fn parse_frequency(s: &str) -> Result<u32, FrequencyParseError> {
    let malformed = || FrequencyParseError::Malformed(s.to_string());
    let out_of_range = || FrequencyParseError::OutOfRange(s.to_string());

    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let scale: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "hz" => 1,
        "khz" => 1_000,
        "mhz" => 1_000_000,
        "ghz" => 1_000_000_000,
        _ => return Err(malformed()),
    };

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return Err(malformed());
    }

    // Only digits are left, so a failed parse means overflow
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| out_of_range())?
    };

    let mut hz = whole.checked_mul(scale).ok_or_else(out_of_range)?;

    let mut place = scale;
    for digit in fraction.chars() {
        let digit = digit.to_digit(10).ok_or_else(malformed)? as u64;
        if place % 10 != 0 {
            if digit != 0 {
                return Err(malformed());
            }
            continue;
        }
        place /= 10;
        hz = hz.saturating_add(digit * place);
    }

    u32::try_from(hz).map_err(|_| out_of_range())
}

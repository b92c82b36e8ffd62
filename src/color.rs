//! RGB colors as written in TMX attributes (`trans="ff00ff"`)

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// An RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Color> for (u8, u8, u8) {
    fn from(color: Color) -> Self {
        (color.r, color.g, color.b)
    }
}

/// Parses `#rrggbb`, `rrggbb`, `#rgb` or `rgb`
impl FromStr for Color {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let digits = input.strip_prefix('#').unwrap_or(input);
        let invalid = || Error::format("color", format!("invalid hex color '{}'", input));

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |text: &str| u8::from_str_radix(text, 16).map_err(|_| invalid());

        match digits.len() {
            3 => {
                // Short form: each digit is doubled (f00 -> ff0000)
                let mut parts = [0u8; 3];
                for (part, c) in parts.iter_mut().zip(digits.chars()) {
                    *part = channel(&c.to_string().repeat(2))?;
                }
                Ok(Color::new(parts[0], parts[1], parts[2]))
            }
            6 => Ok(Color::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

/// Always six lowercase digits, no `#`
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_form_with_hash() {
        let color: Color = "#ff0000".parse().unwrap();
        assert_eq!(color, Color::new(255, 0, 0));
        assert_eq!(color.to_string(), "ff0000");
    }

    #[test]
    fn test_parse_short_form() {
        assert_eq!("f00".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!("#0a8".parse::<Color>().unwrap(), Color::new(0x00, 0xaa, 0x88));
    }

    #[test]
    fn test_parse_mixed_case() {
        assert_eq!("FF00fF".parse::<Color>().unwrap(), Color::new(255, 0, 255));
    }

    #[test]
    fn test_display_zero_pads() {
        assert_eq!(Color::new(1, 2, 3).to_string(), "010203");
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        for input in ["", "#", "ff00", "ff00000", "#12345"] {
            let err = input.parse::<Color>().unwrap_err();
            assert!(matches!(err, Error::Format { .. }), "{}", input);
        }
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!("gg0000".parse::<Color>().is_err());
        assert!("+f0000".parse::<Color>().is_err());
        assert!("ä0000".parse::<Color>().is_err());
    }
}

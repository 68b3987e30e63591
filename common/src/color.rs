use smart_leds::RGB8;

pub const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
pub const STATUS_CONNECTED: RGB8 = RGB8 { r: 0, g: 40, b: 0 };
pub const STATUS_ALERT: RGB8 = RGB8 { r: 40, g: 0, b: 0 };
pub const PROVISIONING_CHASE: RGB8 = RGB8 { r: 0, g: 0, b: 60 };
pub const STARTUP_SWEEP: RGB8 = RGB8 {
    r: 60,
    g: 60,
    b: 60,
};

pub fn parse_hex(value: &str) -> Option<RGB8> {
    let digits = value.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some(RGB8 {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

pub fn to_hex(color: RGB8) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

pub mod hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use smart_leds::RGB8;

    pub fn serialize<S>(color: &RGB8, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_hex(*color))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<RGB8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_hex(&raw).ok_or_else(|| D::Error::custom(format!("invalid color `{raw}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_browser_colors() {
        assert_eq!(parse_hex("#ff8000"), Some(RGB8 { r: 255, g: 128, b: 0 }));
        assert_eq!(parse_hex("00FF7f"), Some(RGB8 { r: 0, g: 255, b: 127 }));
    }

    #[test]
    fn rejects_malformed_colors() {
        assert_eq!(parse_hex("#ff80"), None);
        assert_eq!(parse_hex("#gg0000"), None);
        assert_eq!(parse_hex("#ff00ää"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn formats_lowercase_hex() {
        assert_eq!(to_hex(RGB8 { r: 1, g: 171, b: 255 }), "#01abff");
    }
}

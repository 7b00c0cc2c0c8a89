use tracing::warn;

/// Tooltip shown whenever the status command gives nothing usable.
pub const NO_DATA_TEXT: &str = "No battery data available";

/// One poll of the battery status command.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryReading {
    /// Charge in `[0.0, 1.0]`, or `None` when unavailable.
    pub level: Option<f64>,
    pub description: String,
}

impl BatteryReading {
    pub fn unavailable() -> Self {
        Self {
            level: None,
            description: NO_DATA_TEXT.to_string(),
        }
    }

    pub fn unparsed(description: impl Into<String>) -> Self {
        Self {
            level: None,
            description: description.into(),
        }
    }

    pub fn from_percent(percent: u32, description: impl Into<String>) -> Self {
        if percent > 100 {
            warn!("Battery reported {}%, clamping to 100%", percent);
        }
        Self {
            level: Some(f64::from(percent.min(100)) / 100.0),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBand {
    Normal,
    Low,
    Critical,
    Disabled,
}

impl ColorBand {
    /// `critical` must not exceed `low`; both comparisons are strict.
    pub fn from_level(level: Option<f64>, low: f64, critical: f64) -> Self {
        match level {
            None => ColorBand::Disabled,
            Some(value) if !value.is_finite() => ColorBand::Disabled,
            Some(value) if value < critical => ColorBand::Critical,
            Some(value) if value < low => ColorBand::Low,
            Some(_) => ColorBand::Normal,
        }
    }
}

/// 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }

        let byte = |s: &str| -> Option<u8> { u8::from_str_radix(s, 16).ok() };

        match hex.len() {
            6 => Some(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                0xff,
            )),
            8 => Some(Self::new(
                byte(&hex[0..2])?,
                byte(&hex[2..4])?,
                byte(&hex[4..6])?,
                byte(&hex[6..8])?,
            )),
            _ => None,
        }
    }
}

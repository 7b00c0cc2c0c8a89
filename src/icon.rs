//! Gauge icon rendering.
//!
//! The gauge is a bordered rectangle whose interior fills from the bottom
//! up in proportion to the charge level. All solid-colour templates are
//! built once by [`IconRenderer::new`] and only ever copied afterwards.

use tracing::warn;

use crate::config::{ColorConfig, Config, ConfigError};
use crate::types::{ColorBand, Rgba};

/// Dimensions, thresholds and palette of the gauge. Built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeStyle {
    pub width: u32,
    pub height: u32,
    pub border: u32,
    pub low_threshold: f64,
    pub critical_threshold: f64,
    pub border_color: Rgba,
    pub background_color: Rgba,
    pub normal_color: Rgba,
    pub low_color: Rgba,
    pub critical_color: Rgba,
    pub disabled_color: Rgba,
}

impl GaugeStyle {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let colors = &config.colors;
        Ok(Self {
            width: config.icon.width,
            height: config.icon.height,
            border: config.icon.border,
            low_threshold: config.thresholds.low,
            critical_threshold: config.thresholds.critical,
            border_color: ColorConfig::parse("border", &colors.border)?,
            background_color: ColorConfig::parse("background", &colors.background)?,
            normal_color: ColorConfig::parse("normal", &colors.normal)?,
            low_color: ColorConfig::parse("low", &colors.low)?,
            critical_color: ColorConfig::parse("critical", &colors.critical)?,
            disabled_color: ColorConfig::parse("disabled", &colors.disabled)?,
        })
    }

    pub fn interior_width(&self) -> u32 {
        self.width - 2 * self.border
    }

    pub fn interior_height(&self) -> u32 {
        self.height - 2 * self.border
    }
}

/// RGBA pixel buffer, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GaugeBitmap {
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let pixels = [color.r, color.g, color.b, color.a].repeat((width * height) as usize);
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        Some(Rgba::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    /// Copy the `w`×`h` region at the top-left of `self` into `dest` at
    /// (`dest_x`, `dest_y`). Parts falling outside either buffer are skipped.
    pub fn copy_area(&self, w: u32, h: u32, dest: &mut GaugeBitmap, dest_x: u32, dest_y: u32) {
        let w = w.min(self.width).min(dest.width.saturating_sub(dest_x));
        let h = h.min(self.height).min(dest.height.saturating_sub(dest_y));
        let row_bytes = (w * 4) as usize;

        for row in 0..h {
            let src = ((row * self.width) * 4) as usize;
            let dst = (((dest_y + row) * dest.width + dest_x) * 4) as usize;
            dest.pixels[dst..dst + row_bytes].copy_from_slice(&self.pixels[src..src + row_bytes]);
        }
    }

    /// ARGB32 in network byte order, as StatusNotifierItem pixmaps expect.
    pub fn to_argb32(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(4)
            .flat_map(|p| [p[3], p[0], p[1], p[2]])
            .collect()
    }
}

pub struct IconRenderer {
    style: GaugeStyle,
    background: GaugeBitmap,
    disabled: GaugeBitmap,
    normal: GaugeBitmap,
    low: GaugeBitmap,
    critical: GaugeBitmap,
}

impl IconRenderer {
    pub fn new(style: &GaugeStyle) -> Self {
        let (iw, ih) = (style.interior_width(), style.interior_height());
        let framed = |fill: Rgba| {
            let mut frame = GaugeBitmap::filled(style.width, style.height, style.border_color);
            GaugeBitmap::filled(iw, ih, fill).copy_area(iw, ih, &mut frame, style.border, style.border);
            frame
        };

        Self {
            background: framed(style.background_color),
            disabled: framed(style.disabled_color),
            normal: GaugeBitmap::filled(iw, ih, style.normal_color),
            low: GaugeBitmap::filled(iw, ih, style.low_color),
            critical: GaugeBitmap::filled(iw, ih, style.critical_color),
            style: style.clone(),
        }
    }

    #[cfg(test)]
    pub fn style(&self) -> &GaugeStyle {
        &self.style
    }

    pub fn disabled(&self) -> &GaugeBitmap {
        &self.disabled
    }

    /// Bar height in pixels: rounded, at least 1, at most the interior.
    pub fn bar_height(&self, level: f64) -> u32 {
        let interior = self.style.interior_height();
        let h = (level.clamp(0.0, 1.0) * f64::from(interior) + 0.5).floor() as u32;
        h.clamp(1, interior)
    }

    pub fn render(&self, level: Option<f64>) -> (GaugeBitmap, ColorBand) {
        let level = match level {
            Some(value) if !value.is_finite() => {
                warn!("Ignoring non-finite battery level {}", value);
                None
            }
            Some(value) if !(0.0..=1.0).contains(&value) => {
                warn!("Battery level {} outside [0, 1], clamping", value);
                Some(value.clamp(0.0, 1.0))
            }
            other => other,
        };

        let band = ColorBand::from_level(
            level,
            self.style.low_threshold,
            self.style.critical_threshold,
        );
        let fill = match band {
            ColorBand::Normal => &self.normal,
            ColorBand::Low => &self.low,
            ColorBand::Critical => &self.critical,
            ColorBand::Disabled => return (self.disabled.clone(), band),
        };

        let mut bitmap = self.background.clone();
        let level = level.unwrap_or_default();
        let h = self.bar_height(level);
        let s = &self.style;
        fill.copy_area(s.interior_width(), h, &mut bitmap, s.border, s.height - s.border - h);
        (bitmap, band)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> IconRenderer {
        IconRenderer::new(&GaugeStyle::from_config(&Config::default()).unwrap())
    }

    /// Interior rows painted entirely in `color`.
    fn bar_rows(renderer: &IconRenderer, bitmap: &GaugeBitmap, color: Rgba) -> u32 {
        let s = renderer.style();
        (s.border..s.height - s.border)
            .filter(|&y| {
                (s.border..s.width - s.border).all(|x| bitmap.pixel(x, y) == Some(color))
            })
            .count() as u32
    }

    #[test]
    fn dimensions_never_change() {
        let r = renderer();
        for level in [None, Some(0.0), Some(0.5), Some(1.0), Some(7.0), Some(f64::NAN)] {
            let (bitmap, _) = r.render(level);
            assert_eq!((bitmap.width(), bitmap.height()), (12, 18));
            assert_eq!(bitmap.to_argb32().len(), 12 * 18 * 4);
        }
    }

    #[test]
    fn bar_height_follows_level() {
        let r = renderer();
        for percent in 0..=100u32 {
            let f = f64::from(percent) / 100.0;
            let expected = ((f * 16.0).round() as u32).clamp(1, 16);
            assert_eq!(r.bar_height(f), expected, "level {f}");

            let (bitmap, band) = r.render(Some(f));
            let color = match band {
                ColorBand::Normal => r.style().normal_color,
                ColorBand::Low => r.style().low_color,
                ColorBand::Critical => r.style().critical_color,
                ColorBand::Disabled => unreachable!(),
            };
            assert_eq!(bar_rows(&r, &bitmap, color), expected, "level {f}");
        }
    }

    #[test]
    fn bar_grows_from_the_bottom() {
        let r = renderer();
        let (bitmap, band) = r.render(Some(0.5));
        assert_eq!(band, ColorBand::Normal);
        let green = r.style().normal_color;
        let grey = r.style().background_color;
        // interior rows 1..=16, bar of 8 occupies rows 9..=16
        assert_eq!(bitmap.pixel(1, 16), Some(green));
        assert_eq!(bitmap.pixel(10, 9), Some(green));
        assert_eq!(bitmap.pixel(1, 8), Some(grey));
        assert_eq!(bitmap.pixel(1, 1), Some(grey));
    }

    #[test]
    fn border_is_intact() {
        let r = renderer();
        let (bitmap, _) = r.render(Some(1.0));
        let black = r.style().border_color;
        for x in 0..12 {
            assert_eq!(bitmap.pixel(x, 0), Some(black));
            assert_eq!(bitmap.pixel(x, 17), Some(black));
        }
        for y in 0..18 {
            assert_eq!(bitmap.pixel(0, y), Some(black));
            assert_eq!(bitmap.pixel(11, y), Some(black));
        }
    }

    #[test]
    fn empty_battery_still_shows_a_pixel_row() {
        let r = renderer();
        let (bitmap, band) = r.render(Some(0.0));
        assert_eq!(band, ColorBand::Critical);
        assert_eq!(bar_rows(&r, &bitmap, r.style().critical_color), 1);
        assert_eq!(bitmap.pixel(5, 16), Some(r.style().critical_color));
        assert_eq!(bitmap.pixel(5, 15), Some(r.style().background_color));
    }

    #[test]
    fn unknown_level_is_disabled() {
        let r = renderer();
        let (first, band) = r.render(None);
        assert_eq!(band, ColorBand::Disabled);
        assert_eq!(&first, r.disabled());
        assert_eq!(first.pixel(0, 0), Some(r.style().border_color));
        assert_eq!(first.pixel(6, 9), Some(r.style().disabled_color));

        let _ = r.render(Some(0.8));
        let (second, _) = r.render(None);
        assert_eq!(first, second);
    }

    #[test]
    fn rendering_is_idempotent() {
        let r = renderer();
        for level in [Some(0.05), Some(0.2), Some(0.87), None] {
            assert_eq!(r.render(level), r.render(level));
        }
    }

    #[test]
    fn out_of_range_levels_are_clamped() {
        let r = renderer();
        assert_eq!(r.render(Some(1.5)), r.render(Some(1.0)));
        assert_eq!(r.render(Some(-0.2)), r.render(Some(0.0)));
        assert_eq!(r.render(Some(f64::INFINITY)).1, ColorBand::Disabled);
    }

    #[test]
    fn argb_reorders_channels() {
        let bitmap = GaugeBitmap::filled(1, 2, Rgba::new(0x11, 0x22, 0x33, 0x44));
        assert_eq!(bitmap.to_argb32(), vec![0x44, 0x11, 0x22, 0x33, 0x44, 0x11, 0x22, 0x33]);
    }

    #[test]
    fn copy_area_is_clipped_to_destination() {
        let src = GaugeBitmap::filled(4, 4, Rgba::new(1, 2, 3, 4));
        let mut dest = GaugeBitmap::filled(3, 3, Rgba::new(0, 0, 0, 0));
        src.copy_area(4, 4, &mut dest, 2, 2);
        assert_eq!(dest.pixel(2, 2), Some(Rgba::new(1, 2, 3, 4)));
        assert_eq!(dest.pixel(1, 1), Some(Rgba::new(0, 0, 0, 0)));
    }

    #[test]
    fn custom_style_is_honoured() {
        let mut config = Config::default();
        config.icon.width = 16;
        config.icon.height = 24;
        config.icon.border = 2;
        config.colors.normal = "#0000ff".to_string();
        let r = IconRenderer::new(&GaugeStyle::from_config(&config).unwrap());
        let (bitmap, _) = r.render(Some(1.0));
        assert_eq!((bitmap.width(), bitmap.height()), (16, 24));
        assert_eq!(bitmap.pixel(1, 1), Some(r.style().border_color));
        assert_eq!(bitmap.pixel(2, 2), Some(Rgba::new(0, 0, 0xff, 0xff)));
        assert_eq!(bar_rows(&r, &bitmap, Rgba::new(0, 0, 0xff, 0xff)), 20);
    }
}

use core::convert::Infallible;

use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_8X13, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{renderer::TextRenderer, Baseline, Text},
};

use crate::types::{fan_payload, format_tenths};

pub const TOP_OFFSET: i32 = 10;
pub const LINE_GAP: i32 = 5;

/// One-bit-per-pixel frame, row-major, most significant bit first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize * height as usize).div_ceil(8);
        Self {
            width,
            height,
            bits: vec![0; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let (byte, mask) = self.locate(x, y);
        self.bits[byte] & mask != 0
    }

    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (byte, mask) = self.locate(x, y);
        if on {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    pub fn lit_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.get(x, y))
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let index = y as usize * self.width as usize + x as usize;
        (index / 8, 0x80 >> (index % 8))
    }
}

impl OriginDimensions for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PixelBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set(point.x as u32, point.y as u32, color.is_on());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub text: String,
    pub origin: Point,
    pub size: Size,
}

/// Draws the three-line status screen: label, temperature, fan state.
#[derive(Debug, Clone)]
pub struct StatusRenderer {
    width: u32,
    height: u32,
    font: &'static MonoFont<'static>,
}

impl StatusRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            font: &FONT_8X13,
        }
    }

    pub fn layout(&self, temp: Option<f64>, fan_on: bool) -> [TextLine; 3] {
        let style = self.style();
        let texts = [
            "CPU Temp".to_string(),
            temperature_text(temp),
            fan_text(fan_on),
        ];

        let mut y = TOP_OFFSET;
        texts.map(|text| {
            let size = style
                .measure_string(&text, Point::zero(), Baseline::Top)
                .bounding_box
                .size;
            let x = (self.width as i32 - size.width as i32).div_euclid(2);
            let line = TextLine {
                text,
                origin: Point::new(x, y),
                size,
            };
            y += size.height as i32 + LINE_GAP;
            line
        })
    }

    pub fn render(&self, temp: Option<f64>, fan_on: bool) -> PixelBuffer {
        let style = self.style();
        let mut frame = PixelBuffer::new(self.width, self.height);
        for line in self.layout(temp, fan_on) {
            let _ = Text::with_baseline(&line.text, line.origin, style, Baseline::Top)
                .draw(&mut frame);
        }
        frame
    }

    fn style(&self) -> MonoTextStyle<'static, BinaryColor> {
        MonoTextStyle::new(self.font, BinaryColor::On)
    }
}

pub fn temperature_text(temp: Option<f64>) -> String {
    match temp {
        Some(celsius) => format!("{} °C", format_tenths(celsius)),
        None => "N/A".to_string(),
    }
}

pub fn fan_text(on: bool) -> String {
    format!("Fan: {}", fan_payload(on))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn temperature_line_text() {
        assert_eq!(temperature_text(None), "N/A");
        assert_eq!(temperature_text(Some(23.45)), "23.4 °C");
        assert_eq!(temperature_text(Some(0.0)), "0.0 °C");
        assert_eq!(fan_text(true), "Fan: ON");
        assert_eq!(fan_text(false), "Fan: OFF");
    }

    #[test]
    fn lines_are_centered_and_stacked() {
        let renderer = StatusRenderer::new(128, 64);
        let lines = renderer.layout(Some(23.45), false);
        let glyph = FONT_8X13.character_size;

        assert_eq!(lines[0].text, "CPU Temp");
        assert_eq!(lines[0].size, Size::new(glyph.width * 8, glyph.height));
        assert_eq!(lines[0].origin, Point::new(32, TOP_OFFSET));

        assert_eq!(lines[1].text, "23.4 °C");
        let expected_x = (128 - glyph.width as i32 * 7) / 2;
        assert_eq!(
            lines[1].origin,
            Point::new(expected_x, TOP_OFFSET + glyph.height as i32 + LINE_GAP)
        );

        assert_eq!(lines[2].text, "Fan: OFF");
        assert_eq!(
            lines[2].origin.y,
            lines[1].origin.y + lines[1].size.height as i32 + LINE_GAP
        );
    }

    #[test]
    fn absent_temperature_renders_marker() {
        let renderer = StatusRenderer::new(128, 64);
        let lines = renderer.layout(None, true);
        assert_eq!(lines[1].text, "N/A");
        assert_eq!(lines[2].text, "Fan: ON");
    }

    #[test]
    fn render_only_touches_text_boxes() {
        let renderer = StatusRenderer::new(128, 64);
        let frame = renderer.render(Some(41.0), true);
        let lines = renderer.layout(Some(41.0), true);

        assert!(frame.lit_pixels().count() > 0);
        for (x, y) in frame.lit_pixels() {
            let inside = lines.iter().any(|line| {
                let (left, top) = (line.origin.x, line.origin.y);
                let (x, y) = (x as i32, y as i32);
                x >= left
                    && x < left + line.size.width as i32
                    && y >= top
                    && y < top + line.size.height as i32
            });
            assert!(inside, "stray pixel at ({x}, {y})");
        }
    }

    #[test]
    fn render_is_deterministic() {
        let renderer = StatusRenderer::new(128, 64);
        assert_eq!(renderer.render(Some(55.5), false), renderer.render(Some(55.5), false));
        assert_ne!(renderer.render(Some(55.5), false), renderer.render(Some(55.5), true));
    }

    #[test]
    fn pixel_buffer_bounds() {
        let mut frame = PixelBuffer::new(10, 3);
        assert_eq!(frame.as_bytes().len(), 4);
        frame.set(9, 2, true);
        frame.set(10, 0, true);
        assert!(frame.get(9, 2));
        assert!(!frame.get(10, 0));
        assert_eq!(frame.lit_pixels().collect::<Vec<_>>(), vec![(9, 2)]);
        frame.clear();
        assert_eq!(frame.lit_pixels().count(), 0);
    }
}

//! Frame annotation for display.
//!
//! Pure overlay rendering: bounding boxes with labels, the occupancy banner,
//! and the zone outline with its hit count. The input frame is never mutated;
//! each call returns a freshly rendered image, so callers can keep the
//! original for screenshots.
//!
//! Text uses a small built-in 8x12 bitmap font rather than a bundled TTF;
//! overlays need legibility, not typography.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::Frame;
use crate::zone::Zone;

const GLYPH_WIDTH: u32 = 8;
const GLYPH_HEIGHT: u32 = 12;

#[derive(Clone, Debug)]
pub struct Annotator {
    pub box_color: Rgb<u8>,
    pub zone_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub banner_color: Rgb<u8>,
    /// Caption for the occupancy banner.
    pub occupancy_caption: String,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            box_color: Rgb([255, 255, 0]),
            zone_color: Rgb([255, 0, 0]),
            text_color: Rgb([255, 255, 255]),
            banner_color: Rgb([0, 255, 0]),
            occupancy_caption: "People Count".to_string(),
        }
    }
}

impl Annotator {
    /// Render the overlay onto a copy of the frame.
    ///
    /// `zone_hits` is the number of detections inside the zone, as computed by
    /// `Zone::trigger`; the annotator itself is containment-agnostic.
    pub fn annotate(
        &self,
        frame: &Frame,
        detections: &[Detection],
        occupancy: usize,
        zone: &Zone,
        zone_hits: usize,
    ) -> RgbImage {
        let mut img = frame.to_image();

        for detection in detections {
            self.draw_detection(&mut img, detection);
        }

        self.draw_zone(&mut img, zone, zone_hits);

        let banner = format!("{}: {}", self.occupancy_caption, occupancy);
        draw_text(&mut img, &banner, 10, 10, self.banner_color);

        img
    }

    fn draw_detection(&self, img: &mut RgbImage, detection: &Detection) {
        let (w, h) = img.dimensions();
        let x0 = (detection.bbox.x_min.max(0.0) as i32).min(w as i32 - 1);
        let y0 = (detection.bbox.y_min.max(0.0) as i32).min(h as i32 - 1);
        let x1 = (detection.bbox.x_max.max(0.0) as i32).min(w as i32 - 1);
        let y1 = (detection.bbox.y_max.max(0.0) as i32).min(h as i32 - 1);
        let bw = (x1 - x0).max(1) as u32;
        let bh = (y1 - y0).max(1) as u32;

        draw_hollow_rect_mut(img, Rect::at(x0, y0).of_size(bw, bh), self.box_color);

        let label = format!("{} {:.2}", detection.label, detection.confidence);
        let label_y = if y0 as u32 >= GLYPH_HEIGHT + 2 {
            y0 as u32 - GLYPH_HEIGHT - 2
        } else {
            (y1 as u32).saturating_add(2).min(h.saturating_sub(GLYPH_HEIGHT))
        };
        draw_text(img, &label, x0.max(0) as u32, label_y, self.text_color);
    }

    fn draw_zone(&self, img: &mut RgbImage, zone: &Zone, zone_hits: usize) {
        let vertices = zone.vertices();
        for i in 0..vertices.len() {
            let (x0, y0) = vertices[i];
            let (x1, y1) = vertices[(i + 1) % vertices.len()];
            draw_line_segment_mut(
                img,
                (x0 as f32, y0 as f32),
                (x1 as f32, y1 as f32),
                self.zone_color,
            );
        }

        if let Some(&(x, y)) = vertices.first() {
            let caption = format!("Zone: {}", zone_hits);
            let tx = (x.max(0) as u32).saturating_add(4);
            let ty = (y.max(0) as u32).saturating_add(4);
            draw_text(img, &caption, tx, ty, self.zone_color);
        }
    }
}

/// Draw a string with the built-in bitmap font, clipping at image edges.
fn draw_text(img: &mut RgbImage, text: &str, start_x: u32, start_y: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    let mut x = start_x;
    for ch in text.chars() {
        if x + GLYPH_WIDTH > w {
            break;
        }
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                let py = start_y + row as u32;
                if py >= h {
                    break;
                }
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (7 - col)) & 1 == 1 {
                        img.put_pixel(x + col, py, color);
                    }
                }
            }
        }
        x += GLYPH_WIDTH;
    }
}

/// 8x12 glyphs for the characters overlays actually emit. Unknown characters
/// render as a blank advance. Uppercase letters without their own glyph fall
/// back to lowercase.
fn glyph(ch: char) -> Option<[u8; 12]> {
    let rows = match ch {
        ' ' => [0x00; 12],
        '0' => [0x00, 0x3C, 0x42, 0x46, 0x4A, 0x52, 0x62, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '1' => [0x00, 0x08, 0x18, 0x28, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        '2' => [0x00, 0x3C, 0x42, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00],
        '3' => [0x00, 0x3C, 0x42, 0x02, 0x1C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        '4' => [0x00, 0x04, 0x0C, 0x14, 0x24, 0x44, 0x7E, 0x04, 0x04, 0x04, 0x00, 0x00],
        '5' => [0x00, 0x7E, 0x40, 0x40, 0x7C, 0x02, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        '6' => [0x00, 0x3C, 0x42, 0x40, 0x7C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '7' => [0x00, 0x7E, 0x02, 0x04, 0x08, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00],
        '8' => [0x00, 0x3C, 0x42, 0x42, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        '9' => [0x00, 0x3C, 0x42, 0x42, 0x42, 0x3E, 0x02, 0x02, 0x42, 0x3C, 0x00, 0x00],
        ':' => [0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00, 0x00, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7E, 0x00, 0x00],
        'C' => [0x00, 0x3C, 0x42, 0x40, 0x40, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00],
        'P' => [0x00, 0x7C, 0x42, 0x42, 0x42, 0x7C, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00],
        'Z' => [0x00, 0x7E, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x40, 0x7E, 0x00, 0x00],
        'a' => [0x00, 0x00, 0x00, 0x3C, 0x02, 0x3E, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'b' => [0x00, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x62, 0x5C, 0x00, 0x00],
        'c' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x40, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00],
        'd' => [0x00, 0x02, 0x02, 0x3A, 0x46, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'e' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x7E, 0x40, 0x40, 0x42, 0x3C, 0x00, 0x00],
        'f' => [0x00, 0x0C, 0x12, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x10, 0x00, 0x00],
        'g' => [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x3C, 0x00, 0x00],
        'h' => [0x00, 0x40, 0x40, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'i' => [0x00, 0x08, 0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        'j' => [0x00, 0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x44, 0x38, 0x00, 0x00],
        'k' => [0x00, 0x40, 0x40, 0x44, 0x48, 0x70, 0x48, 0x44, 0x42, 0x41, 0x00, 0x00],
        'l' => [0x00, 0x18, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x3E, 0x00, 0x00],
        'm' => [0x00, 0x00, 0x00, 0x76, 0x49, 0x49, 0x49, 0x49, 0x49, 0x49, 0x00, 0x00],
        'n' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x42, 0x42, 0x42, 0x42, 0x00, 0x00],
        'o' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x42, 0x42, 0x42, 0x42, 0x3C, 0x00, 0x00],
        'p' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x42, 0x62, 0x5C, 0x40, 0x40, 0x00, 0x00],
        'q' => [0x00, 0x00, 0x00, 0x3A, 0x46, 0x42, 0x46, 0x3A, 0x02, 0x02, 0x00, 0x00],
        'r' => [0x00, 0x00, 0x00, 0x5C, 0x62, 0x40, 0x40, 0x40, 0x40, 0x40, 0x00, 0x00],
        's' => [0x00, 0x00, 0x00, 0x3C, 0x42, 0x30, 0x0C, 0x02, 0x42, 0x3C, 0x00, 0x00],
        't' => [0x00, 0x10, 0x10, 0x7C, 0x10, 0x10, 0x10, 0x10, 0x12, 0x0C, 0x00, 0x00],
        'u' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x00, 0x00],
        'v' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x24, 0x24, 0x18, 0x18, 0x00, 0x00],
        'w' => [0x00, 0x00, 0x00, 0x49, 0x49, 0x49, 0x49, 0x49, 0x49, 0x36, 0x00, 0x00],
        'x' => [0x00, 0x00, 0x00, 0x42, 0x24, 0x18, 0x18, 0x18, 0x24, 0x42, 0x00, 0x00],
        'y' => [0x00, 0x00, 0x00, 0x42, 0x42, 0x42, 0x46, 0x3A, 0x02, 0x3C, 0x00, 0x00],
        'z' => [0x00, 0x00, 0x00, 0x7E, 0x04, 0x08, 0x10, 0x20, 0x40, 0x7E, 0x00, 0x00],
        other if other.is_ascii_uppercase() => {
            return glyph(other.to_ascii_lowercase());
        }
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::zone::ZoneTemplate;
    use chrono::Utc;

    fn test_frame() -> Frame {
        Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 1, Utc::now()).expect("frame")
    }

    #[test]
    fn annotate_returns_new_image_and_leaves_frame_untouched() {
        let frame = test_frame();
        let zone = Zone::from_template(&ZoneTemplate::left_half(), 64, 48);
        let detections = vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(5.0, 5.0, 20.0, 20.0),
        )];

        let annotator = Annotator::default();
        let img = annotator.annotate(&frame, &detections, 1, &zone, 1);

        assert_eq!(img.dimensions(), (64, 48));
        // The overlay drew something.
        assert!(img.pixels().any(|p| p.0 != [0, 0, 0]));
        // The source frame is still all zeros.
        assert!(frame.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn out_of_bounds_boxes_are_clipped() {
        let frame = test_frame();
        let zone = Zone::from_template(&ZoneTemplate::left_half(), 64, 48);
        let detections = vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(-10.0, -10.0, 500.0, 500.0),
        )];

        // Must not panic on coordinates outside the image.
        let _ = Annotator::default().annotate(&frame, &detections, 1, &zone, 0);
    }
}

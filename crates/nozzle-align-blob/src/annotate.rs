//! Debug overlay drawn on preview frames.

use nozzle_align_core::{DetectedBlob, Frame, FramePixelsMut, Rgb};

/// Fill color per cascade stage, strictest first.
pub const STAGE_COLORS: [Rgb; 5] = [
    Rgb([255, 0, 0]),
    Rgb([0, 255, 0]),
    Rgb([0, 0, 255]),
    Rgb([255, 127, 39]),
    Rgb([127, 255, 39]),
];

pub fn stage_color(stage: usize) -> Rgb {
    STAGE_COLORS[stage % STAGE_COLORS.len()]
}

const FILL_ALPHA: f32 = 0.4;
const CROSS_HALF: i64 = 5;
const MISSING_RADIUS: f64 = 17.0;

/// Copy of `frame` with the detection (or a "searching" marker) and a
/// center crosshair drawn on it.
pub fn annotate_frame(frame: &Frame, blob: Option<&DetectedBlob>, fill: Rgb) -> Frame {
    let mut out = frame.clone();
    let (w, h) = (frame.width() as i64, frame.height() as i64);
    let (fcx, fcy) = (w / 2, h / 2);
    {
        let mut px = out.pixels_mut();
        match blob {
            Some(b) => {
                let (cx, cy) = (b.x.round() as i64, b.y.round() as i64);
                let r = b.radius.round().max(1.0);
                disk(&mut px, cx, cy, r, |px, x, y| px.blend(x, y, fill, FILL_ALPHA));
                ring(&mut px, cx, cy, r, 1.0, Rgb::BLACK);
                hline(&mut px, cx - CROSS_HALF, cx + CROSS_HALF, cy, 2, Rgb::WHITE);
                vline(&mut px, cx, cy - CROSS_HALF, cy + CROSS_HALF, 2, Rgb::WHITE);
            }
            None => {
                ring(&mut px, fcx, fcy, MISSING_RADIUS, 3.0, Rgb::BLACK);
                ring(&mut px, fcx, fcy, MISSING_RADIUS + 1.0, 1.0, Rgb::RED);
            }
        }

        vline(&mut px, fcx, 0, h - 1, 2, Rgb::BLACK);
        hline(&mut px, 0, w - 1, fcy, 2, Rgb::BLACK);
        vline(&mut px, fcx, 0, h - 1, 1, Rgb::WHITE);
        hline(&mut px, 0, w - 1, fcy, 1, Rgb::WHITE);
    }
    out
}

fn disk(
    px: &mut FramePixelsMut<'_>,
    cx: i64,
    cy: i64,
    r: f64,
    mut plot: impl FnMut(&mut FramePixelsMut<'_>, i64, i64),
) {
    let ri = r.ceil() as i64;
    for y in cy - ri..=cy + ri {
        for x in cx - ri..=cx + ri {
            let d2 = ((x - cx) * (x - cx) + (y - cy) * (y - cy)) as f64;
            if d2 <= r * r {
                plot(px, x, y);
            }
        }
    }
}

fn ring(px: &mut FramePixelsMut<'_>, cx: i64, cy: i64, r: f64, thickness: f64, color: Rgb) {
    let half = 0.5 * thickness;
    let ri = (r + half).ceil() as i64;
    for y in cy - ri..=cy + ri {
        for x in cx - ri..=cx + ri {
            let d = (((x - cx) * (x - cx) + (y - cy) * (y - cy)) as f64).sqrt();
            if (d - r).abs() <= half {
                px.put(x, y, color);
            }
        }
    }
}

fn hline(px: &mut FramePixelsMut<'_>, x0: i64, x1: i64, y: i64, thickness: i64, color: Rgb) {
    for dy in -(thickness / 2)..=(thickness - 1) / 2 {
        for x in x0..=x1 {
            px.put(x, y + dy, color);
        }
    }
}

fn vline(px: &mut FramePixelsMut<'_>, x: i64, y0: i64, y1: i64, thickness: i64, color: Rgb) {
    for dx in -(thickness / 2)..=(thickness - 1) / 2 {
        for y in y0..=y1 {
            px.put(x + dx, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_crosshair_and_missing_marker() {
        let frame = Frame::filled(64, 48, Rgb([100, 100, 100]));
        let out = annotate_frame(&frame, None, stage_color(0));
        assert_eq!(out.pixel(32, 0), Rgb::WHITE);
        assert_eq!(out.pixel(31, 10), Rgb::BLACK);
        assert_eq!(out.pixel(0, 24), Rgb::WHITE);
        assert_eq!(out.pixel(32 + 18, 24), Rgb::WHITE);
        assert_eq!(out.pixel(32 + 18, 24 + 1), Rgb::RED);
        assert_eq!(out.pixel(5, 5), Rgb([100, 100, 100]));
    }

    #[test]
    fn blends_fill_over_detection() {
        let frame = Frame::filled(100, 100, Rgb([0, 0, 0]));
        let blob = DetectedBlob::new(20.0, 20.0, 8.0);
        let out = annotate_frame(&frame, Some(&blob), Rgb([250, 0, 0]));
        // 0.4 * 250 inside the disk, away from the cross.
        assert_eq!(out.pixel(24, 24), Rgb([100, 0, 0]));
        assert_eq!(out.pixel(20, 20), Rgb::WHITE);
        assert_eq!(out.pixel(40, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn stage_colors_cycle() {
        assert_eq!(stage_color(1), STAGE_COLORS[1]);
        assert_eq!(stage_color(5), STAGE_COLORS[0]);
    }
}

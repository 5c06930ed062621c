use image::DynamicImage;
use rayon::prelude::*;

use crate::adjustments::{AdjustmentField, Adjustments};

const EPS: f32 = 0.001;

/// Applies white balance (warmth/tint) and global saturation.
pub fn apply(img: DynamicImage, adjustments: &Adjustments) -> DynamicImage {
    let warmth = adjustments.get(AdjustmentField::Warmth);
    let tint = adjustments.get(AdjustmentField::Tint);
    let saturation = adjustments.get(AdjustmentField::Saturation);
    if warmth.abs() < EPS && tint.abs() < EPS && saturation.abs() < EPS {
        return img;
    }

    let mut rgba = img.to_rgba8();
    rgba.par_chunks_mut(4).for_each(|px| {
        let mut r = px[0] as f32 / 255.0;
        let mut g = px[1] as f32 / 255.0;
        let mut b = px[2] as f32 / 255.0;

        // Positive warms (more red, less blue), negative cools.
        if warmth > 0.0 {
            r += (1.0 - r) * warmth * 0.25;
            b *= 1.0 - warmth * 0.25;
        } else if warmth < 0.0 {
            let cool = -warmth;
            b += (1.0 - b) * cool * 0.25;
            r *= 1.0 - cool * 0.25;
        }

        // Positive tint pushes toward magenta, negative toward green.
        if tint > 0.0 {
            g *= 1.0 - tint * 0.2;
        } else if tint < 0.0 {
            g += (1.0 - g) * -tint * 0.2;
        }

        r = r.clamp(0.0, 1.0);
        g = g.clamp(0.0, 1.0);
        b = b.clamp(0.0, 1.0);

        if saturation.abs() > EPS {
            let (h, s, l) = rgb_to_hsl(r, g, b);
            let s = (s * (1.0 + saturation)).clamp(0.0, 1.0);
            (r, g, b) = hsl_to_rgb(h, s, l);
        }

        px[0] = (r * 255.0).round() as u8;
        px[1] = (g * 255.0).round() as u8;
        px[2] = (b * 255.0).round() as u8;
    });

    DynamicImage::ImageRgba8(rgba)
}

fn wrap_unit(mut v: f32) -> f32 {
    while v < 0.0 {
        v += 1.0;
    }
    while v >= 1.0 {
        v -= 1.0;
    }
    v
}

fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g.max(b));
    let min = r.min(g.min(b));
    let l = (max + min) * 0.5;
    let d = max - min;

    if d <= 1e-6 {
        return (0.0, 0.0, l);
    }

    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let mut h = if (max - r).abs() < f32::EPSILON {
        ((g - b) / d) % 6.0
    } else if (max - g).abs() < f32::EPSILON {
        ((b - r) / d) + 2.0
    } else {
        ((r - g) / d) + 4.0
    };
    h /= 6.0;
    h = wrap_unit(h);
    (h, s.clamp(0.0, 1.0), l.clamp(0.0, 1.0))
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s <= 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);
    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    t = wrap_unit(t);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

//! Fuzzy template matching used by automated calibration.
//!
//! Scores are zero-mean normalized cross-correlation in `[-1, 1]`. The search
//! runs on a downscaled copy first and refines the best candidates at full
//! resolution.

use image::imageops::{self, FilterType};
use image::GrayImage;

pub const DEFAULT_CONFIDENCE: f32 = 0.85;

/// Templates are downscaled only while their smaller side stays at least this
/// many pixels.
const MIN_COARSE_SIDE: u32 = 8;
const COARSE_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchHit {
    /// Top-left corner of the match in haystack pixels.
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl MatchHit {
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Locate `needle` inside `haystack`, returning the best hit whose score is
/// at least `confidence`.
pub fn locate(haystack: &GrayImage, needle: &GrayImage, confidence: f32) -> Option<MatchHit> {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if nw == 0 || nh == 0 || nw > hw || nh > hh {
        return None;
    }

    let scale = [4u32, 2]
        .into_iter()
        .find(|s| nw.min(nh) / s >= MIN_COARSE_SIDE)
        .unwrap_or(1);

    let best = if scale == 1 {
        let table = Integral::new(haystack);
        let template = Template::new(needle);
        search(haystack, &table, &template, 0..=hw - nw, 0..=hh - nh, 1)
            .into_iter()
            .next()
    } else {
        let small_hay = imageops::resize(haystack, hw / scale, hh / scale, FilterType::Triangle);
        let small_needle = imageops::resize(needle, nw / scale, nh / scale, FilterType::Triangle);
        let (shw, shh) = small_hay.dimensions();
        let (snw, snh) = small_needle.dimensions();
        if snw > shw || snh > shh {
            return None;
        }
        let coarse = search(
            &small_hay,
            &Integral::new(&small_hay),
            &Template::new(&small_needle),
            0..=shw - snw,
            0..=shh - snh,
            COARSE_CANDIDATES,
        );

        let table = Integral::new(haystack);
        let template = Template::new(needle);
        let radius = scale * 2;
        coarse
            .into_iter()
            .filter_map(|(cx, cy, _)| {
                let x0 = (cx * scale).saturating_sub(radius);
                let y0 = (cy * scale).saturating_sub(radius);
                let x1 = (cx * scale + radius).min(hw - nw);
                let y1 = (cy * scale + radius).min(hh - nh);
                search(haystack, &table, &template, x0..=x1, y0..=y1, 1)
                    .into_iter()
                    .next()
            })
            .max_by(|a, b| a.2.total_cmp(&b.2))
    };

    let (x, y, score) = best?;
    tracing::debug!("best template match at ({x}, {y}) score {score:.3}");
    (score >= confidence).then_some(MatchHit {
        x,
        y,
        width: nw,
        height: nh,
        score,
    })
}

/// Best `keep` positions in the given window, highest score first.
fn search(
    haystack: &GrayImage,
    table: &Integral,
    template: &Template,
    xs: std::ops::RangeInclusive<u32>,
    ys: std::ops::RangeInclusive<u32>,
    keep: usize,
) -> Vec<(u32, u32, f32)> {
    let mut best: Vec<(u32, u32, f32)> = Vec::with_capacity(keep + 1);
    for y in ys {
        for x in xs.clone() {
            let score = template.score_at(haystack, table, x, y);
            if best.len() < keep || best.last().is_some_and(|b| score > b.2) {
                let pos = best.partition_point(|b| b.2 >= score);
                best.insert(pos, (x, y, score));
                best.truncate(keep);
            }
        }
    }
    best
}

struct Template {
    width: u32,
    height: u32,
    /// Pixel values with the template mean removed, row-major.
    centered: Vec<f64>,
    norm: f64,
}

impl Template {
    fn new(img: &GrayImage) -> Self {
        let (width, height) = img.dimensions();
        let n = f64::from(width * height);
        let mean = img.pixels().map(|p| f64::from(p.0[0])).sum::<f64>() / n;
        let centered: Vec<f64> = img.pixels().map(|p| f64::from(p.0[0]) - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum();
        Self {
            width,
            height,
            centered,
            norm,
        }
    }

    fn score_at(&self, haystack: &GrayImage, table: &Integral, x: u32, y: u32) -> f32 {
        let n = f64::from(self.width * self.height);
        let (sum, sum_sq) = table.window(x, y, self.width, self.height);
        let variance = (sum_sq - sum * sum / n).max(0.0);
        let denom = (variance * self.norm).sqrt();
        if denom < 1e-6 {
            return 0.0;
        }
        let mut cross = 0.0;
        for ty in 0..self.height {
            let row = &self.centered[(ty * self.width) as usize..((ty + 1) * self.width) as usize];
            for (tx, t) in row.iter().enumerate() {
                cross += f64::from(haystack.get_pixel(x + tx as u32, y + ty).0[0]) * t;
            }
        }
        (cross / denom) as f32
    }
}

/// Summed-area tables of pixel values and squared pixel values.
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integral {
    fn new(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        let stride = w as usize + 1;
        let mut sum = vec![0.0; stride * (h as usize + 1)];
        let mut sum_sq = sum.clone();
        for y in 0..h as usize {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w as usize {
                let v = f64::from(img.get_pixel(x as u32, y as u32).0[0]);
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |t: &[f64]| {
            t[y1 * self.stride + x1] - t[y0 * self.stride + x1] - t[y1 * self.stride + x0]
                + t[y0 * self.stride + x0]
        };
        (at(&self.sum), at(&self.sum_sq))
    }
}

use nozzle_align_core::{DetectedBlob, GrayImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::contour::{
    chain_length, convex_hull, label_components, median_radius, polygon_area, trace_outer,
};
use crate::params::BlobParams;

/// Blob seen at one threshold.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: f64,
    y: f64,
    radius: f64,
}

/// Multi-threshold blob detector over a gray plane.
#[derive(Clone, Debug, Default)]
pub struct BlobDetector {
    params: BlobParams,
}

impl BlobDetector {
    pub fn new(params: BlobParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BlobParams {
        &self.params
    }

    /// Blobs that recur over the threshold sweep, in discovery order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect(&self, img: &GrayImageView<'_>) -> Vec<DetectedBlob> {
        if img.width == 0 || img.height == 0 {
            return Vec::new();
        }

        let mut groups: Vec<Vec<Candidate>> = Vec::new();
        for t in self.params.thresholds() {
            let found = self.find_at_threshold(img, t);
            merge_into_groups(&mut groups, found, self.params.min_dist_between_blobs as f64);
        }

        let blobs: Vec<DetectedBlob> = groups
            .iter()
            .filter(|g| g.len() >= self.params.min_repeatability.max(1))
            .map(|g| {
                let n = g.len() as f64;
                let x = g.iter().map(|c| c.x).sum::<f64>() / n;
                let y = g.iter().map(|c| c.y).sum::<f64>() / n;
                DetectedBlob::new(x, y, g[g.len() / 2].radius)
            })
            .collect();
        log::trace!("blob search: {} groups, {} blobs", groups.len(), blobs.len());
        blobs
    }

    fn find_at_threshold(&self, img: &GrayImageView<'_>, t: f32) -> Vec<Candidate> {
        let p = &self.params;
        let mut out = Vec::new();
        let polarities: &[bool] = match p.blob_color {
            Some(c) if c > 127 => &[true],
            Some(_) => &[false],
            None => &[false, true],
        };

        for &bright in polarities {
            let is_bright = |v: u8| v as f32 > t;
            let (labels, comps) =
                label_components(img.width, img.height, |i| is_bright(img.data[i]) == bright);

            for comp in &comps {
                // A dark region that reaches the border is part of the
                // surrounding background, not an enclosed blob.
                if !bright && comp.touches_border {
                    continue;
                }
                if let Some(area) = p.area {
                    // Cheap reject before tracing; pixel count bounds the
                    // contour area from above.
                    if (comp.pixels as f32) < area.min {
                        continue;
                    }
                }

                let contour = trace_outer(&labels, img.width, img.height, comp.label, comp.start);
                let area = polygon_area(&contour);
                if area <= 0.0 {
                    continue;
                }
                if let Some(r) = p.area {
                    if !r.contains(area as f32) {
                        continue;
                    }
                }
                if let Some(r) = p.circularity {
                    let perimeter = chain_length(&contour);
                    let circ = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
                    if !r.contains(circ as f32) {
                        continue;
                    }
                }
                if let Some(r) = p.inertia_ratio {
                    if !r.contains(comp.inertia_ratio() as f32) {
                        continue;
                    }
                }
                if let Some(r) = p.convexity {
                    let hull_area = polygon_area(&convex_hull(&contour));
                    if hull_area <= 0.0 || !r.contains((area / hull_area) as f32) {
                        continue;
                    }
                }

                let (cx, cy) = comp.centroid();
                if let Some(color) = p.blob_color {
                    let x = (cx.round() as i64).clamp(0, img.width as i64 - 1) as usize;
                    let y = (cy.round() as i64).clamp(0, img.height as i64 - 1) as usize;
                    let want_bright = color > 127;
                    if is_bright(img.get(x, y)) != want_bright {
                        continue;
                    }
                }

                out.push(Candidate {
                    x: cx,
                    y: cy,
                    radius: median_radius(&contour, (cx, cy)),
                });
            }
        }
        out
    }
}

/// Attach each candidate to the first group whose representative is
/// close enough, or open a new group. Groups stay sorted by radius so the
/// middle element is the median-size observation.
fn merge_into_groups(groups: &mut Vec<Vec<Candidate>>, found: Vec<Candidate>, min_dist: f64) {
    let mut fresh: Vec<Vec<Candidate>> = Vec::new();
    for c in found {
        let mut placed = false;
        for g in groups.iter_mut() {
            let rep = g[g.len() / 2];
            let dist = ((rep.x - c.x).powi(2) + (rep.y - c.y).powi(2)).sqrt();
            if dist < min_dist || dist < rep.radius || dist < c.radius {
                let at = g.partition_point(|o| o.radius <= c.radius);
                g.insert(at, c);
                placed = true;
                break;
            }
        }
        if !placed {
            fresh.push(vec![c]);
        }
    }
    groups.extend(fresh);
}

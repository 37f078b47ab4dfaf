//! Connected components, outer contour tracing and contour geometry.

/// One 8-connected component of a binary mask.
#[derive(Clone, Debug)]
pub(crate) struct Component {
    pub label: u32,
    /// Topmost, then leftmost pixel; the contour trace starts here.
    pub start: (i32, i32),
    pub pixels: usize,
    pub touches_border: bool,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Component {
    fn new(label: u32, start: (i32, i32)) -> Self {
        Self {
            label,
            start,
            pixels: 0,
            touches_border: false,
            sx: 0.0,
            sy: 0.0,
            sxx: 0.0,
            syy: 0.0,
            sxy: 0.0,
        }
    }

    fn add(&mut self, x: i32, y: i32) {
        let (fx, fy) = (x as f64, y as f64);
        self.pixels += 1;
        self.sx += fx;
        self.sy += fy;
        self.sxx += fx * fx;
        self.syy += fy * fy;
        self.sxy += fx * fy;
    }

    pub fn centroid(&self) -> (f64, f64) {
        let n = self.pixels as f64;
        (self.sx / n, self.sy / n)
    }

    /// Ratio of the minor to the major second moment, in `[0, 1]`.
    pub fn inertia_ratio(&self) -> f64 {
        let n = self.pixels as f64;
        let (cx, cy) = self.centroid();
        let mu20 = self.sxx / n - cx * cx;
        let mu02 = self.syy / n - cy * cy;
        let mu11 = self.sxy / n - cx * cy;

        let denom = ((2.0 * mu11).powi(2) + (mu20 - mu02).powi(2)).sqrt();
        if denom <= 1e-2 {
            return 1.0;
        }
        let cos = (mu20 - mu02) / denom;
        let sin = 2.0 * mu11 / denom;
        let imin = 0.5 * (mu20 + mu02) - 0.5 * (mu20 - mu02) * cos - mu11 * sin;
        let imax = 0.5 * (mu20 + mu02) + 0.5 * (mu20 - mu02) * cos + mu11 * sin;
        if imax <= 0.0 {
            return 1.0;
        }
        imin / imax
    }
}

/// Label the 8-connected components whose pixels satisfy `select`.
///
/// Returns the label map (`0` = unlabeled) and the components, labels
/// starting at `1`, in raster order of their first pixel.
pub(crate) fn label_components(
    width: usize,
    height: usize,
    select: impl Fn(usize) -> bool,
) -> (Vec<u32>, Vec<Component>) {
    let mut labels = vec![0u32; width * height];
    let mut comps = Vec::new();
    let mut stack = Vec::new();

    for idx in 0..width * height {
        if labels[idx] != 0 || !select(idx) {
            continue;
        }
        let label = comps.len() as u32 + 1;
        let start = ((idx % width) as i32, (idx / width) as i32);
        let mut comp = Component::new(label, start);

        labels[idx] = label;
        stack.push(idx);
        while let Some(i) = stack.pop() {
            let (x, y) = ((i % width) as i32, (i / width) as i32);
            comp.add(x, y);
            if x == 0 || y == 0 || x as usize == width - 1 || y as usize == height - 1 {
                comp.touches_border = true;
            }
            for (dx, dy) in NEIGHBOURS {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                    continue;
                }
                let j = ny as usize * width + nx as usize;
                if labels[j] == 0 && select(j) {
                    labels[j] = label;
                    stack.push(j);
                }
            }
        }
        comps.push(comp);
    }
    (labels, comps)
}

/// Clockwise (image y axis down): E, SE, S, SW, W, NW, N, NE.
const NEIGHBOURS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Trace the outer boundary of a labeled component (Moore neighbourhood).
///
/// `start` must be the component's topmost-leftmost pixel. The returned
/// chain is closed implicitly (last point connects back to the first).
pub(crate) fn trace_outer(
    labels: &[u32],
    width: usize,
    height: usize,
    label: u32,
    start: (i32, i32),
) -> Vec<(i32, i32)> {
    let inside = |x: i32, y: i32| {
        x >= 0
            && y >= 0
            && (x as usize) < width
            && (y as usize) < height
            && labels[y as usize * width + x as usize] == label
    };

    let mut contour = vec![start];
    let mut cur = start;
    // Pixel west of the start is background by construction.
    let mut back = 4usize;
    let mut first_dir: Option<usize> = None;
    let guard = 4 * width * height + 8;

    for _ in 0..guard {
        let mut step = None;
        for k in 1..=8 {
            let d = (back + k) % 8;
            let (dx, dy) = NEIGHBOURS[d];
            if inside(cur.0 + dx, cur.1 + dy) {
                step = Some(d);
                break;
            }
        }
        let Some(d) = step else {
            // Isolated pixel.
            return contour;
        };

        match first_dir {
            None => first_dir = Some(d),
            Some(fd) if cur == start && d == fd => break,
            _ => {}
        }

        let (dx, dy) = NEIGHBOURS[d];
        cur = (cur.0 + dx, cur.1 + dy);
        contour.push(cur);
        back = if d % 2 == 0 { (d + 6) % 8 } else { (d + 5) % 8 };
    }

    if contour.len() > 1 && contour.last() == Some(&start) {
        contour.pop();
    }
    contour
}

/// Absolute polygon area (shoelace).
pub(crate) fn polygon_area(pts: &[(i32, i32)]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for (i, &(x0, y0)) in pts.iter().enumerate() {
        let (x1, y1) = pts[(i + 1) % pts.len()];
        acc += x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64;
    }
    (acc as f64).abs() * 0.5
}

/// Length of the closed chain: 1 per axis step, sqrt(2) per diagonal.
pub(crate) fn chain_length(pts: &[(i32, i32)]) -> f64 {
    if pts.len() < 2 {
        return 0.0;
    }
    let mut len = 0.0;
    for (i, &(x0, y0)) in pts.iter().enumerate() {
        let (x1, y1) = pts[(i + 1) % pts.len()];
        let (dx, dy) = ((x1 - x0) as f64, (y1 - y0) as f64);
        len += (dx * dx + dy * dy).sqrt();
    }
    len
}

fn cross(o: (i32, i32), a: (i32, i32), b: (i32, i32)) -> i64 {
    (a.0 - o.0) as i64 * (b.1 - o.1) as i64 - (a.1 - o.1) as i64 * (b.0 - o.0) as i64
}

/// Convex hull (monotone chain), counter-clockwise, no collinear points.
pub(crate) fn convex_hull(pts: &[(i32, i32)]) -> Vec<(i32, i32)> {
    let mut p = pts.to_vec();
    p.sort_unstable();
    p.dedup();
    if p.len() < 3 {
        return p;
    }

    let mut hull: Vec<(i32, i32)> = Vec::with_capacity(p.len() * 2);
    for &q in &p {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], q) <= 0 {
            hull.pop();
        }
        hull.push(q);
    }
    let lower = hull.len() + 1;
    for &q in p.iter().rev().skip(1) {
        while hull.len() >= lower && cross(hull[hull.len() - 2], hull[hull.len() - 1], q) <= 0 {
            hull.pop();
        }
        hull.push(q);
    }
    hull.pop();
    hull
}

/// Median distance of the contour points from `center`.
pub(crate) fn median_radius(pts: &[(i32, i32)], center: (f64, f64)) -> f64 {
    if pts.is_empty() {
        return 0.0;
    }
    let mut d: Vec<f64> = pts
        .iter()
        .map(|&(x, y)| ((x as f64 - center.0).powi(2) + (y as f64 - center.1).powi(2)).sqrt())
        .collect();
    d.sort_by(|a, b| a.total_cmp(b));
    let n = d.len();
    0.5 * (d[(n - 1) / 2] + d[n / 2])
}

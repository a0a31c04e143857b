/// Shared principal-component basis over a set of equal-length sample rows.
///
/// Computed once for the whole recording so that projections are comparable
/// across every stage (a per-row basis would make downstream distances
/// meaningless). Fitting uses power iteration with deflation on the
/// mean-centered rows — fully deterministic, no RNG, so repeated runs on
/// identical input produce an identical basis.
#[derive(Debug, Clone)]
pub struct PcaBasis {
    /// Per-dimension mean of the fitted rows.
    pub mean: Vec<f64>,
    /// Unit-norm principal directions, strongest first.
    pub components: Vec<Vec<f64>>,
}

/// Power iteration sweep count per component. Convergence for covariance
/// matrices with any reasonable spectral gap is well inside this bound.
const POWER_ITERATIONS: usize = 100;

impl PcaBasis {
    /// Fit a basis with up to `n_components` directions. The effective
    /// count is capped at `min(n_components, dim, rows)`. An empty input
    /// yields an empty basis (projections are then empty vectors).
    pub fn fit(rows: &[Vec<f64>], n_components: usize) -> Self {
        let n = rows.len();
        if n == 0 {
            return Self {
                mean: Vec::new(),
                components: Vec::new(),
            };
        }
        let dim = rows[0].len();
        let k = n_components.min(dim).min(n);

        let mut mean = vec![0.0; dim];
        for row in rows {
            for (m, &x) in mean.iter_mut().zip(row.iter()) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }

        // Centered working copy; deflated in place after each component.
        let mut centered: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| row.iter().zip(mean.iter()).map(|(x, m)| x - m).collect())
            .collect();

        let mut components = Vec::with_capacity(k);
        for comp_idx in 0..k {
            match dominant_direction(&centered, comp_idx) {
                Some(direction) => {
                    deflate(&mut centered, &direction);
                    components.push(direction);
                }
                // Remaining variance is numerically zero.
                None => break,
            }
        }

        Self { mean, components }
    }

    /// Number of output dimensions per projected row.
    pub fn output_dim(&self) -> usize {
        self.components.len()
    }

    /// Project one row onto the basis: dot products of the centered row
    /// with each principal direction.
    pub fn project(&self, row: &[f64]) -> Vec<f64> {
        debug_assert_eq!(row.len(), self.mean.len(), "row dimensionality mismatch");
        self.components
            .iter()
            .map(|c| {
                row.iter()
                    .zip(self.mean.iter())
                    .zip(c.iter())
                    .map(|((x, m), w)| (x - m) * w)
                    .sum()
            })
            .collect()
    }
}

/// Dominant variance direction of `rows` after mean-centering, or `None`
/// when the variance is numerically zero. Shares the power-iteration
/// machinery of [`PcaBasis::fit`] for callers that only need one axis.
pub fn principal_axis(rows: &[&[f64]]) -> Option<Vec<f64>> {
    if rows.is_empty() {
        return None;
    }
    let dim = rows[0].len();

    let mut mean = vec![0.0; dim];
    for row in rows {
        for (m, &x) in mean.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= rows.len() as f64;
    }

    let centered: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| row.iter().zip(mean.iter()).map(|(x, m)| x - m).collect())
        .collect();
    dominant_direction(&centered, 0)
}

/// Find the dominant variance direction of `centered` by power iteration.
/// Returns `None` when the residual variance is numerically zero.
///
/// The start vector is the row with the largest norm (deterministic), with
/// a basis-axis fallback for degenerate inputs.
fn dominant_direction(centered: &[Vec<f64>], comp_idx: usize) -> Option<Vec<f64>> {
    let dim = centered[0].len();

    let seed = centered
        .iter()
        .max_by(|a, b| {
            norm_sq(a)
                .partial_cmp(&norm_sq(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|row| norm_sq(row) > 1e-24)
        .cloned()
        .unwrap_or_else(|| {
            let mut v = vec![0.0; dim];
            v[comp_idx % dim] = 1.0;
            v
        });

    let mut v = normalized(seed)?;

    for _ in 0..POWER_ITERATIONS {
        // One application of the (implicit) covariance matrix: sum of
        // (x·v) x over all centered rows.
        let mut next = vec![0.0; dim];
        for row in centered {
            let score: f64 = row.iter().zip(v.iter()).map(|(x, w)| x * w).sum();
            for (n, &x) in next.iter_mut().zip(row.iter()) {
                *n += score * x;
            }
        }
        let Some(next) = normalized(next) else {
            return None;
        };
        let delta: f64 = next
            .iter()
            .zip(v.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        v = next;
        if delta < 1e-12 {
            break;
        }
    }

    Some(fix_sign(v))
}

/// Remove the component along `direction` from every row.
fn deflate(centered: &mut [Vec<f64>], direction: &[f64]) {
    for row in centered.iter_mut() {
        let score: f64 = row.iter().zip(direction.iter()).map(|(x, w)| x * w).sum();
        for (x, &w) in row.iter_mut().zip(direction.iter()) {
            *x -= score * w;
        }
    }
}

/// Canonical sign: the entry with the largest magnitude is positive.
/// Power iteration is sign-ambiguous; this pins the output.
fn fix_sign(mut v: Vec<f64>) -> Vec<f64> {
    let lead = v
        .iter()
        .copied()
        .max_by(|a, b| {
            a.abs()
                .partial_cmp(&b.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0.0);
    if lead < 0.0 {
        for x in &mut v {
            *x = -*x;
        }
    }
    v
}

fn norm_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn normalized(mut v: Vec<f64>) -> Option<Vec<f64>> {
    let norm = norm_sq(&v).sqrt();
    if norm <= 1e-12 {
        return None;
    }
    for x in &mut v {
        *x /= norm;
    }
    Some(v)
}

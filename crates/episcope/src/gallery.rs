//! Correlation gallery core: factors, data points, category colors and the
//! pairwise correlation matrix.
//!
//! The gallery owns everything: the X/Y factor lists (insertion-ordered,
//! the order drives the rendered grid), the data point set, the category
//! color manager and the computed matrix. Registration follows an
//! insert-or-error discipline; duplicate or unknown identifiers abort the
//! call instead of silently mutating state.

use std::collections::HashMap;

use crate::error::{EpiscopeError, Result};
use crate::stats::spearman;

/// A palette entry: human-readable name plus RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteColor {
    pub name: &'static str,
    pub rgb: (u8, u8, u8),
}

/// Fixed category palette, assigned in first-seen order.
pub const CATEGORY_PALETTE: [PaletteColor; 6] = [
    PaletteColor { name: "maroon", rgb: (128, 0, 0) },
    PaletteColor { name: "lightseagreen", rgb: (32, 178, 170) },
    PaletteColor { name: "forestgreen", rgb: (34, 139, 34) },
    PaletteColor { name: "darkorange", rgb: (255, 140, 0) },
    PaletteColor { name: "purple", rgb: (128, 0, 128) },
    PaletteColor { name: "saddlebrown", rgb: (139, 69, 19) },
];

/// Attaches a unique, stable color to each categorical label.
#[derive(Debug, Default)]
pub struct ColorCategoryManager {
    assigned: HashMap<String, usize>,
}

impl ColorCategoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a label, assigning the next unused palette color on first
    /// occurrence. Idempotent for already-known labels; exhausting the
    /// palette is a configuration error.
    pub fn register(&mut self, label: &str) -> Result<()> {
        if self.assigned.contains_key(label) {
            return Ok(());
        }
        let next = self.assigned.len();
        if next >= CATEGORY_PALETTE.len() {
            return Err(EpiscopeError::PaletteExhausted(
                label.to_string(),
                CATEGORY_PALETTE.len(),
            ));
        }
        log::info!("color: {} => {}", label, CATEGORY_PALETTE[next].name);
        self.assigned.insert(label.to_string(), next);
        Ok(())
    }

    /// Looks up the color for a registered label. Asking for a label that
    /// was never registered is a contract violation.
    pub fn color(&self, label: &str) -> Result<PaletteColor> {
        self.assigned
            .get(label)
            .map(|&idx| CATEGORY_PALETTE[idx])
            .ok_or_else(|| EpiscopeError::UnregisteredCategory(label.to_string()))
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

/// A correlation coefficient and its p-value. Immutable once constructed.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationValue {
    r: f64,
    p: f64,
}

impl CorrelationValue {
    pub fn new(r: f64, p: f64) -> Self {
        Self { r, p }
    }

    /// Sentinel for cells where the correlation is not well-defined
    /// (fewer than 2 complete-case points, or zero rank variance).
    pub fn degenerate() -> Self {
        Self { r: f64::NAN, p: 1.0 }
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn is_degenerate(&self) -> bool {
        self.r.is_nan()
    }

    /// Maps the p-value onto [0, 1] for visual color coding: 0 at p = 1,
    /// approaching 1 as p shrinks, clamped at 1. p <= 0 (perfect monotonic
    /// relation) maps to 1.0 rather than evaluating log10(0).
    pub fn signif_intensity(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        if self.p <= 0.0 {
            return 1.0;
        }
        let scaled = (-self.p.log10() / 15.0).clamp(0.0, 1.0);
        scaled * scaled
    }
}

/// One axis variable of the gallery. Tracks the observed value range across
/// all data points that supplied a value for it.
#[derive(Debug, Clone)]
pub struct CorrelationFactor {
    id: String,
    name: String,
    range_min: Option<f64>,
    range_max: Option<f64>,
}

impl CorrelationFactor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            range_min: None,
            range_max: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Widens the observed range to include `value`. Missing values are
    /// ignored; the range never shrinks.
    pub fn add_value(&mut self, value: Option<f64>) {
        let Some(v) = value else { return };
        self.range_min = Some(match self.range_min {
            Some(min) => min.min(v),
            None => v,
        });
        self.range_max = Some(match self.range_max {
            Some(max) => max.max(v),
            None => v,
        });
    }

    /// Observed (min, max); both `None` until a value has been seen.
    pub fn range(&self) -> (Option<f64>, Option<f64>) {
        (self.range_min, self.range_max)
    }
}

/// One entity in the correlation analysis: display metadata plus two
/// independent factor-id -> value mappings, one per axis. Either mapping
/// may be partially populated.
#[derive(Debug, Clone)]
pub struct CorrelationDataPoint {
    id: String,
    name: String,
    size_fraction: f64,
    category: String,
    values_x: HashMap<String, f64>,
    values_y: HashMap<String, f64>,
}

impl CorrelationDataPoint {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        size_fraction: f64,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size_fraction,
            category: category.into(),
            values_x: HashMap::new(),
            values_y: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_fraction(&self) -> f64 {
        self.size_fraction
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Overwrite-or-insert; `None` removes any stored value so that
    /// "explicitly missing" and "never set" both read as absent.
    pub fn set_value_x(&mut self, factor_id: &str, value: Option<f64>) {
        match value {
            Some(v) => {
                self.values_x.insert(factor_id.to_string(), v);
            }
            None => {
                self.values_x.remove(factor_id);
            }
        }
    }

    pub fn set_value_y(&mut self, factor_id: &str, value: Option<f64>) {
        match value {
            Some(v) => {
                self.values_y.insert(factor_id.to_string(), v);
            }
            None => {
                self.values_y.remove(factor_id);
            }
        }
    }

    pub fn value_x(&self, factor_id: &str) -> Option<f64> {
        self.values_x.get(factor_id).copied()
    }

    pub fn value_y(&self, factor_id: &str) -> Option<f64> {
        self.values_y.get(factor_id).copied()
    }
}

/// One plotted point of a cell's complete-case series.
#[derive(Debug, Clone)]
pub struct CellPoint {
    pub x: f64,
    pub y: f64,
    pub size_fraction: f64,
    pub label: String,
    pub rgb: (u8, u8, u8),
}

/// The complete-case series of one (X factor, Y factor) cell.
#[derive(Debug, Clone, Default)]
pub struct CellSeries {
    pub points: Vec<CellPoint>,
}

impl CellSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn split_xy(&self) -> (Vec<f64>, Vec<f64>) {
        let xs = self.points.iter().map(|p| p.x).collect();
        let ys = self.points.iter().map(|p| p.y).collect();
        (xs, ys)
    }
}

/// Organizes factors and data points into an X x Y cross table and computes
/// a Spearman correlation per cell using pairwise-complete cases.
#[derive(Debug, Default)]
pub struct CorrelationGallery {
    factors_x: Vec<CorrelationFactor>,
    factors_x_idx: HashMap<String, usize>,
    factors_y: Vec<CorrelationFactor>,
    factors_y_idx: HashMap<String, usize>,
    points: Vec<CorrelationDataPoint>,
    points_idx: HashMap<String, usize>,
    colors: ColorCategoryManager,
    // Rows indexed by X factor, columns by Y factor
    matrix: Option<Vec<Vec<CorrelationValue>>>,
}

impl CorrelationGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an X-axis factor. Insertion order drives the grid layout.
    pub fn add_factor_x(&mut self, factor: CorrelationFactor) -> Result<()> {
        if self.factors_x_idx.contains_key(factor.id()) {
            return Err(EpiscopeError::duplicate_factor('x', factor.id()));
        }
        self.factors_x_idx
            .insert(factor.id().to_string(), self.factors_x.len());
        self.factors_x.push(factor);
        Ok(())
    }

    /// Registers a Y-axis factor.
    pub fn add_factor_y(&mut self, factor: CorrelationFactor) -> Result<()> {
        if self.factors_y_idx.contains_key(factor.id()) {
            return Err(EpiscopeError::duplicate_factor('y', factor.id()));
        }
        self.factors_y_idx
            .insert(factor.id().to_string(), self.factors_y.len());
        self.factors_y.push(factor);
        Ok(())
    }

    /// Registers a data point and its category label (which receives a
    /// palette color on first occurrence).
    pub fn add_data_point(
        &mut self,
        id: &str,
        name: &str,
        size_fraction: f64,
        category: &str,
    ) -> Result<()> {
        if self.points_idx.contains_key(id) {
            return Err(EpiscopeError::DuplicateDataPoint(id.to_string()));
        }
        self.colors.register(category)?;
        self.points_idx.insert(id.to_string(), self.points.len());
        self.points
            .push(CorrelationDataPoint::new(id, name, size_fraction, category));
        Ok(())
    }

    /// Sets a data point's value for an X factor and feeds the factor's
    /// observed range. Unknown point or factor ids are contract violations.
    pub fn set_value_x(&mut self, point_id: &str, factor_id: &str, value: Option<f64>) -> Result<()> {
        let &pt = self
            .points_idx
            .get(point_id)
            .ok_or_else(|| EpiscopeError::UnknownDataPoint(point_id.to_string()))?;
        let &fx = self
            .factors_x_idx
            .get(factor_id)
            .ok_or_else(|| EpiscopeError::unknown_factor('x', factor_id))?;
        self.points[pt].set_value_x(factor_id, value);
        self.factors_x[fx].add_value(value);
        Ok(())
    }

    /// Sets a data point's value for a Y factor.
    pub fn set_value_y(&mut self, point_id: &str, factor_id: &str, value: Option<f64>) -> Result<()> {
        let &pt = self
            .points_idx
            .get(point_id)
            .ok_or_else(|| EpiscopeError::UnknownDataPoint(point_id.to_string()))?;
        let &fy = self
            .factors_y_idx
            .get(factor_id)
            .ok_or_else(|| EpiscopeError::unknown_factor('y', factor_id))?;
        self.points[pt].set_value_y(factor_id, value);
        self.factors_y[fy].add_value(value);
        Ok(())
    }

    pub fn factors_x(&self) -> &[CorrelationFactor] {
        &self.factors_x
    }

    pub fn factors_y(&self) -> &[CorrelationFactor] {
        &self.factors_y
    }

    pub fn data_points(&self) -> &[CorrelationDataPoint] {
        &self.points
    }

    pub fn colors(&self) -> &ColorCategoryManager {
        &self.colors
    }

    pub fn has_correlations(&self) -> bool {
        self.matrix.is_some()
    }

    /// The correlation of cell (ix, iy), if computed.
    pub fn correlation(&self, ix: usize, iy: usize) -> Option<&CorrelationValue> {
        self.matrix.as_ref().and_then(|m| m.get(ix)?.get(iy))
    }

    /// Builds the complete-case series for one cell: only data points with
    /// values on BOTH factors contribute (pairwise, not listwise).
    pub fn complete_series(
        &self,
        factor_x: &CorrelationFactor,
        factor_y: &CorrelationFactor,
    ) -> Result<CellSeries> {
        let mut series = CellSeries::default();
        for pt in &self.points {
            let (Some(x), Some(y)) = (pt.value_x(factor_x.id()), pt.value_y(factor_y.id())) else {
                continue;
            };
            let color = self.colors.color(pt.category())?;
            series.points.push(CellPoint {
                x,
                y,
                size_fraction: pt.size_fraction(),
                label: pt.name().to_string(),
                rgb: color.rgb,
            });
        }
        Ok(series)
    }

    /// Computes one Spearman correlation per (X, Y) factor pair, replacing
    /// any previous matrix wholesale. Cells with fewer than 2 complete-case
    /// points get the degenerate sentinel.
    pub fn compute_correlations(&mut self) -> Result<()> {
        let mut matrix = Vec::with_capacity(self.factors_x.len());
        for fac_x in &self.factors_x {
            let mut row = Vec::with_capacity(self.factors_y.len());
            for fac_y in &self.factors_y {
                let series = self.complete_series(fac_x, fac_y)?;
                let (xs, ys) = series.split_xy();
                let (r, p) = spearman(&xs, &ys);
                let cell = if r.is_nan() {
                    CorrelationValue::degenerate()
                } else {
                    CorrelationValue::new(r, p)
                };
                row.push(cell);
            }
            matrix.push(row);
        }
        self.matrix = Some(matrix);
        Ok(())
    }

    /// Stably reorders the X factors by ascending p-value against the given
    /// Y factor, permuting matrix rows in lockstep so cell (i, j) always
    /// refers to (factors_x[i], factors_y[j]). Requires a computed matrix.
    pub fn sort_factors_x_by_significance(&mut self, y_factor_id: &str) -> Result<()> {
        let matrix = self
            .matrix
            .take()
            .ok_or(EpiscopeError::CorrelationsNotComputed)?;
        let iy = match self.factors_y_idx.get(y_factor_id) {
            Some(&iy) => iy,
            None => {
                // Put the matrix back before failing
                self.matrix = Some(matrix);
                return Err(EpiscopeError::unknown_factor('y', y_factor_id));
            }
        };

        let mut staging: Vec<(CorrelationFactor, Vec<CorrelationValue>)> =
            self.factors_x.drain(..).zip(matrix).collect();
        staging.sort_by(|a, b| {
            a.1[iy]
                .p()
                .partial_cmp(&b.1[iy].p())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut matrix = Vec::with_capacity(staging.len());
        self.factors_x_idx.clear();
        for (factor, row) in staging {
            self.factors_x_idx
                .insert(factor.id().to_string(), self.factors_x.len());
            self.factors_x.push(factor);
            matrix.push(row);
        }
        self.matrix = Some(matrix);
        Ok(())
    }
}

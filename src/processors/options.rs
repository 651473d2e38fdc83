//! Processing options and tunable thresholds.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::PageSelection;

/// Every numeric constant used by the processing passes.
///
/// The defaults reproduce the reference behaviour; override individual
/// values through the `with_*` builders or by deserializing from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum run-to-line merge probability
    pub line_merge: f64,
    /// Minimum probability for two blocks to form one paragraph
    pub different_lines: f64,
    /// Minimum heading probability
    pub heading: f64,
    /// Bonus added to the heading probability of bulleted nodes
    pub bulleted_heading_bonus: f64,
    /// Minimum caption probability
    pub caption: f64,
    /// Minimum leading probability for a list continuation line
    pub list_item: f64,
    /// Maximum baseline step ratio for list continuation lines
    pub list_baseline_ratio: f64,
    /// Horizontal list tolerance as a fraction of the font size
    pub list_x_interval_ratio: f64,
    /// Maximum line-art bullet height relative to the line height
    pub line_art_label_epsilon: f64,
    /// Gap (relative to font size) above which a space is inserted
    pub space_ratio: f64,
    /// Baseline tolerance (relative to run height) for the table pre-filter
    pub suspicious_baseline_epsilon: f64,
    /// Horizontal gap (relative to run height) for the table pre-filter
    pub suspicious_gap_multiplier: f64,
    /// Intersection above which a cluster grid duplicates a border
    pub table_dedup_intersection: f64,
    /// Relative width tolerance for linking neighbour tables
    pub neighbour_table_tolerance: f64,
    /// Cell coverage above which line art is cell decoration
    pub line_art_cell_percent: f64,
    /// Same-line tolerance of the reading-order sort (points)
    pub reading_order_tolerance: f64,
    /// Aspect ratio below which an image is ignored as a figure
    pub subtle_image_ratio: f64,
    /// Text-to-background contrast below which a run is hidden text
    pub min_contrast_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            line_merge: 0.75,
            different_lines: 0.75,
            heading: 0.75,
            bulleted_heading_bonus: 0.1,
            caption: 0.75,
            list_item: 0.7,
            list_baseline_ratio: 1.2,
            list_x_interval_ratio: 0.3,
            line_art_label_epsilon: 1.2,
            space_ratio: 0.17,
            suspicious_baseline_epsilon: 0.1,
            suspicious_gap_multiplier: 3.0,
            table_dedup_intersection: 0.01,
            neighbour_table_tolerance: 0.2,
            line_art_cell_percent: 0.9,
            reading_order_tolerance: 5.0,
            subtle_image_ratio: 0.01,
            min_contrast_ratio: 1.2,
        }
    }
}

impl Thresholds {
    /// Create thresholds with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading probability threshold.
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = heading;
        self
    }

    /// Set the caption probability threshold.
    pub fn with_caption(mut self, caption: f64) -> Self {
        self.caption = caption;
        self
    }

    /// Set the line merge threshold.
    pub fn with_line_merge(mut self, line_merge: f64) -> Self {
        self.line_merge = line_merge;
        self
    }

    /// Set the reading-order same-line tolerance.
    pub fn with_reading_order_tolerance(mut self, tolerance: f64) -> Self {
        self.reading_order_tolerance = tolerance;
        self
    }

    /// Horizontal list tolerance for a given font size.
    pub fn max_x_gap(&self, font_size: f64) -> f64 {
        font_size * self.list_x_interval_ratio
    }

    /// Reject probabilities outside `[0, 1]` and negative multipliers.
    pub fn validate(&self) -> Result<()> {
        let probabilities = [
            ("line_merge", self.line_merge),
            ("different_lines", self.different_lines),
            ("heading", self.heading),
            ("bulleted_heading_bonus", self.bulleted_heading_bonus),
            ("caption", self.caption),
            ("list_item", self.list_item),
            ("table_dedup_intersection", self.table_dedup_intersection),
            ("line_art_cell_percent", self.line_art_cell_percent),
            ("subtle_image_ratio", self.subtle_image_ratio),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        let multipliers = [
            ("list_baseline_ratio", self.list_baseline_ratio),
            ("list_x_interval_ratio", self.list_x_interval_ratio),
            ("line_art_label_epsilon", self.line_art_label_epsilon),
            ("space_ratio", self.space_ratio),
            ("suspicious_baseline_epsilon", self.suspicious_baseline_epsilon),
            ("suspicious_gap_multiplier", self.suspicious_gap_multiplier),
            ("neighbour_table_tolerance", self.neighbour_table_tolerance),
            ("reading_order_tolerance", self.reading_order_tolerance),
            ("min_contrast_ratio", self.min_contrast_ratio),
        ];
        for (name, value) in multipliers {
            if !(value >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Options for the local processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    /// Page selection (which pages to process)
    pub pages: PageSelection,

    /// Whether to use parallel processing
    pub parallel: bool,

    /// Whether to propose borderless tables on suspicious pages
    pub cluster_tables: bool,

    /// Whether to drop hidden text before processing
    pub drop_hidden_text: bool,

    /// Whether to drop primitives lying entirely outside the page
    pub filter_out_of_page: bool,

    /// Whether to drop page-sized line art backgrounds
    pub remove_backgrounds: bool,

    /// Numeric thresholds of the passes
    pub thresholds: Thresholds,
}

impl ProcessOptions {
    /// Create new process options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Enable or disable cluster table detection.
    pub fn with_cluster_tables(mut self, enabled: bool) -> Self {
        self.cluster_tables = enabled;
        self
    }

    /// Enable or disable hidden text removal.
    pub fn with_drop_hidden_text(mut self, drop: bool) -> Self {
        self.drop_hidden_text = drop;
        self
    }

    /// Replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()
    }
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            pages: PageSelection::All,
            parallel: true,
            cluster_tables: true,
            drop_hidden_text: true,
            filter_out_of_page: true,
            remove_backgrounds: true,
            thresholds: Thresholds::default(),
        }
    }
}

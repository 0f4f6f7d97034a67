/// Trailing margin, in pixels, at which the next page is requested.
pub const DEFAULT_LOAD_MORE_THRESHOLD_PX: f64 = 200.0;

/// Scroll position of the results container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub viewport_height: f64,
    pub scroll_top: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn new(viewport_height: f64, scroll_top: f64, scroll_height: f64) -> Self {
        Self {
            viewport_height,
            scroll_top,
            scroll_height,
        }
    }

    /// Metrics of a container scrolled all the way down.
    pub fn at_end(scroll_height: f64) -> Self {
        Self::new(scroll_height, 0.0, scroll_height)
    }

    /// Whether the bottom of the viewport is within `threshold` of the end.
    pub fn near_end(&self, threshold: f64) -> bool {
        self.viewport_height + self.scroll_top > self.scroll_height - threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crosses_trailing_margin() {
        let threshold = DEFAULT_LOAD_MORE_THRESHOLD_PX;
        assert!(!ScrollMetrics::new(300.0, 0.0, 1000.0).near_end(threshold));
        assert!(!ScrollMetrics::new(300.0, 500.0, 1000.0).near_end(threshold));
        assert!(ScrollMetrics::new(300.0, 501.0, 1000.0).near_end(threshold));
        assert!(ScrollMetrics::at_end(50.0).near_end(threshold));
    }
}

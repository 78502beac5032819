//! Track geometry: stop positions and segment bands along the slider track.

pub const DEFAULT_HANDLE_SIZE: f64 = 30.0;
pub const DEFAULT_STOP_COUNT: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub width: f64,
    pub handle_size: f64,
    stops: Vec<f64>,
}

impl Track {
    pub fn new(width: f64, handle_size: f64, stop_count: usize) -> Self {
        let width = if width.is_finite() { width.max(0.0) } else { 0.0 };
        Self {
            width,
            handle_size,
            stops: compute_stops(width, handle_size, stop_count),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && !self.stops.is_empty()
    }

    pub fn stops(&self) -> &[f64] {
        &self.stops
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Interval the head is clamped to while dragging.
    pub fn bounds(&self) -> (f64, f64) {
        let half = self.handle_size / 2.0;
        let lo = half.min(self.width / 2.0);
        let hi = (self.width - half).max(lo);
        (lo, hi)
    }

    pub fn clamp(&self, x: f64) -> f64 {
        let (lo, hi) = self.bounds();
        x.clamp(lo, hi)
    }

    /// Index of the stop closest to `x`; the lower index wins a tie.
    pub fn closest_stop(&self, x: f64) -> Option<usize> {
        if !self.is_valid() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (i, s) in self.stops.iter().enumerate() {
            let d = (s - x).abs();
            match best {
                Some((_, bd)) if d >= bd => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Nearest stop within `tolerance` pixels of `x`.
    pub fn stop_at(&self, x: f64, tolerance: f64) -> Option<usize> {
        let i = self.closest_stop(x)?;
        ((self.stops[i] - x).abs() < tolerance).then_some(i)
    }

    pub fn resting_stop(&self) -> Option<usize> {
        (!self.stops.is_empty()).then(|| self.stops.len() / 2)
    }

    pub fn resting_position(&self) -> Option<f64> {
        self.resting_stop().map(|i| self.stops[i])
    }

    /// Name of the band under `x` when the width is split evenly across `names`.
    pub fn segment_at<'a>(&self, x: f64, names: &'a [String]) -> Option<&'a str> {
        if names.is_empty() || self.width <= 0.0 {
            return None;
        }
        let band = self.width / names.len() as f64;
        let idx = ((x / band).floor().max(0.0) as usize).min(names.len() - 1);
        Some(names[idx].as_str())
    }
}

pub fn compute_stops(width: f64, handle_size: f64, stop_count: usize) -> Vec<f64> {
    if stop_count == 0 {
        return Vec::new();
    }
    let usable = (width - handle_size).max(0.0);
    if usable == 0.0 {
        return vec![(width / 2.0).max(0.0); stop_count];
    }
    if stop_count == 1 {
        return vec![width / 2.0];
    }
    let pitch = usable / (stop_count - 1) as f64;
    (0..stop_count)
        .map(|i| pitch * i as f64 + handle_size / 2.0)
        .collect()
}

pub fn default_segments() -> Vec<String> {
    ["rot", "orange", "gelb", "gruen", "tuerkis", "blau", "lila"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track::new(630.0, DEFAULT_HANDLE_SIZE, DEFAULT_STOP_COUNT)
    }

    #[test]
    fn stops_for_reference_width() {
        assert_eq!(
            track().stops(),
            &[15.0, 115.0, 215.0, 315.0, 415.0, 515.0, 615.0]
        );
    }

    #[test]
    fn stops_are_non_decreasing_and_pinned_to_ends() {
        for w in [31.0, 77.0, 200.5, 630.0, 1921.0] {
            let t = Track::new(w, 30.0, 7);
            let s = t.stops();
            assert_eq!(s.len(), 7);
            assert!(s.windows(2).all(|p| p[0] <= p[1]));
            assert!((s[0] - 15.0).abs() < 1e-9);
            assert!((s[6] - (w - 15.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn degenerate_widths_do_not_produce_nan() {
        let t = Track::new(20.0, 30.0, 7);
        assert!(t.stops().iter().all(|s| *s == 10.0));
        let single = Track::new(400.0, 30.0, 1);
        assert_eq!(single.stops(), &[200.0]);
        let zero = Track::new(0.0, 30.0, 7);
        assert!(!zero.is_valid());
        assert_eq!(zero.closest_stop(12.0), None);
        assert!(zero.stops().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn closest_stop_prefers_lower_index_on_tie() {
        let t = track();
        assert_eq!(t.closest_stop(301.0), Some(3));
        assert_eq!(t.closest_stop(65.0), Some(0));
        assert_eq!(t.closest_stop(-40.0), Some(0));
        assert_eq!(t.closest_stop(9999.0), Some(6));
    }

    #[test]
    fn stop_at_respects_tolerance() {
        let t = track();
        assert_eq!(t.stop_at(315.4, 1.0), Some(3));
        assert_eq!(t.stop_at(316.5, 1.0), None);
    }

    #[test]
    fn bounds_and_resting_position() {
        let t = track();
        assert_eq!(t.bounds(), (15.0, 615.0));
        assert_eq!(t.clamp(2.0), 15.0);
        assert_eq!(t.resting_position(), Some(315.0));
    }

    #[test]
    fn segment_bands_cover_width() {
        let t = track();
        let names = default_segments();
        assert_eq!(t.segment_at(0.0, &names), Some("rot"));
        assert_eq!(t.segment_at(95.0, &names), Some("orange"));
        assert_eq!(t.segment_at(629.9, &names), Some("lila"));
        assert_eq!(t.segment_at(700.0, &names), Some("lila"));
    }
}

//! Ratchet rule for long stops: a stop may tighten (rise), never loosen.
//!
//! Trailing policies hold no mutable state, so the ratchet is applied as a
//! fold over candidate levels instead of a stored high-water mark. Because the
//! peak price only rises, a trail computed from it can only rise as well; the
//! ratchet additionally keeps an initial protective stop from being dropped
//! below when the trail is still under it.

/// Combine a current stop with a proposed one, keeping the tighter (higher).
///
/// `None` means "no stop yet"; the proposal then becomes the level.
pub fn ratchet_long(current: Option<f64>, proposed: f64) -> f64 {
    match current {
        Some(level) => level.max(proposed),
        None => proposed,
    }
}

/// Fold a sequence of candidate stops into the tightest one.
pub fn tightest<I>(candidates: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    candidates
        .into_iter()
        .fold(None, |acc, level| Some(ratchet_long(acc, level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightening_allowed() {
        assert_eq!(ratchet_long(Some(95.0), 100.0), 100.0);
    }

    #[test]
    fn loosening_blocked() {
        // Wider proposal (e.g. after a volatility spike) keeps the old stop.
        assert_eq!(ratchet_long(Some(100.0), 90.0), 100.0);
    }

    #[test]
    fn first_level_initializes() {
        assert_eq!(ratchet_long(None, 95.0), 95.0);
    }

    #[test]
    fn tightest_of_candidates() {
        assert_eq!(tightest([90.0, 97.5, 95.0]), Some(97.5));
        assert_eq!(tightest(std::iter::empty::<f64>()), None);
    }
}

//! Quality boost: re-weights a per-source score by a monotone function of
//! the chunk's parent document's OCR quality score, applied within each
//! source list before fusion so the penalty isn't counted twice.

const MIN_MULTIPLIER: f64 = 0.8;
const MAX_MULTIPLIER: f64 = 1.0;

/// Linear ramp from `MIN_MULTIPLIER` at quality 0.0 to `MAX_MULTIPLIER` at
/// quality 1.0. Missing quality data (no OCR quality score) applies no
/// boost at all.
pub fn boost(score: f64, ocr_quality_score: Option<f64>) -> f64 {
    let Some(quality) = ocr_quality_score else {
        return score;
    };
    let quality = quality.clamp(0.0, 1.0);
    let multiplier = MIN_MULTIPLIER + (MAX_MULTIPLIER - MIN_MULTIPLIER) * quality;
    score * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_quality_applies_no_discount() {
        assert!((boost(1.0, Some(1.0)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lowest_quality_applies_point_eight() {
        assert!((boost(1.0, Some(0.0)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_missing_quality_is_unboosted() {
        assert_eq!(boost(0.5, None), 0.5);
    }

    #[test]
    fn test_boost_is_monotone_in_quality() {
        let low = boost(1.0, Some(0.2));
        let high = boost(1.0, Some(0.8));
        assert!(high > low);
    }
}

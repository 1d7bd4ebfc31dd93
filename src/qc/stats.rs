//! Summary statistics over match percentages.

/// Fixed distribution buckets: `[0,20) [20,40) [40,60) [60,80) [80,100]`.
pub const BUCKET_LABELS: [&str; 5] = ["0-20", "20-40", "40-60", "60-80", "80-100"];

/// Bucket index of a match percentage. 100 lands in the last bucket.
pub fn bucket_index(percentage: u8) -> usize {
    ((percentage / 20) as usize).min(BUCKET_LABELS.len() - 1)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median via a full sort; even-length input averages the two central values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[20.0, 40.0, 60.0]), 40.0);
        assert_eq!(median(&[20.0, 40.0]), 30.0);
        assert_eq!(median(&[60.0, 20.0, 40.0]), 40.0);
        assert_eq!(median(&[7.0]), 7.0);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[20.0, 40.0, 60.0]), 40.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(BUCKET_LABELS[bucket_index(0)], "0-20");
        assert_eq!(BUCKET_LABELS[bucket_index(19)], "0-20");
        assert_eq!(BUCKET_LABELS[bucket_index(20)], "20-40");
        assert_eq!(BUCKET_LABELS[bucket_index(79)], "60-80");
        assert_eq!(BUCKET_LABELS[bucket_index(80)], "80-100");
        assert_eq!(BUCKET_LABELS[bucket_index(100)], "80-100");
    }
}

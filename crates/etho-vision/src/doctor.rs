use anyhow::Result;

pub fn check_filter(max_animals_per_cell: usize) -> Result<()> {
    anyhow::ensure!(max_animals_per_cell >= 1, "filter.max_animals_per_cell must be >= 1");
    Ok(())
}

pub fn check_tracking(frame_sample_rate: u64, time_gap_seconds: f64, max_distance_fraction: f64) -> Result<()> {
    anyhow::ensure!(frame_sample_rate >= 1, "tracking.frame_sample_rate must be >= 1");
    anyhow::ensure!(
        time_gap_seconds.is_finite() && time_gap_seconds >= 0.0,
        "tracking.time_gap_seconds must be >= 0"
    );
    anyhow::ensure!(
        max_distance_fraction.is_finite() && max_distance_fraction > 0.0,
        "tracking.max_distance_fraction must be > 0"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_needs_at_least_one_slot() {
        check_filter(1).unwrap();
        assert!(check_filter(0).is_err());
    }

    #[test]
    fn tracking_limits() {
        check_tracking(30, 1.0, 0.3).unwrap();
        assert!(check_tracking(0, 1.0, 0.3).is_err());
        assert!(check_tracking(1, -1.0, 0.3).is_err());
        assert!(check_tracking(1, 1.0, 0.0).is_err());
    }
}

// =============================================================================
// Volume averages
// =============================================================================

/// Arithmetic mean of `volumes` over the whole window, current point included.
///
/// `None` for an empty slice or a non-finite result.
pub fn average_volume(volumes: &[f64]) -> Option<f64> {
    if volumes.is_empty() {
        return None;
    }
    let avg = volumes.iter().sum::<f64>() / volumes.len() as f64;
    avg.is_finite().then_some(avg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_includes_current_point() {
        assert_eq!(average_volume(&[1.0, 2.0, 3.0, 6.0]), Some(3.0));
    }

    #[test]
    fn average_empty_is_none() {
        assert_eq!(average_volume(&[]), None);
    }
}

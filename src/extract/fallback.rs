/// Offsets `-1, +1, -2, +2, …, -R, +R` visited around a failed base frame.
///
/// Finite and restartable: `clone()` or build a new one to walk it again.
#[derive(Clone, Debug)]
pub struct FallbackOffsets {
    radius: u64,
    distance: u64,
    before: bool,
}

impl FallbackOffsets {
    pub fn new(radius: u64) -> Self {
        Self {
            radius,
            distance: 1,
            before: true,
        }
    }
}

impl Iterator for FallbackOffsets {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.distance > self.radius {
            return None;
        }

        let offset = self.distance as i64;
        if self.before {
            self.before = false;
            Some(-offset)
        } else {
            self.before = true;
            self.distance += 1;
            Some(offset)
        }
    }
}

/// Neighbour frame indices of `base` in search order, restricted to `[0, total)`.
pub fn fallback_candidates(base: u64, radius: u64, total: u64) -> impl Iterator<Item = u64> {
    FallbackOffsets::new(radius).filter_map(move |offset| {
        let index = base.checked_add_signed(offset)?;
        (index < total).then_some(index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_alternate_before_after() {
        let offsets: Vec<i64> = FallbackOffsets::new(3).collect();
        assert_eq!(offsets, vec![-1, 1, -2, 2, -3, 3]);
    }

    #[test]
    fn test_zero_radius_is_empty() {
        assert_eq!(FallbackOffsets::new(0).count(), 0);
    }

    #[test]
    fn test_restartable() {
        let offsets = FallbackOffsets::new(2);
        let first: Vec<i64> = offsets.clone().collect();
        let second: Vec<i64> = offsets.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_candidates_clipped_at_start() {
        let candidates: Vec<u64> = fallback_candidates(1, 3, 100).collect();
        assert_eq!(candidates, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_candidates_clipped_at_end() {
        let candidates: Vec<u64> = fallback_candidates(98, 3, 100).collect();
        assert_eq!(candidates, vec![97, 99, 96, 95]);
    }
}

//! Identifier allocation

use crate::chest::ChestId;

/// Returns the smallest positive id not present in `in_use`.
///
/// Non-positive values are ignored. Freed ids are handed out again before
/// the range grows, so the id space stays dense and small enough to double
/// as a display value.
pub fn next_id<I>(in_use: I) -> ChestId
where
    I: IntoIterator<Item = ChestId>,
{
    let mut ids: Vec<ChestId> = in_use.into_iter().filter(|id| *id > 0).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut current = 1;
    for id in ids {
        if id == current {
            current += 1;
        } else {
            break;
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_starts_at_one() {
        assert_eq!(next_id([]), 1);
    }

    #[test]
    fn test_dense_set_grows() {
        assert_eq!(next_id([1, 2, 3]), 4);
    }

    #[test]
    fn test_gap_at_front_is_reused() {
        assert_eq!(next_id([2, 3]), 1);
    }

    #[test]
    fn test_inner_gap_is_reused() {
        assert_eq!(next_id([1, 3]), 2);
    }

    #[test]
    fn test_non_positive_values_are_ignored() {
        assert_eq!(next_id([-5, 0, 1, 2]), 3);
        assert_eq!(next_id([-1]), 1);
    }

    #[test]
    fn test_unsorted_input() {
        assert_eq!(next_id([4, 1, 2]), 3);
    }
}

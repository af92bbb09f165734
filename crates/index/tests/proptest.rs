//! Property-based tests for tabula-index using proptest.

use proptest::prelude::*;
use tabula_index::{search, KeyChange, KeyCollection};

fn collection(secondary: &[i32]) -> KeyCollection<i32, u32> {
    let mut keys = KeyCollection::with_capacity("prop.keys", secondary.len());
    for (i, &s) in secondary.iter().enumerate() {
        keys.push_unsorted((s, i as u32));
    }
    keys.sort();
    keys
}

proptest! {
    /// Lower and upper bound delimit exactly the run of equal elements.
    #[test]
    fn bounds_delimit_equal_runs(mut values in prop::collection::vec(0i32..100, 0..200), probe in 0i32..100) {
        values.sort_unstable();
        let lo = search::lower_bound(&values, |x| x.cmp(&probe));
        let hi = search::upper_bound(&values, |x| x.cmp(&probe));
        let expected_lo = values.iter().position(|&x| x == probe);
        let expected_hi = values.iter().rposition(|&x| x == probe);
        prop_assert_eq!(lo, expected_lo);
        prop_assert_eq!(hi, expected_hi);
    }

    /// The closest finders agree with a linear scan.
    #[test]
    fn closest_matches_linear_scan(mut values in prop::collection::vec(0i32..100, 0..200), probe in -10i32..110) {
        values.sort_unstable();

        let lower = search::find_closest(&values, |x| x.cmp(&probe), true);
        let upper = search::find_closest(&values, |x| x.cmp(&probe), false);

        if let Some(at) = values.iter().position(|&x| x == probe) {
            // An exact match is returned on both sides.
            prop_assert_eq!(values[lower.unwrap()], values[at]);
            prop_assert_eq!(values[upper.unwrap()], values[at]);
        } else {
            let below = values.iter().rposition(|&x| x < probe);
            let above = values.iter().position(|&x| x > probe);
            prop_assert_eq!(lower, below);
            prop_assert_eq!(upper, above);
        }
    }

    /// Partition-point finders bracket every element within [min, max].
    #[test]
    fn range_bounds_cover_members(mut values in prop::collection::vec(0i32..100, 1..200), a in 0i32..100, b in 0i32..100) {
        values.sort_unstable();
        let (min, max) = if a <= b { (a, b) } else { (b, a) };

        let lo = search::lower_bound_closest(&values, |x| x.cmp(&min));
        let hi = search::upper_bound_closest(&values, |x| x.cmp(&max));

        let members: Vec<i32> = values.iter().copied().filter(|&x| x >= min && x <= max).collect();
        match (hi, members.is_empty()) {
            (Some(hi), false) if lo <= hi => {
                prop_assert_eq!(&values[lo..=hi], members.as_slice());
            }
            _ => prop_assert!(members.is_empty()),
        }
    }

    /// A collection stays sorted (with primary-key tie-break) under
    /// arbitrary insert/remove interleavings.
    #[test]
    fn collection_stays_sorted(secondary in prop::collection::vec(0i32..20, 0..100), removals in prop::collection::vec(0usize..100, 0..50)) {
        let mut keys = collection(&secondary);

        for &at in &removals {
            if keys.is_empty() {
                break;
            }
            let pair = keys.pair(at % keys.len()).cloned().unwrap();
            keys.apply(KeyChange::Remove(pair)).unwrap();
        }

        let sorted = keys.pairs().windows(2).all(|w| w[0] < w[1]);
        prop_assert!(sorted);
    }

    /// find_many returns exactly the positions holding the probed key.
    #[test]
    fn find_many_matches_scan(secondary in prop::collection::vec(0i32..10, 0..100), probe in 0i32..10) {
        let keys = collection(&secondary);
        let scan: Vec<usize> = keys
            .pairs()
            .iter()
            .enumerate()
            .filter(|(_, (s, _))| *s == probe)
            .map(|(i, _)| i)
            .collect();

        match keys.find_many(&probe) {
            Some((lo, hi)) => {
                prop_assert_eq!(scan.first(), Some(&lo));
                prop_assert_eq!(scan.last(), Some(&hi));
            }
            None => prop_assert!(scan.is_empty()),
        }
    }
}

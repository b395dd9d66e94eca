#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Property tests for fractional-index order keys.

use proptest::prelude::*;
use squickr_core::key_between;

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Strategy producing valid order keys: non-empty digit strings without a
/// trailing smallest digit.
fn order_key() -> impl Strategy<Value = String> {
    (
        proptest::collection::vec(0..DIGITS.len(), 0..6),
        1..DIGITS.len(),
    )
        .prop_map(|(body, last)| {
            let mut key: String = body.iter().map(|&i| char::from(DIGITS[i])).collect();
            key.push(char::from(DIGITS[last]));
            key
        })
}

proptest! {
    #[test]
    fn between_two_keys_lies_a_third(a in order_key(), b in order_key()) {
        prop_assume!(a != b);
        let (lower, upper) = if a < b { (a, b) } else { (b, a) };
        let mid = key_between(Some(&lower), Some(&upper)).expect("keys are valid and ordered");
        prop_assert!(mid > lower, "{mid} > {lower}");
        prop_assert!(mid < upper, "{mid} < {upper}");
    }

    #[test]
    fn appending_always_grows(a in order_key()) {
        let next = key_between(Some(&a), None).expect("key is valid");
        prop_assert!(next > a);
    }

    #[test]
    fn prepending_always_shrinks(b in order_key()) {
        let before = key_between(None, Some(&b)).expect("key is valid");
        prop_assert!(before < b);
    }

    #[test]
    fn generated_keys_are_themselves_usable(a in order_key(), b in order_key()) {
        prop_assume!(a != b);
        let (lower, upper) = if a < b { (a, b) } else { (b, a) };
        let mid = key_between(Some(&lower), Some(&upper)).unwrap();
        // A derived key must be a valid bound for further inserts.
        let lower_half = key_between(Some(&lower), Some(&mid)).unwrap();
        let upper_half = key_between(Some(&mid), Some(&upper)).unwrap();
        prop_assert!(lower < lower_half && lower_half < mid);
        prop_assert!(mid < upper_half && upper_half < upper);
    }
}

#[test]
fn a_long_insertion_sequence_never_renumbers() {
    // Simulate a user repeatedly inserting at the front, middle, and back.
    let mut keys = vec![key_between(None, None).unwrap()];
    for i in 0..100 {
        let key = match i % 3 {
            0 => key_between(None, Some(&keys[0])).unwrap(),
            1 => key_between(keys.last().map(String::as_str), None).unwrap(),
            _ => {
                let mid = keys.len() / 2;
                key_between(Some(&keys[mid - 1]), Some(&keys[mid])).unwrap()
            }
        };
        match i % 3 {
            0 => keys.insert(0, key),
            1 => keys.push(key),
            _ => keys.insert(keys.len() / 2, key),
        }
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, keys, "insertion order must match lexicographic order");
    }
}

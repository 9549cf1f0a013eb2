use proptest::prelude::*;
use wellbatch_core::ItemOutcome;

/// Strategy for `(item_length, window_length)` pairs where the window fits
pub fn fitting_window_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..500).prop_flat_map(|item_length| (Just(item_length), 1..=item_length))
}

/// Strategy for `(item_length, window_length, step)` triples, window may not fit
pub fn strided_window_strategy() -> impl Strategy<Value = (usize, usize, usize)> {
    (0usize..300, 1usize..300, 1usize..50)
}

/// Strategy for unique item keys
pub fn keys_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,6}_[0-9]{1,3}", 0..40)
        .prop_map(|keys| keys.into_iter().collect())
}

/// Strategy for per-item outcomes without failures
pub fn outcome_strategy() -> impl Strategy<Value = ItemOutcome<(i64,)>> {
    prop_oneof![
        3 => any::<i64>().prop_map(|value| ItemOutcome::Success((value,))),
        1 => "[a-z ]{0,12}".prop_map(ItemOutcome::<(i64,)>::Skip),
    ]
}

/// Strategy for a keyed list of outcomes
pub fn keyed_outcomes_strategy() -> impl Strategy<Value = Vec<(String, ItemOutcome<(i64,)>)>> {
    keys_strategy().prop_flat_map(|keys| {
        let len = keys.len();
        (Just(keys), prop::collection::vec(outcome_strategy(), len))
            .prop_map(|(keys, outcomes)| keys.into_iter().zip(outcomes).collect())
    })
}

/// Strategy for per-item delays in milliseconds
pub fn delays_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..4, 1..24)
}

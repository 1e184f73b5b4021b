//! Property-based tests for parameter tree merging.
//!
//! These tests use proptest to generate random parameter trees and verify
//! that the merge invariants the environment relies on hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::params::{Param, Params};
    use proptest::prelude::*;

    fn arb_param() -> impl Strategy<Value = Param> {
        let leaf = "[a-z0-9]{0,6}".prop_map(Param::Scalar);
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Param::Sequence),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(|map| {
                    let mut params = Params::new();
                    for (key, value) in map {
                        params.insert(key, value);
                    }
                    Param::Mapping(params)
                }),
            ]
        })
    }

    fn arb_params() -> impl Strategy<Value = Params> {
        prop::collection::btree_map("[a-z]{1,4}", arb_param(), 0..6).prop_map(|map| {
            let mut params = Params::new();
            for (key, value) in map {
                params.insert(key, value);
            }
            params
        })
    }

    proptest! {
        /// Property: merging an empty tree changes nothing
        #[test]
        fn merge_with_empty_is_identity(base in arb_params()) {
            let merged = base.merged(&Params::new());
            prop_assert_eq!(merged, base);
        }

        /// Property: merging a tree into an empty one yields that tree
        #[test]
        fn merge_into_empty_yields_incoming(incoming in arb_params()) {
            let merged = Params::new().merged(&incoming);
            prop_assert_eq!(merged, incoming);
        }

        /// Property: merging a tree with itself changes nothing
        #[test]
        fn merge_is_idempotent(base in arb_params()) {
            let merged = base.merged(&base);
            prop_assert_eq!(merged, base);
        }

        /// Property: every non-mapping value of the incoming tree wins
        #[test]
        fn incoming_scalars_win(base in arb_params(), incoming in arb_params()) {
            let merged = base.merged(&incoming);
            for (key, value) in incoming.iter() {
                if value.as_mapping().is_none() {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }

        /// Property: keys only present in the base tree survive
        #[test]
        fn base_only_keys_survive(base in arb_params(), incoming in arb_params()) {
            let merged = base.merged(&incoming);
            for (key, value) in base.iter() {
                if incoming.get(key).is_none() {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
        }
    }
}

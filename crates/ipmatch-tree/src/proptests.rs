use super::*;

use proptest::prelude::*;

/// Shared starting points so generated prefixes overlap and share nodes
const BASES: [u128; 4] = [
    0,
    0x0000_0000_0000_0000_0000_ffff_c0a8_0000,
    0x2001_0db8_0000_0000_0000_0000_0000_0000,
    0xfe80_0000_0000_0000_0000_0000_0000_0000,
];

fn address_strategy() -> impl Strategy<Value = Address> + Clone {
    // Keep the top `keep` bits of a base and randomize the rest.
    (0..BASES.len(), any::<u128>(), 0u32..=128).prop_map(|(base, noise, keep)| {
        Address(BASES[base] ^ noise.checked_shr(keep).unwrap_or(0))
    })
}

fn cidr_strategy() -> impl Strategy<Value = Cidr> {
    let len = prop_oneof![
        1 => Just(0u8),
        30 => 1u8..=128,
    ];
    (address_strategy(), len).prop_map(|(address, prefix_len)| Cidr {
        address,
        prefix_len,
    })
}

fn build(cidrs: &[Cidr]) -> PrefixTree {
    let mut tree = PrefixTree::new();
    for cidr in cidrs {
        tree.insert_cidr(cidr);
    }
    tree
}

fn oracle(cidrs: &[Cidr], address: Address) -> bool {
    cidrs.iter().any(|cidr| cidr.contains(address))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_inserted_prefix_contains_its_range(
        cidrs in prop::collection::vec(cidr_strategy(), 1..48),
        noise in any::<u128>(),
    ) {
        let tree = build(&cidrs);

        for cidr in &cidrs {
            let mask = cidr.mask();
            let inside = Address((cidr.address.0 & mask) | (noise & !mask));
            prop_assert!(tree.contains(cidr.address), "missing {}", cidr);
            prop_assert!(tree.contains(inside), "{} not under {}", inside, cidr);
        }
    }

    #[test]
    fn prop_matches_linear_scan(
        cidrs in prop::collection::vec(cidr_strategy(), 0..48),
        queries in prop::collection::vec(address_strategy(), 0..64),
        flip in 0u8..128,
    ) {
        let tree = build(&cidrs);

        // Flipping a bit inside a prefix leaves the range unless another
        // prefix covers the result; the oracle decides either way.
        let near_misses = cidrs
            .iter()
            .filter(|cidr| cidr.prefix_len > 0)
            .map(|cidr| {
                let bit = flip % cidr.prefix_len;
                Address(cidr.address.0 ^ (1u128 << (127 - bit)))
            });

        for address in queries.iter().copied().chain(near_misses) {
            prop_assert_eq!(
                tree.contains(address),
                oracle(&cidrs, address),
                "query {}", address
            );
        }
    }

    #[test]
    fn prop_single_prefix_rejects_outside(
        cidr in cidr_strategy(),
        flip in 0u8..128,
    ) {
        prop_assume!(cidr.prefix_len > 0);
        let tree = build(&[cidr]);

        let bit = flip % cidr.prefix_len;
        let outside = Address(cidr.address.0 ^ (1u128 << (127 - bit)));
        prop_assert!(!tree.contains(outside));
    }

    #[test]
    fn prop_insert_twice_is_idempotent(
        cidrs in prop::collection::vec(cidr_strategy(), 0..32),
        queries in prop::collection::vec(address_strategy(), 0..64),
    ) {
        let once = build(&cidrs);
        let twice = build(&[cidrs.clone(), cidrs.clone()].concat());

        prop_assert_eq!(once.len(), twice.len());
        prop_assert_eq!(once.node_count(), twice.node_count());
        for address in queries {
            prop_assert_eq!(once.contains(address), twice.contains(address));
        }
    }
}

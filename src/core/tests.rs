#[cfg(test)]
mod property_tests {
    use crate::core::codec::{self, Action, decode, encode, listing_line};
    use crate::core::error::Error;
    use crate::core::rule::Rule;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    prop_compose! {
        fn arb_port()(port in 1u32..=65535) -> u32 {
            port
        }
    }

    prop_compose! {
        fn arb_rule()(
            iface in "[a-z][a-z0-9._-]{0,14}",
            proto in prop_oneof![Just("tcp"), Just("udp"), Just("sctp")],
            dport in arb_port(),
            addr in any::<u32>(),
            sport in arb_port(),
        ) -> Rule {
            Rule::new(iface, proto, dport, Ipv4Addr::from(addr).to_string(), sport)
        }
    }

    proptest! {
        #[test]
        fn test_listing_line_roundtrip(rule in arb_rule()) {
            prop_assert_eq!(decode(&listing_line(&rule)).unwrap(), rule);
        }

        #[test]
        fn test_roundtrip_with_trailing_counters(
            rule in arb_rule(),
            packets in any::<u64>(),
            bytes in any::<u64>(),
        ) {
            let line = format!("{} -c {packets} {bytes}", listing_line(&rule));
            prop_assert_eq!(decode(&line).unwrap(), rule);
        }

        #[test]
        fn test_decode_never_panics_and_is_complete(line in "\\PC*") {
            // Either a fully populated rule or an error, never something in between
            if let Ok(rule) = decode(&line) {
                prop_assert!(!rule.iface.is_empty());
                prop_assert!(!rule.proto.is_empty());
                prop_assert!(!rule.saddr.is_empty());
            }
        }

        #[test]
        fn test_decode_rejects_line_without_destination(rule in arb_rule()) {
            let args = encode(&rule, Action::Insert);
            // Drop `--to-destination <addr>:<port>`
            let line = args[..args.len() - 2].join(" ");
            let is_malformed = matches!(decode(&line), Err(Error::MalformedRuleLine { .. }));
            prop_assert!(is_malformed);
        }

        #[test]
        fn test_encoded_rules_are_managed(rule in arb_rule()) {
            prop_assert!(codec::is_managed(&listing_line(&rule)));
        }

        #[test]
        fn test_actions_share_rule_tokens(rule in arb_rule()) {
            let insert = encode(&rule, Action::Insert);
            let delete = encode(&rule, Action::Delete);
            prop_assert_eq!(&insert[1..], &delete[1..]);
            prop_assert_eq!(insert.len(), 18);
        }
    }
}

use super::*;
use proptest::prelude::*;

#[test]
fn encode_joins_parts_with_delimiter() {
    let key = CompositeKey::new("byService", ["idservice1", "idagent1"]).unwrap();

    assert_eq!(key.encode(), "byService\u{0}idservice1\u{0}idagent1");
    assert_eq!(key.to_string(), "byService~idservice1~idagent1");
}

#[test]
fn encode_rejects_empty_and_delimited_parts() {
    assert_eq!(
        CompositeKey::new("", ["a"]).unwrap_err(),
        KeyEncodeError::EmptyNamespace
    );
    assert_eq!(
        CompositeKey::new("ns", ["a", ""]).unwrap_err(),
        KeyEncodeError::EmptyField { position: 1 }
    );
    assert_eq!(
        CompositeKey::new("ns", ["a\u{0}b"]).unwrap_err(),
        KeyEncodeError::DelimiterInField { position: 0 }
    );
}

#[test]
fn decode_checks_namespace_and_arity() {
    let raw = CompositeKey::new("byAgent", ["a1", "s1"]).unwrap().encode();

    assert_eq!(
        CompositeKey::decode(&raw, "byService", 2).unwrap_err(),
        KeyDecodeError::NamespaceMismatch {
            expected: "byService".into(),
            found: "byAgent".into(),
        }
    );
    assert_eq!(
        CompositeKey::decode(&raw, "byAgent", 3).unwrap_err(),
        KeyDecodeError::Arity {
            expected: 3,
            found: 2
        }
    );
    assert_eq!(
        CompositeKey::decode("byAgent\u{0}a1\u{0}", "byAgent", 2).unwrap_err(),
        KeyDecodeError::EmptyField { position: 1 }
    );
}

#[test]
fn prefix_range_excludes_longer_sibling_values() {
    let range = KeyRange::prefix("byService", &["s1"]).unwrap();

    let inside = CompositeKey::new("byService", ["s1", "a9"]).unwrap().encode();
    let sibling = CompositeKey::new("byService", ["s10", "a1"]).unwrap().encode();
    let spaced = CompositeKey::new("byService", ["s1 x", "a1"]).unwrap().encode();
    let other_ns = CompositeKey::new("byServiceX", ["s1", "a1"]).unwrap().encode();

    assert!(range.contains(&inside));
    assert!(!range.contains(&sibling));
    assert!(!range.contains(&spaced));
    assert!(!range.contains(&other_ns));
}

#[test]
fn empty_prefix_covers_whole_namespace() {
    let range = KeyRange::prefix("agent", &[]).unwrap();

    assert!(range.contains(&data_key("agent", "zz").unwrap()));
    assert!(!range.contains(&data_key("agentByAddress", "zz").unwrap()));
    assert!(!range.contains("agent"));
}

#[test]
fn render_key_substitutes_display_separator() {
    assert_eq!(render_key(&data_key("agent", "idagent1").unwrap()), "agent~idagent1");
}

fn field() -> impl Strategy<Value = String> {
    "[ -~]{1,8}"
}

proptest! {
    #[test]
    fn decode_inverts_encode(
        ns in "[a-zA-Z]{1,10}",
        fields in prop::collection::vec(field(), 0..4),
    ) {
        let key = CompositeKey::new(&ns, fields.clone()).unwrap();
        let decoded = CompositeKey::decode(&key.encode(), &ns, fields.len()).unwrap();

        prop_assert_eq!(decoded, key);
    }

    #[test]
    fn encoded_order_matches_tuple_order(
        a in prop::collection::vec(field(), 2),
        b in prop::collection::vec(field(), 2),
    ) {
        let ka = CompositeKey::new("ns", a.clone()).unwrap().encode();
        let kb = CompositeKey::new("ns", b.clone()).unwrap().encode();

        prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
    }

    #[test]
    fn prefix_range_matches_first_field(a in field(), b in field(), tail in field()) {
        let range = KeyRange::prefix("ns", &[a.as_str()]).unwrap();
        let key = CompositeKey::new("ns", [b.clone(), tail]).unwrap().encode();

        prop_assert_eq!(range.contains(&key), a == b);
    }
}

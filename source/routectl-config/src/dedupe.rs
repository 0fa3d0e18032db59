//! List deduplication. Pure functions only, no filesystem and no config
//! model, so both the normalizer and the deduper can be
//! property-tested in isolation from everything else.

/// Per-list dedupe policy. `PriorityBased` behaves identically to
/// `PreserveOrder`; the distinct name exists so callers can express
/// intent ("first = highest priority") for ordered protocol/match lists
/// that must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PreserveOrder,
    NetworkAware,
    PriorityBased,
}

/// Auto-selects a [`Strategy`] by list (option) name.
/// Callers may always override this.
pub fn auto_select(list_name: &str) -> Strategy {
    match list_name {
        "network" | "server" | "entry" => Strategy::NetworkAware,
        "proto" | "match" => Strategy::PriorityBased,
        _ => Strategy::PreserveOrder,
    }
}

/// Removes duplicates from `values` under `strategy`, keeping the first
/// occurrence (by the strategy's notion of equality) and its original
/// string. Stable: never reorders surviving elements.
pub fn dedupe(values: &[String], strategy: Strategy) -> Vec<String> {
    match strategy {
        Strategy::PreserveOrder | Strategy::PriorityBased => dedupe_exact(values),
        Strategy::NetworkAware => dedupe_by_key(values, normalize_key),
    }
}

fn dedupe_exact(values: &[String]) -> Vec<String> {
    dedupe_by_key(values, |s| s.to_string())
}

fn dedupe_by_key(values: &[String], key_of: impl Fn(&str) -> String) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        let key = key_of(v);
        if seen.insert(key) {
            out.push(v.clone());
        }
    }
    out
}

/// The NetworkAware canonicalization rules, applied in
/// order; the first matching rule yields the canonical key.
pub fn normalize_key(value: &str) -> String {
    if let Some(ipv4) = canonical_ipv4(value) {
        return ipv4;
    }
    if is_digit_led(value) {
        return canonical_digit_set(value);
    }
    value.chars().filter(|c| !c.is_ascii_whitespace()).flat_map(|c| c.to_lowercase()).collect()
}

/// Rule 1: `a.b.c.d` with each octet 0-255, leading zeros stripped.
fn canonical_ipv4(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut octets = Vec::with_capacity(4);
    for part in parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let n: u16 = part.parse().ok()?;
        if n > 255 {
            return None;
        }
        octets.push(n.to_string());
    }
    Some(octets.join("."))
}

/// Rule 2: a digit-led string is treated as a set of integers (e.g. a
/// port list). Extract maximal digit runs, sort ascending, rejoin.
fn is_digit_led(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_digit() {
        return false;
    }
    chars.all(|c| c.is_ascii_digit() || c == ',' || c == '-' || c.is_ascii_whitespace())
}

fn canonical_digit_set(value: &str) -> String {
    let mut numbers: Vec<u64> = Vec::new();
    let mut current = String::new();
    for c in value.chars().chain(std::iter::once(',')) {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            if let Ok(n) = current.parse() {
                numbers.push(n);
            }
            current.clear();
        }
    }
    numbers.sort_unstable();
    numbers.into_iter().map(|n| n.to_string()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scenario_a_ip_dedupe_network_aware() {
        let input = v(&["192.168.001.001", "10.0.0.1", "192.168.1.1", "10.0.0.1"]);
        let out = dedupe(&input, Strategy::NetworkAware);
        assert_eq!(out, v(&["192.168.001.001", "10.0.0.1"]));
    }

    #[test]
    fn scenario_b_port_set_normalization() {
        let input = v(&["80,443", "443,80", "22"]);
        let out = dedupe(&input, Strategy::NetworkAware);
        assert_eq!(out, v(&["80,443", "22"]));
    }

    #[test]
    fn preserve_order_is_exact_string_equality() {
        let input = v(&["gzip", "GZIP", "gzip"]);
        let out = dedupe(&input, Strategy::PreserveOrder);
        assert_eq!(out, v(&["gzip", "GZIP"]));
    }

    #[test]
    fn priority_based_matches_preserve_order() {
        let input = v(&["tcp", "udp", "tcp"]);
        assert_eq!(
            dedupe(&input, Strategy::PriorityBased),
            dedupe(&input, Strategy::PreserveOrder)
        );
    }

    #[test]
    fn single_value_unchanged_regardless_of_strategy() {
        for s in [Strategy::PreserveOrder, Strategy::NetworkAware, Strategy::PriorityBased] {
            assert_eq!(dedupe(&v(&["only"]), s), v(&["only"]));
        }
    }

    #[test]
    fn idempotence_property() {
        let cases: Vec<Vec<String>> = vec![
            v(&["a", "b", "a"]),
            v(&["192.168.1.1", "192.168.001.001"]),
            v(&["80,443", "443,80"]),
            v(&[]),
        ];
        for strategy in [Strategy::PreserveOrder, Strategy::NetworkAware, Strategy::PriorityBased] {
            for xs in &cases {
                let once = dedupe(xs, strategy);
                let twice = dedupe(&once, strategy);
                assert_eq!(once, twice, "strategy {strategy:?} not idempotent for {xs:?}");
            }
        }
    }

    #[test]
    fn subset_property() {
        let xs = v(&["1", "2", "1", "3", "2"]);
        for strategy in [Strategy::PreserveOrder, Strategy::NetworkAware, Strategy::PriorityBased] {
            let out = dedupe(&xs, strategy);
            assert!(out.len() <= xs.len());
            assert!(out.iter().all(|item| xs.contains(item)));
        }
    }

    #[test]
    fn auto_select_table() {
        assert_eq!(auto_select("network"), Strategy::NetworkAware);
        assert_eq!(auto_select("server"), Strategy::NetworkAware);
        assert_eq!(auto_select("entry"), Strategy::NetworkAware);
        assert_eq!(auto_select("proto"), Strategy::PriorityBased);
        assert_eq!(auto_select("match"), Strategy::PriorityBased);
        assert_eq!(auto_select("anything_else"), Strategy::PreserveOrder);
    }

    #[test]
    fn lowercase_fallback_strips_whitespace() {
        assert_eq!(normalize_key("  Foo Bar  "), "foobar");
    }
}

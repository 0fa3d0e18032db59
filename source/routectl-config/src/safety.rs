//! The network-safety guard, shared between the Merge and
//! Remove engines. Read-only on the `Config`s it's given: it never
//! forces a conflict resolution, only fails closed when a protected
//! section or option would have disappeared.

use crate::error::{Result, RouterConfigError};
use crate::model::{Config, Section};

/// Protected section types: `{interface, device, route}` in the
/// `network` config, and the same set in `firewall`.
const PROTECTED_KINDS: [&str; 3] = ["interface", "device", "route"];
const PROTECTED_CONFIGS: [&str; 2] = ["network", "firewall"];

pub fn is_guarded_config(config_name: &str) -> bool {
    PROTECTED_CONFIGS.contains(&config_name)
}

fn is_protected(section: &Section) -> bool {
    PROTECTED_KINDS.contains(&section.kind.as_str())
}

/// Verifies that every protected section (and each of its pre-existing
/// scalar options) present in `before` is still present in `after`.
pub fn check(config_name: &str, before: &Config, after: &Config) -> Result<()> {
    if !is_guarded_config(config_name) {
        return Ok(());
    }

    let mut anonymous_seen: std::collections::HashMap<&str, usize> =
        std::collections::HashMap::new();

    for section in &before.sections {
        if !is_protected(section) {
            continue;
        }

        let found = match &section.name {
            Some(name) => after.find_named(name),
            None => {
                let idx = anonymous_seen.entry(section.kind.as_str()).or_insert(0);
                let result = after.find_anonymous(&section.kind, *idx);
                *idx += 1;
                result
            }
        };

        let Some(found) = found else {
            return Err(RouterConfigError::NetworkSafety {
                config: config_name.to_string(),
                message: format!(
                    "protected section '{}' ({}) would be removed",
                    section.name.as_deref().unwrap_or("<anonymous>"),
                    section.kind
                ),
            });
        };

        for (option, value) in &section.options {
            if value.is_list() {
                continue;
            }
            if !found.options.contains_key(option) {
                return Err(RouterConfigError::NetworkSafety {
                    config: config_name.to_string(),
                    message: format!(
                        "protected section '{}' ({}) would lose option '{}'",
                        section.name.as_deref().unwrap_or("<anonymous>"),
                        section.kind,
                        option
                    ),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse;
    use std::path::Path;

    #[test]
    fn missing_protected_interface_trips_guard() {
        let before = parse("config interface 'lan'\n\toption ifname 'eth0'\n", Path::new("network")).unwrap();
        let after = parse("config interface 'wan'\n\toption ifname 'eth1'\n", Path::new("network")).unwrap();
        let err = check("network", &before, &after).unwrap_err();
        assert!(matches!(err, RouterConfigError::NetworkSafety { .. }));
    }

    #[test]
    fn added_interface_alongside_existing_is_fine() {
        let before = parse("config interface 'lan'\n\toption ifname 'eth0'\n", Path::new("network")).unwrap();
        let after = parse(
            "config interface 'lan'\n\toption ifname 'eth0'\n\nconfig interface 'captive'\n\toption ifname 'eth2'\n",
            Path::new("network"),
        )
        .unwrap();
        assert!(check("network", &before, &after).is_ok());
    }

    #[test]
    fn removing_scalar_option_trips_guard() {
        let before = parse("config interface 'lan'\n\toption ifname 'eth0'\n\toption proto 'static'\n", Path::new("network")).unwrap();
        let after = parse("config interface 'lan'\n\toption ifname 'eth0'\n", Path::new("network")).unwrap();
        let err = check("network", &before, &after).unwrap_err();
        assert!(matches!(err, RouterConfigError::NetworkSafety { .. }));
    }

    #[test]
    fn unguarded_config_never_trips() {
        let before = parse("config interface 'lan'\n\toption ifname 'eth0'\n", Path::new("dhcp")).unwrap();
        let after = Config::default();
        assert!(check("dhcp", &before, &after).is_ok());
    }
}

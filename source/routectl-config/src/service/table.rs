//! Fixed config→service and service-dependency tables. Plain const
//! slices: the tables are small, known at compile time, and callers
//! extend them by passing their own [`ServiceTables`] rather than
//! mutating a global.

/// `(config, service)` pairs. A config absent from this table causes no
/// restart and no warning.
pub const DEFAULT_CONFIG_SERVICE_MAP: &[(&str, &str)] = &[
    ("network", "network"),
    ("wireless", "network"),
    ("dhcp", "dnsmasq"),
    ("firewall", "firewall"),
    ("uhttpd", "uhttpd"),
    ("uspot", "uspot"),
    ("system", "system"),
    ("dropbear", "dropbear"),
    ("openvpn", "openvpn"),
];

/// `(service, [dependencies...])`. Restart order places a dependency
/// before its dependents.
pub const DEFAULT_SERVICE_DEPENDENCIES: &[(&str, &[&str])] = &[
    ("network", &[]),
    ("system", &[]),
    ("firewall", &["network"]),
    ("dnsmasq", &["network"]),
    ("uhttpd", &["network"]),
    ("dropbear", &["network"]),
    ("openvpn", &["network", "firewall"]),
    ("uspot", &["network", "firewall", "dnsmasq"]),
];

/// Holds the (possibly caller-extended) config→service map and service
/// dependency graph the orchestrator walks.
#[derive(Debug, Clone)]
pub struct ServiceTables {
    config_service_map: Vec<(String, String)>,
    dependencies: Vec<(String, Vec<String>)>,
}

impl Default for ServiceTables {
    fn default() -> Self {
        Self {
            config_service_map: DEFAULT_CONFIG_SERVICE_MAP
                .iter()
                .map(|(c, s)| (c.to_string(), s.to_string()))
                .collect(),
            dependencies: DEFAULT_SERVICE_DEPENDENCIES
                .iter()
                .map(|(s, deps)| (s.to_string(), deps.iter().map(|d| d.to_string()).collect()))
                .collect(),
        }
    }
}

impl ServiceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or overrides a config→service mapping.
    pub fn with_config_service(mut self, config: impl Into<String>, service: impl Into<String>) -> Self {
        self.config_service_map.push((config.into(), service.into()));
        self
    }

    /// Adds or overrides a service's dependency list.
    pub fn with_dependencies(mut self, service: impl Into<String>, depends_on: Vec<String>) -> Self {
        self.dependencies.push((service.into(), depends_on));
        self
    }

    /// Every service implied by `modified_configs`, in first-seen order,
    /// deduplicated.
    pub fn services_for(&self, modified_configs: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for config in modified_configs {
            for (c, service) in self.config_service_map.iter().rev() {
                if c == config && seen.insert(service.clone()) {
                    out.push(service.clone());
                    break;
                }
            }
        }
        out
    }

    /// `service`'s declared dependencies, or an empty slice if `service`
    /// has none on record.
    pub fn dependencies_of(&self, service: &str) -> &[String] {
        self.dependencies
            .iter()
            .rev()
            .find(|(s, _)| s == service)
            .map(|(_, deps)| deps.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_to_its_table_service() {
        let tables = ServiceTables::new();
        assert_eq!(
            tables.services_for(&["dhcp".to_string()]),
            vec!["dnsmasq".to_string()]
        );
    }

    #[test]
    fn unknown_config_implies_no_service() {
        let tables = ServiceTables::new();
        assert!(tables.services_for(&["unknown_config".to_string()]).is_empty());
    }

    #[test]
    fn network_and_wireless_both_imply_network_service_once() {
        let tables = ServiceTables::new();
        let services = tables.services_for(&["network".to_string(), "wireless".to_string()]);
        assert_eq!(services, vec!["network".to_string()]);
    }

    #[test]
    fn uspot_depends_on_network_firewall_dnsmasq() {
        let tables = ServiceTables::new();
        assert_eq!(
            tables.dependencies_of("uspot"),
            &["network".to_string(), "firewall".to_string(), "dnsmasq".to_string()]
        );
    }

    #[test]
    fn extension_hook_adds_new_mapping() {
        let tables = ServiceTables::new().with_config_service("ddns", "ddns");
        assert_eq!(tables.services_for(&["ddns".to_string()]), vec!["ddns".to_string()]);
    }
}

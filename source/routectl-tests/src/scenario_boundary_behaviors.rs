#[cfg(test)]
mod tests {
    use routectl_config::driver::DriverOptions;

    use crate::common::Fixture;

    #[test]
    fn empty_overlay_directory_is_a_no_op() {
        let fx = Fixture::new();
        fx.write_live("system", "config system\n\toption hostname 'router'\n");

        let driver = fx.driver();
        let summary = driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap();

        assert!(summary.modified_configs.is_empty());
        assert!(summary.restart_report.is_none());
        assert_eq!(fx.read_live("system"), "config system\n\toption hostname 'router'\n");
    }

    #[test]
    fn overlay_only_config_is_committed_as_a_new_file() {
        let fx = Fixture::new();
        fx.write_overlay("dhcp", "config dnsmasq\n\toption domain 'lan'\n");

        let driver = fx.driver();
        let summary = driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap();

        assert_eq!(summary.modified_configs, vec!["dhcp".to_string()]);
        assert!(fx.live_path("dhcp").exists());
    }

    #[test]
    fn dry_run_reports_the_new_file_but_never_creates_it() {
        let fx = Fixture::new();
        fx.write_overlay("dhcp", "config dnsmasq\n\toption domain 'lan'\n");

        let driver = fx.driver();
        let opts = DriverOptions {
            dry_run: true,
            ..DriverOptions::default()
        };
        let summary = driver.merge(fx.overlay.path(), &opts).unwrap();

        assert_eq!(summary.modified_configs, vec!["dhcp".to_string()]);
        assert!(!fx.live_path("dhcp").exists());
    }

    /// Two anonymous `rule` sections merge positionally by `(kind, index)`:
    /// an overlay's first anonymous `rule` updates the live config's
    /// first anonymous `rule`, not whichever one happens to share option
    /// values with it.
    #[test]
    fn anonymous_sections_merge_by_position_not_content() {
        let fx = Fixture::new();
        fx.write_live(
            "firewall",
            "config rule\n\toption target 'ACCEPT'\n\nconfig rule\n\toption target 'DROP'\n",
        );
        fx.write_overlay("firewall", "config rule\n\toption log '1'\n");

        let driver = fx.driver();
        driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap();

        let live = fx.read_live("firewall");
        let first_rule_block = live.split("config rule").nth(1).unwrap();
        assert!(first_rule_block.contains("'ACCEPT'"));
        assert!(first_rule_block.contains("log '1'"));
        let second_rule_block = live.split("config rule").nth(2).unwrap();
        assert!(second_rule_block.contains("'DROP'"));
        assert!(!second_rule_block.contains("log '1'"));
    }

    /// An overlay with more anonymous sections of a kind than the live
    /// config has appends the extras rather than erroring.
    #[test]
    fn extra_anonymous_overlay_sections_are_appended() {
        let fx = Fixture::new();
        fx.write_live("firewall", "config rule\n\toption target 'ACCEPT'\n");
        fx.write_overlay(
            "firewall",
            "config rule\n\toption target 'ACCEPT'\n\nconfig rule\n\toption target 'DROP'\n",
        );

        let driver = fx.driver();
        let summary = driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap();

        assert_eq!(summary.modified_configs, vec!["firewall".to_string()]);
        let live = fx.read_live("firewall");
        assert_eq!(live.matches("config rule").count(), 2);
        assert!(live.contains("'DROP'"));
    }
}

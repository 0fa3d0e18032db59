#[cfg(test)]
mod tests {
    use routectl_config::backup;

    use crate::common::Fixture;

    #[test]
    fn driver_backup_round_trips_the_live_directory() {
        let fx = Fixture::new();
        fx.write_live("network", "config interface 'lan'\n\toption ifname 'eth0'\n");
        fx.write_live("firewall", "config zone 'lan'\n\toption input 'ACCEPT'\n");

        let driver = fx.driver();
        let handle = driver.backup("manual").unwrap();
        assert!(handle.archive_path.exists());
        assert_eq!(handle.digest.len(), 64);

        std::fs::remove_file(fx.live_path("network")).unwrap();
        backup::restore(&handle, fx.live.path()).unwrap();

        assert_eq!(fx.read_live("network"), "config interface 'lan'\n\toption ifname 'eth0'\n");
        assert_eq!(fx.read_live("firewall"), "config zone 'lan'\n\toption input 'ACCEPT'\n");
    }

    #[test]
    fn a_failed_merge_restores_the_pre_merge_backup() {
        use routectl_config::driver::DriverOptions;
        use routectl_config::service::controller::mock::MockController;
        use routectl_config::service::{ServiceAction, ServiceStatus};

        let fx = Fixture::new();
        fx.write_live("firewall", "config zone 'lan'\n\toption input 'ACCEPT'\n");
        fx.write_overlay("firewall", "config zone 'wan'\n\toption input 'REJECT'\n");

        let controller = MockController::new()
            .with_status("firewall", ServiceStatus::Running)
            .fail_on("firewall", ServiceAction::Restart);
        let driver = fx.driver_with_controller(controller);

        driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap_err();

        let content = fx.read_live("firewall");
        assert!(content.contains("'lan'"));
        assert!(!content.contains("'wan'"));
    }

    #[test]
    fn repeated_named_backups_are_pruned_to_the_configured_retention() {
        let fx = Fixture::new();
        fx.write_live("network", "config interface 'lan'\n");

        let driver = fx.driver();
        for _ in 0..3 {
            driver.backup("pre-merge").unwrap();
        }
        let evicted = backup::evict(fx.backups.path(), "pre-merge", 1).unwrap();
        assert_eq!(evicted.len(), 2);

        let remaining: Vec<_> = std::fs::read_dir(fx.backups.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(remaining.len(), 1);
    }
}

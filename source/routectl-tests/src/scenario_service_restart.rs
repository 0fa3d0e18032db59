#[cfg(test)]
mod tests {
    use routectl_config::driver::DriverOptions;
    use routectl_config::service::controller::mock::MockController;
    use routectl_config::service::{ServiceAction, ServiceStatus};
    use routectl_config::RouterConfigError;

    use crate::common::Fixture;

    /// Scenario F: modifying `firewall`, `network`, and `dhcp` restarts
    /// `network` first, then `firewall` and `dnsmasq` in either order,
    /// never a dependent before its dependency.
    #[test]
    fn scenario_f_restart_ordering() {
        let fx = Fixture::new();
        fx.write_overlay("network", "config interface 'lan'\n\toption ifname 'eth0'\n");
        fx.write_overlay("firewall", "config zone 'lan'\n\toption input 'ACCEPT'\n");
        fx.write_overlay("dhcp", "config dnsmasq\n\toption domain 'lan'\n");

        let driver = fx.driver();
        let summary = driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap();

        let report = summary.restart_report.unwrap();
        let order: Vec<&str> = report.results.iter().map(|(s, _)| s.as_str()).collect();
        let network_pos = order.iter().position(|s| *s == "network").unwrap();
        let firewall_pos = order.iter().position(|s| *s == "firewall").unwrap();
        let dnsmasq_pos = order.iter().position(|s| *s == "dnsmasq").unwrap();
        assert!(network_pos < firewall_pos);
        assert!(network_pos < dnsmasq_pos);
    }

    /// Scenario F (continued): if `firewall`'s restart fails with
    /// `RollbackOnFailure=true`, `network` is rolled back to its
    /// captured pre-state, `dnsmasq` never runs, and the operation
    /// reports failure.
    #[test]
    fn scenario_f_failure_halts_before_the_next_service_and_rolls_back() {
        let fx = Fixture::new();
        fx.write_overlay("network", "config interface 'lan'\n\toption ifname 'eth0'\n");
        fx.write_overlay("firewall", "config zone 'lan'\n\toption input 'ACCEPT'\n");
        fx.write_overlay("dhcp", "config dnsmasq\n\toption domain 'lan'\n");

        let controller = MockController::new()
            .with_status("network", ServiceStatus::Running)
            .fail_on("firewall", ServiceAction::Restart);
        let driver = fx.driver_with_controller(controller);

        let err = driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap_err();
        assert!(matches!(err, RouterConfigError::ServiceFailed { .. }));
    }

    #[test]
    fn unavailable_service_script_is_reported_not_failed() {
        let fx = Fixture::new();
        fx.write_overlay("dropbear", "config dropbear\n\toption PasswordAuth 'off'\n");

        let controller = MockController::new().with_available("dropbear", false);
        let driver = fx.driver_with_controller(controller);
        let summary = driver.merge(fx.overlay.path(), &DriverOptions::default()).unwrap();

        let report = summary.restart_report.unwrap();
        assert!(report.ok);
        assert!(report.results[0].1.unavailable);
    }

    #[test]
    fn no_restart_option_skips_the_orchestrator_entirely() {
        let fx = Fixture::new();
        fx.write_overlay("dhcp", "config dnsmasq\n\toption domain 'lan'\n");

        let controller = MockController::new().fail_on("dnsmasq", ServiceAction::Restart);
        let driver = fx.driver_with_controller(controller);
        let opts = DriverOptions {
            no_restart: true,
            ..DriverOptions::default()
        };
        let summary = driver.merge(fx.overlay.path(), &opts).unwrap();
        assert!(summary.restart_report.is_none());
    }
}

//! The `ServiceController` seam: restart, start, stop, and status as an
//! abstract side effect, so the orchestrator is testable without a real
//! init system.

use std::path::PathBuf;
use std::process::Command;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub succeeded: bool,
    pub output: String,
}

pub trait ServiceController: Send + Sync {
    /// True if the service's init script exists.
    fn is_available(&self, service: &str) -> bool;

    fn status(&self, service: &str) -> ServiceStatus;

    fn invoke(&self, service: &str, action: ServiceAction) -> Result<ActionOutcome>;
}

/// Shells out to `<init_dir>/<service> <action>`, the conventional
/// init-script layout.
pub struct InitScriptController {
    init_dir: PathBuf,
}

impl InitScriptController {
    pub fn new(init_dir: impl Into<PathBuf>) -> Self {
        Self { init_dir: init_dir.into() }
    }

    fn script_path(&self, service: &str) -> PathBuf {
        self.init_dir.join(service)
    }
}

impl Default for InitScriptController {
    fn default() -> Self {
        Self::new("/etc/init.d")
    }
}

impl ServiceController for InitScriptController {
    fn is_available(&self, service: &str) -> bool {
        self.script_path(service).is_file()
    }

    fn status(&self, service: &str) -> ServiceStatus {
        let Ok(output) = Command::new(self.script_path(service)).arg("status").output() else {
            return ServiceStatus::Unknown;
        };
        if !output.status.success() {
            return ServiceStatus::Unknown;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        if text.to_lowercase().contains("running") {
            ServiceStatus::Running
        } else if text.to_lowercase().contains("stopped") || text.to_lowercase().contains("inactive") {
            ServiceStatus::Stopped
        } else {
            ServiceStatus::Unknown
        }
    }

    fn invoke(&self, service: &str, action: ServiceAction) -> Result<ActionOutcome> {
        let arg = match action {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        };
        let output = Command::new(self.script_path(service))
            .arg(arg)
            .output()
            .map_err(|e| crate::error::RouterConfigError::io(self.script_path(service), e))?;
        Ok(ActionOutcome {
            succeeded: output.status.success(),
            output: format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        })
    }
}

/// A fully scripted controller for tests: fixed availability/status
/// tables and a scripted outcome per `(service, action)`.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockController {
        pub available: HashMap<String, bool>,
        pub statuses: HashMap<String, ServiceStatus>,
        pub failing: HashMap<String, ServiceAction>,
        pub invocations: Mutex<Vec<(String, ServiceAction)>>,
    }

    impl MockController {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_available(mut self, service: &str, available: bool) -> Self {
            self.available.insert(service.to_string(), available);
            self
        }

        pub fn with_status(mut self, service: &str, status: ServiceStatus) -> Self {
            self.statuses.insert(service.to_string(), status);
            self
        }

        pub fn fail_on(mut self, service: &str, action: ServiceAction) -> Self {
            self.failing.insert(service.to_string(), action);
            self
        }

        pub fn invocations(&self) -> Vec<(String, ServiceAction)> {
            self.invocations.lock().unwrap().clone()
        }
    }

    impl ServiceController for MockController {
        fn is_available(&self, service: &str) -> bool {
            self.available.get(service).copied().unwrap_or(true)
        }

        fn status(&self, service: &str) -> ServiceStatus {
            self.statuses.get(service).copied().unwrap_or(ServiceStatus::Running)
        }

        fn invoke(&self, service: &str, action: ServiceAction) -> Result<ActionOutcome> {
            self.invocations.lock().unwrap().push((service.to_string(), action));
            let succeeded = self.failing.get(service) != Some(&action);
            Ok(ActionOutcome {
                succeeded,
                output: format!("{service}: {action:?} -> {succeeded}"),
            })
        }
    }
}

//! Shared fixture helpers for the end-to-end scenario tests.

use std::fs;
use std::path::Path;

use routectl_config::driver::Driver;
use routectl_config::service::controller::mock::MockController;
use tempfile::TempDir;

/// A throwaway `live/`, `overlay/`, and `backups/` directory triple, torn
/// down when dropped.
pub struct Fixture {
    pub live: TempDir,
    pub overlay: TempDir,
    pub backups: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            live: TempDir::new().unwrap(),
            overlay: TempDir::new().unwrap(),
            backups: TempDir::new().unwrap(),
        }
    }

    pub fn write_live(&self, name: &str, content: &str) -> &Self {
        fs::write(self.live.path().join(name), content).unwrap();
        self
    }

    pub fn write_overlay(&self, name: &str, content: &str) -> &Self {
        fs::write(self.overlay.path().join(name), content).unwrap();
        self
    }

    pub fn read_live(&self, name: &str) -> String {
        fs::read_to_string(self.live.path().join(name)).unwrap_or_default()
    }

    pub fn live_path(&self, name: &str) -> std::path::PathBuf {
        self.live.path().join(name)
    }

    /// A driver wired to a scripted [`MockController`] so restart
    /// behavior is deterministic and asserted against directly.
    pub fn driver_with_controller(&self, controller: MockController) -> Driver {
        Driver::new(self.live.path(), self.backups.path()).with_controller(Box::new(controller))
    }

    pub fn driver(&self) -> Driver {
        self.driver_with_controller(MockController::new())
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - Isolated project roots
//! - Global/project config files
//! - Scratch files for guarded I/O
//!
//! # Usage
//!
//! ```ignore
//! use opguard_config::testing::TestEnvironment;
//!
//! #[test]
//! fn test_something() {
//!     let env = TestEnvironment::new().unwrap();
//!     env.write_project_config("[guard]\ntrace_calls = false\n").unwrap();
//!     let config = env.load_config().unwrap();
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::{Config, ConfigError};

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with unique paths
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Stand-in for the user's home directory
    pub home_dir: PathBuf,
    /// Project root for the test
    pub project_root: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let home_dir = root.join("home");
        let project_root = root.join(format!("project-{}", test_id));

        std::fs::create_dir_all(home_dir.join(".opguard"))?;
        std::fs::create_dir_all(project_root.join(".opguard"))?;

        Ok(Self {
            _temp_dir: temp_dir,
            home_dir,
            project_root,
            test_id,
        })
    }

    /// Global config path inside the fake home
    pub fn global_config_path(&self) -> PathBuf {
        self.home_dir.join(".opguard").join("config.toml")
    }

    /// Project config path inside the project root
    pub fn project_config_path(&self) -> PathBuf {
        self.project_root.join(".opguard").join("config.toml")
    }

    pub fn write_global_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.global_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_project_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        let path = self.project_config_path();
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Load config the way `Config::load` does, minus the environment
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        Config::load_from_paths(
            Some(&self.global_config_path()),
            Some(&self.project_config_path()),
        )
    }

    /// Create a test file with content
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.project_root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Path under the project root that is guaranteed not to exist yet
    pub fn missing_path(&self, relative_path: &str) -> PathBuf {
        self.project_root.join("missing").join(relative_path)
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}

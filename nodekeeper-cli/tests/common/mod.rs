#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub struct TestContext {
    pub cmd: Command,
    pub config: PathBuf,
    temp_dir: TempDir,
}

impl TestContext {
    /// Command bound to this context's config file.
    pub fn new_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_nodekeeper");
        let mut cmd = Command::new(bin_path);
        cmd.timeout(Duration::from_secs(30));
        cmd.env_remove("NODEKEEPER_CONFIG");
        cmd.arg("--config").arg(&self.config);
        cmd
    }

    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir().join("state.yaml")
    }

    pub fn base_local(&self) -> PathBuf {
        self.dir().join("cardano")
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(&self.config, content).expect("Failed to write config");
    }
}

/// Context whose config keeps every path inside a fresh temp dir.
pub fn nodekeeper() -> TestContext {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = temp_dir.path().join("nodekeeper.yaml");

    let mut ctx = TestContext {
        cmd: Command::new(env!("CARGO_BIN_EXE_nodekeeper")),
        config,
        temp_dir,
    };
    ctx.write_config(&format!(
        "node:\n  server_name: test\ncardano:\n  base_local: {}\nsupervisor:\n  state_file: {}\n",
        ctx.base_local().display(),
        ctx.state_file().display()
    ));
    ctx.cmd = ctx.new_cmd();
    ctx
}

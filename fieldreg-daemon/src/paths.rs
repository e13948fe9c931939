use std::path::{Path, PathBuf};

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn fieldreg_root(home: &Path) -> PathBuf {
    home.join(".fieldreg")
}

pub fn run_dir(home: &Path) -> PathBuf {
    fieldreg_root(home).join("run")
}

pub fn socket_path(home: &Path) -> PathBuf {
    run_dir(home).join(DAEMON_SOCKET)
}

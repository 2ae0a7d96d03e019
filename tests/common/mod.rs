#![allow(dead_code)]

pub mod pack;

use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use sha1::{Digest, Sha1};
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_bit_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    repository_dir
}

pub fn run_bit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("bit").expect("Failed to find bit binary");
    cmd.current_dir(dir);
    cmd.env_remove("GIT_DIR")
        .env_remove("GIT_OBJECT_DIRECTORY")
        .env_remove("GIT_INDEX_FILE");
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

/// Trimmed stdout of a command expected to succeed
pub fn bit_stdout(dir: &Path, args: &[&str]) -> String {
    let output = run_bit_command(dir, args)
        .output()
        .expect("Failed to run bit");
    assert!(
        output.status.success(),
        "bit {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout)
        .expect("bit printed invalid UTF-8")
        .trim_end()
        .to_string()
}

/// Object ID git assigns to `data` stored as `kind`
pub fn object_id(kind: &str, data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{kind} {}\0", data.len()).as_bytes());
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    std::fs::write(path, content).expect("Failed to write file");
}

pub fn random_content() -> String {
    use fake::Fake;
    use fake::faker::lorem::en::Words;

    Words(5..10).fake::<Vec<String>>().join(" ")
}

use assert_fs::TempDir;
use common::{bit_stdout, init_repository_dir, object_id, run_bit_command, write_file};
use predicates::prelude::predicate;
use pretty_assertions::assert_eq;
use rstest::rstest;

mod common;

#[rstest]
fn staged_files_are_listed_in_path_order(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(&dir.join("b.txt"), "two");
    write_file(&dir.join("a/nested.txt"), "one");
    write_file(&dir.join("a.txt"), "three");

    run_bit_command(dir, &["update-index", "--add", "b.txt", "a/nested.txt", "a.txt"])
        .assert()
        .success();

    assert_eq!(bit_stdout(dir, &["ls-files"]), "a.txt\na/nested.txt\nb.txt");
    assert_eq!(
        bit_stdout(dir, &["ls-files", "--stage"]),
        format!(
            "100644 {} 0\ta.txt\n100644 {} 0\ta/nested.txt\n100644 {} 0\tb.txt",
            object_id("blob", b"three"),
            object_id("blob", b"one"),
            object_id("blob", b"two"),
        )
    );

    // the blobs went into the object database as well
    run_bit_command(dir, &["cat-file", "-p", &object_id("blob", b"one")])
        .assert()
        .success()
        .stdout("one");

    Ok(())
}

#[rstest]
fn untracked_files_need_the_add_flag(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(&dir.join("new.txt"), "fresh");

    run_bit_command(dir, &["update-index", "new.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing --add option"));

    assert!(!dir.join(".git/index").exists());

    Ok(())
}

#[rstest]
fn tracked_files_are_refreshed_without_the_add_flag(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(&dir.join("file.txt"), "first");
    run_bit_command(dir, &["update-index", "--add", "file.txt"])
        .assert()
        .success();

    write_file(&dir.join("file.txt"), "second");
    run_bit_command(dir, &["update-index", "file.txt"])
        .assert()
        .success();

    assert_eq!(
        bit_stdout(dir, &["ls-files", "-s"]),
        format!("100644 {} 0\tfile.txt", object_id("blob", b"second"))
    );

    Ok(())
}

#[rstest]
fn replacing_a_file_with_a_directory_drops_the_file(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(&dir.join("a"), "file");
    run_bit_command(dir, &["update-index", "--add", "a"])
        .assert()
        .success();

    std::fs::remove_file(dir.join("a"))?;
    write_file(&dir.join("a/inner.txt"), "nested");
    run_bit_command(dir, &["update-index", "--add", "a/inner.txt"])
        .assert()
        .success();

    assert_eq!(bit_stdout(dir, &["ls-files"]), "a/inner.txt");

    Ok(())
}

#[rstest]
fn a_held_index_lock_fails_the_update(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(&dir.join("file.txt"), "content");
    std::fs::write(dir.join(".git/index.lock"), "")?;

    run_bit_command(dir, &["update-index", "--add", "file.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File exists"));

    assert!(!dir.join(".git/index").exists());

    Ok(())
}

#[rstest]
fn git_index_file_redirects_the_index(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    write_file(&dir.join("file.txt"), "content");

    run_bit_command(dir, &["update-index", "--add", "file.txt"])
        .env("GIT_INDEX_FILE", "alternate-index")
        .assert()
        .success();

    assert!(dir.join("alternate-index").is_file());
    assert!(!dir.join(".git/index").exists());
    assert_eq!(bit_stdout(dir, &["ls-files"]), "");

    Ok(())
}

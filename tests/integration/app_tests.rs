use clap::Parser;
use dupfind::cli::Cli;
use dupfind::config::Config;
use dupfind::error::ExitCode;
use dupfind::run_app;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn write(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn run(dir: &TempDir, args: &[&str]) -> anyhow::Result<ExitCode> {
    let config = dir.path().join("no-such-config.toml");
    let mut argv = vec!["dupfind", "-q", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_scan_with_duplicates_succeeds() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("tree");
    write(&root, "a", &[1; 1000]);
    write(&root, "b", &[1; 1000]);
    write(&root, "c", &[2; 1000]);

    let code = run(
        &dir,
        &["scan", root.to_str().unwrap(), "--header-min-size", "0", "--output", "json"],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_scan_without_duplicates() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("tree");
    write(&root, "a", b"one");
    write(&root, "b", b"two!");

    let code = run(&dir, &["scan", root.to_str().unwrap(), "--header-min-size", "0"]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_small_files_stay_below_default_header_threshold() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("tree");
    write(&root, "a", b"same");
    write(&root, "b", b"same");

    let code = run(&dir, &["scan", root.to_str().unwrap()]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_scan_and_move() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("outer").join("photos");
    write(&root, "a", &[b'X'; 1000]);
    write(&root, "b", &[b'X'; 1000]);
    write(&root, "c", &[b'Y'; 1000]);

    let code = run(
        &dir,
        &["scan", root.to_str().unwrap(), "--header-min-size", "0", "--move"],
    )
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(root.join("a").exists());
    assert!(!root.join("b").exists());
    assert!(root.join("c").exists());
    assert!(dir.path().join("outer/dups/photos/b").exists());
}

#[test]
fn test_compare_and_move_theirs() {
    let dir = tempdir().unwrap();
    let ours = dir.path().join("ours");
    let theirs = dir.path().join("theirs");
    write(&ours, "x", &[b'Z'; 300]);
    write(&theirs, "y", &[b'Z'; 300]);
    write(&theirs, "z", &[b'W'; 300]);
    let dest = dir.path().join("moved");

    let code = run(
        &dir,
        &[
            "compare",
            ours.to_str().unwrap(),
            theirs.to_str().unwrap(),
            "--header-min-size",
            "0",
            "--move-theirs",
            "--dest",
            dest.to_str().unwrap(),
            "--output",
            "json",
        ],
    )
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(ours.join("x").exists());
    assert!(!theirs.join("y").exists());
    assert!(theirs.join("z").exists());
    assert!(dest.join("theirs").join("y").exists());
}

#[test]
fn test_compare_overlapping_roots_fails() {
    let dir = tempdir().unwrap();
    let outer = dir.path().join("outer");
    write(&outer, "inner/a", b"data");

    let result = run(
        &dir,
        &[
            "compare",
            outer.to_str().unwrap(),
            outer.join("inner").to_str().unwrap(),
        ],
    );
    assert!(result.is_err());
}

#[test]
fn test_missing_root_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing");
    let err = run(&dir, &["scan", missing.to_str().unwrap()]).unwrap_err();
    assert!(format!("{:#}", err).contains("cannot index"));
}

#[test]
fn test_show_config() {
    let dir = tempdir().unwrap();
    assert_eq!(run(&dir, &["show-config"]).unwrap(), ExitCode::Success);
}

#[test]
fn test_show_config_save_writes_loadable_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf").join("config.toml");
    let argv = ["dupfind", "-q", "--config", path.to_str().unwrap(), "show-config", "--save"];

    let code = run_app(Cli::try_parse_from(argv).unwrap()).unwrap();
    assert_eq!(code, ExitCode::Success);
    let saved: Config = toml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.io_threads, Config::default().io_threads);
    assert_eq!(saved.hash_algorithm, Config::default().hash_algorithm);
}

use clap::Parser;
use dupfind::cli::{Cli, Commands};
use dupfind::config::{Config, ConfigError};
use dupfind::scanner::HashAlgorithm;
use std::fs;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("DUPFIND_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_layers_apply_in_order() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "hash_algorithm = \"sha256\"\nheader_min_size = 4096\nio_threads = 8\n",
    )
    .unwrap();
    std::env::set_var("DUPFIND_HEADER_MIN_SIZE", "2048");

    let loaded = Config::load(Some(&path));
    clear_env();
    let mut config = loaded.unwrap();
    assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
    assert_eq!(config.header_min_size, 2048);
    assert_eq!(config.io_threads, 8);

    let cli = Cli::try_parse_from(["dupfind", "scan", "/data", "--io-threads", "1"]).unwrap();
    let Commands::Scan(args) = cli.command else {
        panic!("Expected Scan command");
    };
    args.stage.apply(&mut config);
    assert_eq!(config.io_threads, 1);
    assert_eq!(config.header_min_size, 2048);
}

#[test]
fn test_bad_type_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = \"many\"\n").unwrap();

    let err = Config::load(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
    assert!(err.to_string().starts_with("invalid configuration"));
}

#[test]
fn test_toml_output_lists_every_field() {
    let toml = Config::default().to_toml().unwrap();
    for key in [
        "hash_algorithm",
        "header_size",
        "chunk_size",
        "header_min_size",
        "io_threads",
        "paranoid",
        "recursive",
        "allow_copy_fallback",
    ] {
        assert!(toml.contains(key), "missing {key}");
    }
    assert!(toml.contains("\"blake3\""));
}

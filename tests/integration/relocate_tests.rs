use dupfind::actions::{select_survivor, RelocateConfig, RelocationScope, Relocator};
use dupfind::duplicates::{FileIndex, FullStageOptions, HeaderStageOptions, StageConfig};
use dupfind::scanner::WalkerConfig;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn staged(root: &Path) -> FileIndex {
    let mut index = FileIndex::build(root, &WalkerConfig::default()).unwrap();
    let config = StageConfig::default();
    index
        .find_header_candidates(&HeaderStageOptions::default().with_min_size(0), &config)
        .unwrap();
    index
        .find_duplicates(&FullStageOptions::default(), &config)
        .unwrap();
    index
}

#[test]
fn test_survivor_is_shortest_path() {
    let paths = [Path::new("/a/bb/f"), Path::new("/a/f")];
    assert_eq!(select_survivor(&paths), Some(1));
}

#[test]
fn test_nested_copy_is_moved_and_top_copy_stays() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("music");
    write(&root, "f", b"track");
    write(&root, "bb/f", b"track");
    write(&root, "bb/g", b"other");

    let mut index = staged(&root);
    let dest = dir.path().join("attic");
    let report = Relocator::default()
        .move_duplicates(&mut index, RelocationScope::Within, Some(&dest))
        .unwrap();

    assert_eq!(report.success_count(), 1);
    assert!(root.join("f").exists());
    assert!(!root.join("bb/f").exists());
    assert!(dest.join("music").join("bb").join("f").exists());
    assert_eq!(fs::read(dest.join("music/bb/f")).unwrap(), b"track");
}

#[test]
fn test_index_is_compacted_and_rescannable() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("docs");
    for name in ["one", "two", "three"] {
        write(&root, name, &[b'D'; 2048]);
    }
    write(&root, "unique", &[b'U'; 10]);

    let mut index = staged(&root);
    assert_eq!(index.len(), 4);

    let report = Relocator::default()
        .move_duplicates(&mut index, RelocationScope::Within, Some(&dir.path().join("out")))
        .unwrap();
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.bytes_moved, 4096);

    assert_eq!(index.len(), 2);
    for (pos, record) in index.records().iter().enumerate() {
        assert!(index.positions_for_size(record.size()).contains(&pos));
        assert!(record.path().exists());
    }
    assert!(index.duplicate_groups().is_empty());

    let config = StageConfig::default();
    index
        .find_header_candidates(&HeaderStageOptions::default().with_min_size(0), &config)
        .unwrap();
    let full = index
        .find_duplicates(&FullStageOptions::default(), &config)
        .unwrap();
    assert_eq!(full.groups, 0);
}

#[test]
fn test_interrupted_relocation_moves_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("pics");
    write(&root, "a", b"same");
    write(&root, "b", b"same");

    let mut index = staged(&root);
    let flag = Arc::new(AtomicBool::new(true));
    let relocator = Relocator::new(RelocateConfig::default().with_shutdown_flag(flag));
    let report = relocator
        .move_duplicates(&mut index, RelocationScope::Within, Some(&dir.path().join("out")))
        .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.success_count(), 0);
    assert!(root.join("a").exists());
    assert!(root.join("b").exists());
    assert_eq!(index.len(), 2);
}

use dupfind::duplicates::{FileIndex, FullStageOptions, HeaderStageOptions, SkipReason, StageConfig};
use dupfind::output::{ScanSummary, TextOutput};
use dupfind::scanner::{FileSource, FsSource, HashAlgorithm, Hasher, WalkerConfig};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[derive(Default)]
struct CountingSource {
    opens: AtomicUsize,
}

impl CountingSource {
    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl FileSource for CountingSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        FsSource.open(path)
    }
}

fn write(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn every_size() -> HeaderStageOptions {
    HeaderStageOptions::default().with_min_size(0)
}

fn run_stages(root: &Path, config: &StageConfig) -> FileIndex {
    let mut index = FileIndex::build(root, &WalkerConfig::default()).unwrap();
    index.find_header_candidates(&every_size(), config).unwrap();
    index
        .find_duplicates(&FullStageOptions::default(), config)
        .unwrap();
    index
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let mut index = FileIndex::build(dir.path(), &WalkerConfig::default()).unwrap();

    let sizes = index.find_size_candidates();
    assert_eq!(sizes.skipped, Some(SkipReason::NoFiles));

    let header = index
        .find_header_candidates(&every_size(), &StageConfig::default())
        .unwrap();
    assert_eq!(header.groups, 0);
    assert!(index.duplicate_groups_list(None).is_empty());
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"content a");
    write(dir.path(), "b.txt", b"content b");
    write(dir.path(), "c.txt", b"content c");

    let index = run_stages(dir.path(), &StageConfig::default());

    assert_eq!(index.len(), 3);
    assert_eq!(index.header_groups().len(), 0);
    assert!(index.duplicate_groups().is_empty());
}

#[test]
fn test_scan_reports_reclaimable_space() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", &[b'X'; 1000]);
    write(dir.path(), "b", &[b'X'; 1000]);
    write(dir.path(), "c", &[b'Y'; 1000]);

    let mut index = FileIndex::build(dir.path(), &WalkerConfig::default()).unwrap();
    let config = StageConfig::default();
    index.find_header_candidates(&every_size(), &config).unwrap();
    let full = index
        .find_duplicates(&FullStageOptions::default(), &config)
        .unwrap();

    assert_eq!(full.groups, 1);
    assert_eq!(full.duplicate_files, 1);
    assert_eq!(full.reclaimable, 1000);

    let groups = index.duplicate_groups_list(None);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].wasted_space(), 1000);
    let names: Vec<_> = groups[0]
        .paths()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    let summary = ScanSummary::new(&index, &full, Duration::ZERO);
    let text = TextOutput::new(&groups, &summary).render();
    assert!(text.contains("Found 1 duplicate groups, 1 duplicate files, 1000.00B reclaimable"));
}

#[test]
fn test_scan_nested_duplicates() {
    let dir = tempdir().unwrap();
    write(dir.path(), "top.bin", b"same bytes");
    write(dir.path(), "deep/er/copy.bin", b"same bytes");

    let index = run_stages(dir.path(), &StageConfig::default());
    assert_eq!(index.duplicate_groups_list(None).len(), 1);

    let mut shallow =
        FileIndex::build(dir.path(), &WalkerConfig::default().with_recursive(false)).unwrap();
    assert_eq!(shallow.len(), 1);
    assert_eq!(shallow.find_size_candidates().candidate_sizes, 0);
}

#[test]
fn test_digests_are_computed_once() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", &[b'X'; 1000]);
    write(dir.path(), "b", &[b'X'; 1000]);
    write(dir.path(), "c", &[b'Y'; 1000]);

    let source = Arc::new(CountingSource::default());
    let config = StageConfig::default().with_hasher(Hasher::new().with_source(source.clone()));
    let mut index = run_stages(dir.path(), &config);

    // three header reads, two full reads
    assert_eq!(source.opens(), 5);

    index
        .find_duplicates(&FullStageOptions::default(), &config)
        .unwrap();
    index.find_header_candidates(&every_size(), &config).unwrap();
    let full = index
        .find_duplicates(&FullStageOptions::default(), &config)
        .unwrap();

    assert_eq!(source.opens(), 5);
    assert_eq!(full.groups, 1);
}

#[test]
fn test_algorithms_agree_on_groups() {
    let dir = tempdir().unwrap();
    for (name, byte) in [("a", 1u8), ("b", 1), ("c", 2), ("d", 2), ("e", 3)] {
        write(dir.path(), name, &[byte; 4096]);
    }

    let blake = run_stages(dir.path(), &StageConfig::default());
    let sha = run_stages(
        dir.path(),
        &StageConfig::default().with_hasher(Hasher::new().with_algorithm(HashAlgorithm::Sha256)),
    );

    let shape = |index: &FileIndex| -> Vec<usize> {
        index
            .duplicate_groups_list(None)
            .iter()
            .map(|g| g.len())
            .collect()
    };
    assert_eq!(shape(&blake), vec![2, 2]);
    assert_eq!(shape(&blake), shape(&sha));
}

#[test]
fn test_limit_and_range_select_sizes() {
    let dir = tempdir().unwrap();
    for size in [100usize, 200, 300] {
        write(dir.path(), &format!("{size}_1"), &vec![7; size]);
        write(dir.path(), &format!("{size}_2"), &vec![7; size]);
    }

    let config = StageConfig::default();
    let mut index = FileIndex::build(dir.path(), &WalkerConfig::default()).unwrap();
    let header = index
        .find_header_candidates(&every_size().with_limit(2), &config)
        .unwrap();
    assert_eq!(header.selected_sizes, 2);
    assert_eq!(index.header_groups().keys().copied().collect::<Vec<_>>(), vec![200, 300]);

    let full = index
        .find_duplicates(
            &FullStageOptions::default().with_min_size(200).with_max_size(400),
            &config,
        )
        .unwrap();
    assert_eq!(full.selected_sizes, 1);
    assert_eq!(index.duplicate_groups().keys().copied().collect::<Vec<_>>(), vec![300]);
}

#[test]
fn test_paranoid_scan_matches_plain_scan() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"identical payload");
    write(dir.path(), "b", b"identical payload");
    write(dir.path(), "c", b"different payload");

    let plain = run_stages(dir.path(), &StageConfig::default());
    let paranoid = run_stages(dir.path(), &StageConfig::default().with_paranoid(true));

    assert_eq!(
        plain.duplicate_groups_list(None)[0].paths(),
        paranoid.duplicate_groups_list(None)[0].paths()
    );
}

use dupfind::actions::{RelocationScope, Relocator};
use dupfind::duplicates::{
    CrossMatcher, FileIndex, MatchError, Side, SkipReason, StageConfig, StageError,
};
use dupfind::scanner::{FileSource, FsSource, Hasher, WalkerConfig};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[derive(Default)]
struct CountingSource {
    opens: AtomicUsize,
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

fn index(root: &Path) -> FileIndex {
    FileIndex::build(root, &WalkerConfig::default()).unwrap()
}

#[test]
fn test_shared_file_is_paired() {
    let dir = tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let archive = dir.path().join("archive");
    write(&inbox, "x", &[b'Q'; 500]);
    write(&inbox, "only-here", &[b'R'; 500]);
    write(&archive, "sub/y", &[b'Q'; 500]);
    write(&archive, "other", &[b'S'; 77]);

    let mut ours = index(&inbox);
    let mut theirs = index(&archive);
    let config = StageConfig::default();

    let (headers, matched) = {
        let mut matcher = CrossMatcher::new(&mut ours, &mut theirs).unwrap();
        assert_eq!(matcher.intersect_sizes(), vec![500]);
        let headers = matcher.intersect_headers(&config).unwrap();
        let matched = matcher.intersect_full_hashes(&headers, None, &config).unwrap();
        (headers, matched)
    };

    assert_eq!(matched.report().pairs, 1);
    assert_eq!(matched.report().ours.files, 1);
    assert_eq!(matched.report().theirs.bytes, 500);

    for (index, side) in [(&mut ours, Side::Ours), (&mut theirs, Side::Theirs)] {
        index.apply_cross_headers(&headers, side).unwrap();
        index.apply_cross_match(&matched, side).unwrap();
    }

    let ours_groups = ours.cross_groups_list(None);
    assert_eq!(ours_groups.len(), 1);
    assert!(ours_groups[0][0].paths()[0].ends_with("x"));
    let theirs_groups = theirs.cross_groups_list(None);
    assert!(theirs_groups[0][0].paths()[0].ends_with("sub/y"));
}

#[test]
fn test_nested_roots_are_rejected_before_reading() {
    let dir = tempdir().unwrap();
    let outer = dir.path().join("outer");
    let inner = outer.join("inner");
    write(&outer, "a", b"data");
    write(&inner, "b", b"data");

    let source = Arc::new(CountingSource::default());
    let _config = StageConfig::default().with_hasher(Hasher::new().with_source(source.clone()));

    let mut a = index(&outer);
    let mut b = index(&inner);
    let result = CrossMatcher::new(&mut a, &mut b);
    assert!(matches!(result, Err(MatchError::OverlappingRoots { .. })));

    let result = CrossMatcher::new(&mut b, &mut a);
    assert!(matches!(result, Err(MatchError::OverlappingRoots { .. })));

    assert_eq!(source.opens.load(Ordering::SeqCst), 0);
}

#[test]
fn test_no_common_sizes_is_a_skip() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    write(&left, "a", b"1");
    write(&right, "b", b"22");

    let mut ours = index(&left);
    let mut theirs = index(&right);
    let config = StageConfig::default();
    let mut matcher = CrossMatcher::new(&mut ours, &mut theirs).unwrap();
    let headers = matcher.intersect_headers(&config).unwrap();

    assert!(headers.is_empty());
    assert_eq!(headers.report().skipped, Some(SkipReason::NoCommonSizes));
}

#[test]
fn test_match_is_stale_after_relocation() {
    let dir = tempdir().unwrap();
    let left = dir.path().join("left");
    let right = dir.path().join("right");
    write(&left, "a", b"shared content");
    write(&right, "b", b"shared content");

    let mut ours = index(&left);
    let mut theirs = index(&right);
    let config = StageConfig::default();
    let matched = {
        let mut matcher = CrossMatcher::new(&mut ours, &mut theirs).unwrap();
        let headers = matcher.intersect_headers(&config).unwrap();
        matcher.intersect_full_hashes(&headers, None, &config).unwrap()
    };
    ours.apply_cross_match(&matched, Side::Ours).unwrap();

    let report = Relocator::default()
        .move_duplicates(&mut ours, RelocationScope::AgainstOther, Some(&dir.path().join("dest")))
        .unwrap();
    assert_eq!(report.success_count(), 1);
    assert!(dir.path().join("dest").join("left").join("a").exists());
    assert!(right.join("b").exists());

    let err = ours.apply_cross_match(&matched, Side::Ours).unwrap_err();
    assert!(matches!(err, StageError::StaleResult { .. }));
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dupfind::duplicates::{FileIndex, FullStageOptions, HeaderStageOptions, StageConfig};
use dupfind::scanner::{HashAlgorithm, Hasher, Walker, WalkerConfig};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// Every third file repeats the content of the first one in its directory.
fn setup_test_dir(depth: usize, files_per_dir: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fill_dir(temp_dir.path(), depth, files_per_dir);
    temp_dir
}

fn fill_dir(path: &Path, depth: usize, files_per_dir: usize) {
    if depth == 0 {
        return;
    }
    fs::create_dir_all(path).expect("Failed to create dir");

    for i in 0..files_per_dir {
        let content = if i % 3 == 0 {
            "shared content in every directory".repeat(64)
        } else {
            format!("{}:{}", path.display(), i).repeat(64)
        };
        fs::write(path.join(format!("file_{i}.txt")), content).expect("Failed to write file");
    }

    if depth > 1 {
        for i in 0..2 {
            fill_dir(&path.join(format!("dir_{i}")), depth - 1, files_per_dir);
        }
    }
}

fn bench_walker(c: &mut Criterion) {
    let temp_dir = setup_test_dir(4, 10);
    let config = WalkerConfig::default();

    c.bench_function("walker_150_files", |b| {
        b.iter(|| {
            let walker = Walker::new(temp_dir.path(), config.clone());
            let files: Vec<_> = walker.walk().collect();
            black_box(files);
        })
    });
}

fn bench_hasher(c: &mut Criterion) {
    let mut group = c.benchmark_group("hasher");

    for size_kb in [1, 1024, 10240] {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("bench_file.dat");
        fs::write(&file_path, vec![b'a'; size_kb * 1024]).expect("Failed to write bench file");

        for algorithm in [HashAlgorithm::Blake3, HashAlgorithm::Sha256] {
            let hasher = Hasher::new().with_algorithm(algorithm);
            group.bench_with_input(
                format!("{}_{}KB", algorithm, size_kb),
                &file_path,
                |b, path| b.iter(|| black_box(hasher.full_digest(path).unwrap())),
            );
        }
        group.bench_with_input(format!("header_{}KB", size_kb), &file_path, |b, path| {
            let hasher = Hasher::new();
            b.iter(|| black_box(hasher.header_digest(path).unwrap()))
        });
    }
    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let temp_dir = setup_test_dir(3, 12);
    let header = HeaderStageOptions::default().with_min_size(0);

    c.bench_function("stages_cold_index", |b| {
        b.iter(|| {
            let mut index = FileIndex::build(temp_dir.path(), &WalkerConfig::default()).unwrap();
            let config = StageConfig::default();
            index.find_header_candidates(&header, &config).unwrap();
            let report = index
                .find_duplicates(&FullStageOptions::default(), &config)
                .unwrap();
            black_box(report);
        })
    });

    // Digests are memoized on the records, so a rerun measures grouping only.
    let mut warm = FileIndex::build(temp_dir.path(), &WalkerConfig::default()).unwrap();
    let config = StageConfig::default();
    warm.find_header_candidates(&header, &config).unwrap();
    c.bench_function("stages_warm_index", |b| {
        b.iter(|| {
            warm.find_header_candidates(&header, &config).unwrap();
            let report = warm
                .find_duplicates(&FullStageOptions::default(), &config)
                .unwrap();
            black_box(report);
        })
    });
}

criterion_group!(benches, bench_walker, bench_hasher, bench_stages);
criterion_main!(benches);

use super::*;
use serde::Deserialize;
use tempfile::{TempDir, tempdir};

fn create_test_storage() -> (StorageManager, TempDir) {
    let temp_dir = tempdir().unwrap();
    let storage = StorageManager::new(&StorageConfig::rooted_at(temp_dir.path())).unwrap();
    (storage, temp_dir)
}

fn write_temp(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Bookmark {
    title: String,
    position_secs: u64,
}

#[test]
fn test_new_creates_all_roots() {
    let (storage, _temp_dir) = create_test_storage();

    for directory in Directory::ALL {
        assert!(storage.root(directory).is_dir(), "{directory} root must exist");
    }
}

#[test]
fn test_resolve_path_creates_nested_subdirectory() {
    let (storage, _temp_dir) = create_test_storage();

    let path = storage
        .resolve_path(Directory::Documents, Some("videos/hd"))
        .unwrap();

    assert!(path.is_dir());
    assert!(path.ends_with("documents/videos/hd"));
}

#[test]
fn test_resolve_path_is_idempotent() {
    let (storage, _temp_dir) = create_test_storage();

    let first = storage.resolve_path(Directory::Caches, Some("thumbs")).unwrap();
    let second = storage.resolve_path(Directory::Caches, Some("thumbs")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_resolve_path_without_subdirectory_is_root() {
    let (storage, _temp_dir) = create_test_storage();

    let path = storage.resolve_path(Directory::Library, None).unwrap();
    assert_eq!(path, storage.root(Directory::Library));

    let empty = storage.resolve_path(Directory::Library, Some("")).unwrap();
    assert_eq!(empty, storage.root(Directory::Library));
}

#[test]
fn test_resolve_path_rejects_parent_components() {
    let (storage, _temp_dir) = create_test_storage();

    let result = storage.resolve_path(Directory::Documents, Some("../escape"));
    assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
}

#[test]
fn test_move_file_into_subdirectory() {
    let (storage, temp_dir) = create_test_storage();
    let source = write_temp(temp_dir.path(), "download.tmp", b"video bytes");

    let relative = storage
        .move_file(&source, Directory::Documents, Some("videos"), "a.mp4")
        .unwrap();

    assert_eq!(relative, "videos/a.mp4");
    assert!(!source.exists(), "source must be moved, not copied");
    let moved = storage.root(Directory::Documents).join("videos/a.mp4");
    assert_eq!(std::fs::read(moved).unwrap(), b"video bytes");
}

#[test]
fn test_move_file_twice_overwrites() {
    let (storage, temp_dir) = create_test_storage();

    let first = write_temp(temp_dir.path(), "one.tmp", b"first version, longer");
    let second = write_temp(temp_dir.path(), "two.tmp", b"second");

    let a = storage
        .move_file(&first, Directory::Documents, Some("videos"), "a.mp4")
        .unwrap();
    let b = storage
        .move_file(&second, Directory::Documents, Some("videos"), "a.mp4")
        .unwrap();

    assert_eq!(a, b, "relative path must be deterministic");
    let content = std::fs::read(storage.root(Directory::Documents).join("videos/a.mp4")).unwrap();
    assert_eq!(content, b"second", "second move must fully replace the first");
}

#[test]
fn test_move_file_without_subdirectory() {
    let (storage, temp_dir) = create_test_storage();
    let source = write_temp(temp_dir.path(), "x.tmp", b"x");

    let relative = storage
        .move_file(&source, Directory::Caches, None, "x.bin")
        .unwrap();

    assert_eq!(relative, "x.bin");
    assert!(storage.file_exists("x.bin", Directory::Caches));
}

#[test]
fn test_move_file_missing_source_fails() {
    let (storage, temp_dir) = create_test_storage();

    let result = storage.move_file(
        &temp_dir.path().join("does-not-exist.tmp"),
        Directory::Documents,
        Some("videos"),
        "a.mp4",
    );

    assert!(matches!(result, Err(StorageError::Io { .. })));
    assert!(!storage.file_exists("videos/a.mp4", Directory::Documents));
}

#[test]
fn test_move_file_rejects_escaping_file_name() {
    let (storage, temp_dir) = create_test_storage();
    let source = write_temp(temp_dir.path(), "x.tmp", b"x");

    let result = storage.move_file(&source, Directory::Documents, Some("videos"), "../../x");
    assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
    assert!(source.exists(), "rejected move must leave the source in place");
}

#[test]
fn test_file_exists_and_check_if_already_exists() {
    let (storage, temp_dir) = create_test_storage();
    assert!(!storage.file_exists("videos/a.mp4", Directory::Documents));
    assert_eq!(
        storage.check_if_already_exists("videos/a.mp4", Directory::Documents),
        None
    );

    let source = write_temp(temp_dir.path(), "a.tmp", b"a");
    storage
        .move_file(&source, Directory::Documents, Some("videos"), "a.mp4")
        .unwrap();

    assert!(storage.file_exists("videos/a.mp4", Directory::Documents));
    assert!(
        !storage.file_exists("videos/a.mp4", Directory::Library),
        "existence is per root"
    );
    assert_eq!(
        storage.check_if_already_exists("videos/a.mp4", Directory::Documents),
        Some("videos/a.mp4".to_string())
    );
}

#[test]
fn test_store_and_retrieve_struct() {
    let (storage, _temp_dir) = create_test_storage();
    let bookmark = Bookmark {
        title: "Episode 1".to_string(),
        position_secs: 754,
    };

    storage
        .store(&bookmark, Directory::Library, Some("bookmarks"), "ep1.json")
        .unwrap();
    let restored: Option<Bookmark> = storage
        .retrieve("ep1.json", Directory::Library, Some("bookmarks"))
        .unwrap();

    assert_eq!(restored, Some(bookmark));
}

#[test]
fn test_store_overwrites_existing_value() {
    let (storage, _temp_dir) = create_test_storage();

    storage
        .store(&vec![1, 2, 3], Directory::Caches, None, "numbers.json")
        .unwrap();
    storage
        .store(&vec![4], Directory::Caches, None, "numbers.json")
        .unwrap();

    let numbers: Option<Vec<u32>> = storage
        .retrieve("numbers.json", Directory::Caches, None)
        .unwrap();
    assert_eq!(numbers, Some(vec![4]));
}

#[test]
fn test_store_leaves_no_staging_file() {
    let (storage, _temp_dir) = create_test_storage();

    storage
        .store(&"value", Directory::Caches, Some("s"), "v.json")
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(storage.root(Directory::Caches).join("s"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["v.json".to_string()]);
}

#[test]
fn test_retrieve_missing_file_is_none() {
    let (storage, _temp_dir) = create_test_storage();

    let value: Option<Bookmark> = storage
        .retrieve("missing.json", Directory::Library, Some("bookmarks"))
        .unwrap();
    assert!(value.is_none());
}

#[test]
fn test_retrieve_with_wrong_type_is_decode_error() {
    let (storage, _temp_dir) = create_test_storage();
    storage
        .store(&vec!["not", "a", "bookmark"], Directory::Library, None, "b.json")
        .unwrap();

    let result = storage.retrieve::<Bookmark>("b.json", Directory::Library, None);

    match result {
        Err(err @ StorageError::Decode { .. }) => assert!(err.is_fatal()),
        other => panic!("expected Decode error, got {other:?}"),
    }
}

#[test]
fn test_clear_removes_direct_children_including_directories() {
    let (storage, _temp_dir) = create_test_storage();
    let videos = storage.resolve_path(Directory::Documents, Some("videos")).unwrap();
    std::fs::write(videos.join("a.mp4"), b"a").unwrap();
    std::fs::write(videos.join("b.mp4"), b"b").unwrap();
    storage
        .store(&"x", Directory::Documents, Some("videos/hd"), "c.json")
        .unwrap();

    storage.clear(Directory::Documents, Some("videos")).unwrap();

    assert!(!storage.file_exists("videos/a.mp4", Directory::Documents));
    assert!(!storage.file_exists("videos/b.mp4", Directory::Documents));
    assert!(
        !storage.file_exists("videos/hd", Directory::Documents),
        "child directories go with their contents"
    );
    assert!(videos.is_dir(), "the cleared directory itself is kept");
    assert_eq!(std::fs::read_dir(&videos).unwrap().count(), 0);
}

#[test]
fn test_clear_leaves_siblings_and_parent_untouched() {
    let (storage, _temp_dir) = create_test_storage();
    storage
        .store(&1u8, Directory::Caches, Some("c/nested"), "x.json")
        .unwrap();
    storage.store(&2u8, Directory::Caches, Some("c"), "y.json").unwrap();
    storage.store(&3u8, Directory::Caches, None, "keep.json").unwrap();
    storage
        .store(&4u8, Directory::Caches, Some("other"), "keep.json")
        .unwrap();

    storage.clear(Directory::Caches, Some("c")).unwrap();

    assert!(!storage.file_exists("c/y.json", Directory::Caches));
    assert!(!storage.file_exists("c/nested", Directory::Caches));
    assert!(storage.file_exists("keep.json", Directory::Caches));
    assert!(storage.file_exists("other/keep.json", Directory::Caches));
}

#[test]
fn test_clear_missing_directory_is_noop() {
    let (storage, _temp_dir) = create_test_storage();

    assert!(storage.clear(Directory::Caches, Some("never-created")).is_ok());
}

#[test]
fn test_remove_file() {
    let (storage, _temp_dir) = create_test_storage();
    storage
        .store(&1u8, Directory::Caches, Some("x"), "one.json")
        .unwrap();
    assert!(storage.file_exists("x/one.json", Directory::Caches));

    storage.remove_file("x/one.json", Directory::Caches).unwrap();

    assert!(!storage.file_exists("x/one.json", Directory::Caches));
}

#[test]
fn test_remove_missing_file_is_noop() {
    let (storage, _temp_dir) = create_test_storage();

    assert!(storage.remove_file("nothing/here.bin", Directory::Caches).is_ok());
}

#[test]
fn test_remove_file_rejects_absolute_path() {
    let (storage, _temp_dir) = create_test_storage();

    let result = storage.remove_file("/etc/hosts", Directory::Caches);
    assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
}

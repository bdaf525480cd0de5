use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use envloader::{EnvLoader, Error, ParseErrorKind, RequiredKeys, TargetEnv};

#[test]
fn override_existing_false_skips_existing_values() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=from_file\nB=2\n");

    let mut loader = EnvLoader::new()
        .path(&file)
        .target(TargetEnv::from_memory(seed(&[("A", "existing")])))
        .override_existing(false);

    let report = loader.load().expect("load should succeed");
    assert_eq!(report.files_read, 1);
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped_existing, 1);

    let map = loader.target_env().as_memory().expect("memory target");
    assert_eq!(map.get("A").expect("A should exist"), "existing");
    assert_eq!(map.get("B").expect("B should exist"), "2");
}

#[test]
fn override_existing_true_replaces_values() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=from_file\n");

    let mut loader = EnvLoader::new()
        .path(&file)
        .target(TargetEnv::from_memory(seed(&[("A", "existing")])))
        .override_existing(true);

    let report = loader.load().expect("load should succeed");
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped_existing, 0);

    let map = loader.target_env().as_memory().expect("memory target");
    assert_eq!(map.get("A").expect("A should exist"), "from_file");
}

#[test]
fn load_never_removes_unrelated_keys() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=1\n");

    let mut loader = EnvLoader::new()
        .path(&file)
        .target(TargetEnv::from_memory(seed(&[("UNRELATED", "kept")])))
        .override_existing(true);
    loader.load().expect("load should succeed");

    let map = loader.into_target().into_memory().expect("memory target");
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("UNRELATED").expect("UNRELATED should exist"), "kept");
}

#[test]
fn multi_file_load_uses_last_file_precedence() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let first = dir.path().join(".env.base");
    let second = dir.path().join(".env.local");
    write_file(&first, "A=base\nB=base\n");
    write_file(&second, "B=local\nC=local\n");

    let mut loader = EnvLoader::new()
        .paths([first, second])
        .target(TargetEnv::memory());

    let report = loader.load().expect("load should succeed");
    assert_eq!(report.files_read, 2);
    assert_eq!(report.loaded, 3);
    assert_eq!(report.skipped_existing, 0);

    let map = loader.target_env().as_memory().expect("memory target");
    assert_eq!(map.get("A").expect("A should exist"), "base");
    assert_eq!(map.get("B").expect("B should exist"), "local");
    assert_eq!(map.get("C").expect("C should exist"), "local");
}

#[test]
fn missing_file_returns_not_found() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let missing = dir.path().join("missing.env");

    let mut loader = EnvLoader::new().path(&missing);
    let err = loader.load().expect_err("expected not found");

    match err {
        Error::NotFound { path } => assert_eq!(path, missing),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn directory_returns_not_found() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let err = envloader::parse(dir.path()).expect_err("expected not found");
    assert!(matches!(err, Error::NotFound { .. }), "unexpected error: {err:?}");
}

#[cfg(unix)]
#[test]
fn unreadable_file_returns_not_readable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=1\n");
    std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o000))
        .expect("failed to change permissions");

    if std::fs::read(&file).is_ok() {
        // Privileged users bypass file permissions.
        return;
    }

    let err = envloader::parse(&file).expect_err("expected not readable");
    assert!(matches!(err, Error::NotReadable { .. }), "unexpected error: {err:?}");
}

#[test]
fn invalid_key_aborts_before_any_write() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=ok\nINVALID-KEY=value\n");

    let mut loader = EnvLoader::new().path(file).target(TargetEnv::memory());
    let err = loader.load().expect_err("expected parse error");

    match err {
        Error::Parse(parse_err) => {
            assert_eq!(
                parse_err.kind,
                ParseErrorKind::InvalidKey("INVALID-KEY".to_owned())
            );
            assert_eq!(parse_err.line, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let map = loader.target_env().as_memory().expect("memory target");
    assert!(map.is_empty());
}

#[test]
fn required_keys_as_delimited_string_tolerate_empty_parts() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=one\nB=two\n");

    for required in ["A,B,", "A,,B", " A , B "] {
        let mut loader = EnvLoader::new()
            .path(&file)
            .required(required)
            .target(TargetEnv::memory());
        loader.load().expect("load should succeed");
    }
}

#[test]
fn required_keys_as_list() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=one\nB=two\n");

    let mut loader = EnvLoader::new()
        .path(&file)
        .required(["A", "B"])
        .target(TargetEnv::memory());
    loader.load().expect("load should succeed");
}

#[test]
fn missing_required_key_is_named() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=one\n");

    let mut loader = EnvLoader::new()
        .path(&file)
        .required(RequiredKeys::from(["C"]))
        .target(TargetEnv::memory());
    let err = loader.load().expect_err("expected missing key");

    match &err {
        Error::MissingRequiredKey { key } => assert_eq!(key, "C"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "missing required key: C");
}

#[test]
fn required_key_is_checked_after_skipping_existing() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=from_file\n");

    let mut loader = EnvLoader::new()
        .path(&file)
        .required("A,PRESET")
        .target(TargetEnv::from_memory(seed(&[
            ("A", "existing"),
            ("PRESET", "set"),
        ])));
    let report = loader.load().expect("load should succeed");

    assert_eq!(report.loaded, 0);
    assert_eq!(report.skipped_existing, 1);
}

#[test]
fn parse_only_leaves_target_untouched() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "ONE=one\nTWO=two\n");

    let loader = EnvLoader::new().path(&file).target(TargetEnv::memory());
    let parsed = loader.parse_only().expect("parse should succeed");

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed["ONE"], "one");
    assert_eq!(parsed["TWO"], "two");
    let map = loader.target_env().as_memory().expect("memory target");
    assert!(map.is_empty());
}

#[test]
fn load_writes_process_environment() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(
        &file,
        "ENVLOADER_TEST_PROCESS_NEW=new\nENVLOADER_TEST_PROCESS_KEEP=file\n",
    );

    // SAFETY: process-environment access in this test binary is serialized
    // through `env_lock`.
    unsafe {
        std::env::set_var("ENVLOADER_TEST_PROCESS_KEEP", "original");
        let report = envloader::load(&file, false, "ENVLOADER_TEST_PROCESS_NEW")
            .expect("load should succeed");
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped_existing, 1);
    }

    assert_eq!(
        std::env::var("ENVLOADER_TEST_PROCESS_NEW").as_deref(),
        Ok("new")
    );
    assert_eq!(
        std::env::var("ENVLOADER_TEST_PROCESS_KEEP").as_deref(),
        Ok("original")
    );

    // SAFETY: see above.
    unsafe {
        envloader::load(&file, true, RequiredKeys::new()).expect("load should succeed");
    }
    assert_eq!(
        std::env::var("ENVLOADER_TEST_PROCESS_KEEP").as_deref(),
        Ok("file")
    );
}

#[test]
fn process_target_rejects_nul_values_before_writing() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(
        &file,
        "ENVLOADER_TEST_NUL_FIRST=ok\nENVLOADER_TEST_NUL=\"a\\0b\"\n",
    );

    // SAFETY: process-environment access in this test binary is serialized
    // through `env_lock`.
    let err = unsafe { envloader::load(&file, false, RequiredKeys::new()) }
        .expect_err("expected invalid value");

    match &err {
        Error::InvalidValue { key } => assert_eq!(key, "ENVLOADER_TEST_NUL"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(std::env::var_os("ENVLOADER_TEST_NUL_FIRST").is_none());
    assert!(std::env::var_os("ENVLOADER_TEST_NUL").is_none());
}

#[test]
fn memory_target_keeps_nul_values() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let file = dir.path().join(".env");
    write_file(&file, "A=\"a\\0b\"\n");

    let mut loader = EnvLoader::new().path(&file).target(TargetEnv::memory());
    loader.load().expect("load should succeed");

    let map = loader.target_env().as_memory().expect("memory target");
    assert_eq!(map.get("A").expect("A should exist"), "a\0b");
}

#[test]
fn dotenv_reads_current_directory() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_file(&dir.path().join(".env"), "ENVLOADER_TEST_DOTENV=here\n");

    let report = with_current_dir(dir.path(), || {
        // SAFETY: process-environment access in this test binary is
        // serialized through `env_lock`.
        unsafe { envloader::dotenv() }.expect("load should succeed")
    });

    assert_eq!(report.files_read, 1);
    assert_eq!(std::env::var("ENVLOADER_TEST_DOTENV").as_deref(), Ok("here"));
}

fn seed(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn write_file(path: &Path, content: &str) {
    std::fs::write(path, content).expect("failed to write test file");
}

fn with_current_dir<R>(dir: &Path, f: impl FnOnce() -> R) -> R {
    let _guard = CurrentDirGuard::enter(dir);
    f()
}

fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct CurrentDirGuard {
    original: PathBuf,
}

impl CurrentDirGuard {
    fn enter(dir: &Path) -> Self {
        let original = std::env::current_dir().expect("failed to read current dir");
        std::env::set_current_dir(dir).expect("failed to set current dir");
        Self { original }
    }
}

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        std::env::set_current_dir(&self.original).expect("failed to restore current dir");
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::env::TargetEnv;
use crate::error::Error;
use crate::model::{EnvMap, LoadReport, QuoteMode, RequiredKeys};
use crate::parser::parse_lines;

const DEFAULT_FILE: &str = ".env";

/// Parse a `.env` file without touching any environment.
pub fn parse(path: impl AsRef<Path>) -> Result<EnvMap, Error> {
    EnvLoader::new().path(path).parse_only()
}

/// Load a `.env` file into the process environment, then check that every
/// `required` key is set.
///
/// Existing variables are kept unless `override_existing` is true.
///
/// # Safety
///
/// The caller must ensure no other threads concurrently read or write the
/// process environment while this runs.
pub unsafe fn load(
    path: impl AsRef<Path>,
    override_existing: bool,
    required: impl Into<RequiredKeys>,
) -> Result<LoadReport, Error> {
    // SAFETY: forwarded to the caller.
    let target = unsafe { TargetEnv::process() };
    let mut loader = EnvLoader::new()
        .path(path)
        .override_existing(override_existing)
        .required(required)
        .target(target);
    loader.load()
}

/// Load `.env` from the current working directory into the process
/// environment.
///
/// # Safety
///
/// Same contract as [`load`].
pub unsafe fn dotenv() -> Result<LoadReport, Error> {
    unsafe { load(DEFAULT_FILE, false, RequiredKeys::new()) }
}

/// Builder-style dotenv loader.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    paths: Vec<PathBuf>,
    override_existing: bool,
    required: RequiredKeys,
    quote_mode: QuoteMode,
    target: TargetEnv,
}

impl EnvLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.paths
            .extend(paths.into_iter().map(|path| path.as_ref().to_path_buf()));
        self
    }

    pub fn override_existing(mut self, override_existing: bool) -> Self {
        self.override_existing = override_existing;
        self
    }

    /// Add keys that must be present in the target after loading.
    ///
    /// Accepts a comma-separated string or a list of names; repeated calls
    /// accumulate.
    pub fn required(mut self, keys: impl Into<RequiredKeys>) -> Self {
        self.required.extend_from(keys.into());
        self
    }

    pub fn quote_mode(mut self, quote_mode: QuoteMode) -> Self {
        self.quote_mode = quote_mode;
        self
    }

    pub fn target(mut self, target: TargetEnv) -> Self {
        self.target = target;
        self
    }

    pub fn target_env(&self) -> &TargetEnv {
        &self.target
    }

    pub fn target_env_mut(&mut self) -> &mut TargetEnv {
        &mut self.target
    }

    pub fn into_target(self) -> TargetEnv {
        self.target
    }

    /// Parse every configured file and merge them, later files winning.
    pub fn parse_only(&self) -> Result<EnvMap, Error> {
        let (entries, _) = self.collect_entries()?;
        Ok(entries)
    }

    /// Write parsed entries into the target, then verify required keys.
    ///
    /// Required keys are checked against the target, so a key set before
    /// loading satisfies the requirement. The first missing key fails the
    /// load; values written before that point stay in the target.
    ///
    /// A process target rejects values containing NUL before anything is
    /// written.
    pub fn load(&mut self) -> Result<LoadReport, Error> {
        let (entries, files_read) = self.collect_entries()?;
        if self.target.is_process() {
            check_process_values(&entries)?;
        }
        let mut report = LoadReport {
            files_read,
            ..LoadReport::default()
        };

        for (key, value) in &entries {
            if !self.override_existing && self.target.contains_key(key) {
                report.skipped_existing += 1;
                tracing::debug!(key = %key, "skipping existing key");
                continue;
            }

            self.target.set_var(key, value);
            report.loaded += 1;
        }

        self.check_required()?;
        Ok(report)
    }

    fn check_required(&self) -> Result<(), Error> {
        match self
            .required
            .iter()
            .find(|key| !self.target.contains_key(key))
        {
            Some(key) => Err(Error::MissingRequiredKey {
                key: key.to_owned(),
            }),
            None => Ok(()),
        }
    }

    fn collect_entries(&self) -> Result<(EnvMap, usize), Error> {
        let mut merged_entries = EnvMap::new();
        let mut files_read = 0usize;

        for path in self.effective_paths() {
            let parsed = parse_file(&path, self.quote_mode)?;
            files_read += 1;
            merged_entries.extend(parsed);
        }

        Ok((merged_entries, files_read))
    }

    fn effective_paths(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![PathBuf::from(DEFAULT_FILE)]
        } else {
            self.paths.clone()
        }
    }
}

/// The process environment cannot hold NUL bytes.
fn check_process_values(entries: &EnvMap) -> Result<(), Error> {
    match entries.iter().find(|(_, value)| value.contains('\0')) {
        Some((key, _)) => Err(Error::InvalidValue { key: key.clone() }),
        None => Ok(()),
    }
}

fn parse_file(path: &Path, quote_mode: QuoteMode) -> Result<EnvMap, Error> {
    let bytes = read_source(path)?;
    let content = std::str::from_utf8(&bytes).map_err(|source| Error::InvalidEncoding {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = parse_lines(content, quote_mode).map_err(|err| err.with_path(path))?;
    tracing::debug!(path = %path.display(), entries = entries.len(), "parsed env file");
    Ok(entries)
}

/// Read a regular file. Anything that is not an existing regular file,
/// directories included, is reported as not found.
fn read_source(path: &Path) -> Result<Vec<u8>, Error> {
    let is_file = std::fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(Error::NotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::PermissionDenied => Error::NotReadable {
            path: path.to_path_buf(),
            source,
        },
        ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

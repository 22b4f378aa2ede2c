//! Baseline store.
//!
//! Owns every image read and write. Layout under the root directory:
//!
//! ```text
//! <root>/<channel>/<locale>/<Class>/<step>[_<suffix>].png                      baselines
//! <root>/actual/<channel>/<locale>/<Class>/<step>[_<suffix>].png               captures
//! <root>/diff/<channel>/<locale>/<Class>/<step>[_<suffix>]_diff.png            diff images
//! <root>/backup/<channel>/<locale>/<Class>/<step>[_<suffix>]_backup_<ts>.png   archived baselines
//! ```
//!
//! Baselines are only ever overwritten through [`BaselineStore::update_baseline`],
//! which archives the previous version first. Captures and diffs are run
//! artifacts and are overwritten freely.

use crate::config::StoreConfig;
use crate::result::{PixelgateError, PixelgateResult};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const ACTUAL_DIR: &str = "actual";
const DIFF_DIR: &str = "diff";
const BACKUP_DIR: &str = "backup";
const RESERVED: [&str; 3] = [ACTUAL_DIR, DIFF_DIR, BACKUP_DIR];

/// Collapse a raw name into a file-system safe token.
///
/// Non-alphanumeric characters become `_`, runs of `_` collapse to one, and
/// leading/trailing `_` are stripped.
///
/// # Errors
///
/// Returns `InvalidArgument` if nothing is left after sanitizing
pub fn sanitize_token(raw: &str) -> PixelgateResult<String> {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let ch = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        return Err(PixelgateError::invalid_argument(format!(
            "'{raw}' has no usable characters for a file name"
        )));
    }
    Ok(trimmed.to_string())
}

/// Identifies one baseline: test class, step, and optional suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineIdentity {
    /// Test class identifier
    pub class_name: String,
    /// Test step identifier
    pub step_name: String,
    /// Optional disambiguating suffix (e.g. a step counter)
    pub suffix: Option<String>,
}

impl BaselineIdentity {
    /// Create an identity without suffix
    #[must_use]
    pub fn new(class_name: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            step_name: step_name.into(),
            suffix: None,
        }
    }

    /// Attach a suffix
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Sanitized class directory name
    ///
    /// # Errors
    ///
    /// Returns error if the class name sanitizes to nothing
    pub fn class_token(&self) -> PixelgateResult<String> {
        sanitize_token(&self.class_name)
    }

    /// Sanitized file stem, `<step>[_<suffix>]`
    ///
    /// # Errors
    ///
    /// Returns error if the step or suffix sanitizes to nothing
    pub fn file_stem(&self) -> PixelgateResult<String> {
        let step = sanitize_token(&self.step_name)?;
        match &self.suffix {
            Some(suffix) => Ok(format!("{step}_{}", sanitize_token(suffix)?)),
            None => Ok(step),
        }
    }

    /// Stable key, `<Class>/<stem>`
    ///
    /// # Errors
    ///
    /// Returns error if any component sanitizes to nothing
    pub fn key(&self) -> PixelgateResult<String> {
        Ok(format!("{}/{}", self.class_token()?, self.file_stem()?))
    }
}

impl fmt::Display for BaselineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Ok(key) => f.write_str(&key),
            Err(_) => write!(f, "{}/{}", self.class_name, self.step_name),
        }
    }
}

/// Outcome of [`BaselineStore::update_baseline`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineUpdate {
    /// Path of the new baseline
    pub path: PathBuf,
    /// Where the previous baseline was archived, if there was one
    pub backup: Option<PathBuf>,
}

/// Outcome of [`BaselineStore::cleanup`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Capture files removed
    pub actual_removed: usize,
    /// Diff files removed
    pub diff_removed: usize,
}

impl CleanupReport {
    /// Total files removed
    #[must_use]
    pub const fn total(&self) -> usize {
        self.actual_removed + self.diff_removed
    }
}

/// File-system baseline store
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
    channel: String,
    locale: String,
}

impl BaselineStore {
    /// Create a store rooted at `root` for one channel and locale
    ///
    /// # Errors
    ///
    /// Returns error if channel or locale sanitize to nothing or collide with
    /// an artifact directory name
    pub fn new(root: impl Into<PathBuf>, channel: &str, locale: &str) -> PixelgateResult<Self> {
        let channel = sanitize_token(channel)?;
        let locale = sanitize_token(locale)?;
        if RESERVED.contains(&channel.as_str()) {
            return Err(PixelgateError::invalid_argument(format!(
                "channel '{channel}' is reserved for store artifacts"
            )));
        }
        Ok(Self {
            root: root.into(),
            channel,
            locale,
        })
    }

    /// Create a store from configuration
    ///
    /// # Errors
    ///
    /// See [`Self::new`]
    pub fn from_config(config: &StoreConfig) -> PixelgateResult<Self> {
        Self::new(config.root.clone(), &config.channel, &config.locale)
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scoped(&self, base: PathBuf, id: &BaselineIdentity) -> PixelgateResult<PathBuf> {
        Ok(base.join(&self.channel).join(&self.locale).join(id.class_token()?))
    }

    fn baseline_dir(&self, id: &BaselineIdentity) -> PixelgateResult<PathBuf> {
        self.scoped(self.root.clone(), id)
    }

    /// Path of the baseline for `id`
    ///
    /// # Errors
    ///
    /// Returns error if the identity does not sanitize
    pub fn baseline_path(&self, id: &BaselineIdentity) -> PixelgateResult<PathBuf> {
        Ok(self.baseline_dir(id)?.join(format!("{}.png", id.file_stem()?)))
    }

    /// Path of the latest capture for `id`
    ///
    /// # Errors
    ///
    /// Returns error if the identity does not sanitize
    pub fn actual_path(&self, id: &BaselineIdentity) -> PixelgateResult<PathBuf> {
        Ok(self
            .scoped(self.root.join(ACTUAL_DIR), id)?
            .join(format!("{}.png", id.file_stem()?)))
    }

    /// Path of the latest diff image for `id`
    ///
    /// # Errors
    ///
    /// Returns error if the identity does not sanitize
    pub fn diff_path(&self, id: &BaselineIdentity) -> PixelgateResult<PathBuf> {
        Ok(self
            .scoped(self.root.join(DIFF_DIR), id)?
            .join(format!("{}_diff.png", id.file_stem()?)))
    }

    fn backup_dir(&self, id: &BaselineIdentity) -> PixelgateResult<PathBuf> {
        self.scoped(self.root.join(BACKUP_DIR), id)
    }

    /// Whether a baseline exists for `id`
    ///
    /// # Errors
    ///
    /// Returns error if the identity does not sanitize
    pub fn exists(&self, id: &BaselineIdentity) -> PixelgateResult<bool> {
        Ok(self.baseline_path(id)?.is_file())
    }

    /// Load the baseline for `id`
    ///
    /// # Errors
    ///
    /// Returns `BaselineNotFound` if missing, or an image error if unreadable
    pub fn load_baseline(&self, id: &BaselineIdentity) -> PixelgateResult<RgbaImage> {
        let path = self.baseline_path(id)?;
        if !path.is_file() {
            return Err(PixelgateError::BaselineNotFound { key: id.key()? });
        }
        load_image(&path)
    }

    /// Load the latest capture for `id`
    ///
    /// # Errors
    ///
    /// Returns `ArtifactNotFound` if missing, or an image error if unreadable
    pub fn load_actual(&self, id: &BaselineIdentity) -> PixelgateResult<RgbaImage> {
        let path = self.actual_path(id)?;
        if !path.is_file() {
            return Err(PixelgateError::ArtifactNotFound {
                path: path.display().to_string(),
            });
        }
        load_image(&path)
    }

    /// Store a first baseline for `id`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a baseline already exists, or an I/O error
    pub fn save_baseline(&self, id: &BaselineIdentity, image: &RgbaImage) -> PixelgateResult<PathBuf> {
        let path = self.baseline_path(id)?;
        if path.exists() {
            return Err(PixelgateError::invalid_argument(format!(
                "baseline {} already exists; use update_baseline to replace it",
                id.key()?
            )));
        }
        save_png(&path, image)?;
        tracing::info!(key = %id, path = %path.display(), "baseline created");
        Ok(path)
    }

    /// Replace the baseline for `id`, archiving any existing one first
    ///
    /// # Errors
    ///
    /// Returns error if the backup copy or the write fails; the previous
    /// baseline is left in place when the backup fails
    pub fn update_baseline(
        &self,
        id: &BaselineIdentity,
        image: &RgbaImage,
    ) -> PixelgateResult<BaselineUpdate> {
        let path = self.baseline_path(id)?;
        let backup = if path.is_file() {
            let dir = self.backup_dir(id)?;
            fs::create_dir_all(&dir)?;
            let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
            let stem = id.file_stem()?;
            let mut backup = dir.join(format!("{stem}_backup_{stamp}.png"));
            let mut attempt = 1;
            while backup.exists() {
                backup = dir.join(format!("{stem}_backup_{stamp}_{attempt}.png"));
                attempt += 1;
            }
            fs::copy(&path, &backup)?;
            tracing::info!(key = %id, backup = %backup.display(), "archived previous baseline");
            Some(backup)
        } else {
            None
        };

        save_png(&path, image)?;
        tracing::info!(key = %id, path = %path.display(), "baseline updated");
        Ok(BaselineUpdate { path, backup })
    }

    /// Write the latest capture for `id`, overwriting any previous one
    ///
    /// # Errors
    ///
    /// Returns error if encoding or writing fails
    pub fn save_actual(&self, id: &BaselineIdentity, image: &RgbaImage) -> PixelgateResult<PathBuf> {
        let path = self.actual_path(id)?;
        save_png(&path, image)?;
        Ok(path)
    }

    /// Write the latest diff image for `id`, overwriting any previous one
    ///
    /// # Errors
    ///
    /// Returns error if encoding or writing fails
    pub fn save_diff(&self, id: &BaselineIdentity, image: &RgbaImage) -> PixelgateResult<PathBuf> {
        let path = self.diff_path(id)?;
        save_png(&path, image)?;
        Ok(path)
    }

    /// Remove the baseline for `id`; backups are kept
    ///
    /// # Errors
    ///
    /// Returns error if removal fails
    pub fn delete_baseline(&self, id: &BaselineIdentity) -> PixelgateResult<bool> {
        remove_if_present(&self.baseline_path(id)?)
    }

    /// Remove the capture and diff artifacts for `id`
    ///
    /// # Errors
    ///
    /// Returns error if removal fails
    pub fn delete_artifacts(&self, id: &BaselineIdentity) -> PixelgateResult<usize> {
        let removed = [self.actual_path(id)?, self.diff_path(id)?]
            .iter()
            .map(|path| remove_if_present(path))
            .collect::<PixelgateResult<Vec<bool>>>()?;
        Ok(removed.into_iter().filter(|r| *r).count())
    }

    /// Archived baselines for `id`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the backup directory cannot be read
    pub fn list_backups(&self, id: &BaselineIdentity) -> PixelgateResult<Vec<PathBuf>> {
        let dir = self.backup_dir(id)?;
        let prefix = format!("{}_backup_", id.file_stem()?);
        let mut backups: Vec<PathBuf> = list_files(&dir)?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// Keys (`<Class>/<stem>`) of every baseline for this channel and locale
    ///
    /// # Errors
    ///
    /// Returns error if the directory tree cannot be read
    pub fn list_baselines(&self) -> PixelgateResult<Vec<String>> {
        let scope = self.root.join(&self.channel).join(&self.locale);
        let mut keys: Vec<String> = walk_files(&scope)?
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .filter_map(|path| {
                let rel = path.strip_prefix(&scope).ok()?.with_extension("");
                let parts: Vec<_> = rel.iter().map(|p| p.to_string_lossy().into_owned()).collect();
                Some(parts.join("/"))
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Remove capture and diff artifacts older than `max_age`.
    ///
    /// Baselines and backups are never touched.
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be read or a file cannot be removed
    pub fn cleanup(&self, max_age: Duration) -> PixelgateResult<CleanupReport> {
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let sweep = |dir: PathBuf| -> PixelgateResult<usize> {
            let mut removed = 0;
            for path in walk_files(&dir)? {
                let modified = fs::metadata(&path)?.modified()?;
                if modified <= cutoff {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
            Ok(removed)
        };

        let report = CleanupReport {
            actual_removed: sweep(self.root.join(ACTUAL_DIR))?,
            diff_removed: sweep(self.root.join(DIFF_DIR))?,
        };
        tracing::info!(
            actual = report.actual_removed,
            diff = report.diff_removed,
            "cleaned up stale artifacts"
        );
        Ok(report)
    }
}

/// Decode an image file into RGBA
///
/// # Errors
///
/// Returns error if the file cannot be read or decoded
pub fn load_image(path: &Path) -> PixelgateResult<RgbaImage> {
    let img = image::open(path).map_err(|e| {
        PixelgateError::invalid_input(format!("cannot read image {}: {e}", path.display()))
    })?;
    Ok(img.to_rgba8())
}

/// Encode RGBA pixels as PNG
///
/// # Errors
///
/// Returns error if encoding fails
pub fn encode_png(image: &RgbaImage) -> PixelgateResult<Vec<u8>> {
    let (width, height) = image.dimensions();
    let mut output = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut output, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);

        let mut writer = encoder
            .write_header()
            .map_err(|e| PixelgateError::ImageProcessing {
                message: format!("Failed to write PNG header: {e}"),
            })?;
        writer
            .write_image_data(image.as_raw())
            .map_err(|e| PixelgateError::ImageProcessing {
                message: format!("Failed to write PNG data: {e}"),
            })?;
    }
    Ok(output)
}

/// Encode and write a PNG, creating parent directories.
///
/// Writes to a sibling temporary file and renames it into place so readers
/// never see a half-written image.
///
/// # Errors
///
/// Returns error if encoding or any file operation fails
pub fn save_png(path: &Path, image: &RgbaImage) -> PixelgateResult<()> {
    let data = encode_png(image)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("png.tmp");
    fs::write(&tmp, data)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> PixelgateResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn list_files(dir: &Path) -> PixelgateResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

fn walk_files(dir: &Path) -> PixelgateResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        if !current.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    Ok(files)
}

//! Bounded, chunkable directory scanner.

use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use filescope_core::{
    FileEntry, ScanConfig, ScanError, ScanStats, ScanWarning, WarningKind, normalize_path,
    relative_path,
};
use filescope_ignore::{Matcher, PatternResolver};

use crate::classify::Classifier;
use crate::guard::AppDirectoryGuard;
use crate::progress::ScanProgress;

/// Walks a root and produces classified [`FileEntry`] records.
#[derive(Debug)]
pub struct DirectoryScanner {
    config: ScanConfig,
    resolver: Arc<PatternResolver>,
    classifier: Arc<Classifier>,
    guard: AppDirectoryGuard,
}

impl DirectoryScanner {
    /// Create a scanner with the default token counter.
    pub fn new(config: ScanConfig, resolver: Arc<PatternResolver>) -> Self {
        let classifier = Classifier::new(&config);
        Self::with_classifier(config, resolver, classifier)
    }

    /// Create a scanner with a specific classifier.
    pub fn with_classifier(
        config: ScanConfig,
        resolver: Arc<PatternResolver>,
        classifier: Classifier,
    ) -> Self {
        let guard = AppDirectoryGuard::from_config(config.app_directory.as_deref());
        Self {
            config,
            resolver,
            classifier: Arc::new(classifier),
            guard,
        }
    }

    /// Replace the application directory guard.
    pub fn with_guard(mut self, guard: AppDirectoryGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Scanner configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Pattern resolver shared with the scanner.
    pub fn resolver(&self) -> &Arc<PatternResolver> {
        &self.resolver
    }

    /// Check whether `root` is the guarded application directory.
    pub fn is_app_directory(&self, root: &Path) -> bool {
        self.guard.is_guarded(&normalize_path(root))
    }

    /// Scan `root` to completion.
    pub fn scan(&self, root: &Path) -> Result<Vec<FileEntry>, ScanError> {
        let mut job = self.start(root)?;
        while !job.step(usize::MAX) {}
        Ok(job.finish().files)
    }

    /// Prepare a scan that the caller drives with [`ScanJob::step`].
    pub fn start(&self, root: &Path) -> Result<ScanJob, ScanError> {
        let normalized = normalize_path(root);

        if self.guard.is_guarded(&normalized) {
            warn!(root = %normalized, "refusing to scan the application directory");
            return Ok(ScanJob::app_directory(normalized));
        }

        let root_path = PathBuf::from(&normalized);
        let metadata = fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let matcher = self.resolver.matcher(&root_path);
        info!(root = %normalized, "starting scan");

        Ok(ScanJob {
            pending: vec![PendingDir {
                path: root_path,
                normalized: normalized.clone(),
                depth: 0,
            }],
            current: normalized.clone(),
            root: normalized,
            config: self.config.clone(),
            matcher,
            classifier: Arc::clone(&self.classifier),
            files: Vec::new(),
            stats: ScanStats::new(),
            warnings: Vec::new(),
            started: Instant::now(),
        })
    }

    /// Build a fresh entry for one file below `root`.
    pub fn file_entry(&self, root: &Path, path: &Path) -> Result<FileEntry, ScanError> {
        let root = normalize_path(root);
        let normalized = normalize_path(path);
        let Some(relative) = relative_path(&root, &normalized) else {
            return Err(ScanError::OutsideRoot {
                path: path.to_path_buf(),
                root: PathBuf::from(root),
            });
        };

        let file_path = PathBuf::from(&normalized);
        let metadata = fs::metadata(&file_path).map_err(|e| ScanError::io(&file_path, e))?;
        if metadata.is_dir() {
            return Err(ScanError::Other {
                message: format!("{normalized} is a directory"),
            });
        }

        let excluded = self
            .resolver
            .matcher(Path::new(&root))
            .is_excluded(relative, false);
        let name = file_name(&normalized).to_string();
        Ok(build_entry(
            &self.classifier,
            &file_path,
            normalized,
            &name,
            &metadata,
            excluded,
        ))
    }

    /// Bring an existing listing of `root` in line with the current patterns.
    ///
    /// Entries inside a directory that is now excluded are dropped, and
    /// entries whose own exclusion flipped are rebuilt from disk. Files under
    /// directories that were excluded before only show up on the next scan.
    pub fn reapply_patterns(&self, root: &Path, files: Vec<FileEntry>) -> Vec<FileEntry> {
        let root_norm = normalize_path(root);
        let matcher = self.resolver.matcher(root);
        let before = files.len();

        let files: Vec<FileEntry> = files
            .into_iter()
            .filter_map(|entry| {
                if entry.is_app_directory {
                    return Some(entry);
                }
                let relative = relative_path(&root_norm, &entry.path)?;
                if let Some((parent, _)) = relative.rsplit_once('/')
                    && matcher.is_excluded(parent, true)
                {
                    return None;
                }
                if matcher.is_excluded(relative, false) == entry.excluded_by_default {
                    return Some(entry);
                }
                self.file_entry(root, Path::new(&entry.path)).ok()
            })
            .collect();

        debug!(root = %root_norm, before, after = files.len(), "reapplied patterns");
        files
    }

    /// Number of direct children of `root`, or 0 if it cannot be listed.
    pub fn top_level_entry_count(root: &Path) -> usize {
        fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0)
    }
}

/// Everything a finished scan produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Normalized root.
    pub root: String,
    /// Recorded entries.
    pub files: Vec<FileEntry>,
    /// Summary counters.
    pub stats: ScanStats,
    /// Non-fatal problems.
    pub warnings: Vec<ScanWarning>,
    /// Wall time spent.
    pub duration: Duration,
}

#[derive(Debug)]
struct PendingDir {
    path: PathBuf,
    normalized: String,
    depth: u32,
}

#[derive(Debug)]
struct FileCandidate {
    path: PathBuf,
    normalized: String,
    name: String,
    excluded: bool,
}

/// An in-progress scan, advanced one chunk of directories at a time.
#[derive(Debug)]
pub struct ScanJob {
    root: String,
    config: ScanConfig,
    matcher: Arc<Matcher>,
    classifier: Arc<Classifier>,
    pending: Vec<PendingDir>,
    files: Vec<FileEntry>,
    stats: ScanStats,
    warnings: Vec<ScanWarning>,
    current: String,
    started: Instant,
}

impl ScanJob {
    fn app_directory(root: String) -> Self {
        let sentinel = FileEntry::app_directory(root.clone());
        let mut stats = ScanStats::new();
        stats.record_file(&sentinel);

        Self {
            matcher: Arc::new(Matcher::empty(&root)),
            current: root.clone(),
            root,
            config: ScanConfig::default(),
            classifier: Arc::new(Classifier::new(&ScanConfig::default())),
            pending: Vec::new(),
            files: vec![sentinel],
            stats,
            warnings: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Normalized root.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// True once no directories remain.
    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }

    /// Entries recorded so far.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Counters so far.
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Warnings so far.
    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    /// Snapshot of the running tally.
    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            files_scanned: self.stats.total_files,
            dirs_scanned: self.stats.total_dirs,
            bytes_scanned: self.stats.total_size,
            dirs_pending: self.pending.len(),
            current_path: self.current.clone(),
            errors_count: self.warnings.len() as u64,
            elapsed: self.started.elapsed(),
        }
    }

    /// Process up to `max_dirs` directories. Returns true when the scan is
    /// complete.
    pub fn step(&mut self, max_dirs: usize) -> bool {
        for _ in 0..max_dirs.max(1) {
            let Some(dir) = self.pending.pop() else {
                break;
            };

            if self.stats.total_dirs >= self.config.max_directories as u64 {
                warn!(
                    root = %self.root,
                    limit = self.config.max_directories,
                    "directory limit reached, stopping scan"
                );
                self.warnings.push(ScanWarning::limit_reached(
                    &dir.path,
                    format!(
                        "Stopped after {} directories",
                        self.config.max_directories
                    ),
                ));
                self.stats.record_truncation();
                self.pending.clear();
                break;
            }

            self.visit(dir);
        }
        self.is_done()
    }

    /// Consume the job.
    pub fn finish(self) -> ScanOutcome {
        let duration = self.started.elapsed();
        info!(
            root = %self.root,
            files = self.stats.total_files,
            dirs = self.stats.total_dirs,
            warnings = self.warnings.len(),
            elapsed_ms = duration.as_millis() as u64,
            "scan finished"
        );
        ScanOutcome {
            root: self.root,
            files: self.files,
            stats: self.stats,
            warnings: self.warnings,
            duration,
        }
    }

    fn visit(&mut self, dir: PendingDir) {
        self.stats.record_dir(dir.depth);
        self.current.clone_from(&dir.normalized);

        let Some(children) = self.list(&dir) else {
            return;
        };

        let mut subdirs = Vec::new();
        let mut candidates = Vec::new();

        for child in children {
            let name = child.file_name().to_string_lossy().into_owned();
            if is_hidden(&name) {
                continue;
            }

            let file_type = match child.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    self.warnings.push(ScanWarning::new(
                        child.path(),
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    continue;
                }
            };

            let normalized = join_normalized(&dir.normalized, &name);
            let Some(relative) = relative_path(&self.root, &normalized) else {
                continue;
            };

            if file_type.is_dir() {
                if name.ends_with(".app") || self.config.is_skipped_directory(&name) {
                    trace!(path = %normalized, "skipping directory by name");
                    continue;
                }
                if self.matcher.is_excluded(relative, true) {
                    trace!(path = %normalized, "pruning ignored directory");
                    continue;
                }
                subdirs.push(PendingDir {
                    path: child.path(),
                    normalized,
                    depth: dir.depth + 1,
                });
            } else if file_type.is_file() || file_type.is_symlink() {
                let excluded = self.matcher.is_excluded(relative, false);
                candidates.push(FileCandidate {
                    path: child.path(),
                    normalized,
                    name,
                    excluded,
                });
            }
        }

        if candidates.len() > self.config.max_files_per_directory {
            debug!(
                path = %dir.normalized,
                files = candidates.len(),
                limit = self.config.max_files_per_directory,
                "truncating files in directory"
            );
            candidates.truncate(self.config.max_files_per_directory);
            self.stats.record_truncation();
        }

        let classifier = &self.classifier;
        let entries: Vec<FileEntry> = candidates
            .into_par_iter()
            .filter_map(|candidate| classify_candidate(classifier, candidate))
            .collect();
        for entry in entries {
            self.stats.record_file(&entry);
            self.files.push(entry);
        }

        if subdirs.is_empty() {
            return;
        }
        if dir.depth >= self.config.max_depth {
            debug!(path = %dir.normalized, depth = dir.depth, "maximum depth reached");
            self.stats.record_truncation();
            return;
        }
        if subdirs.len() > self.config.max_subdirectories_per_level {
            debug!(
                path = %dir.normalized,
                subdirs = subdirs.len(),
                limit = self.config.max_subdirectories_per_level,
                "truncating subdirectories"
            );
            subdirs.truncate(self.config.max_subdirectories_per_level);
            self.stats.record_truncation();
        }

        // Reversed so the stack pops them in name order.
        self.pending.extend(subdirs.into_iter().rev());
    }

    /// Sorted listing of `dir`, or `None` if it was unreadable or too large.
    fn list(&mut self, dir: &PendingDir) -> Option<Vec<DirEntry>> {
        let read_dir = match fs::read_dir(&dir.path) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                warn!(path = %dir.normalized, error = %err, "cannot read directory");
                self.warnings.push(ScanWarning::read_error(&dir.path, &err));
                return None;
            }
        };

        let limit = self.config.max_entries_per_directory;
        let mut children = Vec::new();
        for child in read_dir.take(limit.saturating_add(1)) {
            match child {
                Ok(child) => children.push(child),
                Err(err) => self.warnings.push(ScanWarning::read_error(&dir.path, &err)),
            }
        }

        if children.len() > limit {
            warn!(path = %dir.normalized, limit, "directory has too many entries, skipping");
            self.warnings
                .push(ScanWarning::directory_too_large(&dir.path, limit));
            self.stats.record_truncation();
            return None;
        }

        children.sort_by_key(|child| child.file_name());
        Some(children)
    }
}

fn classify_candidate(classifier: &Classifier, candidate: FileCandidate) -> Option<FileEntry> {
    match fs::metadata(&candidate.path) {
        // Symlinked directories are not followed.
        Ok(metadata) if metadata.is_dir() => None,
        Ok(metadata) => Some(build_entry(
            classifier,
            &candidate.path,
            candidate.normalized,
            &candidate.name,
            &metadata,
            candidate.excluded,
        )),
        Err(err) => Some(
            FileEntry::new_skipped(
                candidate.normalized,
                candidate.name.as_str(),
                0,
                SystemTime::UNIX_EPOCH,
                format!("Metadata error: {err}"),
            )
            .with_excluded(candidate.excluded),
        ),
    }
}

/// Excluded files are recorded from metadata alone.
fn build_entry(
    classifier: &Classifier,
    path: &Path,
    normalized: String,
    name: &str,
    metadata: &fs::Metadata,
    excluded: bool,
) -> FileEntry {
    if excluded {
        classifier.excluded_entry(normalized, name, metadata)
    } else {
        classifier.entry(path, normalized, name, metadata)
    }
}

/// Hidden entries are skipped, `.gitignore` excepted.
fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != ".gitignore"
}

fn join_normalized(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn file_name(normalized: &str) -> &str {
    normalized.rsplit('/').next().unwrap_or(normalized)
}

/// Check whether a normalized path could be part of a scan of `root`.
pub fn is_scannable_path(root: &str, path: &str, config: &ScanConfig) -> bool {
    let Some(relative) = relative_path(root, path) else {
        return false;
    };
    let mut components = relative.split('/').peekable();
    while let Some(component) = components.next() {
        if is_hidden(component) {
            return false;
        }
        let is_last = components.peek().is_none();
        if !is_last && (component.ends_with(".app") || config.is_skipped_directory(component)) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use filescope_ignore::ResolverConfig;
    use tempfile::TempDir;

    fn scanner(config: ScanConfig) -> DirectoryScanner {
        let resolver = Arc::new(PatternResolver::new(ResolverConfig::default().in_memory()));
        DirectoryScanner::new(config, resolver).with_guard(AppDirectoryGuard::default())
    }

    #[test]
    fn test_hidden_rule() {
        assert!(is_hidden(".env"));
        assert!(is_hidden(".git"));
        assert!(!is_hidden(".gitignore"));
        assert!(!is_hidden("src"));
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(join_normalized("/a", "b"), "/a/b");
        assert_eq!(join_normalized("/", "b"), "/b");
    }

    #[test]
    fn test_scannable_path() {
        let config = ScanConfig::default();
        assert!(is_scannable_path("/p", "/p/src/a.ts", &config));
        assert!(is_scannable_path("/p", "/p/.gitignore", &config));
        assert!(!is_scannable_path("/p", "/p/.git/HEAD", &config));
        assert!(!is_scannable_path("/p", "/p/node_modules/x/y.js", &config));
        assert!(!is_scannable_path("/p", "/q/a.ts", &config));
    }

    #[test]
    fn test_step_chunks() {
        let temp = TempDir::new().unwrap();
        for name in ["a", "b", "c"] {
            fs::create_dir(temp.path().join(name)).unwrap();
            fs::write(temp.path().join(name).join("f.txt"), "x").unwrap();
        }

        let mut job = scanner(ScanConfig::default()).start(temp.path()).unwrap();
        assert!(!job.step(1)); // root only
        assert_eq!(job.progress().dirs_pending, 3);
        assert!(!job.step(2));
        assert!(job.step(5));
        assert_eq!(job.stats().total_dirs, 4);
        assert_eq!(job.files().len(), 3);
    }

    #[test]
    fn test_depth_limit() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("one/two/three")).unwrap();
        fs::write(temp.path().join("one/a.txt"), "a").unwrap();
        fs::write(temp.path().join("one/two/b.txt"), "b").unwrap();
        fs::write(temp.path().join("one/two/three/c.txt"), "c").unwrap();

        let config = ScanConfig::builder().max_depth(1u32).build().unwrap();
        let files = scanner(config).scan(temp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[test]
    fn test_oversized_directory_is_abandoned() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("crowded")).unwrap();
        for i in 0..6 {
            fs::write(temp.path().join("crowded").join(format!("{i}.txt")), "x").unwrap();
        }
        fs::write(temp.path().join("top.txt"), "x").unwrap();

        let config = ScanConfig::builder()
            .max_entries_per_directory(5usize)
            .build()
            .unwrap();
        let mut job = scanner(config).start(temp.path()).unwrap();
        while !job.step(10) {}
        let outcome = job.finish();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.stats.truncated_dirs, 1);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::DirectoryTooLarge));
    }
}

//! Type-checking engine backed by `tsc`.
//!
//! Targets are grouped by their nearest `tsconfig.json`. For each group the
//! engine writes a scoped config into its cache directory that extends the
//! project config with `files: [targets...]`, and runs `tsc` once,
//! incrementally, against a persisted `.tsbuildinfo`. Only the targets'
//! diagnostics are kept, plus configuration-level diagnostics that belong to
//! no file or to the config.
//!
//! Results are also cached per target together with the mtimes of every
//! project file in the compiled program, so an unchanged file whose imports
//! are unchanged never spawns `tsc` at all. Imports `tsc` could not resolve
//! are tracked too: the entry goes stale as soon as a file appears where the
//! import would resolve.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Instant, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{find_nearest_config, resolve_binary, run_tool, soft_skip, Engine, EngineContext};
use crate::cache::{content_hash, project_key, CacheStore};
use crate::error::{QualityError, Result};
use crate::quality::issue::{CheckerResult, Issue, Severity, Tool};
use crate::selection::normalize_path;

/// Config file names, nearest first.
const CONFIG_NAMES: &[&str] = &["tsconfig.json"];

/// Extensions the type checker handles.
const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts"];

/// Cache namespace for per-file diagnostics.
const CACHE_NAMESPACE: &str = "tsc";

/// Diagnostics for an import `tsc` could not resolve.
const UNRESOLVED_IMPORT_CODES: &[&str] = &["TS2307", "TS2792", "TS7016"];

/// Suffixes tried when a relative specifier is resolved.
const RESOLUTION_SUFFIXES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".d.ts",
    ".mts",
    ".cts",
    ".js",
    ".jsx",
    ".mjs",
    ".cjs",
    ".json",
    "/index.ts",
    "/index.tsx",
    "/index.d.ts",
    "/index.js",
    "/package.json",
];

/// Extensions `tsc` maps back to TypeScript sources in a specifier.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

fn located_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\): (?P<sev>error|warning) (?P<code>TS\d+): (?P<msg>.*)$",
        )
        .expect("valid regex")
    })
}

fn global_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<sev>error|warning) (?P<code>TS\d+): (?P<msg>.*)$").expect("valid regex")
    })
}

fn specifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"module '(?P<spec>[^']+)'").expect("valid regex"))
}

fn is_type_checked(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TS_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

fn mtime_ms(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_millis() as u64)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Where the unresolved imports among `issues` could appear on disk.
struct UnresolvedImports {
    /// Candidate paths that exist now; their mtimes are tracked.
    present: Vec<PathBuf>,
    /// Candidate paths that must stay absent.
    absent: Vec<PathBuf>,
    /// A bare or unparseable specifier whose resolution cannot be tracked.
    untracked: bool,
}

fn unresolved_imports(target: &Path, issues: &[Issue]) -> UnresolvedImports {
    let mut found = UnresolvedImports {
        present: Vec::new(),
        absent: Vec::new(),
        untracked: false,
    };

    for issue in issues {
        let Some(code) = issue.code.as_deref() else {
            continue;
        };
        if !UNRESOLVED_IMPORT_CODES.contains(&code) {
            continue;
        }
        let Some(caps) = specifier_re().captures(&issue.message) else {
            found.untracked = true;
            continue;
        };
        let spec = &caps["spec"];
        if !(spec.starts_with("./") || spec.starts_with("../")) {
            found.untracked = true;
            continue;
        }

        let importer = issue.file.as_deref().unwrap_or(target);
        let Some(dir) = importer.parent() else {
            found.untracked = true;
            continue;
        };
        let base = dir.join(spec);

        let mut stems = vec![base.clone()];
        if base
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SCRIPT_EXTENSIONS.contains(&e))
            .unwrap_or(false)
        {
            stems.push(base.with_extension(""));
        }

        for stem in &stems {
            for suffix in RESOLUTION_SUFFIXES {
                let candidate = with_suffix(stem, suffix);
                if candidate.exists() {
                    found.present.push(candidate);
                } else {
                    found.absent.push(candidate);
                }
            }
        }
    }

    found
}

// ============================================================================
// Warm cache entry
// ============================================================================

/// Cached diagnostics for one target file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCacheEntry {
    content_hash: String,
    /// mtime (ms) of the target, its config and every project file in the program.
    inputs: BTreeMap<PathBuf, u64>,
    /// Where unresolved relative imports would resolve; all must stay absent.
    #[serde(default)]
    absent: Vec<PathBuf>,
    /// Never served: an unresolved bare import could be installed at any time.
    #[serde(default)]
    untracked_imports: bool,
    issues: Vec<Issue>,
    checked_at: DateTime<Utc>,
}

impl TypeCacheEntry {
    /// Snapshot the current state of `target` and `inputs` together with `issues`.
    pub fn capture(
        target: &Path,
        inputs: impl IntoIterator<Item = PathBuf>,
        issues: Vec<Issue>,
    ) -> Result<Self> {
        let content = std::fs::read(target)?;
        let unresolved = unresolved_imports(target, &issues);

        let mut recorded = BTreeMap::new();
        for path in inputs
            .into_iter()
            .chain(unresolved.present)
            .chain(std::iter::once(target.to_path_buf()))
        {
            if let Some(mtime) = mtime_ms(&path) {
                recorded.insert(path, mtime);
            }
        }

        Ok(Self {
            content_hash: content_hash(&content),
            inputs: recorded,
            absent: unresolved.absent,
            untracked_imports: unresolved.untracked,
            issues,
            checked_at: Utc::now(),
        })
    }

    /// The entry is usable only if the target content and every recorded
    /// input are unchanged, and no unresolved import has become resolvable.
    #[must_use]
    pub fn is_fresh(&self, target: &Path) -> bool {
        if self.untracked_imports {
            return false;
        }
        let Ok(content) = std::fs::read(target) else {
            return false;
        };
        if content_hash(&content) != self.content_hash {
            return false;
        }
        if self.absent.iter().any(|p| p.exists()) {
            return false;
        }
        self.inputs
            .iter()
            .all(|(path, mtime)| mtime_ms(path) == Some(*mtime))
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

// ============================================================================
// Output parsing
// ============================================================================

/// Parsed `tsc --pretty false --listFiles` output.
#[derive(Debug, Default)]
pub(crate) struct TscOutput {
    pub issues: Vec<Issue>,
    pub program_files: Vec<PathBuf>,
}

/// Parse tsc output; relative paths are resolved against `cwd`.
pub(crate) fn parse_tsc_output(stdout: &str, cwd: &Path) -> TscOutput {
    let mut out = TscOutput::default();

    for raw in stdout.lines() {
        if raw.trim().is_empty() {
            continue;
        }

        if let Some(caps) = located_re().captures(raw) {
            let file = normalize_path(Path::new(&caps["file"]), cwd);
            let line = caps["line"].parse().unwrap_or(1);
            let col = caps["col"].parse().unwrap_or(1);
            out.issues.push(
                Issue::new(Tool::Type, parse_severity(&caps["sev"]), caps["msg"].trim())
                    .with_location(file, line, col)
                    .with_code(&caps["code"]),
            );
            continue;
        }

        if let Some(caps) = global_re().captures(raw) {
            out.issues.push(
                Issue::new(Tool::Type, parse_severity(&caps["sev"]), caps["msg"].trim())
                    .with_code(&caps["code"]),
            );
            continue;
        }

        // Continuation lines of a multi-line message are indented.
        if raw.starts_with(char::is_whitespace) {
            if let Some(last) = out.issues.last_mut() {
                last.message.push(' ');
                last.message.push_str(raw.trim());
            }
            continue;
        }

        out.program_files.push(normalize_path(Path::new(raw.trim()), cwd));
    }

    out
}

fn parse_severity(s: &str) -> Severity {
    if s == "warning" {
        Severity::Warning
    } else {
        Severity::Error
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Diagnostics from one `tsc` run over a group of targets.
struct ProgramRun {
    /// Per target: its own diagnostics plus configuration-level ones.
    per_target: Vec<(PathBuf, Vec<Issue>)>,
    /// Project files in the compiled program, outside `node_modules`.
    inputs: Vec<PathBuf>,
}

/// Type-checking engine.
#[derive(Debug, Clone)]
pub struct TypeEngine {
    cache_dir: PathBuf,
}

impl TypeEngine {
    /// Create an engine that keeps build info and warm results in `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The per-project warm-result store.
    #[must_use]
    pub fn cache_store(&self, project_root: &Path) -> CacheStore {
        CacheStore::new(&self.cache_dir, CACHE_NAMESPACE, project_root)
    }

    /// Type-check every target under `tsconfig` in one `tsc` run.
    fn check_program(
        &self,
        ctx: &EngineContext,
        binary: &Path,
        tsconfig: &Path,
        targets: &[PathBuf],
    ) -> Result<ProgramRun> {
        let scoped = self.write_scoped_config(&ctx.project_root, targets, tsconfig)?;
        let scoped_str = scoped.to_string_lossy();

        let started = Instant::now();
        let output = run_tool(
            binary,
            &["-p", scoped_str.as_ref(), "--pretty", "false", "--listFiles"],
            &ctx.project_root,
        )?;
        debug!(
            "tsc checked {} file(s) under {} in {}ms",
            targets.len(),
            ctx.relative(tsconfig).display(),
            started.elapsed().as_millis()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_tsc_output(&stdout, &ctx.project_root);

        if !output.status.success() && parsed.issues.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .chain(stdout.lines())
                .find(|l| !l.trim().is_empty())
                .unwrap_or("exited without diagnostics");
            return Err(QualityError::tool("tsc", detail.trim()));
        }

        let mut config_level = Vec::new();
        let mut located: BTreeMap<&Path, Vec<Issue>> = BTreeMap::new();
        for issue in parsed.issues {
            match issue.file.clone() {
                None => config_level.push(issue),
                Some(f) if f == tsconfig || f == scoped => config_level.push(issue),
                Some(f) => {
                    if let Some(target) = targets.iter().find(|t| **t == f) {
                        located.entry(target.as_path()).or_default().push(issue);
                    }
                }
            }
        }

        let per_target = targets
            .iter()
            .map(|target| {
                let mut issues = located.remove(target.as_path()).unwrap_or_default();
                issues.extend(config_level.iter().cloned());
                (target.clone(), issues)
            })
            .collect();

        let inputs = parsed
            .program_files
            .into_iter()
            .filter(|p| p.starts_with(&ctx.project_root))
            .filter(|p| !p.components().any(|c| c.as_os_str() == "node_modules"))
            .chain(std::iter::once(tsconfig.to_path_buf()))
            .collect();

        Ok(ProgramRun { per_target, inputs })
    }

    /// Write a config that extends `tsconfig` but compiles only `targets`.
    fn write_scoped_config(
        &self,
        project_root: &Path,
        targets: &[PathBuf],
        tsconfig: &Path,
    ) -> Result<PathBuf> {
        let project = project_key(project_root);
        let joined = targets
            .iter()
            .map(|t| t.to_string_lossy())
            .collect::<Vec<_>>()
            .join("\n");
        let group_key = &content_hash(joined.as_bytes())[..16];

        let scoped_dir = self.cache_dir.join("scoped");
        let build_dir = self.cache_dir.join("buildinfo");
        std::fs::create_dir_all(&scoped_dir)?;
        std::fs::create_dir_all(&build_dir)?;

        let config_path = scoped_dir.join(format!("{project}-{group_key}.tsconfig.json"));
        let build_info = build_dir.join(format!("{project}-{group_key}.tsbuildinfo"));

        let scoped = serde_json::json!({
            "extends": tsconfig,
            "compilerOptions": {
                "noEmit": true,
                "incremental": true,
                "tsBuildInfoFile": build_info,
            },
            "files": targets,
            "include": [],
        });
        std::fs::write(&config_path, serde_json::to_string_pretty(&scoped)?)?;

        Ok(config_path)
    }
}

fn cache_key(ctx: &EngineContext, target: &Path) -> String {
    ctx.relative(target).to_string_lossy().into_owned()
}

/// Config-level diagnostics repeat for every target; keep one copy.
fn merge_issues(into: &mut Vec<Issue>, found: impl IntoIterator<Item = Issue>) {
    for issue in found {
        if issue.file.is_some() || !into.contains(&issue) {
            into.push(issue);
        }
    }
}

impl Engine for TypeEngine {
    fn tool(&self) -> Tool {
        Tool::Type
    }

    fn check(&self, ctx: &EngineContext, files: &[PathBuf]) -> Result<CheckerResult> {
        let targets: Vec<&PathBuf> = files.iter().filter(|f| is_type_checked(f)).collect();
        if targets.is_empty() {
            return Ok(CheckerResult::skipped("no TypeScript files to check"));
        }

        let store = self.cache_store(&ctx.project_root);
        let cached: BTreeMap<String, TypeCacheEntry> = store.load();

        let mut issues: Vec<Issue> = Vec::new();
        let mut checked = 0usize;
        let mut pending: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

        for target in targets {
            let Some(tsconfig) = find_nearest_config(target, &ctx.project_root, CONFIG_NAMES)
            else {
                warn!(
                    "No tsconfig.json found for {}; skipping type check",
                    ctx.relative(target).display()
                );
                continue;
            };
            checked += 1;

            let key = cache_key(ctx, target);
            match cached.get(&key) {
                Some(entry) if entry.is_fresh(target) => {
                    debug!("tsc cache hit for {}", key);
                    merge_issues(&mut issues, entry.issues().iter().cloned());
                }
                _ => pending.entry(tsconfig).or_default().push(target.clone()),
            }
        }

        if checked == 0 {
            return Ok(CheckerResult::skipped("no tsconfig.json found"));
        }
        if pending.is_empty() {
            return Ok(CheckerResult::from_issues(issues));
        }

        let binary = match resolve_binary(&ctx.project_root, "tsc") {
            Ok(binary) => binary,
            Err(e) if e.is_soft() => return Ok(soft_skip(Tool::Type, &e)),
            Err(e) => return Err(e),
        };

        let mut updates = Vec::new();
        for (tsconfig, group) in &pending {
            let run = match self.check_program(ctx, &binary, tsconfig, group) {
                Ok(run) => run,
                Err(e) if e.is_soft() => return Ok(soft_skip(Tool::Type, &e)),
                Err(e) => return Err(e),
            };

            for (target, found) in run.per_target {
                match TypeCacheEntry::capture(&target, run.inputs.iter().cloned(), found.clone()) {
                    Ok(entry) => updates.push((cache_key(ctx, &target), entry)),
                    Err(e) => warn!("Failed to snapshot {} for caching: {}", target.display(), e),
                }
                merge_issues(&mut issues, found);
            }
        }

        if let Err(e) = store.put_many(updates) {
            warn!("Failed to persist tsc cache: {}", e);
        }

        Ok(CheckerResult::from_issues(issues))
    }
}

//! Module naming and import resolution
//!
//! Maps Python files to dotted module names relative to the analysis roots
//! and turns extracted [`ImportSpec`]s into edges between local modules.
//! Resolution is static and deliberately over-approximates: `from pkg
//! import x` depends on both `pkg` and `pkg.x`, and whichever of those
//! exists locally wins.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::parser::ImportSpec;

/// Share of dotless module names above which the root name becomes a prefix
const PREFIX_DOTLESS_RATIO: f64 = 0.6;

/// Make a path absolute and fold `.`/`..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Directories that module names are computed relative to
///
/// Directory arguments are roots themselves, file arguments contribute
/// their parent. Paths that cannot be stat'ed are ignored. The result is
/// deduplicated and ordered longest first.
pub fn determine_roots(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for path in paths {
        let absolute = normalize_path(path);
        let root = match std::fs::metadata(&absolute) {
            Ok(meta) if meta.is_dir() => absolute,
            Ok(_) => match absolute.parent() {
                Some(parent) => parent.to_path_buf(),
                None => continue,
            },
            Err(_) => continue,
        };
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    roots.sort_by(|a, b| {
        b.as_os_str()
            .len()
            .cmp(&a.as_os_str().len())
            .then_with(|| a.cmp(b))
    });
    roots
}

/// Dotted module name of a file
///
/// The first root containing the file is used; without one, only the file
/// name counts. Returns an empty string for files that name no module,
/// such as a root-level `__init__.py`.
pub fn module_name_from_path(path: &Path, roots: &[PathBuf]) -> String {
    let absolute = normalize_path(path);

    let relative = roots
        .iter()
        .find(|root| absolute.starts_with(root))
        .and_then(|root| absolute.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .or_else(|| absolute.file_name().map(PathBuf::from))
        .unwrap_or_default();

    let stem = relative.with_extension("");
    let mut segments: Vec<String> = stem
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .filter(|s| !s.is_empty() && s != ".")
        .collect();

    if segments.last().is_some_and(|s| s == "__init__") {
        segments.pop();
    }

    segments.join(".")
}

/// Package prefix to apply when most modules sit directly under the root
///
/// Projects analyzed from inside their package directory (`myapp/`) yield
/// names like `models` while the code imports `myapp.models`. When at
/// least 60% of modules are dotless, the base name of the primary root is
/// returned so local names can be qualified.
pub fn infer_module_prefix<'a>(
    modules: impl IntoIterator<Item = &'a str>,
    roots: &[PathBuf],
) -> Option<String> {
    let root = roots.first()?;
    let base = root.file_name()?.to_string_lossy().into_owned();
    if base.is_empty() || base == "." || base == ".." || base == "/" {
        return None;
    }

    let mut total = 0usize;
    let mut dotless = 0usize;
    for module in modules {
        total += 1;
        if !module.contains('.') {
            dotless += 1;
        }
    }
    if total == 0 {
        return None;
    }

    if dotless as f64 / total as f64 >= PREFIX_DOTLESS_RATIO {
        Some(base)
    } else {
        None
    }
}

/// Qualify a module with a prefix unless it already carries it
pub fn apply_module_prefix(module: &str, prefix: &str) -> String {
    if module.starts_with(&format!("{}.", prefix)) {
        module.to_string()
    } else {
        format!("{}.{}", prefix, module)
    }
}

fn package_of(module: &str) -> &str {
    module.rsplit_once('.').map(|(package, _)| package).unwrap_or("")
}

/// Strip `levels` trailing segments; `None` when that goes past the top
fn ascend(package: &str, levels: usize) -> Option<String> {
    if levels == 0 {
        return Some(package.to_string());
    }
    let segments: Vec<&str> = package.split('.').filter(|s| !s.is_empty()).collect();
    if levels >= segments.len() {
        return None;
    }
    Some(segments[..segments.len() - levels].join("."))
}

/// Candidate dotted targets for the imports of `from_module`
///
/// Relative imports ascend the importing module's package by one segment
/// per leading dot. An import that ascends as far as the top of the package
/// (or past it) is dropped.
pub fn resolve_imports(from_module: &str, specs: &[ImportSpec]) -> Vec<String> {
    let package = package_of(from_module);
    let mut candidates: Vec<String> = Vec::new();

    for spec in specs {
        match spec {
            ImportSpec::Direct { names } => {
                candidates.extend(names.iter().map(|n| n.trim().to_string()));
            }
            ImportSpec::From {
                module,
                names,
                level,
            } => {
                let module = module.trim();
                let base = if *level > 0 {
                    let Some(anchor) = ascend(package, *level) else {
                        continue;
                    };
                    if module.is_empty() {
                        anchor
                    } else {
                        format!("{}.{}", anchor, module)
                    }
                } else {
                    module.to_string()
                };

                if base.is_empty() {
                    continue;
                }

                let names: Vec<&str> = names.iter().map(|n| n.trim()).collect();
                if names.is_empty() || names.contains(&"*") {
                    candidates.push(base);
                    continue;
                }

                candidates.push(base.clone());
                for name in names.into_iter().filter(|n| !n.is_empty()) {
                    candidates.push(format!("{}.{}", base, name));
                }
            }
        }
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Local modules of one analysis run and how to find them
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: BTreeMap<String, Vec<PathBuf>>,
    file_to_module: HashMap<PathBuf, String>,
    prefix: Option<String>,
}

impl ModuleIndex {
    /// Name every file and apply the inferred prefix, if any
    pub fn build(files: &[PathBuf], roots: &[PathBuf]) -> Self {
        let mut named: Vec<(PathBuf, String)> = Vec::with_capacity(files.len());
        for file in files {
            let module = module_name_from_path(file, roots);
            if module.is_empty() {
                debug!(file = %file.display(), "file names no module, skipping");
                continue;
            }
            named.push((file.clone(), module));
        }

        let prefix = {
            let distinct: HashSet<&str> = named.iter().map(|(_, m)| m.as_str()).collect();
            infer_module_prefix(distinct, roots)
        };
        if let Some(prefix) = &prefix {
            debug!(prefix = %prefix, "qualifying local modules with inferred prefix");
            for (_, module) in named.iter_mut() {
                *module = apply_module_prefix(module, prefix);
            }
        }

        let mut modules: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut file_to_module = HashMap::with_capacity(named.len());
        for (file, module) in named {
            modules.entry(module.clone()).or_default().push(file.clone());
            file_to_module.insert(file, module);
        }
        for files in modules.values_mut() {
            files.sort();
        }

        Self {
            modules,
            file_to_module,
            prefix,
        }
    }

    /// module -> backing files, sorted
    pub fn modules(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.modules
    }

    pub fn into_modules(self) -> BTreeMap<String, Vec<PathBuf>> {
        self.modules
    }

    pub fn module_for(&self, file: &Path) -> Option<&str> {
        self.file_to_module.get(file).map(String::as_str)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Longest dotted prefix of `name` that is a local module
    pub fn longest_local_prefix<'a>(&self, name: &'a str) -> Option<&'a str> {
        let mut current = name;
        loop {
            if self.modules.contains_key(current) {
                return Some(current);
            }
            let (parent, _) = current.rsplit_once('.')?;
            current = parent;
        }
    }

    /// Like [`Self::longest_local_prefix`], retrying with the inferred prefix
    pub fn longest_local_or_prefixed_prefix(&self, name: &str) -> Option<String> {
        if let Some(found) = self.longest_local_prefix(name) {
            return Some(found.to_string());
        }
        let prefix = self.prefix.as_deref()?;
        if name.starts_with(&format!("{}.", prefix)) {
            return None;
        }
        let qualified = format!("{}.{}", prefix, name);
        self.longest_local_prefix(&qualified).map(str::to_string)
    }

    /// Local modules imported by `from_module`, in first-seen order
    ///
    /// Dotless names (`import logging`) only resolve through the inferred
    /// prefix so that stdlib and third-party imports stay out of the graph.
    pub fn resolve_targets(&self, from_module: &str, specs: &[ImportSpec]) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for candidate in resolve_imports(from_module, specs) {
            if candidate == from_module {
                continue;
            }
            if !candidate.contains('.') && self.prefix.is_none() {
                continue;
            }
            if let Some(local) = self.longest_local_or_prefixed_prefix(&candidate) {
                if local != from_module && !targets.contains(&local) {
                    targets.push(local);
                }
            }
        }
        targets
    }
}

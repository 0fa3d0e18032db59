//! The Merge Engine: combines an overlay [`Config`] into a
//! live one under well-defined conflict, list-merge, and dedup rules,
//! emitting a [`Journal`] and committing atomically.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::cancel::CancellationToken;
use crate::codec;
use crate::dedupe::{self, Strategy};
use crate::error::{Result, RouterConfigError};
use crate::journal::{Conflict, ConflictKind, Journal, JournalRecord};
use crate::model::{Config, Section, Value};
use crate::safety;

/// Options shared by `merge` and `remove`.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub dry_run: bool,
    pub preserve_network: bool,
    /// Default `true`, matching the `safe-merge` preset.
    pub preserve_existing: bool,
    /// Per-list-name overrides of the auto-selected dedupe [`Strategy`].
    pub list_strategy_overrides: HashMap<String, Strategy>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            preserve_network: true,
            preserve_existing: true,
            list_strategy_overrides: HashMap::new(),
        }
    }
}

impl MergeOptions {
    fn strategy_for(&self, list_name: &str) -> Strategy {
        self.list_strategy_overrides
            .get(list_name)
            .copied()
            .unwrap_or_else(|| dedupe::auto_select(list_name))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigMergeResult {
    pub config: Config,
    pub journal: Journal,
    pub conflicts: Vec<Conflict>,
    pub modified: bool,
}

/// Merges the overlay file for `name` into the corresponding live file,
/// committing the result unless `opts.dry_run` is set.
pub fn merge_config(
    name: &str,
    overlay_path: &Path,
    live_path: &Path,
    opts: &MergeOptions,
) -> Result<ConfigMergeResult> {
    if !overlay_path.exists() {
        return Err(RouterConfigError::FileNotFound {
            path: overlay_path.to_path_buf(),
        });
    }
    let overlay_text = fs::read_to_string(overlay_path)
        .map_err(|e| RouterConfigError::io(overlay_path, e))?;
    let overlay = codec::parse(&overlay_text, overlay_path)?;

    let (live, pre_emit) = load_live(live_path)?;

    let mut journal = Journal::new();
    let mut conflicts = Vec::new();

    let merged = merge_sections(name, &live, &overlay, opts, &mut conflicts);

    if opts.preserve_network {
        safety::check(name, &live, &merged)?;
    }

    let post_emit = codec::emit(&merged);
    let modified = post_emit != pre_emit;

    journal.push(JournalRecord::MergeConfig {
        config: name.to_string(),
        overlay_path: overlay_path.display().to_string(),
        live_path: live_path.display().to_string(),
        conflict_count: conflicts.len(),
    });
    for c in &conflicts {
        journal.push(JournalRecord::Conflict(c.clone()));
    }

    if modified && !opts.dry_run {
        commit(live_path, &post_emit, live.mode)?;
        journal.push(JournalRecord::SaveConfig {
            config: name.to_string(),
        });
    }

    Ok(ConfigMergeResult {
        config: merged,
        journal,
        conflicts,
        modified,
    })
}

#[derive(Debug, Default)]
pub struct MergeDirectoryResult {
    pub results: IndexMap<String, std::result::Result<ConfigMergeResult, RouterConfigError>>,
    pub ok: bool,
}

/// Merges every regular file in `overlay_dir` against the same-named
/// file in `live_dir`. Subdirectories are ignored.
///
/// Checked between files, never mid-file: on cancellation, any
/// file already committed stays committed, and no further file is
/// started.
pub fn merge_directory(
    overlay_dir: &Path,
    live_dir: &Path,
    opts: &MergeOptions,
    cancel: &CancellationToken,
) -> Result<MergeDirectoryResult> {
    let mut out = MergeDirectoryResult {
        results: IndexMap::new(),
        ok: true,
    };

    if !overlay_dir.exists() {
        return Err(RouterConfigError::FileNotFound {
            path: overlay_dir.to_path_buf(),
        });
    }

    let mut names: Vec<String> = fs::read_dir(overlay_dir)
        .map_err(|e| RouterConfigError::io(overlay_dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    for name in names {
        cancel.check()?;
        let overlay_path = overlay_dir.join(&name);
        let live_path = live_dir.join(&name);
        let result = merge_config(&name, &overlay_path, &live_path, opts);
        if result.is_err() {
            out.ok = false;
        }
        out.results.insert(name, result);
    }

    Ok(out)
}

fn load_live(live_path: &Path) -> Result<(Config, String)> {
    if !live_path.exists() {
        return Ok((Config::default(), String::new()));
    }
    let text = fs::read_to_string(live_path).map_err(|e| RouterConfigError::io(live_path, e))?;
    let mut config = codec::parse(&text, live_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(live_path) {
            config.mode = Some(meta.permissions().mode());
        }
    }
    let pre_emit = codec::emit(&config);
    Ok((config, pre_emit))
}

/// Applies the merge rules below, walking the overlay in its own
/// iteration order. Result section order: all of `live`'s sections in
/// `live`'s order (possibly merged), then new sections from `overlay`
/// in `overlay`'s order.
fn merge_sections(
    config_name: &str,
    live: &Config,
    overlay: &Config,
    opts: &MergeOptions,
    conflicts: &mut Vec<Conflict>,
) -> Config {
    let mut result = live.clone();
    let mut new_sections: Vec<Section> = Vec::new();

    // Tracks how many anonymous sections of a given kind we've already
    // matched against `live`, so repeated anonymous kinds in the overlay
    // line up with the right positional index.
    let mut anon_overlay_index: HashMap<String, usize> = HashMap::new();

    for o in &overlay.sections {
        let existing_index = match &o.name {
            Some(name) => result.sections.iter().position(|s| s.name.as_deref() == Some(name.as_str())),
            None => {
                let idx = anon_overlay_index.entry(o.kind.clone()).or_insert(0);
                let position = result
                    .sections
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.name.is_none() && s.kind == o.kind)
                    .nth(*idx)
                    .map(|(i, _)| i);
                *idx += 1;
                position
            }
        };

        match existing_index {
            Some(i) => {
                merge_options_into(config_name, &mut result.sections[i], o, opts, conflicts);
            }
            None => {
                let mut copy = o.clone();
                dedupe_all_lists(&mut copy, opts);
                new_sections.push(copy);
            }
        }
    }

    result.sections.extend(new_sections);
    result
}

fn merge_options_into(
    config_name: &str,
    target: &mut Section,
    overlay_section: &Section,
    opts: &MergeOptions,
    conflicts: &mut Vec<Conflict>,
) {
    let section_label = target.name.clone().unwrap_or_else(|| target.kind.clone());

    for (key, overlay_value) in &overlay_section.options {
        match target.options.get(key) {
            None => {
                let mut value = overlay_value.clone();
                if let Value::List(items) = &value {
                    let strategy = opts.strategy_for(key);
                    value = Value::List(dedupe::dedupe(items, strategy));
                }
                // Invariant 4 / Open Question 4: an empty overlay list is a no-op.
                if matches!(&value, Value::List(items) if items.is_empty()) {
                    continue;
                }
                target.options.insert(key.clone(), value);
            }
            Some(existing) => match (existing, overlay_value) {
                (Value::Scalar(a), Value::Scalar(b)) if a == b => {}
                (Value::Scalar(a), Value::Scalar(b)) => {
                    conflicts.push(Conflict {
                        config: config_name.to_string(),
                        section: section_label.clone(),
                        option: key.clone(),
                        existing_value: Some(a.clone()),
                        new_value: Some(b.clone()),
                        kind: ConflictKind::ScalarConflict,
                    });
                    if !opts.preserve_existing {
                        target.options.insert(key.clone(), Value::Scalar(b.clone()));
                    }
                }
                (Value::List(existing_items), Value::List(overlay_items)) => {
                    if overlay_items.is_empty() {
                        // Open Question 4: empty overlay list never erases the live list.
                        continue;
                    }
                    let mut combined = existing_items.clone();
                    combined.extend(overlay_items.iter().cloned());
                    let strategy = opts.strategy_for(key);
                    let deduped = dedupe::dedupe(&combined, strategy);
                    target.options.insert(key.clone(), Value::List(deduped));
                }
                _ => {
                    conflicts.push(Conflict {
                        config: config_name.to_string(),
                        section: section_label.clone(),
                        option: key.clone(),
                        existing_value: Some(existing.to_debug_string()),
                        new_value: Some(overlay_value.to_debug_string()),
                        kind: ConflictKind::TypeConflict,
                    });
                    // keep `l`'s value: no-op, `target` already holds it.
                }
            },
        }
    }
}

fn dedupe_all_lists(section: &mut Section, opts: &MergeOptions) {
    let keys: Vec<String> = section.options.keys().cloned().collect();
    for key in keys {
        if let Some(Value::List(items)) = section.options.get(&key) {
            let strategy = opts.strategy_for(&key);
            let deduped = dedupe::dedupe(items, strategy);
            section.options.insert(key, Value::List(deduped));
        }
    }
}

impl Value {
    fn to_debug_string(&self) -> String {
        match self {
            Value::Scalar(s) => s.clone(),
            Value::List(items) => items.join(","),
        }
    }
}

/// Write-temp + rename commit. Never `open-truncate-write`
/// the live file directly.
pub(crate) fn commit(live_path: &Path, content: &str, mode: Option<u32>) -> Result<()> {
    let dir = live_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = live_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path: PathBuf = dir.join(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, content).map_err(|e| RouterConfigError::io(&tmp_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = mode.unwrap_or(0o644);
        let perms = std::fs::Permissions::from_mode(mode);
        fs::set_permissions(&tmp_path, perms).map_err(|e| RouterConfigError::io(&tmp_path, e))?;
    }

    if let Err(e) = fs::rename(&tmp_path, live_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(RouterConfigError::io(live_path, e));
    }

    Ok(())
}

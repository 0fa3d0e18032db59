//! The Remove Engine: the subtractive counterpart of `merge`.
//! An overlay section's mere presence marks the matching live section for
//! removal; options are never compared.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::cancel::CancellationToken;
use crate::codec;
use crate::error::{Result, RouterConfigError};
use crate::journal::{Journal, JournalRecord};
use crate::merge::{commit, MergeOptions};
use crate::model::Config;
use crate::safety;

#[derive(Debug, Clone)]
pub struct ConfigRemoveResult {
    pub config: Config,
    pub journal: Journal,
    /// Names (for named sections) or `"<kind>#<index>"` labels (for
    /// anonymous sections) of every section removed.
    pub removed: Vec<String>,
    pub modified: bool,
}

/// Removes, from the live file for `name`, every section also present
/// (by identity, not content) in the overlay file. Commits the result
/// unless `opts.dry_run` is set.
pub fn remove_config(
    name: &str,
    overlay_path: &Path,
    live_path: &Path,
    opts: &MergeOptions,
) -> Result<ConfigRemoveResult> {
    if !overlay_path.exists() {
        return Err(RouterConfigError::FileNotFound {
            path: overlay_path.to_path_buf(),
        });
    }
    if !live_path.exists() {
        return Err(RouterConfigError::FileNotFound {
            path: live_path.to_path_buf(),
        });
    }

    let overlay_text = fs::read_to_string(overlay_path)
        .map_err(|e| RouterConfigError::io(overlay_path, e))?;
    let overlay = codec::parse(&overlay_text, overlay_path)?;

    let live_text = fs::read_to_string(live_path).map_err(|e| RouterConfigError::io(live_path, e))?;
    let mut live = codec::parse(&live_text, live_path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(live_path) {
            live.mode = Some(meta.permissions().mode());
        }
    }
    let pre_emit = codec::emit(&live);

    let (retained, removed) = remove_matching(&live, &overlay);

    if opts.preserve_network {
        let mut after = live.clone();
        after.sections = retained.clone();
        safety::check(name, &live, &after)?;
    }

    live.sections = retained;
    let post_emit = codec::emit(&live);
    let modified = post_emit != pre_emit;

    let mut journal = Journal::new();
    journal.push(JournalRecord::RemoveConfig {
        config: name.to_string(),
        overlay_path: overlay_path.display().to_string(),
        live_path: live_path.display().to_string(),
        removed_count: removed.len(),
    });

    if modified && !opts.dry_run {
        commit(live_path, &post_emit, live.mode)?;
        journal.push(JournalRecord::SaveConfig {
            config: name.to_string(),
        });
    }

    Ok(ConfigRemoveResult {
        config: live,
        journal,
        removed,
        modified,
    })
}

#[derive(Debug, Default)]
pub struct RemoveDirectoryResult {
    pub results: IndexMap<String, std::result::Result<ConfigRemoveResult, RouterConfigError>>,
    pub ok: bool,
}

/// Removes matching sections for every overlay file that also has a
/// same-named file in `live_dir`. Overlay files with no live counterpart
/// are skipped (nothing to remove from).
pub fn remove_directory(
    overlay_dir: &Path,
    live_dir: &Path,
    opts: &MergeOptions,
    cancel: &CancellationToken,
) -> Result<RemoveDirectoryResult> {
    let mut out = RemoveDirectoryResult {
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
        let live_path = live_dir.join(&name);
        if !live_path.exists() {
            continue;
        }
        let overlay_path = overlay_dir.join(&name);
        let result = remove_config(&name, &overlay_path, &live_path, opts);
        if result.is_err() {
            out.ok = false;
        }
        out.results.insert(name, result);
    }

    Ok(out)
}

/// Returns `(retained, removed_labels)`: `live`'s sections that survive,
/// in original order, and the labels of the ones an overlay section
/// matched (options are never compared, presence is enough).
fn remove_matching(live: &Config, overlay: &Config) -> (Vec<crate::model::Section>, Vec<String>) {
    let mut marked = vec![false; live.sections.len()];
    let mut anon_overlay_index: HashMap<String, usize> = HashMap::new();

    for o in &overlay.sections {
        match &o.name {
            Some(name) => {
                if let Some(i) = live.sections.iter().position(|s| s.name.as_deref() == Some(name.as_str())) {
                    marked[i] = true;
                }
            }
            None => {
                let idx = anon_overlay_index.entry(o.kind.clone()).or_insert(0);
                if let Some(i) = live
                    .sections
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.name.is_none() && s.kind == o.kind)
                    .nth(*idx)
                    .map(|(i, _)| i)
                {
                    marked[i] = true;
                }
                *idx += 1;
            }
        }
    }

    let mut retained = Vec::new();
    let mut removed = Vec::new();
    let mut anon_seen: HashMap<String, usize> = HashMap::new();

    for (i, section) in live.sections.iter().enumerate() {
        let label = match &section.name {
            Some(name) => name.clone(),
            None => {
                let idx = anon_seen.entry(section.kind.clone()).or_insert(0);
                let label = format!("{}#{}", section.kind, idx);
                *idx += 1;
                label
            }
        };
        if marked[i] {
            removed.push(label);
        } else {
            retained.push(section.clone());
        }
    }

    (retained, removed)
}

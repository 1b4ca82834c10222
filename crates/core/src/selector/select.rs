use tracing::trace;

use crate::network::{normalize_path, SharedFile};
use crate::quality::{self, QualityPreferences};

use super::types::{FileSelection, FileSelectionOptions, SelectionRejected};

/// Choose a directory and file set from one uploader's listing.
pub fn select_files(
    files: &[SharedFile],
    options: &FileSelectionOptions,
) -> Result<FileSelection, SelectionRejected> {
    let has_audio = files
        .iter()
        .any(|f| quality::detect_format(&f.filename).is_audio());
    if !has_audio {
        return Err(SelectionRejected::NoAudioFiles);
    }

    let wanted_directory = options.directory.as_deref().map(normalize_path);
    let qualifying: Vec<&SharedFile> = files
        .iter()
        .filter(|f| qualifies(f, options, wanted_directory.as_deref()))
        .collect();

    let required = options.min_files.max(1);
    let groups = group_by_directory(&qualifying);
    let largest = largest_group(&groups);
    let largest_len = largest.map(|(_, g)| g.len()).unwrap_or(0);

    let (directory, chosen): (String, Vec<&SharedFile>) = if options.prefer_complete_albums {
        match largest {
            Some((dir, group)) if group.len() >= required => (dir.clone(), group.clone()),
            _ => {
                return Err(SelectionRejected::NotEnoughFiles {
                    found: largest_len,
                    required,
                })
            }
        }
    } else if options.prefer_album_folder {
        match groups.iter().find(|(_, g)| g.len() >= required) {
            Some((dir, group)) => (dir.clone(), group.clone()),
            None => {
                return Err(SelectionRejected::NotEnoughFiles {
                    found: largest_len,
                    required,
                })
            }
        }
    } else {
        if qualifying.len() < required {
            return Err(SelectionRejected::NotEnoughFiles {
                found: qualifying.len(),
                required,
            });
        }
        let dir = largest.map(|(d, _)| d.clone()).unwrap_or_default();
        (dir, qualifying.clone())
    };

    if let Some(hint) = options.single_file_hint.as_deref() {
        if let Some(file) = pick_single(&chosen, hint, options.quality.as_ref()) {
            return Ok(FileSelection {
                directory: file.directory(),
                files: vec![file.clone()],
            });
        }
    }

    trace!(directory = %directory, files = chosen.len(), "Selected files");

    Ok(FileSelection {
        directory,
        files: chosen.into_iter().cloned().collect(),
    })
}

fn qualifies(file: &SharedFile, options: &FileSelectionOptions, directory: Option<&str>) -> bool {
    let info = quality::extract_quality_info(file);
    if !info.format.is_audio() {
        return false;
    }

    // Unknown sizes pass; the uploader simply did not report one.
    if let Some(size) = file.size {
        if size < options.min_file_size_bytes || size > options.max_file_size_bytes {
            return false;
        }
    }

    if let Some(prefs) = &options.quality {
        if quality::should_reject(&info, prefs) {
            return false;
        }
    }

    match directory {
        Some(dir) => file.directory() == dir,
        None => true,
    }
}

/// Group files by parent directory, preserving first-seen order.
fn group_by_directory<'a>(files: &[&'a SharedFile]) -> Vec<(String, Vec<&'a SharedFile>)> {
    let mut groups: Vec<(String, Vec<&'a SharedFile>)> = Vec::new();
    for &file in files {
        let dir = file.directory();
        match groups.iter_mut().find(|(d, _)| *d == dir) {
            Some((_, group)) => group.push(file),
            None => groups.push((dir, vec![file])),
        }
    }
    groups
}

/// Largest group; ties go to the first seen.
fn largest_group<'g, 'a>(
    groups: &'g [(String, Vec<&'a SharedFile>)],
) -> Option<&'g (String, Vec<&'a SharedFile>)> {
    let mut best: Option<&'g (String, Vec<&'a SharedFile>)> = None;
    for group in groups {
        if best.map_or(true, |b| group.1.len() > b.1.len()) {
            best = Some(group);
        }
    }
    best
}

/// First file whose name contains the hint, else the best-scoring file.
fn pick_single<'a>(
    files: &[&'a SharedFile],
    hint: &str,
    preferences: Option<&QualityPreferences>,
) -> Option<&'a SharedFile> {
    let hint = hint.trim().to_lowercase();
    if !hint.is_empty() {
        if let Some(file) = files
            .iter()
            .copied()
            .find(|f| f.basename().to_lowercase().contains(&hint))
        {
            return Some(file);
        }
    }

    let default_prefs = QualityPreferences::default();
    let prefs = preferences.unwrap_or(&default_prefs);

    let mut best: Option<(&'a SharedFile, i64, u8)> = None;
    for &file in files {
        let info = quality::extract_quality_info(file);
        let score = quality::score(&info, prefs);
        let rank = info.tier.rank();
        let better = match best {
            None => true,
            Some((_, s, r)) => score > s || (score == s && rank < r),
        };
        if better {
            best = Some((file, score, rank));
        }
    }
    best.map(|(f, _, _)| f)
}

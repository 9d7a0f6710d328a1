//! Wildcard and segment matching.
//!
//! `*` matches any run of characters within one path segment, `?` exactly
//! one. Patterns walk the working directory; an expansion with no matches
//! fails unless the word carries the `nomatch-ok` modifier. Dotfiles only
//! match patterns that name the leading dot.

use std::path::PathBuf;

use crate::exception::{Cause, EvalResult, Exception};
use crate::interp::EvalCtx;
use crate::value::Value;

/// Expand a pattern against the evaluator's working directory. Matches are
/// returned sorted, as path strings relative to the pattern's own root.
pub fn expand(ec: &EvalCtx, pattern: &str, nomatch_ok: bool) -> EvalResult<Vec<Value>> {
    let anchored = pattern.starts_with('/');
    let root = if anchored {
        PathBuf::from("/")
    } else {
        ec.evaler.cwd.read().clone()
    };

    let mut matches: Vec<(PathBuf, String)> = vec![(root, String::new())];
    for segment in pattern.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        let mut next = Vec::new();
        if has_meta(segment) {
            for (dir, display) in &matches {
                let mut names: Vec<String> = match std::fs::read_dir(dir) {
                    Ok(entries) => entries
                        .filter_map(|e| e.ok())
                        .filter_map(|e| e.file_name().into_string().ok())
                        .collect(),
                    Err(_) => continue,
                };
                names.sort();
                for name in names {
                    if name.starts_with('.') && !segment.starts_with('.') {
                        continue;
                    }
                    if seg_match(segment, &name) {
                        next.push((dir.join(&name), join_display(display, &name)));
                    }
                }
            }
        } else {
            for (dir, display) in &matches {
                let path = dir.join(segment);
                if path.symlink_metadata().is_ok() {
                    next.push((path, join_display(display, segment)));
                }
            }
        }
        matches = next;
    }

    if matches.is_empty() && !nomatch_ok {
        return Err(Exception::new(Cause::WildcardNoMatch));
    }
    Ok(matches
        .into_iter()
        .map(|(_, display)| {
            if anchored {
                Value::str(format!("/{}", display))
            } else {
                Value::str(display)
            }
        })
        .collect())
}

fn join_display(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

fn has_meta(segment: &str) -> bool {
    segment.contains('*') || segment.contains('?')
}

/// Match one path segment against a pattern containing `*` and `?`.
pub fn seg_match(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = name.chars().collect();
    match_at(&pat, 0, &txt, 0)
}

fn match_at(pat: &[char], pi: usize, txt: &[char], ti: usize) -> bool {
    if pi == pat.len() {
        return ti == txt.len();
    }
    match pat[pi] {
        '*' => {
            for skip in ti..=txt.len() {
                if match_at(pat, pi + 1, txt, skip) {
                    return true;
                }
            }
            false
        }
        '?' => ti < txt.len() && match_at(pat, pi + 1, txt, ti + 1),
        c => ti < txt.len() && txt[ti] == c && match_at(pat, pi + 1, txt, ti + 1),
    }
}

//! URL path normalization.
//!
//! Runs of two or more `/` or `\` collapse into a single `/`. When that
//! changes the path the handler answers with a permanent redirect to the
//! canonical URL; query string and fragment are carried over untouched.
//! A single trailing slash is left alone.

use std::borrow::Cow;

use url::Url;

/// Collapse repeated separators in a pathname.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let is_sep = |c: char| c == '/' || c == '\\';
    let has_run = path
        .as_bytes()
        .windows(2)
        .any(|w| is_sep(w[0] as char) && is_sep(w[1] as char));
    if !has_run {
        return Cow::Borrowed(path);
    }

    let mut out = String::with_capacity(path.len());
    let mut run = 0usize;
    let mut run_start = 0usize;
    for (i, c) in path.char_indices() {
        if is_sep(c) {
            if run == 0 {
                run_start = i;
            }
            run += 1;
            continue;
        }
        flush_run(&mut out, &path[run_start..i], run);
        run = 0;
        out.push(c);
    }
    flush_run(&mut out, &path[run_start..], run);
    Cow::Owned(out)
}

fn flush_run(out: &mut String, raw: &str, run: usize) {
    match run {
        0 => {}
        1 => out.push_str(raw),
        _ => out.push('/'),
    }
}

/// Location to redirect to when the request path is not canonical.
pub fn canonical_location(url: &Url) -> Option<String> {
    let normalized = normalize_path(url.path());
    let Cow::Owned(path) = normalized else {
        return None;
    };

    let mut location = path;
    if let Some(query) = url.query() {
        location.push('?');
        location.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        location.push('#');
        location.push_str(fragment);
    }
    Some(location)
}

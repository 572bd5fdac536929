//! # Lineage Names
//!
//! Helpers for dotted lineage names such as `BA.5.1` or `B.1.1.529.5.1`.
//! Segment 0 is the alias token; later segments subdivide it.
//!
//! All helpers work on borrowed `&str` slices of the original name, so
//! walking the hierarchy of a lineage never allocates.

/// Separator between lineage segments
pub const SEPARATOR: char = '.';

/// Leading alias token of a lineage (`"BA"` for `"BA.5.1"`)
#[inline]
pub fn alias_token(name: &str) -> &str {
    match name.find(SEPARATOR) {
        Some(end) => &name[..end],
        None => name,
    }
}

/// Everything after the alias token (`Some("5.1")` for `"BA.5.1"`)
#[inline]
pub fn suffix(name: &str) -> Option<&str> {
    name.find(SEPARATOR).map(|end| &name[end + 1..])
}

/// Number of dot-separated segments
#[inline]
pub fn n_segments(name: &str) -> usize {
    name.split(SEPARATOR).count()
}

/// Split a name after its first `n` segments.
///
/// Returns `(head, tail)` where `head` holds the first `n` segments and
/// `tail` the remainder, or `None` when the name has `n` segments or fewer.
pub fn split_after(name: &str, n: usize) -> Option<(&str, &str)> {
    if n == 0 {
        return Some(("", name));
    }
    let (end, _) = name.match_indices(SEPARATOR).nth(n - 1)?;
    Some((&name[..end], &name[end + 1..]))
}

/// Direct parent in the dotted hierarchy (`"B.1.1"` for `"B.1.1.7"`)
pub fn parent(name: &str) -> Option<&str> {
    name.rfind(SEPARATOR).map(|end| &name[..end])
}

/// Iterate every dotted prefix of a name, shortest first.
///
/// The empty prefix comes first, the full name last:
/// `"B.1.7"` yields `""`, `"B"`, `"B.1"`, `"B.1.7"`.
pub fn prefixes(name: &str) -> Prefixes<'_> {
    Prefixes {
        name,
        started: false,
        search_from: if name.is_empty() { None } else { Some(0) },
    }
}

/// Iterator returned by [`prefixes`]
#[derive(Clone, Debug)]
pub struct Prefixes<'a> {
    name: &'a str,
    /// Whether the empty prefix has been yielded
    started: bool,
    /// Byte offset where the search for the next separator resumes
    search_from: Option<usize>,
}

impl<'a> Iterator for Prefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return Some("");
        }

        let from = self.search_from?;
        match self.name[from..].find(SEPARATOR) {
            Some(i) => {
                self.search_from = Some(from + i + 1);
                Some(&self.name[..from + i])
            }
            None => {
                self.search_from = None;
                Some(self.name)
            }
        }
    }
}

//! # Lineage Designations
//!
//! Leaf name -> lineage mapping, in table order.

use indexmap::IndexMap;

use crate::error::Result;

/// Strain -> lineage assignments
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Designations {
    lineages: IndexMap<String, String>,
}

impl Designations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a designation, replacing any earlier one for the same strain.
    ///
    /// Returns the previous lineage if there was one.
    pub fn insert(&mut self, strain: impl Into<String>, lineage: impl Into<String>) -> Option<String> {
        self.lineages.insert(strain.into(), lineage.into())
    }

    #[inline]
    pub fn get(&self, strain: &str) -> Option<&str> {
        self.lineages.get(strain).map(String::as_str)
    }

    pub fn contains(&self, strain: &str) -> bool {
        self.lineages.contains_key(strain)
    }

    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    /// Iterate `(strain, lineage)` in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lineages.iter().map(|(s, l)| (s.as_str(), l.as_str()))
    }

    /// Rewrite every lineage through `f`, stopping at the first failure
    pub fn try_map_lineages<F>(&self, mut f: F) -> Result<Designations>
    where
        F: FnMut(&str, &str) -> Result<String>,
    {
        let mut lineages = IndexMap::with_capacity(self.lineages.len());
        for (strain, lineage) in &self.lineages {
            lineages.insert(strain.clone(), f(strain, lineage)?);
        }
        Ok(Designations { lineages })
    }

    /// Strains grouped by lineage, strains in table order
    pub fn group_by_lineage(&self) -> IndexMap<&str, Vec<&str>> {
        let mut groups: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (strain, lineage) in self.iter() {
            groups.entry(lineage).or_default().push(strain);
        }
        groups
    }
}

impl<S: Into<String>, L: Into<String>> FromIterator<(S, L)> for Designations {
    fn from_iter<I: IntoIterator<Item = (S, L)>>(iter: I) -> Self {
        let mut designations = Designations::new();
        for (strain, lineage) in iter {
            designations.insert(strain, lineage);
        }
        designations
    }
}

//! Multi-pattern fixed-string automaton over signature prefilters.

use aho_corasick::AhoCorasick;

use crate::error::ScanError;

/// One occurrence of a prefilter in a line; `line[start..stop]` equals the
/// pattern. Overlapping and nested occurrences are all reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefilterHit<'a> {
    pub pattern: &'a str,
    pub start: usize,
    pub stop: usize,
}

/// Aho-Corasick automaton built once per signature set.
pub struct PrefilterIndex {
    automaton: AhoCorasick,
    patterns: Vec<String>,
}

impl PrefilterIndex {
    pub fn build<I, S>(patterns: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let automaton = AhoCorasick::new(&patterns)
            .map_err(|e| ScanError::IndexBuild(e.to_string()))?;
        Ok(Self {
            automaton,
            patterns,
        })
    }

    /// Every occurrence of every pattern in `line`, including overlaps.
    pub fn find_all<'s>(&'s self, line: &'s str) -> impl Iterator<Item = PrefilterHit<'s>> + 's {
        self.automaton
            .find_overlapping_iter(line)
            .map(move |m| PrefilterHit {
                pattern: &self.patterns[m.pattern().as_usize()],
                start: m.start(),
                stop: m.end(),
            })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_every_occurrence() {
        let index = PrefilterIndex::build(["abc", "bcd"]).unwrap();
        let hits: Vec<_> = index.find_all("xabcdx abc").collect();
        assert_eq!(hits.len(), 3);
        assert!(hits.contains(&PrefilterHit {
            pattern: "abc",
            start: 1,
            stop: 4
        }));
        assert!(hits.contains(&PrefilterHit {
            pattern: "bcd",
            start: 2,
            stop: 5
        }));
        assert!(hits.contains(&PrefilterHit {
            pattern: "abc",
            start: 7,
            stop: 10
        }));
    }

    #[test]
    fn nested_patterns_both_hit() {
        let index = PrefilterIndex::build(["192.168.1.", "192.168.1.1"]).unwrap();
        let hits: Vec<_> = index.find_all("x 192.168.1.1 x").collect();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn empty_index_finds_nothing() {
        let index = PrefilterIndex::build(Vec::<String>::new()).unwrap();
        assert!(index.find_all("anything").next().is_none());
        assert!(index.is_empty());
    }
}

//! Source maps from byte offsets back to template lines

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Line table for a single template file.
///
/// Compiled methods keep one of these so that a span recorded at parse time
/// can be turned back into the line of the original template at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build the line table for `source`
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// 1-based line containing `offset`
    ///
    /// Offsets past the end of the source clamp to the last line.
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        self.line_starts.partition_point(|&start| start <= offset)
    }

    /// Number of lines in the source
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

use crate::diagnostic::Location;

/// Byte offset to line/column translation for one template.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    /// Columns count characters, not bytes.
    pub fn location(&self, text: &str, offset: usize) -> Location {
        let offset = offset.min(text.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.starts[line];
        let column = text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - start);
        Location::new(line + 1, column + 1)
    }
}

/// A run of generated lines that came from one template fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    generated_line: usize,
    generated_column: usize,
    line_count: usize,
    origin: Location,
}

/// Maps generated-source positions back to template positions.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    segments: Vec<Segment>,
}

impl SourceMap {
    pub fn record(
        &mut self,
        generated_line: usize,
        generated_column: usize,
        line_count: usize,
        origin: Location,
    ) {
        self.segments.push(Segment {
            generated_line,
            generated_column,
            line_count: line_count.max(1),
            origin,
        });
    }

    /// Look up a 1-based generated position. Lines produced by the lowering
    /// scaffolding have no template counterpart and yield `None`.
    pub fn lookup(&self, line: usize, column: usize) -> Option<Location> {
        let segment = self.segments.iter().find(|s| {
            line >= s.generated_line && line < s.generated_line + s.line_count
        })?;

        let rel_line = line - segment.generated_line + 1;
        let rel_column = if rel_line == 1 {
            (column + 1).saturating_sub(segment.generated_column).max(1)
        } else {
            column
        };
        Some(segment.origin.advance(rel_line, rel_column))
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_locations() {
        let text = "ab\ncdé\n\nx";
        let index = LineIndex::new(text);
        assert_eq!(index.location(text, 0), Location::new(1, 1));
        assert_eq!(index.location(text, 2), Location::new(1, 3));
        assert_eq!(index.location(text, 3), Location::new(2, 1));
        // 'é' is two bytes but one column
        assert_eq!(index.location(text, 7), Location::new(2, 4));
        assert_eq!(index.location(text, 8), Location::new(3, 1));
        assert_eq!(index.location(text, text.len()), Location::new(4, 2));
    }

    #[test]
    fn test_lookup_maps_first_and_continuation_lines() {
        let mut map = SourceMap::default();
        // fragment starts at generated 5:20, spans two lines, from template 2:7
        map.record(5, 20, 2, Location::new(2, 7));

        assert_eq!(map.lookup(5, 20), Some(Location::new(2, 7)));
        assert_eq!(map.lookup(5, 23), Some(Location::new(2, 10)));
        assert_eq!(map.lookup(6, 4), Some(Location::new(3, 4)));
        assert_eq!(map.lookup(7, 1), None);
        assert_eq!(map.lookup(1, 1), None);
    }

    #[test]
    fn test_lookup_clamps_columns_left_of_fragment() {
        let mut map = SourceMap::default();
        map.record(3, 10, 1, Location::new(1, 4));
        assert_eq!(map.lookup(3, 2), Some(Location::new(1, 4)));
    }
}

// Source segmentation
// Splits raw text into blank-line separated segments


/// One retrievable unit of source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub source_type: String,
    pub ordinal: usize,
}

impl Segment {
    /// Record id: `<source_type>_<ordinal>`
    #[inline]
    pub fn id(&self) -> String {
        format!("{}_{}", self.source_type, self.ordinal)
    }
}

/// Split `raw` into segments. Consecutive non-blank lines are trimmed and
/// joined with a single space; one or more blank lines end a segment.
#[inline]
pub fn segment_text(source_type: &str, raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    let mut flush = |current: &mut Vec<&str>| {
        if !current.is_empty() {
            let ordinal = segments.len();
            segments.push(Segment {
                text: current.join(" "),
                source_type: source_type.to_string(),
                ordinal,
            });
            current.clear();
        }
    };

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut current);
        } else {
            current.push(line);
        }
    }
    flush(&mut current);

    segments
}

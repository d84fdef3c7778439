use serde::{Deserialize, Serialize};

pub type FileId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Span({}:{}-{})", self.file, self.lo, self.hi)
    }
}

impl Span {
    pub fn new(file: FileId, lo: u32, hi: u32) -> Span {
        debug_assert!(lo <= hi, "inverted span {lo}..{hi}");
        Span { file, lo, hi }
    }

    pub fn null() -> Span {
        Span::default()
    }

    pub fn is_null(&self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    pub fn len(&self) -> u32 {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.lo == self.hi
    }

    /// Smallest span covering every non-null span in `spans`.
    pub fn union(spans: impl IntoIterator<Item = Span>) -> Span {
        spans
            .into_iter()
            .filter(|span| !span.is_null())
            .reduce(|acc, span| Span {
                file: acc.file,
                lo: acc.lo.min(span.lo),
                hi: acc.hi.max(span.hi),
            })
            .unwrap_or_default()
    }

    pub fn to(self, other: Span) -> Span {
        Span::union([self, other])
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new((span.lo as usize).into(), span.len() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_skips_null_spans() {
        let span = Span::union([Span::null(), Span::new(0, 4, 9), Span::new(0, 2, 5)]);
        assert_eq!(span, Span::new(0, 2, 9));
        assert!(Span::union([]).is_null());
    }

    #[test]
    fn converts_to_source_span() {
        let source: miette::SourceSpan = Span::new(0, 3, 8).into();
        assert_eq!(source.offset(), 3);
        assert_eq!(source.len(), 5);
    }
}

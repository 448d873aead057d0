use std::fmt;

/// What a container record holds. Decided by position, never by content.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum RecordKind {
    Text,
    Tables,
    Opaque,
}

pub fn record_kind_to_str(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Text => "text",
        RecordKind::Tables => "tables",
        RecordKind::Opaque => "opaque",
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", record_kind_to_str(*self))
    }
}

/// A run of consecutive records in a container.
#[derive(Debug)]
pub enum Segment {
    /// Two VGA files per zone: `0001.VGA`, `0002.VGA`, `0011.VGA`, ...
    Zones(u16),
    Numbered{ prefix: &'static str, suffix: &'static str, first: u16, last: u16 },
    Named(&'static str),
    /// The text files listed by the text index, in index order.
    TextFiles,
    /// The script files listed by the table index, in index order.
    TableFiles,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSlot {
    pub ordinal: usize,
    pub name: String,
    pub kind: RecordKind,
}

pub fn layout_records(segments: &[Segment], text_files: &[String], table_files: &[String]) -> Vec<RecordSlot> {
    let mut named: Vec<(String, RecordKind)> = Vec::new();
    for segment in segments {
        match segment {
            Segment::Zones(count) => {
                for zone in 0..*count {
                    named.push((format!("{:03}1.VGA", zone), RecordKind::Opaque));
                    named.push((format!("{:03}2.VGA", zone), RecordKind::Opaque));
                }
            },
            Segment::Numbered{ prefix, suffix, first, last } => {
                for n in *first..=*last {
                    named.push((format!("{}{}{}", prefix, n, suffix), RecordKind::Opaque));
                }
            },
            Segment::Named(name) => named.push((name.to_string(), RecordKind::Opaque)),
            Segment::TextFiles => {
                named.extend(text_files.iter().map(|f| (f.clone(), RecordKind::Text)));
            },
            Segment::TableFiles => {
                named.extend(table_files.iter().map(|f| (f.clone(), RecordKind::Tables)));
            },
        }
    }
    named.into_iter().enumerate()
        .map(|(ordinal, (name, kind))| RecordSlot{ ordinal, name, kind })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_segments_in_order() {
        let segments = [
            Segment::Zones(2),
            Segment::Numbered{ prefix: "MOD", suffix: ".MUS", first: 0, last: 1 },
            Segment::Named("EMPTYFILE"),
            Segment::TextFiles,
            Segment::TableFiles,
            Segment::Named("EMPTYFILE"),
        ];
        let slots = layout_records(&segments, &[ "TEXT01".to_string() ], &[ "TABLES01".to_string(), "TABLES02".to_string() ]);
        let names: Vec<&str> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![ "0001.VGA", "0002.VGA", "0011.VGA", "0012.VGA", "MOD0.MUS", "MOD1.MUS",
            "EMPTYFILE", "TEXT01", "TABLES01", "TABLES02", "EMPTYFILE" ]);
        assert_eq!(slots[7].kind, RecordKind::Text);
        assert_eq!(slots[9], RecordSlot{ ordinal: 9, name: "TABLES02".to_string(), kind: RecordKind::Tables });
        assert_eq!(slots[10].kind, RecordKind::Opaque);
    }
}

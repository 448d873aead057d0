use phf::phf_map;

use crate::archive::ArchiveLayout;
use crate::codepage::Language;
use crate::opcode::OpTableId;
use crate::record::Segment;

/// Everything the codecs need to know about one release of a game.
#[derive(Debug)]
pub struct GameVariant {
    pub id: &'static str,
    pub name: &'static str,
    /// Holds the global strings, the objects and the resident script tables.
    pub basefile: &'static str,
    /// Container file, or `None` when the records are loose files.
    pub archive: Option<&'static str>,
    pub archive_layout: ArchiveLayout,
    pub segments: &'static [Segment],
    pub op_table: OpTableId,
    pub default_language: Language,
    pub has_voice_crossref: bool,
    pub text_index: Option<&'static str>,
    pub table_index: Option<&'static str>,
    /// Whether an edited script file is accepted on rebuild.
    pub script_rebuild: bool,
    /// Whether text references in a script file must stay inside its paired text file.
    pub narrow_text_ranges: bool,
}

static LOOSE_FILES: &[Segment] = &[ Segment::TextFiles, Segment::TableFiles ];

static SIMON_GME: &[Segment] = &[
    Segment::Zones(164),
    Segment::Named("UNKNOWN.BIN"),
    Segment::Numbered{ prefix: "MOD", suffix: ".MUS", first: 0, last: 35 },
    Segment::Named("EMPTYFILE"),
    Segment::TextFiles,
    Segment::TableFiles,
    Segment::Named("EMPTYFILE"),
];

static SIMON2_GME: &[Segment] = &[
    Segment::Zones(141),
    Segment::Numbered{ prefix: "HI", suffix: ".XMI", first: 1, last: 93 },
    Segment::Named("EMPTYFILE"),
    Segment::TextFiles,
    Segment::TableFiles,
    Segment::Named("EMPTYFILE"),
    Segment::Numbered{ prefix: "SFX", suffix: ".VOC", first: 1, last: 19 },
    Segment::Numbered{ prefix: "LO", suffix: ".XMI", first: 1, last: 93 },
    Segment::Named("EMPTYFILE"),
];

pub static GAME_VARIANTS: phf::Map<&'static str, GameVariant> = phf_map!{
    "waxworks" => GameVariant{
        id: "waxworks",
        name: "Waxworks",
        basefile: "GAMEPC",
        archive: None,
        archive_layout: ArchiveLayout::Indexed,
        segments: LOOSE_FILES,
        op_table: OpTableId::Waxworks,
        default_language: Language::English,
        has_voice_crossref: false,
        text_index: Some("STRIPPED.TXT"),
        table_index: None,
        script_rebuild: false,
        narrow_text_ranges: false,
    },
    "waxworks-demo" => GameVariant{
        id: "waxworks-demo",
        name: "Waxworks: Demo",
        basefile: "DEMO",
        archive: None,
        archive_layout: ArchiveLayout::Indexed,
        segments: LOOSE_FILES,
        op_table: OpTableId::Waxworks,
        default_language: Language::English,
        has_voice_crossref: false,
        text_index: None,
        table_index: None,
        script_rebuild: false,
        narrow_text_ranges: false,
    },
    "simon1" => GameVariant{
        id: "simon1",
        name: "Simon the Sorcerer: Floppy version",
        basefile: "GAMEPC",
        archive: None,
        archive_layout: ArchiveLayout::Indexed,
        segments: LOOSE_FILES,
        op_table: OpTableId::Simon,
        default_language: Language::English,
        has_voice_crossref: false,
        text_index: Some("STRIPPED.TXT"),
        table_index: Some("TBLLIST"),
        script_rebuild: true,
        narrow_text_ranges: true,
    },
    "simon1-demo" => GameVariant{
        id: "simon1-demo",
        name: "Simon the Sorcerer: Demo",
        basefile: "GDEMO",
        archive: None,
        archive_layout: ArchiveLayout::Indexed,
        segments: LOOSE_FILES,
        op_table: OpTableId::Simon,
        default_language: Language::English,
        has_voice_crossref: false,
        text_index: Some("STRIPPED.TXT"),
        table_index: Some("TBLLIST"),
        script_rebuild: false,
        narrow_text_ranges: true,
    },
    "simon1-talkie" => GameVariant{
        id: "simon1-talkie",
        name: "Simon the Sorcerer: Talkie version",
        basefile: "GAMEPC",
        archive: Some("SIMON.GME"),
        archive_layout: ArchiveLayout::Indexed,
        segments: SIMON_GME,
        op_table: OpTableId::SimonTalkie,
        default_language: Language::English,
        has_voice_crossref: true,
        text_index: Some("STRIPPED.TXT"),
        table_index: Some("TBLLIST"),
        script_rebuild: true,
        narrow_text_ranges: true,
    },
    "simon2" => GameVariant{
        id: "simon2",
        name: "Simon the Sorcerer II: Floppy version",
        basefile: "GAME32",
        archive: Some("SIMON2.GME"),
        archive_layout: ArchiveLayout::Talkie{ extra_words: 1 },
        segments: SIMON2_GME,
        op_table: OpTableId::Simon2,
        default_language: Language::English,
        has_voice_crossref: false,
        text_index: Some("STRIPPED.TXT"),
        table_index: Some("TBLLIST"),
        script_rebuild: true,
        narrow_text_ranges: true,
    },
    "simon2-talkie" => GameVariant{
        id: "simon2-talkie",
        name: "Simon the Sorcerer II: Talkie version",
        basefile: "GSPTR30",
        archive: Some("SIMON2.GME"),
        archive_layout: ArchiveLayout::Talkie{ extra_words: 1 },
        segments: SIMON2_GME,
        op_table: OpTableId::Simon2Talkie,
        default_language: Language::English,
        has_voice_crossref: true,
        text_index: Some("STRIPPED.TXT"),
        table_index: Some("TBLLIST"),
        script_rebuild: true,
        narrow_text_ranges: true,
    },
    "feeble" => GameVariant{
        id: "feeble",
        name: "The Feeble Files",
        basefile: "GAME22",
        archive: None,
        archive_layout: ArchiveLayout::Indexed,
        segments: LOOSE_FILES,
        op_table: OpTableId::Feeble,
        default_language: Language::English,
        has_voice_crossref: true,
        text_index: None,
        table_index: Some("TBLLIST"),
        script_rebuild: true,
        narrow_text_ranges: true,
    },
};

pub fn find_variant(id: &str) -> Option<&'static GameVariant> {
    GAME_VARIANTS.get(id)
}

pub fn variant_ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = GAME_VARIANTS.keys().copied().collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode;

    #[test]
    fn registry_entries_are_consistent() {
        for id in variant_ids() {
            let variant = find_variant(id).unwrap();
            assert_eq!(variant.id, id);
            if variant.archive.is_none() {
                assert!(variant.segments.iter().all(|s| matches!(s, Segment::TextFiles | Segment::TableFiles)), "{}", id);
            }
        }
        assert!(find_variant("elvira1").is_none());
    }

    #[test]
    fn talkie_variants_carry_voice_operands() {
        let variant = find_variant("simon2-talkie").unwrap();
        assert!(variant.has_voice_crossref);
        assert_eq!(opcode::shape_string(opcode::operand_shape(0xa2, variant).unwrap()), "BBTS");
        let floppy = find_variant("simon2").unwrap();
        assert_eq!(opcode::shape_string(opcode::operand_shape(0xa2, floppy).unwrap()), "BBT");
        assert_eq!(floppy.archive_layout, ArchiveLayout::Talkie{ extra_words: 1 });
    }
}

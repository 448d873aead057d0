use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::archive::{Archive, ArchiveError, ResourceRecord};
use crate::assemble::{self, Assembler, EncodeError, SourceBody, StringPool};
use crate::basefile::{Basefile, BasefileError};
use crate::codepage::{EncodingError, Language};
use crate::disassemble::{self, DecodeError};
use crate::game::GameVariant;
use crate::item::{self, Item, ObjectError};
use crate::label::{self, LabelMap};
use crate::opcode::InstructionSet;
use crate::print::{self, Formatter};
use crate::record::{self, RecordKind, RecordSlot};
use crate::script::{self, ScriptError, ScriptStream, Symbols, TableIndexEntry};
use crate::stream::Stream;
use crate::strings::{self, StringEntry, StringTable, StringsError, TextIndexEntry, TEXT_BASE};
use crate::voice::{self, SoundMap};

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0} is missing from the game directory")]
    MissingFile(String),
    #[error("container holds {found} records but {expected} were expected")]
    RecordCount{ expected: usize, found: usize },
    #[error("{0} is not a text file of this game")]
    UnknownStringFile(String),
    #[error("{file} holds {expected} strings but the strings file gives {found}")]
    StringCount{ file: String, expected: usize, found: usize },
    #[error("{file} string {id}: {source}")]
    Text{ file: String, id: u32, source: EncodingError },
    #[error("the game has {expected} objects but the object file holds {found}, objects cannot be removed")]
    RemovedObjects{ expected: usize, found: usize },
    #[error("{0} failed to decode, its scripts cannot be replaced")]
    OpaqueRecord(String),
    #[error("refusing to write into the game directory {0}")]
    OutputIsGameDir(PathBuf),
    #[error("{file} would hold {count} strings but global string ids end at {limit}")]
    GlobalStringsFull{ file: String, count: usize, limit: u32 },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Basefile(#[from] BasefileError),
    #[error(transparent)]
    Strings(#[from] StringsError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Object(#[from] ObjectError),
}

/// Where the named game files come from.
pub trait FileSource {
    /// `None` when the file does not exist.
    fn load(&self, name: &str) -> io::Result<Option<Vec<u8>>>;
}

pub struct GameDir(pub PathBuf);

impl FileSource for GameDir {
    fn load(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.0.join(name)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl FileSource for HashMap<String, Vec<u8>> {
    fn load(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.get(name).cloned())
    }
}

fn require(source: &dyn FileSource, name: &str) -> Result<Vec<u8>, ToolkitError> {
    source.load(name)?.ok_or_else(|| ToolkitError::MissingFile(name.to_string()))
}

/// A game as read from disk: the basefile, both indexes and every record by position.
pub struct Game {
    pub variant: &'static GameVariant,
    pub basefile: Basefile,
    pub text_index: Vec<TextIndexEntry>,
    pub table_index: Vec<TableIndexEntry>,
    pub slots: Vec<RecordSlot>,
    pub records: Vec<Vec<u8>>,
    /// Extra header block of the container, `None` when the records are loose files.
    container_extra: Option<Vec<u8>>,
}

pub fn load_game(variant: &'static GameVariant, source: &dyn FileSource) -> Result<Game, ToolkitError> {
    info!("loading {}", variant.name);
    let basefile = Basefile::read(&require(source, variant.basefile)?)?;

    let text_index = match variant.text_index {
        Some(name) => match source.load(name)? {
            Some(data) => strings::read_text_index(&data)?,
            None => {
                warn!("{} not found, assuming no text files", name);
                Vec::new()
            },
        },
        None => Vec::new(),
    };
    let table_index = match variant.table_index {
        Some(name) => match source.load(name)? {
            Some(data) => script::read_table_index(&data)?,
            None => {
                warn!("{} not found, assuming no script files", name);
                Vec::new()
            },
        },
        None => Vec::new(),
    };

    let text_files: Vec<String> = text_index.iter().map(|e| e.name.clone()).collect();
    let table_files: Vec<String> = table_index.iter().map(|e| e.file.clone()).collect();
    let slots = record::layout_records(variant.segments, &text_files, &table_files);

    let (records, container_extra) = match variant.archive {
        Some(name) => {
            let archive = Archive::read(&require(source, name)?, variant.archive_layout)?;
            if archive.records.len() != slots.len() {
                return Err(ToolkitError::RecordCount{ expected: slots.len(), found: archive.records.len() });
            }
            info!("{}: {} records", name, archive.records.len());
            (archive.records.into_iter().map(|r| r.data).collect(), Some(archive.extra))
        },
        None => {
            let records = slots.iter()
                .map(|slot| require(source, &slot.name))
                .collect::<Result<Vec<_>, _>>()?;
            (records, None)
        },
    };
    for slot in &slots {
        debug!("record {} {} ({})", slot.ordinal, slot.name, slot.kind);
    }
    Ok(Game{ variant, basefile, text_index, table_index, slots, records, container_extra })
}

/// The basefile data split into its object table and resident script tables.
struct BasefileLayout {
    items: Vec<Item>,
    objects_end: usize,
    /// Decoded resident tables and where they end, or why they could not be decoded.
    resident: Result<(ScriptStream, usize), DecodeError>,
}

impl Game {
    pub fn instruction_set(&self) -> &'static InstructionSet {
        self.variant.op_table.instruction_set()
    }

    pub fn record(&self, name: &str) -> Option<&[u8]> {
        self.slots.iter().position(|s| s.name == name).map(|n| self.records[n].as_slice())
    }

    fn text_bases(&self) -> Vec<u32> {
        strings::text_bases(&self.text_index, |name| self.record(name).map_or(true, |d| d.is_empty()))
    }

    fn text_tables(&self) -> Result<Vec<(String, StringTable)>, ToolkitError> {
        let mut tables = Vec::with_capacity(self.text_index.len());
        for (entry, base) in self.text_index.iter().zip(self.text_bases()) {
            let data = self.record(&entry.name).ok_or_else(|| ToolkitError::MissingFile(entry.name.clone()))?;
            tables.push((entry.name.clone(), StringTable::from_bytes(base, data)?));
        }
        Ok(tables)
    }

    /// External string ids a script file may reference: those of its paired text file.
    fn text_range(&self, table_file: &str) -> Option<Range<u32>> {
        if !self.variant.narrow_text_ranges {
            return None;
        }
        let paired = table_file.replacen("TABLES", "TEXT", 1);
        self.text_index.iter().zip(self.text_bases())
            .find(|(entry, _)| entry.name == paired)
            .map(|(entry, base)| base..entry.base_max as u32)
    }

    fn basefile_layout(&self) -> Result<BasefileLayout, ToolkitError> {
        let data = &self.basefile.data;
        let mut rdr = Stream::new(data);
        let items = item::read_items(&mut rdr, self.basefile.object_count())?;
        let objects_end = rdr.position();
        let resident = disassemble::decode_block(&data[objects_end..], self.instruction_set());
        Ok(BasefileLayout{ items, objects_end, resident })
    }

    /// Item count scripts may reference, dynamic items included.
    fn item_count(&self, added: usize) -> u32 {
        self.basefile.header.total_item_count.saturating_add(item::FIRST_ITEM).saturating_add(added as u32)
    }
}

fn add_texts(symbols: &mut Symbols, table: &StringTable, language: Language) {
    for (id, text) in table.ids().zip(table.decode(language)) {
        symbols.texts.insert(id, text);
    }
}

fn decode_script(data: &[u8], set: &InstructionSet, ranges: &[(u16, u16)]) -> Result<(ScriptStream, LabelMap), DecodeError> {
    let stream = disassemble::decode_record(data, set)?;
    disassemble::check_ranges(&stream, ranges)?;
    let labels = label::find_labels(&stream)?;
    Ok((stream, labels))
}

/// Text artifacts of one extraction.
#[derive(Debug)]
pub struct Extraction {
    pub strings: String,
    pub scripts: String,
    pub objects: String,
    /// Script records that failed to decode. They appear as RAW in `scripts`.
    pub failures: Vec<(String, DecodeError)>,
    pub voices: SoundMap,
}

pub fn extract(game: &Game, language: Language) -> Result<Extraction, ToolkitError> {
    let variant = game.variant;
    let set = game.instruction_set();
    let texts = game.text_tables()?;

    let mut symbols = Symbols::default();
    add_texts(&mut symbols, &game.basefile.strings, language);
    for (_, table) in &texts {
        add_texts(&mut symbols, table, language);
    }

    let layout = game.basefile_layout()?;
    symbols.item_names = item::item_names(&layout.items);
    symbols.item_count = game.item_count(0);
    info!("{} objects, {} strings", layout.items.len(), symbols.texts.len());

    let mut decoded = Vec::with_capacity(game.table_index.len() + 1);
    let resident = layout.resident
        .and_then(|(stream, _)| label::find_labels(&stream).map(|labels| (stream, labels)));
    decoded.push((variant.basefile.to_string(), Vec::new(), resident));
    for entry in &game.table_index {
        let data = game.record(&entry.file).ok_or_else(|| ToolkitError::MissingFile(entry.file.clone()))?;
        decoded.push((entry.file.clone(), entry.ranges.clone(), decode_script(data, set, &entry.ranges)));
    }

    let mut voices = SoundMap::new();
    if variant.has_voice_crossref {
        voice::collect_object_voices(&mut voices, &layout.items);
        for (_, _, result) in &decoded {
            if let Ok((stream, _)) = result {
                voice::collect_script_voices(&mut voices, stream);
            }
        }
    }

    let mut scripts = String::new();
    let mut failures = Vec::new();
    for (name, ranges, result) in decoded {
        match result {
            Ok((stream, labels)) => {
                debug!("{}: {} tables, {} commands", name, stream.tables.len(), stream.instruction_count());
                let crossref = if variant.has_voice_crossref { Some(&voices) } else { None };
                print::file_header(&mut scripts, &name, &ranges);
                Formatter::new(set, &labels, &symbols, crossref).format_tables(&mut scripts, &stream);
            },
            Err(e) => {
                warn!("{}: {}, keeping it as raw bytes", name, e);
                print::raw_file_header(&mut scripts, &name, &e.to_string());
                failures.push((name, e));
            },
        }
    }

    let voices_of = |id: u32| if variant.has_voice_crossref {
        Some(voices.get(&id).map(|set| set.iter().copied().collect::<Vec<u16>>()).unwrap_or_default())
    } else {
        None
    };
    let mut entries = Vec::new();
    let groups = std::iter::once((variant.basefile.to_string(), &game.basefile.strings))
        .chain(texts.iter().map(|(name, table)| (name.clone(), table)));
    for (file, table) in groups {
        for (id, text) in table.ids().zip(table.decode(language)) {
            entries.push(StringEntry{ file: file.clone(), id, text, voices: voices_of(id) });
        }
    }

    Ok(Extraction{
        strings: strings::write_strings(&entries),
        scripts,
        objects: item::write_items_text(&layout.items, &symbols),
        failures,
        voices,
    })
}

/// Edited text artifacts. Anything left out keeps the game's original bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Edits<'a> {
    pub strings: Option<&'a str>,
    pub scripts: Option<&'a str>,
    pub objects: Option<&'a str>,
}

/// Everything a rebuild produces. Nothing is written until all of it encoded.
#[derive(Debug)]
pub struct Rebuilt {
    pub basefile: Vec<u8>,
    pub archive: Option<Vec<u8>>,
    /// Loose files whose contents changed, by name.
    pub files: Vec<(String, Vec<u8>)>,
}

fn encode_table(file: &str, base: u32, lines: &[String], language: Language) -> Result<StringTable, ToolkitError> {
    let mut entries = Vec::with_capacity(lines.len());
    for (n, line) in lines.iter().enumerate() {
        let id = base + n as u32;
        entries.push(language.encode(line).map_err(|source| ToolkitError::Text{ file: file.to_string(), id, source })?);
    }
    Ok(StringTable{ base, entries })
}

pub fn rebuild(game: &Game, language: Language, edits: &Edits) -> Result<Rebuilt, ToolkitError> {
    let variant = game.variant;
    let set = game.instruction_set();
    let mut base_strings = game.basefile.strings.clone();
    let mut texts = game.text_tables()?;

    // Quoted operands name the strings as extracted, before any edits.
    let mut symbols = Symbols::default();
    add_texts(&mut symbols, &base_strings, language);
    for (_, table) in &texts {
        add_texts(&mut symbols, table, language);
    }

    if let Some(text) = edits.strings {
        for (file, entries) in strings::group_strings(strings::read_strings(text)?) {
            if file == variant.basefile {
                let lines = strings::contiguous_lines(&file, &entries, 0)?;
                if lines.len() < base_strings.entries.len() {
                    return Err(ToolkitError::StringCount{ file, expected: base_strings.entries.len(), found: lines.len() });
                }
                base_strings = encode_table(&file, 0, &lines, language)?;
            } else if let Some((_, table)) = texts.iter_mut().find(|(name, _)| *name == file) {
                let lines = strings::contiguous_lines(&file, &entries, table.base)?;
                if lines.len() != table.entries.len() {
                    return Err(ToolkitError::StringCount{ file, expected: table.entries.len(), found: lines.len() });
                }
                *table = encode_table(&file, table.base, &lines, language)?;
            } else {
                return Err(ToolkitError::UnknownStringFile(file));
            }
        }
    }

    let layout = game.basefile_layout()?;
    let original_count = layout.items.len();
    let (items, object_bytes) = match edits.objects {
        Some(text) => {
            let items = item::parse_items(text)?;
            if items.len() < original_count {
                return Err(ToolkitError::RemovedObjects{ expected: original_count, found: items.len() });
            }
            let bytes = item::write_items(&items)?;
            (items, bytes)
        },
        None => (layout.items, game.basefile.data[..layout.objects_end].to_vec()),
    };
    if items.len() > original_count {
        info!("{} new objects", items.len() - original_count);
    }

    symbols.item_names = item::item_names(&items);
    symbols.item_count = game.item_count(items.len() - original_count);

    let mut assembled: BTreeMap<String, (Vec<u8>, Vec<(u16, u16)>)> = BTreeMap::new();
    let first_new = base_strings.entries.len() as u32;
    let limit = game.text_bases().first().map_or(TEXT_BASE, |&base| base.min(TEXT_BASE));
    let pool = match edits.scripts {
        Some(_) if !variant.script_rebuild => {
            info!("{} scripts cannot be recompiled, keeping the original script records", variant.name);
            StringPool::bounded(first_new, limit)
        },
        Some(text) => {
            let files = assemble::parse_script(text)?;
            let mut assembler = Assembler::new(set, &symbols, StringPool::bounded(first_new, limit));
            for file in &files {
                let ranges = match &file.body {
                    SourceBody::Raw => {
                        debug!("{}: raw, passing through", file.name);
                        continue;
                    },
                    SourceBody::Tables{ ranges, .. } => ranges.clone(),
                };
                let is_basefile = file.name == variant.basefile;
                if !is_basefile && !game.table_index.iter().any(|e| e.file == file.name) {
                    return Err(EncodeError::UnknownFile{ line: file.line, file: file.name.clone() }.into());
                }
                if is_basefile && layout.resident.is_err() {
                    return Err(ToolkitError::OpaqueRecord(file.name.clone()));
                }
                if assembled.contains_key(&file.name) {
                    return Err(EncodeError::Syntax{ line: file.line, reason: format!("{} appears twice", file.name) }.into());
                }
                let range = if is_basefile { None } else { game.text_range(&file.name) };
                let data = assembler.assemble(file, range)?;
                debug!("{}: {} bytes", file.name, data.len());
                assembled.insert(file.name.clone(), (data, ranges));
            }
            assembler.into_pool()
        },
        None => StringPool::bounded(first_new, limit),
    };

    let mut basefile = game.basefile.clone();
    let added = encode_table(variant.basefile, first_new, pool.added(), language)?;
    if !added.entries.is_empty() {
        info!("{} new strings in {}", added.entries.len(), variant.basefile);
    }
    base_strings.entries.extend(added.entries);
    if base_strings.entries.len() > limit as usize {
        return Err(ToolkitError::GlobalStringsFull{
            file: variant.basefile.to_string(),
            count: base_strings.entries.len(),
            limit,
        });
    }
    basefile.strings = base_strings;
    basefile.set_object_count(items.len())?;
    let mut data = object_bytes;
    match (assembled.remove(variant.basefile), &layout.resident) {
        (Some((tables, _)), Ok((_, used))) => {
            data.extend_from_slice(&tables);
            data.extend_from_slice(&game.basefile.data[layout.objects_end + used..]);
        },
        _ => data.extend_from_slice(&game.basefile.data[layout.objects_end..]),
    }
    basefile.data = data;
    let basefile = basefile.write()?;

    let mut records = game.records.clone();
    for (slot, data) in game.slots.iter().zip(records.iter_mut()) {
        match slot.kind {
            RecordKind::Text => {
                if let Some((_, table)) = texts.iter().find(|(name, _)| *name == slot.name) {
                    *data = table.to_bytes();
                }
            },
            RecordKind::Tables => {
                if let Some((tables, _)) = assembled.get(&slot.name) {
                    *data = tables.clone();
                }
            },
            RecordKind::Opaque => { },
        }
    }

    let mut files = Vec::new();
    let archive = match &game.container_extra {
        Some(extra) => {
            let archive = Archive{
                layout: variant.archive_layout,
                extra: extra.clone(),
                records: records.into_iter().enumerate().map(|(ordinal, data)| ResourceRecord{ ordinal, data }).collect(),
            };
            Some(archive.write()?)
        },
        None => {
            for ((slot, data), original) in game.slots.iter().zip(records).zip(&game.records) {
                if data != *original {
                    files.push((slot.name.clone(), data));
                }
            }
            None
        },
    };

    if let Some(name) = variant.table_index {
        let index: Vec<TableIndexEntry> = game.table_index.iter().map(|entry| match assembled.get(&entry.file) {
            Some((_, ranges)) => TableIndexEntry{ file: entry.file.clone(), ranges: ranges.clone() },
            None => entry.clone(),
        }).collect();
        if index != game.table_index {
            info!("table ranges changed, rewriting {}", name);
            files.push((name.to_string(), script::write_table_index(&index)));
        }
    }

    Ok(Rebuilt{ basefile, archive, files })
}

/// Creates `output` and checks that it is not the directory the game is read from.
pub fn prepare_output(game_dir: &Path, output: &Path) -> Result<PathBuf, ToolkitError> {
    fs::create_dir_all(output)?;
    let output = fs::canonicalize(output)?;
    if fs::canonicalize(game_dir)? == output {
        return Err(ToolkitError::OutputIsGameDir(output));
    }
    Ok(output)
}

fn part_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.part_{}", name, std::process::id()))
}

/// Writes every file under a temporary name, then renames them all into place.
pub fn write_outputs(dir: &Path, outputs: &[(String, Vec<u8>)]) -> io::Result<Vec<PathBuf>> {
    for (n, (name, data)) in outputs.iter().enumerate() {
        if let Err(e) = fs::write(part_path(dir, name), data) {
            for (staged, _) in &outputs[..=n] {
                let _ = fs::remove_file(part_path(dir, staged));
            }
            return Err(e);
        }
    }
    let mut written = Vec::with_capacity(outputs.len());
    for (name, data) in outputs {
        let path = dir.join(name);
        fs::rename(part_path(dir, name), &path)?;
        debug!("wrote {} ({} bytes)", path.display(), data.len());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveLayout;
    use crate::game;
    use pretty_assertions::assert_eq;

    fn gamepc() -> Vec<u8> {
        let mut data = vec![
            0, 0, 0, 3,
            0, 0, 0, 128,
            0, 0, 0, 1,
            0, 0, 0, 2,
            0, 0, 0, 10,
        ];
        data.extend_from_slice(b"LAMP\0HALL\0");
        data.extend_from_slice(&[
            0, 0, 0, 5, 0, 0,
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
            0, 0, 0, 0,
            0, 0, 0, 1,
            0, 2, 0, 0, 0, 0, 0, 0, 0, 0,
            0, 0,
        ]);
        data.extend_from_slice(&[ 0, 0, 0, 0, 0, 0, 0, 1, 0, 2, 0, 3, 0x45, 0xff, 0, 1, 0, 1 ]);
        data.extend_from_slice(&[ 0xaa, 0xbb ]);
        data
    }

    fn stripped() -> Vec<u8> {
        b"TEXT01\0\x80\x10".to_vec()
    }

    fn tbllist() -> Vec<u8> {
        b"TABLES01\0\0\x01\0\x05\0\0\0".to_vec()
    }

    const TABLES01: &[u8] = &[ 0, 0, 0, 1, 0, 0, 0x3f, 0, 1, 0, 0, 0x80, 0x00, 0x45, 0xff, 0, 1, 0, 1 ];

    fn loose_game() -> HashMap<String, Vec<u8>> {
        let mut files = HashMap::new();
        files.insert("GAMEPC".to_string(), gamepc());
        files.insert("STRIPPED.TXT".to_string(), stripped());
        files.insert("TBLLIST".to_string(), tbllist());
        files.insert("TEXT01".to_string(), b"HELLO\0WORLD\0".to_vec());
        files.insert("TABLES01".to_string(), TABLES01.to_vec());
        files
    }

    fn load(id: &str, files: &HashMap<String, Vec<u8>>) -> Game {
        load_game(game::find_variant(id).unwrap(), files).unwrap()
    }

    #[test]
    fn extracts_loose_game() {
        let game = load("simon1", &loose_game());
        let out = extract(&game, Language::English).unwrap();
        assert!(out.failures.is_empty());
        assert_eq!(out.strings, "GAMEPC\t0\tLAMP\nGAMEPC\t1\tHALL\nTEXT01\t32768\tHELLO\nTEXT01\t32769\tWORLD\n");
        assert_eq!(out.scripts, concat!(
            "== FILE GAMEPC ~\n",
            "== TABLE 0\n",
            "==> DEF 1 2 3\n",
            "\t(0x45) DONE\n",
            "== FILE TABLES01 1:5\n",
            "== TABLE 1\n",
            "==>\n",
            "\t(0x3f) MESSAGE 32768 // {HELLO}\n",
            "\t(0x45) DONE\n",
        ));
        assert!(out.objects.starts_with("== ITEM 2 ==\n"));
    }

    #[test]
    fn unchanged_rebuild_is_identity() {
        let files = loose_game();
        let game = load("simon1", &files);
        let out = extract(&game, Language::English).unwrap();
        let edits = Edits{ strings: Some(&out.strings), scripts: Some(&out.scripts), objects: Some(&out.objects) };
        let rebuilt = rebuild(&game, Language::English, &edits).unwrap();
        assert_eq!(rebuilt.basefile, files["GAMEPC"]);
        assert!(rebuilt.archive.is_none());
        assert!(rebuilt.files.is_empty());
    }

    #[test]
    fn edited_strings_reach_the_text_file() {
        let game = load("simon1", &loose_game());
        let strings = "TEXT01\t32768\tHOLA\nTEXT01\t32769\tWORLD\n";
        let rebuilt = rebuild(&game, Language::English, &Edits{ strings: Some(strings), ..Edits::default() }).unwrap();
        assert_eq!(rebuilt.files, vec![ ("TEXT01".to_string(), b"HOLA\0WORLD\0".to_vec()) ]);
        assert_eq!(rebuilt.basefile, gamepc());

        let short = "TEXT01\t32768\tHOLA\n";
        assert!(matches!(rebuild(&game, Language::English, &Edits{ strings: Some(short), ..Edits::default() }),
            Err(ToolkitError::StringCount{ expected: 2, found: 1, .. })));
        let unknown = "TEXT09\t32768\tHOLA\n";
        assert!(matches!(rebuild(&game, Language::English, &Edits{ strings: Some(unknown), ..Edits::default() }),
            Err(ToolkitError::UnknownStringFile(_))));
        let gap = "TEXT01\t32768\tHOLA\nTEXT01\t32770\tWORLD\n";
        assert!(matches!(rebuild(&game, Language::English, &Edits{ strings: Some(gap), ..Edits::default() }),
            Err(ToolkitError::Strings(StringsError::NonContiguous{ .. }))));
    }

    #[test]
    fn new_strings_land_in_the_basefile() {
        let game = load("simon1", &loose_game());
        let scripts = "== FILE TABLES01 1:5\n== TABLE 1\n==>\n\tMESSAGE +\"GOODBYE\"\n\tMESSAGE \"WORLD\"\n\tDONE\n";
        let rebuilt = rebuild(&game, Language::English, &Edits{ scripts: Some(scripts), ..Edits::default() }).unwrap();

        let basefile = Basefile::read(&rebuilt.basefile).unwrap();
        assert_eq!(basefile.strings.entries.len(), 3);
        assert_eq!(basefile.strings.get(2), Some(&b"GOODBYE"[..]));
        assert_eq!(basefile.data, game.basefile.data);
        assert_eq!(rebuilt.files, vec![ ("TABLES01".to_string(), vec![
            0, 0, 0, 1, 0, 0,
            0x3f, 0, 1, 0, 0, 0, 2,
            0x3f, 0, 1, 0, 0, 0x80, 0x01,
            0x45, 0xff, 0, 1, 0, 1,
        ]) ]);
    }

    #[test]
    fn quoted_text_resolves_against_the_extracted_strings() {
        let game = load("simon1", &loose_game());
        let strings = "TEXT01\t32768\tHOLA\nTEXT01\t32769\tHELLO\n";
        let scripts = "== FILE TABLES01 1:5\n== TABLE 1\n==>\n\tMESSAGE \"HELLO\"\n\tDONE\n";
        let edits = Edits{ strings: Some(strings), scripts: Some(scripts), ..Edits::default() };
        let rebuilt = rebuild(&game, Language::English, &edits).unwrap();
        assert_eq!(rebuilt.files, vec![ ("TEXT01".to_string(), b"HOLA\0HELLO\0".to_vec()) ]);

        let scripts = "== FILE TABLES01 1:5\n== TABLE 1\n==>\n\tMESSAGE \"HOLA\"\n\tDONE\n";
        let edits = Edits{ strings: Some(strings), scripts: Some(scripts), ..Edits::default() };
        assert!(matches!(rebuild(&game, Language::English, &edits),
            Err(ToolkitError::Encode(EncodeError::UnresolvedReference{ line: 4, .. }))));
    }

    fn global_strings(count: u32) -> String {
        let mut text = String::new();
        for id in 0..count {
            text.push_str(&format!("GAMEPC\t{}\tS{}\n", id, id));
        }
        text.push_str("TEXT01\t32768\tHELLO\nTEXT01\t32769\tWORLD\n");
        text
    }

    #[test]
    fn global_strings_stop_below_the_text_files() {
        let game = load("simon1", &loose_game());
        let add = "== FILE TABLES01 1:5\n== TABLE 1\n==>\n\tMESSAGE +\"NEW\"\n\tDONE\n";

        let almost = global_strings(TEXT_BASE - 1);
        let rebuilt = rebuild(&game, Language::English, &Edits{ strings: Some(&almost), scripts: Some(add), ..Edits::default() }).unwrap();
        let basefile = Basefile::read(&rebuilt.basefile).unwrap();
        assert_eq!(basefile.strings.entries.len(), TEXT_BASE as usize);
        assert_eq!(basefile.strings.get(TEXT_BASE - 1), Some(&b"NEW"[..]));

        let full = global_strings(TEXT_BASE);
        let rebuilt = rebuild(&game, Language::English, &Edits{ strings: Some(&full), ..Edits::default() }).unwrap();
        assert_eq!(Basefile::read(&rebuilt.basefile).unwrap().strings.entries.len(), TEXT_BASE as usize);
        assert!(matches!(rebuild(&game, Language::English, &Edits{ strings: Some(&full), scripts: Some(add), ..Edits::default() }),
            Err(ToolkitError::Encode(EncodeError::MalformedOperand{ line: 4, .. }))));

        let over = global_strings(TEXT_BASE + 1);
        assert!(matches!(rebuild(&game, Language::English, &Edits{ strings: Some(&over), ..Edits::default() }),
            Err(ToolkitError::GlobalStringsFull{ count: 32769, limit: TEXT_BASE, .. })));
    }

    #[test]
    fn text_references_stay_in_the_paired_file() {
        let game = load("simon1", &loose_game());
        let scripts = "== FILE TABLES01 1:5\n== TABLE 1\n==>\n\tMESSAGE 32784\n";
        let err = rebuild(&game, Language::English, &Edits{ scripts: Some(scripts), ..Edits::default() }).unwrap_err();
        assert!(matches!(err, ToolkitError::Encode(EncodeError::TextOutOfRange{ line: 4, id: 32784, .. })));
    }

    #[test]
    fn script_errors_abort_the_rebuild() {
        let game = load("simon1", &loose_game());
        let unknown = "== FILE TABLES07 ~\n";
        assert!(matches!(rebuild(&game, Language::English, &Edits{ scripts: Some(unknown), ..Edits::default() }),
            Err(ToolkitError::Encode(EncodeError::UnknownFile{ line: 1, .. }))));
        let bad = "== FILE TABLES01 1:5\n== TABLE 1\n==>\n\tFROBNICATE 1\n";
        assert!(matches!(rebuild(&game, Language::English, &Edits{ scripts: Some(bad), ..Edits::default() }),
            Err(ToolkitError::Encode(EncodeError::UnknownMnemonic{ line: 4, .. }))));
    }

    #[test]
    fn edited_ranges_rewrite_the_table_index() {
        let game = load("simon1", &loose_game());
        let scripts = "== FILE TABLES01 1:9\n== TABLE 1\n==>\n\tMESSAGE 32768\n\tDONE\n";
        let rebuilt = rebuild(&game, Language::English, &Edits{ scripts: Some(scripts), ..Edits::default() }).unwrap();
        assert_eq!(rebuilt.files, vec![ ("TBLLIST".to_string(), b"TABLES01\0\0\x01\0\x09\0\0\0".to_vec()) ]);
    }

    #[test]
    fn appended_objects_grow_the_counters() {
        let game = load("simon1", &loose_game());
        let out = extract(&game, Language::English).unwrap();
        let objects = format!("{}{}", out.objects, out.objects.replace("== ITEM 2 ==", "== ITEM 3 =="));
        let rebuilt = rebuild(&game, Language::English, &Edits{ objects: Some(&objects), ..Edits::default() }).unwrap();
        let basefile = Basefile::read(&rebuilt.basefile).unwrap();
        assert_eq!(basefile.header.item_count, 2);
        assert_eq!(basefile.header.total_item_count, 4);

        let none = "";
        assert!(matches!(rebuild(&game, Language::English, &Edits{ objects: Some(none), ..Edits::default() }),
            Err(ToolkitError::RemovedObjects{ expected: 1, found: 0 })));
    }

    #[test]
    fn scripts_are_ignored_where_recompiling_is_off() {
        let mut files = loose_game();
        let base = files.remove("GAMEPC").unwrap();
        files.insert("GDEMO".to_string(), base.clone());
        let game = load("simon1-demo", &files);
        let rebuilt = rebuild(&game, Language::English, &Edits{ scripts: Some("not a script"), ..Edits::default() }).unwrap();
        assert_eq!(rebuilt.basefile, base);
        assert!(rebuilt.files.is_empty());
    }

    #[test]
    fn undecodable_records_stay_raw() {
        let mut files = loose_game();
        files.insert("TABLES01".to_string(), vec![ 0, 0, 0, 1, 0, 0, 0xfe ]);
        let game = load("simon1", &files);
        let out = extract(&game, Language::English).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert!(out.scripts.contains("== FILE TABLES01 RAW // "));
        let rebuilt = rebuild(&game, Language::English, &Edits{ scripts: Some(&out.scripts), ..Edits::default() }).unwrap();
        assert!(rebuilt.files.is_empty());
    }

    #[test]
    fn missing_files_are_reported() {
        let mut files = loose_game();
        files.remove("TEXT01");
        assert!(matches!(load_game(game::find_variant("simon1").unwrap(), &files),
            Err(ToolkitError::MissingFile(name)) if name == "TEXT01"));
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("agostools-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn output_must_not_be_the_game_directory() {
        let game_dir = scratch_dir("game");
        assert!(matches!(prepare_output(&game_dir, &game_dir), Err(ToolkitError::OutputIsGameDir(_))));
        assert!(matches!(prepare_output(&game_dir, &game_dir.join(".")), Err(ToolkitError::OutputIsGameDir(_))));

        let output = prepare_output(&game_dir, &game_dir.join("rebuilt")).unwrap();
        assert!(output.is_dir());
        fs::remove_dir_all(&game_dir).unwrap();
    }

    #[test]
    fn outputs_replace_files_whole() {
        let dir = scratch_dir("out");
        fs::write(dir.join("GAMEPC"), b"old").unwrap();
        let outputs = vec![ ("GAMEPC".to_string(), b"new".to_vec()), ("TEXT01".to_string(), b"A\0".to_vec()) ];
        let written = write_outputs(&dir, &outputs).unwrap();
        assert_eq!(written, vec![ dir.join("GAMEPC"), dir.join("TEXT01") ]);
        assert_eq!(fs::read(dir.join("GAMEPC")).unwrap(), b"new");
        assert_eq!(fs::read(dir.join("TEXT01")).unwrap(), b"A\0");
        let mut names: Vec<_> = fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name()).collect();
        names.sort();
        assert_eq!(names, vec![ "GAMEPC", "TEXT01" ]);
        fs::remove_dir_all(&dir).unwrap();
    }

    fn talkie_container(drop_one: bool) -> HashMap<String, Vec<u8>> {
        let variant = game::find_variant("simon1-talkie").unwrap();
        let slots = record::layout_records(variant.segments, &[ "TEXT01".to_string() ], &[ "TABLES01".to_string() ]);
        let mut records: Vec<ResourceRecord> = slots.iter().map(|slot| {
            let data = match slot.name.as_str() {
                "TEXT01" => b"HELLO\0WORLD\0".to_vec(),
                "TABLES01" => vec![ 0, 0, 0, 1, 0, 0, 0x43, 0x02, 0, 1, 0, 0, 0x80, 0x00, 0, 7, 0x45, 0xff, 0, 1, 0, 1 ],
                "EMPTYFILE" => Vec::new(),
                _ => vec![ slot.ordinal as u8 ],
            };
            ResourceRecord{ ordinal: slot.ordinal, data }
        }).collect();
        if drop_one {
            records.remove(0);
        }
        let archive = Archive{ layout: ArchiveLayout::Indexed, extra: Vec::new(), records };

        let mut files = loose_game();
        files.remove("TEXT01");
        files.remove("TABLES01");
        files.insert("SIMON.GME".to_string(), archive.write().unwrap());
        files
    }

    #[test]
    fn container_game_round_trip() {
        let files = talkie_container(false);
        let game = load("simon1-talkie", &files);
        let out = extract(&game, Language::English).unwrap();
        assert!(out.strings.contains("TEXT01\t32768\tHELLO\t7\n"));
        assert!(out.strings.contains("TEXT01\t32769\tWORLD\t-1\n"));
        assert!(out.strings.starts_with("GAMEPC\t0\tLAMP\t-1\n"));
        assert!(out.scripts.contains("\t(0x43) SET_LONG_TEXT 2 32768 7 // {HELLO} [voice 7]\n"));

        let edits = Edits{ strings: Some(&out.strings), scripts: Some(&out.scripts), objects: Some(&out.objects) };
        let rebuilt = rebuild(&game, Language::English, &edits).unwrap();
        assert_eq!(rebuilt.archive.as_deref(), Some(files["SIMON.GME"].as_slice()));
        assert_eq!(rebuilt.basefile, files["GAMEPC"]);
        assert!(rebuilt.files.is_empty());
    }

    #[test]
    fn container_record_count_is_checked() {
        let files = talkie_container(true);
        assert!(matches!(load_game(game::find_variant("simon1-talkie").unwrap(), &files),
            Err(ToolkitError::RecordCount{ .. })));
    }
}

use std::collections::BTreeMap;
use std::fmt::Write;
use std::str::FromStr;

use indexmap::IndexMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::disassemble::DecodeError;
use crate::script::{self, Symbols};
use crate::stream::{self, Stream};
use crate::strings;

/// Id of the first stored item. Items 0 and 1 (none and the player) are implicit.
pub const FIRST_ITEM: u32 = 2;
const EXIT_COUNT: usize = 6;
const SLOT_DESCRIPTION: u8 = 0;
const SLOT_VOICE: u8 = 9;

#[derive(TryFromPrimitive, IntoPrimitive)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PropertyType {
    Room = 1,
    Object = 2,
    SuperRoom = 4,
    Container = 7,
    Chain = 8,
    UserFlag = 9,
    Inherit = 255,
}

impl PropertyType {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Room => "ROOM",
            PropertyType::Object => "OBJECT",
            PropertyType::SuperRoom => "SUPER_ROOM",
            PropertyType::Container => "CONTAINER",
            PropertyType::Chain => "CHAIN",
            PropertyType::UserFlag => "USERFLAG",
            PropertyType::Inherit => "INHERIT",
        }
    }

    pub fn from_name(name: &str) -> Option<PropertyType> {
        [ PropertyType::Room, PropertyType::Object, PropertyType::SuperRoom, PropertyType::Container,
          PropertyType::Chain, PropertyType::UserFlag, PropertyType::Inherit ]
            .iter().copied().find(|t| t.name() == name)
    }
}

#[derive(TryFromPrimitive, IntoPrimitive)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DoorState {
    Open = 1,
    Closed = 2,
    Locked = 3,
}

impl DoorState {
    pub fn name(&self) -> &'static str {
        match self {
            DoorState::Open => "OPEN",
            DoorState::Closed => "CLOSED",
            DoorState::Locked => "LOCKED",
        }
    }

    fn from_name(name: &str) -> Option<DoorState> {
        match name {
            "OPEN" => Some(DoorState::Open),
            "CLOSED" => Some(DoorState::Closed),
            "LOCKED" => Some(DoorState::Locked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    pub to: u32,
    pub state: DoorState,
}

/// Name of a u16 slot of the OBJECT property, by flag bit.
pub fn slot_name(bit: u8) -> String {
    match bit {
        1 => "SIZE".to_string(),
        2 => "WEIGHT".to_string(),
        3 => "VOLUME".to_string(),
        4 => "ICON".to_string(),
        7 => "MENU".to_string(),
        8 => "NUMBER".to_string(),
        9 => "VOICE".to_string(),
        10 => "UNK10".to_string(),
        11 => "UNK11".to_string(),
        n => format!("SLOT{}", n),
    }
}

pub fn slot_bit(name: &str) -> Option<u8> {
    (1..16).find(|&bit| slot_name(bit) == name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Room{ table: u16, exits: [Option<Exit>; EXIT_COUNT] },
    Object{
        name: u32,
        description: Option<u32>,
        /// Flag bit (1..15) to slot value.
        slots: BTreeMap<u8, u16>,
        /// High half of the flag word.
        flags: u16,
    },
    SuperRoom{ id: u16, x: u16, y: u16, z: u16, exits: Vec<u16> },
    Container{ volume: u16, flags: u16 },
    Chain(u32),
    Inherit(u32),
    UserFlag([u16; 4]),
}

impl Property {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Property::Room{ .. } => PropertyType::Room,
            Property::Object{ .. } => PropertyType::Object,
            Property::SuperRoom{ .. } => PropertyType::SuperRoom,
            Property::Container{ .. } => PropertyType::Container,
            Property::Chain(_) => PropertyType::Chain,
            Property::Inherit(_) => PropertyType::Inherit,
            Property::UserFlag(_) => PropertyType::UserFlag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub adjective: u16,
    pub noun: u16,
    pub state: u16,
    pub next: u32,
    pub child: u32,
    pub parent: u32,
    pub actor_table: u16,
    pub class: u16,
    pub properties_init: u32,
    pub properties: Vec<Property>,
}

impl Item {
    /// String id of the item's name, taken from its OBJECT property.
    pub fn name(&self) -> Option<u32> {
        self.properties.iter().find_map(|p| match p {
            Property::Object{ name, .. } => Some(*name),
            _ => None,
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ObjectError {
    #[error("line {line}: {reason}")]
    Syntax{ line: usize, reason: String },
    #[error("line {line}: expected item {expected}, found {found}")]
    NonContiguous{ line: usize, expected: u32, found: u32 },
    #[error("item {0} cannot be referenced directly")]
    UnencodableItem(u32),
    #[error("super room of {x}x{y}x{z} needs {wanted} exits, found {found}")]
    ExitCount{ x: u16, y: u16, z: u16, wanted: usize, found: usize },
}

fn read_property(rdr: &mut Stream, kind: PropertyType, offset: usize) -> Result<Property, DecodeError> {
    let short = |_| DecodeError::TruncatedOperand{ offset };
    let property = match kind {
        PropertyType::Room => {
            let table = rdr.get_u16_be().map_err(short)?;
            let mut states = rdr.get_u16_be().map_err(short)?;
            let mut exits = [None; EXIT_COUNT];
            for exit in exits.iter_mut() {
                if states & 3 != 0 {
                    let state = DoorState::try_from(states & 3)
                        .map_err(|_| DecodeError::MalformedOperand{ offset, reason: "bad door state".to_string() })?;
                    let to = script::read_item(rdr).map_err(short)?;
                    if to == 0 {
                        return Err(DecodeError::MalformedOperand{ offset, reason: "exit leads to no item".to_string() });
                    }
                    *exit = Some(Exit{ to, state });
                }
                states >>= 2;
            }
            Property::Room{ table, exits }
        },
        PropertyType::Object => {
            let mut bits = rdr.get_u32_be().map_err(short)?;
            let description = if bits & (1 << SLOT_DESCRIPTION) != 0 {
                Some(rdr.get_u32_be().map_err(short)?)
            } else {
                None
            };
            let mut slots = BTreeMap::new();
            for bit in 1..16u8 {
                if bits & (1 << bit) != 0 {
                    slots.insert(bit, rdr.get_u16_be().map_err(short)?);
                }
            }
            bits >>= 16;
            let name = rdr.get_u32_be().map_err(short)?;
            Property::Object{ name, description, slots, flags: bits as u16 }
        },
        PropertyType::SuperRoom => {
            let id = rdr.get_u16_be().map_err(short)?;
            let x = rdr.get_u16_be().map_err(short)?;
            let y = rdr.get_u16_be().map_err(short)?;
            let z = rdr.get_u16_be().map_err(short)?;
            let count = x as usize * y as usize * z as usize;
            let mut exits = Vec::with_capacity(count);
            for _ in 0..count {
                exits.push(rdr.get_u16_be().map_err(short)?);
            }
            Property::SuperRoom{ id, x, y, z, exits }
        },
        PropertyType::Container => {
            let volume = rdr.get_u16_be().map_err(short)?;
            let flags = rdr.get_u16_be().map_err(short)?;
            Property::Container{ volume, flags }
        },
        PropertyType::Chain => Property::Chain(script::read_item(rdr).map_err(short)?),
        PropertyType::Inherit => Property::Inherit(script::read_item(rdr).map_err(short)?),
        PropertyType::UserFlag => {
            let mut flags = [0u16; 4];
            for flag in flags.iter_mut() {
                *flag = rdr.get_u16_be().map_err(short)?;
            }
            Property::UserFlag(flags)
        },
    };
    Ok(property)
}

fn read_item(rdr: &mut Stream) -> Result<Item, DecodeError> {
    let offset = rdr.position();
    let short = |_| DecodeError::TruncatedOperand{ offset };
    let adjective = rdr.get_u16_be().map_err(short)?;
    let noun = rdr.get_u16_be().map_err(short)?;
    let state = rdr.get_u16_be().map_err(short)?;
    let next = script::read_item(rdr).map_err(short)?;
    let child = script::read_item(rdr).map_err(short)?;
    let parent = script::read_item(rdr).map_err(short)?;
    let actor_table = rdr.get_u16_be().map_err(short)?;
    let class = rdr.get_u16_be().map_err(short)?;
    let properties_init = rdr.get_u32_be().map_err(short)?;

    let mut properties = Vec::new();
    if properties_init != 0 {
        loop {
            let at = rdr.position();
            let kind = rdr.get_u16_be().map_err(short)?;
            if kind == 0 {
                break;
            }
            let kind = PropertyType::try_from(kind)
                .map_err(|_| DecodeError::UnknownProperty{ offset: at, kind })?;
            properties.push(read_property(rdr, kind, at)?);
        }
    }
    Ok(Item{ adjective, noun, state, next, child, parent, actor_table, class, properties_init, properties })
}

/// Reads `count` objects, the first being item 2.
pub fn read_items(rdr: &mut Stream, count: usize) -> Result<Vec<Item>, DecodeError> {
    (0..count).map(|_| read_item(rdr)).collect()
}

fn put_item(out: &mut Vec<u8>, item: u32) -> Result<(), ObjectError> {
    script::write_item(out, item).map_err(ObjectError::UnencodableItem)
}

fn write_property(out: &mut Vec<u8>, property: &Property) -> Result<(), ObjectError> {
    stream::put_u16_be(out, property.property_type().into());
    match property {
        Property::Room{ table, exits } => {
            stream::put_u16_be(out, *table);
            let mut states = 0u16;
            for (n, exit) in exits.iter().enumerate() {
                if let Some(exit) = exit {
                    states |= u16::from(exit.state) << (2 * n);
                }
            }
            stream::put_u16_be(out, states);
            for exit in exits.iter().flatten() {
                put_item(out, exit.to)?;
            }
        },
        Property::Object{ name, description, slots, flags } => {
            let mut bits = (*flags as u32) << 16;
            if description.is_some() {
                bits |= 1 << SLOT_DESCRIPTION;
            }
            for bit in slots.keys() {
                bits |= 1 << bit;
            }
            stream::put_u32_be(out, bits);
            if let Some(description) = description {
                stream::put_u32_be(out, *description);
            }
            for value in slots.values() {
                stream::put_u16_be(out, *value);
            }
            stream::put_u32_be(out, *name);
        },
        Property::SuperRoom{ id, x, y, z, exits } => {
            let wanted = *x as usize * *y as usize * *z as usize;
            if exits.len() != wanted {
                return Err(ObjectError::ExitCount{ x: *x, y: *y, z: *z, wanted, found: exits.len() });
            }
            for value in [ *id, *x, *y, *z ].iter().chain(exits.iter()) {
                stream::put_u16_be(out, *value);
            }
        },
        Property::Container{ volume, flags } => {
            stream::put_u16_be(out, *volume);
            stream::put_u16_be(out, *flags);
        },
        Property::Chain(item) | Property::Inherit(item) => put_item(out, *item)?,
        Property::UserFlag(flags) => {
            for flag in flags {
                stream::put_u16_be(out, *flag);
            }
        },
    }
    Ok(())
}

pub fn write_items(items: &[Item]) -> Result<Vec<u8>, ObjectError> {
    let mut out = Vec::new();
    for item in items {
        stream::put_u16_be(&mut out, item.adjective);
        stream::put_u16_be(&mut out, item.noun);
        stream::put_u16_be(&mut out, item.state);
        put_item(&mut out, item.next)?;
        put_item(&mut out, item.child)?;
        put_item(&mut out, item.parent)?;
        stream::put_u16_be(&mut out, item.actor_table);
        stream::put_u16_be(&mut out, item.class);
        stream::put_u32_be(&mut out, item.properties_init);
        if item.properties_init != 0 {
            for property in &item.properties {
                write_property(&mut out, property)?;
            }
            stream::put_u16_be(&mut out, 0);
        }
    }
    Ok(out)
}

/// Item id to the string id of its name.
pub fn item_names(items: &[Item]) -> BTreeMap<u32, u32> {
    items.iter().enumerate()
        .filter_map(|(n, item)| item.name().map(|name| (FIRST_ITEM + n as u32, name)))
        .collect()
}

/// Description text to voice sample, for objects that carry both.
pub fn description_voices(items: &[Item]) -> Vec<(u32, u16)> {
    items.iter().flat_map(|item| &item.properties).filter_map(|p| match p {
        Property::Object{ description: Some(text), slots, .. } => slots.get(&SLOT_VOICE).map(|voice| (*text, *voice)),
        _ => None,
    }).collect()
}

fn text_comment(symbols: &Symbols, id: u32) -> String {
    match symbols.text(id) {
        Some(text) => format!(" // {}", strings::escape(text)),
        None => String::new(),
    }
}

fn item_comment(symbols: &Symbols, item: u32) -> String {
    match symbols.item_name(item) {
        Some(name) => format!(" // {}", strings::escape(name)),
        None => String::new(),
    }
}

pub fn write_items_text(items: &[Item], symbols: &Symbols) -> String {
    let mut out = String::new();
    for (n, item) in items.iter().enumerate() {
        let _ = writeln!(out, "== ITEM {} ==", FIRST_ITEM + n as u32);
        let _ = writeln!(out, "\tADJECTIVE {}", item.adjective);
        let _ = writeln!(out, "\tNOUN {}", item.noun);
        let _ = writeln!(out, "\tSTATE {}", item.state);
        let _ = writeln!(out, "\tNEXT {}{}", item.next, item_comment(symbols, item.next));
        let _ = writeln!(out, "\tCHILD {}{}", item.child, item_comment(symbols, item.child));
        let _ = writeln!(out, "\tPARENT {}{}", item.parent, item_comment(symbols, item.parent));
        let _ = writeln!(out, "\tACTOR_TABLE {}", item.actor_table);
        let _ = writeln!(out, "\tCLASS {}", item.class);
        let _ = writeln!(out, "\tPROPERTIES {}", item.properties_init);
        for property in &item.properties {
            let _ = writeln!(out, "==> {}", property.property_type().name());
            match property {
                Property::Room{ table, exits } => {
                    let _ = writeln!(out, "\tTABLE {}", table);
                    for (n, exit) in exits.iter().enumerate() {
                        match exit {
                            Some(exit) => {
                                let _ = writeln!(out, "\tEXIT{} {} {}{}", n + 1, exit.to, exit.state.name(), item_comment(symbols, exit.to));
                            },
                            None => { let _ = writeln!(out, "\tEXIT{} -", n + 1); },
                        }
                    }
                },
                Property::Object{ name, description, slots, flags } => {
                    let _ = writeln!(out, "\tNAME {}{}", name, text_comment(symbols, *name));
                    if let Some(description) = description {
                        let _ = writeln!(out, "\tDESCRIPTION {}{}", description, text_comment(symbols, *description));
                    }
                    for (bit, value) in slots {
                        let _ = writeln!(out, "\t{} {}", slot_name(*bit), value);
                    }
                    if *flags != 0 {
                        let _ = writeln!(out, "\tFLAGS {}", flags);
                    }
                },
                Property::SuperRoom{ id, x, y, z, exits } => {
                    let _ = writeln!(out, "\tSUPER_ROOM {} {} {} {}", id, x, y, z);
                    let exits: Vec<String> = exits.iter().map(|e| e.to_string()).collect();
                    let _ = writeln!(out, "\tEXITS {}", exits.join(" "));
                },
                Property::Container{ volume, flags } => {
                    let _ = writeln!(out, "\tVOLUME {}", volume);
                    let _ = writeln!(out, "\tFLAGS {}", flags);
                },
                Property::Chain(item) | Property::Inherit(item) => {
                    let _ = writeln!(out, "\tITEM {}{}", item, item_comment(symbols, *item));
                },
                Property::UserFlag(flags) => {
                    for (n, flag) in flags.iter().enumerate() {
                        let _ = writeln!(out, "\t{} {}", n + 1, flag);
                    }
                },
            }
        }
    }
    out
}

fn syntax(line: usize, reason: impl Into<String>) -> ObjectError {
    ObjectError::Syntax{ line, reason: reason.into() }
}

/// Fields of one `== ITEM` or `==>` block, in source order.
struct Fields {
    line: usize,
    values: IndexMap<String, (usize, String)>,
}

impl Fields {
    fn new(line: usize) -> Fields {
        Fields{ line, values: IndexMap::new() }
    }

    fn insert(&mut self, line: usize, key: &str, value: &str) -> Result<(), ObjectError> {
        if self.values.insert(key.to_string(), (line, value.to_string())).is_some() {
            return Err(syntax(line, format!("duplicate field {}", key)));
        }
        Ok(())
    }

    fn take(&mut self, key: &str) -> Result<(usize, String), ObjectError> {
        self.values.shift_remove(key).ok_or_else(|| syntax(self.line, format!("missing field {}", key)))
    }

    fn number<T: FromStr>(&mut self, key: &str) -> Result<T, ObjectError> {
        let (line, value) = self.take(key)?;
        parse_number(line, key, &value)
    }

    fn optional<T: FromStr>(&mut self, key: &str) -> Result<Option<T>, ObjectError> {
        match self.values.shift_remove(key) {
            Some((line, value)) => Ok(Some(parse_number(line, key, &value)?)),
            None => Ok(None),
        }
    }

    fn finish(self) -> Result<(), ObjectError> {
        match self.values.iter().next() {
            Some((key, (line, _))) => Err(syntax(*line, format!("unknown field {}", key))),
            None => Ok(()),
        }
    }
}

fn parse_number<T: FromStr>(line: usize, key: &str, value: &str) -> Result<T, ObjectError> {
    value.trim().parse::<T>().map_err(|_| syntax(line, format!("bad value {:?} for {}", value, key)))
}

fn parse_exit(line: usize, value: &str) -> Result<Option<Exit>, ObjectError> {
    if value == "-" {
        return Ok(None);
    }
    let mut parts = value.split_whitespace();
    let to = parts.next().and_then(|p| p.parse::<u32>().ok());
    let state = parts.next().and_then(DoorState::from_name);
    match (to, state, parts.next()) {
        (Some(to), Some(state), None) if to != 0 => Ok(Some(Exit{ to, state })),
        _ => Err(syntax(line, format!("bad exit {:?}", value))),
    }
}

fn parse_property(kind: PropertyType, mut fields: Fields) -> Result<Property, ObjectError> {
    let property = match kind {
        PropertyType::Room => {
            let table = fields.number("TABLE")?;
            let mut exits = [None; EXIT_COUNT];
            for (n, exit) in exits.iter_mut().enumerate() {
                let (line, value) = fields.take(&format!("EXIT{}", n + 1))?;
                *exit = parse_exit(line, &value)?;
            }
            Property::Room{ table, exits }
        },
        PropertyType::Object => {
            let name = fields.number("NAME")?;
            let description = fields.optional("DESCRIPTION")?;
            let flags = fields.optional("FLAGS")?.unwrap_or(0);
            let mut slots = BTreeMap::new();
            for (key, (line, value)) in std::mem::take(&mut fields.values) {
                let bit = slot_bit(&key).ok_or_else(|| syntax(line, format!("unknown field {}", key)))?;
                slots.insert(bit, parse_number(line, &key, &value)?);
            }
            Property::Object{ name, description, slots, flags }
        },
        PropertyType::SuperRoom => {
            let (line, value) = fields.take("SUPER_ROOM")?;
            let numbers = value.split_whitespace()
                .map(|v| parse_number::<u16>(line, "SUPER_ROOM", v))
                .collect::<Result<Vec<_>, _>>()?;
            let (id, x, y, z) = match numbers.as_slice() {
                &[ id, x, y, z ] => (id, x, y, z),
                _ => return Err(syntax(line, "SUPER_ROOM takes an id and three dimensions")),
            };
            let (line, value) = fields.take("EXITS")?;
            let exits = value.split_whitespace()
                .map(|v| parse_number::<u16>(line, "EXITS", v))
                .collect::<Result<Vec<_>, _>>()?;
            let wanted = x as usize * y as usize * z as usize;
            if exits.len() != wanted {
                return Err(ObjectError::ExitCount{ x, y, z, wanted, found: exits.len() });
            }
            Property::SuperRoom{ id, x, y, z, exits }
        },
        PropertyType::Container => {
            let volume = fields.number("VOLUME")?;
            let flags = fields.number("FLAGS")?;
            Property::Container{ volume, flags }
        },
        PropertyType::Chain => Property::Chain(fields.number("ITEM")?),
        PropertyType::Inherit => Property::Inherit(fields.number("ITEM")?),
        PropertyType::UserFlag => {
            let mut flags = [0u16; 4];
            for (n, flag) in flags.iter_mut().enumerate() {
                *flag = fields.number(&(n + 1).to_string())?;
            }
            Property::UserFlag(flags)
        },
    };
    fields.finish()?;
    Ok(property)
}

struct ItemDraft {
    header: Fields,
    properties: Vec<(PropertyType, Fields)>,
}

impl ItemDraft {
    fn finish(self) -> Result<Item, ObjectError> {
        let mut header = self.header;
        let line = header.line;
        let item = Item{
            adjective: header.number("ADJECTIVE")?,
            noun: header.number("NOUN")?,
            state: header.number("STATE")?,
            next: header.number("NEXT")?,
            child: header.number("CHILD")?,
            parent: header.number("PARENT")?,
            actor_table: header.number("ACTOR_TABLE")?,
            class: header.number("CLASS")?,
            properties_init: header.number("PROPERTIES")?,
            properties: self.properties.into_iter()
                .map(|(kind, fields)| parse_property(kind, fields))
                .collect::<Result<Vec<_>, _>>()?,
        };
        header.finish()?;
        if item.properties_init == 0 && !item.properties.is_empty() {
            return Err(syntax(line, "properties listed while PROPERTIES is 0"));
        }
        Ok(item)
    }
}

/// Parses an object file. Items must be numbered consecutively from 2.
pub fn parse_items(text: &str) -> Result<Vec<Item>, ObjectError> {
    let mut items = Vec::new();
    let mut current: Option<ItemDraft> = None;
    for (n, raw) in text.lines().enumerate() {
        let line = n + 1;
        let content = match raw.find("//") {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        if let Some(rest) = content.strip_prefix("==>") {
            let draft = current.as_mut().ok_or_else(|| syntax(line, "property outside of an item"))?;
            let kind = PropertyType::from_name(rest.trim())
                .ok_or_else(|| syntax(line, format!("unknown property type {:?}", rest.trim())))?;
            draft.properties.push((kind, Fields::new(line)));
        } else if let Some(rest) = content.strip_prefix("==") {
            let id = rest.trim().strip_prefix("ITEM")
                .and_then(|r| r.trim().strip_suffix("=="))
                .and_then(|r| r.trim().parse::<u32>().ok())
                .ok_or_else(|| syntax(line, "expected == ITEM <id> =="))?;
            if let Some(draft) = current.take() {
                items.push(draft.finish()?);
            }
            let expected = FIRST_ITEM + items.len() as u32;
            if id != expected {
                return Err(ObjectError::NonContiguous{ line, expected, found: id });
            }
            current = Some(ItemDraft{ header: Fields::new(line), properties: Vec::new() });
        } else {
            let draft = current.as_mut().ok_or_else(|| syntax(line, "field outside of an item"))?;
            let (key, value) = match content.split_once(char::is_whitespace) {
                Some((key, value)) => (key, value.trim()),
                None => (content, ""),
            };
            let fields = match draft.properties.last_mut() {
                Some((_, fields)) => fields,
                None => &mut draft.header,
            };
            fields.insert(line, key, value)?;
        }
    }
    if let Some(draft) = current {
        items.push(draft.finish()?);
    }
    Ok(items)
}

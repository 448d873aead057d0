use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use log::warn;
use thiserror::Error;

use crate::game::GameVariant;

/// Operand kinds. Every kind has a fixed encoding, see `disassemble`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    /// u8, or `FF nn` for a variable
    Byte,
    /// object reference
    Item,
    /// string reference
    Text,
    /// voice sample
    Voice,
    Number,
    Variable,
    Property,
    Noun,
    Adjective,
    /// absolute record offset
    Jump,
    /// u16 values up to `LIST_END`
    List,
}

pub const LIST_END: u16 = 0xffff;

impl Arg {
    pub fn code(&self) -> char {
        match self {
            Arg::Byte => 'B',
            Arg::Item => 'I',
            Arg::Text => 'T',
            Arg::Voice => 'S',
            Arg::Number => 'N',
            Arg::Variable => 'v',
            Arg::Property => 'p',
            Arg::Noun => 'n',
            Arg::Adjective => 'a',
            Arg::Jump => 'J',
            Arg::List => 'L',
        }
    }
}

pub fn shape_string(args: &[Arg]) -> String {
    args.iter().map(|arg| arg.code()).collect()
}

#[allow(non_upper_case_globals)]
mod shape {
    use super::Arg;
    pub const B: Arg = Arg::Byte;
    pub const I: Arg = Arg::Item;
    pub const T: Arg = Arg::Text;
    pub const S: Arg = Arg::Voice;
    pub const N: Arg = Arg::Number;
    pub const v: Arg = Arg::Variable;
    pub const p: Arg = Arg::Property;
    pub const n: Arg = Arg::Noun;
    pub const a: Arg = Arg::Adjective;
    pub const J: Arg = Arg::Jump;
    pub const L: Arg = Arg::List;
}
use shape::*;

pub type OpDef = (u8, Option<&'static str>, &'static [Arg]);

pub struct Opcode {
    pub code: u8,
    pub name: Option<&'static str>,
    pub mnemonic: String,
    pub args: &'static [Arg],
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(0x{:02x}) {} {}", self.code, self.mnemonic, shape_string(self.args))
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("opcode 0x{0:02x} is not part of the instruction set")]
pub struct UnknownOpcode(pub u8);

/// Byte that ends a line of commands. It is never an opcode.
pub const END_OF_LINE: u8 = 0xff;

pub struct InstructionSet {
    pub name: &'static str,
    ops: Vec<Option<Opcode>>,
    by_mnemonic: HashMap<String, u8>,
}

impl InstructionSet {
    /// Later layers override earlier ones opcode by opcode.
    pub fn new(name: &'static str, layers: &[&'static [OpDef]]) -> InstructionSet {
        let mut defs: Vec<Option<&OpDef>> = vec![ None; 256 ];
        for &layer in layers {
            for def in layer {
                if def.0 == END_OF_LINE {
                    warn!("{}: ignoring definition of reserved opcode 0x{:02x}", name, def.0);
                    continue;
                }
                defs[def.0 as usize] = Some(def);
            }
        }

        let mut ops: Vec<Option<Opcode>> = Vec::with_capacity(256);
        let mut by_mnemonic = HashMap::new();
        for def in defs {
            let op = def.map(|&(code, name, args)| {
                let mut mnemonic = match name {
                    Some(name) => name.to_string(),
                    None => format!("OP_{:02X}", code),
                };
                if by_mnemonic.contains_key(&mnemonic) {
                    mnemonic = format!("OP_{:02X}", code);
                }
                by_mnemonic.insert(mnemonic.clone(), code);
                Opcode{ code, name, mnemonic, args }
            });
            ops.push(op);
        }
        InstructionSet{ name, ops, by_mnemonic }
    }

    pub fn get(&self, opcode: u8) -> Option<&Opcode> {
        self.ops[opcode as usize].as_ref()
    }

    pub fn lookup(&self, mnemonic: &str) -> Option<&Opcode> {
        self.by_mnemonic.get(mnemonic).and_then(|&code| self.get(code))
    }

    pub fn operand_shape(&self, opcode: u8) -> Result<&'static [Arg], UnknownOpcode> {
        self.get(opcode).map(|op| op.args).ok_or(UnknownOpcode(opcode))
    }

    pub fn opcodes(&self) -> impl Iterator<Item = &Opcode> {
        self.ops.iter().flatten()
    }
}

/// The opcode tables shipped with the games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpTableId {
    Simon,
    SimonTalkie,
    Waxworks,
    Simon2,
    Simon2Talkie,
    Feeble,
}

impl OpTableId {
    pub fn instruction_set(&self) -> &'static InstructionSet {
        match self {
            OpTableId::Simon => &SIMON,
            OpTableId::SimonTalkie => &SIMON_TALKIE,
            OpTableId::Waxworks => &WAXWORKS,
            OpTableId::Simon2 => &SIMON2,
            OpTableId::Simon2Talkie => &SIMON2_TALKIE,
            OpTableId::Feeble => &FEEBLE,
        }
    }
}

pub fn operand_shape(opcode: u8, variant: &GameVariant) -> Result<&'static [Arg], UnknownOpcode> {
    variant.op_table.instruction_set().operand_shape(opcode)
}

lazy_static! {
    static ref SIMON: InstructionSet = InstructionSet::new("simon", &[ SIMON_OPS ]);
    static ref SIMON_TALKIE: InstructionSet = InstructionSet::new("simon-talkie", &[ SIMON_OPS, SIMON_TALKIE_OPS ]);
    static ref WAXWORKS: InstructionSet = InstructionSet::new("waxworks", &[ SIMON_OPS, WAXWORKS_OPS ]);
    static ref SIMON2: InstructionSet = InstructionSet::new("simon2", &[ SIMON_OPS, SIMON2_OPS ]);
    static ref SIMON2_TALKIE: InstructionSet = InstructionSet::new("simon2-talkie", &[ SIMON_OPS, SIMON2_OPS, SIMON_TALKIE_OPS ]);
    static ref FEEBLE: InstructionSet = InstructionSet::new("feeble", &[ SIMON_OPS, SIMON2_OPS, SIMON_TALKIE_OPS, FEEBLE_OPS ]);
}

static SIMON_OPS: &[OpDef] = &[
    (0x00, Some("NOT"), &[]),
    (0x01, Some("AT"), &[ I ]),
    (0x02, Some("NOTAT"), &[ I ]),
    (0x03, Some("PRESENT"), &[ I ]),
    (0x04, Some("ABSENT"), &[ I ]),
    (0x05, Some("CARRIED"), &[ I ]),
    (0x06, Some("NOTCARR"), &[ I ]),
    (0x07, Some("ISAT"), &[ I, I ]),
    (0x08, Some("ISNOTAT"), &[ I, I ]),
    (0x09, Some("ISBY"), &[ I, I ]),
    (0x0a, Some("ISNOTBY"), &[ I, I ]),
    (0x0b, Some("ZERO"), &[ B ]),
    (0x0c, Some("NOTZERO"), &[ B ]),
    (0x0d, Some("EQ"), &[ B, N ]),
    (0x0e, Some("NOTEQ"), &[ B, N ]),
    (0x0f, Some("GT"), &[ B, N ]),
    (0x10, Some("LT"), &[ B, N ]),
    (0x11, Some("EQF"), &[ B, B ]),
    (0x12, Some("NOTEQF"), &[ B, B ]),
    (0x13, Some("LTF"), &[ B, B ]),
    (0x14, Some("GTF"), &[ B, B ]),
    (0x15, Some("ISIN"), &[ I, I ]),
    (0x16, Some("ISNOTIN"), &[ I, I ]),
    (0x17, Some("CHANCE"), &[ N ]),
    (0x18, Some("ISPLAYER"), &[ I ]),
    (0x19, Some("ISROOM"), &[ I ]),
    (0x1a, Some("ISOBJECT"), &[ I ]),
    (0x1b, Some("STATE"), &[ I, N ]),
    (0x1c, Some("OFLAG"), &[ I, B ]),
    (0x1d, Some("CANPUT"), &[ I, I ]),
    (0x1e, Some("CREATE"), &[ I ]),
    (0x1f, Some("DESTROY"), &[ I ]),
    (0x20, Some("SWAP"), &[ I, I ]),
    (0x21, Some("PLACE"), &[ I, I ]),
    (0x22, Some("COPYOF"), &[ I, B, B ]),
    (0x23, Some("COPYFO"), &[ B, I, B ]),
    (0x24, Some("COPYFF"), &[ B, B ]),
    (0x25, Some("WHATO"), &[ B ]),
    (0x26, Some("GETO"), &[ B, I ]),
    (0x27, Some("WEIGH"), &[ I, B ]),
    (0x28, Some("SET"), &[ B ]),
    (0x29, Some("CLEAR"), &[ B ]),
    (0x2a, Some("LET"), &[ B, N ]),
    (0x2b, Some("ADD"), &[ B, N ]),
    (0x2c, Some("SUB"), &[ B, N ]),
    (0x2d, Some("ADDF"), &[ B, B ]),
    (0x2e, Some("SUBF"), &[ B, B ]),
    (0x2f, Some("MUL"), &[ B, N ]),
    (0x30, Some("DIV"), &[ B, N ]),
    (0x31, Some("MULF"), &[ B, B ]),
    (0x32, Some("DIVF"), &[ B, B ]),
    (0x33, Some("MOD"), &[ B, N ]),
    (0x34, Some("MODF"), &[ B, B ]),
    (0x35, Some("RANDOM"), &[ B, N ]),
    (0x36, Some("MOVE"), &[ B ]),
    (0x37, Some("GOTO"), &[ I ]),
    (0x38, Some("OSET"), &[ I, B ]),
    (0x39, Some("OCLEAR"), &[ I, B ]),
    (0x3a, Some("PUTBY"), &[ I, I ]),
    (0x3b, Some("INC"), &[ I ]),
    (0x3c, Some("DEC"), &[ I ]),
    (0x3d, Some("SETSTATE"), &[ I, N ]),
    (0x3e, Some("PRINT"), &[ B ]),
    (0x3f, Some("MESSAGE"), &[ T ]),
    (0x40, Some("MSG"), &[ T ]),
    (0x41, Some("ADD_TEXT_BOX"), &[ N, N, N, N, N, B ]),
    (0x42, Some("SET_SHORT_TEXT"), &[ B, T ]),
    (0x43, Some("SET_LONG_TEXT"), &[ B, T ]),
    (0x44, Some("END"), &[ T ]),
    (0x45, Some("DONE"), &[]),
    (0x46, Some("SHOW_STRING_AR3"), &[ B ]),
    (0x47, Some("PROCESS"), &[ N ]),
    (0x48, Some("DOCLASS"), &[ I, B, N ]),
    (0x49, Some("POBJ"), &[ I ]),
    (0x4a, Some("PNAME"), &[ I ]),
    (0x4b, Some("PCNAME"), &[ I ]),
    (0x4c, Some("WHEN"), &[ N, N ]),
    (0x4d, Some("IF1"), &[]),
    (0x4e, Some("IF2"), &[]),
    (0x4f, Some("ISCALLED"), &[ I, T ]),
    (0x50, Some("IS"), &[ I, I ]),
    (0x51, Some("EXITS"), &[ I ]),
    (0x52, Some("DEBUG"), &[ B ]),
    (0x53, Some("RESCAN"), &[]),
    (0x54, Some("CANGOBY"), &[ I, B ]),
    (0x55, Some("WHERETO"), &[ I, B, B ]),
    (0x56, Some("DOOREXIT"), &[ I, I, B ]),
    (0x57, Some("COMMENT"), &[ T ]),
    (0x58, Some("STOP_ANIMATION"), &[]),
    (0x59, Some("RESTART_ANIMATION"), &[]),
    (0x5a, Some("GETPARENT"), &[ I, B ]),
    (0x5b, Some("GETNEXT"), &[ I, B ]),
    (0x5c, Some("GETCHILDREN"), &[ I, B ]),
    (0x5d, Some("PEXIT"), &[ B ]),
    (0x5e, Some("FINDMASTER"), &[ B, B ]),
    (0x5f, Some("NEXTMASTER"), &[ I, B, B ]),
    (0x60, Some("PICTURE"), &[ N, B ]),
    (0x61, Some("LOAD_ZONE"), &[ N ]),
    (0x62, Some("ANIMATE"), &[ N, B, N, N, N ]),
    (0x63, Some("STOP_ANIMATE"), &[ N ]),
    (0x64, Some("KILL_ANIMATE"), &[]),
    (0x65, Some("DEFINE_WINDOW"), &[ B, N, N, N, N, N, N ]),
    (0x66, Some("CHANGE_WINDOW"), &[ B ]),
    (0x67, Some("CLS"), &[]),
    (0x68, Some("CLOSE_WINDOW"), &[ B ]),
    (0x69, Some("MENU"), &[ B ]),
    (0x6a, Some("TEXT_MENU"), &[ B, B ]),
    (0x6b, Some("ADD_BOX"), &[ N, N, N, N, N, I, N ]),
    (0x6c, Some("DEL_BOX"), &[ N ]),
    (0x6d, Some("ENABLE_BOX"), &[ N ]),
    (0x6e, Some("DISABLE_BOX"), &[ N ]),
    (0x6f, Some("MOVE_BOX"), &[ N, N, N ]),
    (0x70, Some("DRAW_ICON"), &[ N, B, N, N ]),
    (0x71, Some("DRAW_ITEM"), &[ I, B, N, N ]),
    (0x72, Some("DO_ICONS"), &[ I, B ]),
    (0x73, Some("ISCLASS"), &[ I, B ]),
    (0x74, Some("SETCLASS"), &[ I, B ]),
    (0x75, Some("UNSETCLASS"), &[ I, B ]),
    (0x76, Some("WAIT"), &[ N ]),
    (0x77, Some("WAIT_SYNC"), &[ N ]),
    (0x78, Some("SYNC"), &[ N ]),
    (0x79, Some("DEF_OBJ"), &[ B, I ]),
    (0x7a, Some("ENABLE_INPUT"), &[]),
    (0x7b, Some("SET_TIME"), &[]),
    (0x7c, Some("IF_TIME"), &[ N ]),
    (0x7d, Some("IS_SIBLING_WITH_A"), &[ I ]),
    (0x7e, Some("DO_CLASS_ICONS"), &[ I, B, B ]),
    (0x7f, Some("PLAY_TUNE"), &[ N, N ]),
    (0x80, Some("WAITENDTUNE"), &[ N ]),
    (0x81, Some("IFENDTUNE"), &[ N ]),
    (0x82, Some("SET_ADJ_NOUN"), &[ B, a, n ]),
    (0x83, Some("ZONEDISK"), &[ B, B ]),
    (0x84, Some("SAVE_USER_GAME"), &[]),
    (0x85, Some("LOAD_USER_GAME"), &[]),
    (0x86, Some("STOP_TUNE"), &[]),
    (0x87, Some("PAUSE"), &[]),
    (0x88, Some("COPY_SF"), &[ I, B ]),
    (0x89, Some("RESTORE_ICONS"), &[ B ]),
    (0x8a, Some("FREEZE_ZONES"), &[]),
    (0x8b, Some("SET_PARENT_SPECIAL"), &[ I, I ]),
    (0x8c, Some("CLEAR_TIMERS"), &[]),
    (0x8d, Some("SET_M1_OR_M3"), &[ B, I ]),
    (0x8e, Some("IS_BOX"), &[ N ]),
    (0x8f, Some("START_ITEM_SUB"), &[ I ]),
    (0x90, None, &[ I, B ]),
    (0x91, None, &[ I, B ]),
    (0x92, None, &[ I, B ]),
    (0x93, None, &[ I, B ]),
    (0x94, None, &[ I, B ]),
    (0x95, None, &[ I, B ]),
    (0x96, None, &[ I, B ]),
    (0x97, Some("STORE_ITEM"), &[ B, I ]),
    (0x98, Some("GET_ITEM"), &[ B, B ]),
    (0x99, Some("SET_BIT"), &[ B ]),
    (0x9a, Some("CLEAR_BIT"), &[ B ]),
    (0x9b, Some("IS_BIT_CLEAR"), &[ B ]),
    (0x9c, Some("IS_BIT_SET"), &[ B ]),
    (0x9d, Some("GET_ITEM_PROP"), &[ I, B, B ]),
    (0x9e, Some("SET_ITEM_PROP"), &[ I, B, N ]),
    (0x9f, None, &[ I, B ]),
    (0xa0, Some("SET_INK"), &[ B ]),
    (0xa1, Some("SETUP_TEXT"), &[ B, N, B, N ]),
    (0xa2, Some("PRINT_STR"), &[ B, B, T ]),
    (0xa3, Some("PLAY_EFFECT"), &[ N ]),
    (0xa4, Some("getDollar2"), &[]),
    (0xa5, Some("IS_ADJ_NOUN"), &[ I, a, n ]),
    (0xa6, Some("SET_BIT2"), &[ B ]),
    (0xa7, Some("CLEAR_BIT2"), &[ B ]),
    (0xa8, Some("IS_BIT2_CLEAR"), &[ B ]),
    (0xa9, Some("IS_BIT2_SET"), &[ B ]),
    (0xaa, None, &[ T ]),
    (0xab, None, &[ T ]),
    (0xac, None, &[ B ]),
    (0xad, None, &[]),
    (0xae, None, &[ I ]),
    (0xaf, Some("LOCK_ZONES"), &[]),
    (0xb0, Some("UNLOCK_ZONES"), &[]),
    (0xb1, Some("SCREEN_TEXT_POBJ"), &[ B, B, I ]),
    (0xb2, Some("GETPATHPOSN"), &[ N, N, B, B ]),
    (0xb3, Some("SCREEN_TEXT_LONG_TEXT"), &[ B, B, B ]),
    (0xb4, Some("MOUSE_ON"), &[]),
    (0xb5, Some("MOUSE_OFF"), &[]),
    (0xb6, Some("LOAD_BEARD"), &[]),
    (0xb7, Some("UNLOAD_BEARD"), &[]),
    (0xb8, Some("UNLOAD_ZONE"), &[ N ]),
    (0xb9, Some("LOAD_SOUND_FILES"), &[ N ]),
    (0xba, Some("UNFREEZE_ZONES"), &[]),
    (0xbb, Some("FADE_TO_BLACK"), &[]),
];

static SIMON_TALKIE_OPS: &[OpDef] = &[
    (0x43, Some("SET_LONG_TEXT"), &[ B, T, S ]),
    (0xa2, Some("PRINT_STR"), &[ B, B, T, S ]),
];

static WAXWORKS_OPS: &[OpDef] = &[
    (0x58, None, &[ T ]),
    (0x59, Some("LOAD_GAME"), &[ T ]),
    (0x90, Some("SET_DOOR_OPEN"), &[ I, B ]),
    (0x91, Some("SET_DOOR_CLOSED"), &[ I, B ]),
    (0x92, Some("SET_DOOR_LOCKED"), &[ I, B ]),
    (0x93, Some("SET_DOOR_UNLOCKED"), &[ I, B ]),
    (0x94, Some("IF_DOOR_OPEN"), &[ I, B ]),
    (0x95, Some("IF_DOOR_CLOSED"), &[ I, B ]),
    (0x96, Some("IF_DOOR_LOCKED"), &[ I, B ]),
    (0xa1, None, &[]),
    (0xa2, None, &[ T, B ]),
    (0xa3, None, &[ T, B ]),
    (0xa4, None, &[ I ]),
    (0xa5, None, &[ N ]),
    (0xa6, None, &[ B ]),
    (0xa7, None, &[ I, N, B ]),
    (0xa8, None, &[ I, N, B ]),
    (0xa9, None, &[ I, N, B ]),
    (0xaa, None, &[ I, N, B ]),
    (0xab, None, &[ I, N, B ]),
    (0xac, None, &[ I, N, B ]),
    (0xad, None, &[ I, N, B ]),
    (0xae, None, &[ N ]),
    (0xaf, Some("getDollar2"), &[]),
    (0xb0, None, &[ I, N, B, B ]),
    (0xb1, None, &[ B ]),
    (0xb2, None, &[ B ]),
    (0xb3, Some("IS_ADJ_NOUN"), &[ I, a, n ]),
    (0xb4, Some("SET_BIT2"), &[ B ]),
    (0xb5, Some("CLEAR_BIT2"), &[ B ]),
    (0xb6, Some("IS_BIT2_CLEAR"), &[ B ]),
    (0xb7, Some("IS_BIT2_SET"), &[ B ]),
    (0xb8, Some("BOX_MESSAGE"), &[ T ]),
    (0xb9, Some("BOX_MSG"), &[ T ]),
    (0xba, Some("BOX_LONG_TEXT"), &[ B ]),
    (0xbb, Some("PRINT_BOX"), &[]),
    (0xbc, Some("BOX_POBJ"), &[ I ]),
    (0xbd, Some("LOCK_ZONES"), &[]),
    (0xbe, Some("UNLOCK_ZONES"), &[]),
];

static SIMON2_OPS: &[OpDef] = &[
    (0x62, Some("ANIMATE"), &[ N, N, B, N, N, N ]),
    (0x63, Some("STOP_ANIMATE"), &[ N, N ]),
    (0x7f, Some("PLAY_TUNE"), &[ N, N, B ]),
    (0xbc, Some("STRING2_IS"), &[ B, T ]),
    (0xbd, Some("CLEAR_MARKS"), &[]),
    (0xbe, Some("WAIT_FOR_MARK"), &[ B ]),
];

static FEEBLE_OPS: &[OpDef] = &[
    (0x7a, Some("ORACLE_TEXT_DOWN"), &[]),
    (0x7b, Some("ORACLE_TEXT_UP"), &[]),
    (0x83, Some("SET_TIME"), &[]),
    (0x86, Some("LIST_SAVED_GAMES"), &[]),
    (0x87, Some("SWITCH_CD"), &[]),
    (0xa1, Some("SETUP_TEXT"), &[ B, N, N, N ]),
    (0xab, Some("HYPERLINK_ON"), &[ N ]),
    (0xac, Some("HYPERLINK_OFF"), &[]),
    (0xad, Some("CHECK_PATHS"), &[]),
    (0xb6, Some("LOAD_VIDEO"), &[ T ]),
    (0xb7, Some("PLAY_VIDEO"), &[]),
    (0xbb, Some("CENTER_SCROLL"), &[]),
    (0xbf, Some("RESET_PV_COUNT"), &[]),
    (0xc0, Some("SET_PATH_VALUES"), &[ B, B, B, B ]),
    (0xc1, Some("STOP_CLOCK"), &[]),
    (0xc2, Some("RESTART_CLOCK"), &[]),
    (0xc3, Some("SET_COLOR"), &[ B, B, B, B ]),
    (0xc4, Some("B3_SET"), &[ B ]),
    (0xc5, Some("B3_CLEAR"), &[ B ]),
    (0xc6, Some("B3_ZERO"), &[ B ]),
    (0xc7, Some("B3_NOT_ZERO"), &[ B ]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layered_overrides() {
        let simon = OpTableId::Simon.instruction_set();
        let talkie = OpTableId::SimonTalkie.instruction_set();
        assert_eq!(simon.operand_shape(0x43).unwrap(), &[ Arg::Byte, Arg::Text ]);
        assert_eq!(talkie.operand_shape(0x43).unwrap(), &[ Arg::Byte, Arg::Text, Arg::Voice ]);
        assert_eq!(talkie.operand_shape(0x3f).unwrap(), &[ Arg::Text ]);

        let feeble = OpTableId::Feeble.instruction_set();
        assert_eq!(feeble.get(0x62).unwrap().mnemonic, "ANIMATE");
        assert_eq!(feeble.operand_shape(0x62).unwrap().len(), 6);
        assert_eq!(feeble.get(0xa1).unwrap().args, &[ Arg::Byte, Arg::Number, Arg::Number, Arg::Number ]);
        assert_eq!(feeble.lookup("B3_NOT_ZERO").unwrap().code, 0xc7);
    }

    #[test]
    fn unknown_opcodes() {
        let simon = OpTableId::Simon.instruction_set();
        assert_eq!(simon.operand_shape(0xbc), Err(UnknownOpcode(0xbc)));
        assert_eq!(simon.operand_shape(END_OF_LINE), Err(UnknownOpcode(0xff)));
        assert!(OpTableId::Simon2.instruction_set().operand_shape(0xbc).is_ok());
    }

    #[test]
    fn unnamed_opcodes_get_mnemonics() {
        let simon = OpTableId::Simon.instruction_set();
        let op = simon.get(0x90).unwrap();
        assert_eq!(op.name, None);
        assert_eq!(op.mnemonic, "OP_90");
        assert_eq!(simon.lookup("OP_90").unwrap().code, 0x90);
        assert_eq!(OpTableId::Waxworks.instruction_set().get(0x90).unwrap().mnemonic, "SET_DOOR_OPEN");
    }

    #[test]
    fn mnemonics_are_unique() {
        for id in [ OpTableId::Simon, OpTableId::SimonTalkie, OpTableId::Waxworks,
                    OpTableId::Simon2, OpTableId::Simon2Talkie, OpTableId::Feeble ].iter() {
            let set = id.instruction_set();
            for op in set.opcodes() {
                assert_eq!(set.lookup(&op.mnemonic).unwrap().code, op.code, "{:?}", op);
            }
        }
    }

    #[test]
    fn shared_names_fall_back_to_numbers() {
        static DUP: &[OpDef] = &[
            (0x01, Some("PRINT"), &[ Arg::Text ]),
            (0x02, Some("PRINT"), &[ Arg::Byte ]),
            (0xff, Some("BAD"), &[]),
        ];
        let set = InstructionSet::new("dup", &[ DUP ]);
        assert_eq!(set.get(0x01).unwrap().mnemonic, "PRINT");
        assert_eq!(set.get(0x02).unwrap().mnemonic, "OP_02");
        assert!(set.get(0xff).is_none());
        assert_eq!(shape_string(set.operand_shape(0x01).unwrap()), "T");
    }
}

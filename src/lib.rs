pub mod stream;
pub mod codepage;
pub mod strings;
pub mod archive;
pub mod basefile;
pub mod record;
pub mod opcode;
pub mod script;
pub mod disassemble;
pub mod label;
pub mod print;
pub mod assemble;
pub mod item;
pub mod voice;
pub mod game;
pub mod config;
pub mod toolkit;

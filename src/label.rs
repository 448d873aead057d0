use std::collections::BTreeMap;

use crate::disassemble::DecodeError;
use crate::script::{Operand, ScriptStream};

/// Jump target offset to label name.
pub type LabelMap = BTreeMap<usize, String>;

pub fn label_name(ordinal: usize) -> String {
    format!("L{:04}", ordinal)
}

/// Names every jump target of a decoded record after the ordinal of the command it lands on.
pub fn find_labels(stream: &ScriptStream) -> Result<LabelMap, DecodeError> {
    let mut labels = LabelMap::new();
    for command in stream.commands() {
        for operand in &command.operands {
            if let Operand::JumpTarget(target) = operand {
                let target = *target as usize;
                match stream.starts.get(&target) {
                    Some(&ordinal) => { labels.insert(target, label_name(ordinal)); },
                    None => return Err(DecodeError::InvalidJumpTarget{ offset: command.offset, target }),
                }
            }
        }
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Command, Line, Table};

    fn stream(targets: &[u16]) -> ScriptStream {
        let commands = targets.iter().enumerate()
            .map(|(n, &t)| Command{ offset: 6 + 3 * n, opcode: 2, operands: vec![ Operand::JumpTarget(t) ] })
            .collect();
        ScriptStream::new(vec![ Table{ number: 1, lines: vec![ Line{ header: None, commands } ] } ])
    }

    #[test]
    fn labels_forward_and_backward_jumps() {
        let labels = find_labels(&stream(&[ 12, 6, 12 ])).unwrap();
        let expected: LabelMap = vec![ (6, "L0000".to_string()), (12, "L0002".to_string()) ].into_iter().collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn rejects_jumps_into_operands() {
        assert_eq!(find_labels(&stream(&[ 7 ])), Err(DecodeError::InvalidJumpTarget{ offset: 6, target: 7 }));
    }
}

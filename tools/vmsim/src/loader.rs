//! Process description files.
//!
//! ```text
//! <priority> <instruction count>
//! calc
//! alloc <size> <region>
//! free <region>
//! read <region> <offset> <register>
//! write <value> <region> <offset>
//! syscall <nr> [a1 [a2 [a3]]]
//! ```
//!
//! Numbers are decimal or `0x`-prefixed hex. Blank lines and lines starting
//! with `#` are ignored.

use std::path::Path;

/// One decoded instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    Calc,
    Alloc { size: u64, region: usize },
    Free { region: usize },
    Read { region: usize, offset: u64, register: usize },
    Write { value: u64, region: usize, offset: u64 },
    Syscall { nr: u64, a1: u64, a2: u64, a3: u64 },
}

/// A loaded process description.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Program {
    pub priority: u32,
    pub code: Vec<Instruction>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("missing `<priority> <count>` header")]
    MissingHeader,
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown opcode `{opcode}`")]
    UnknownOpcode { line: usize, opcode: String },
    #[error("header announces {expected} instructions, found {found}")]
    CountMismatch { expected: usize, found: usize },
}

/// Read and parse the description at `path`.
pub fn load(path: &Path) -> Result<Program, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text)
}

/// Parse a process description.
pub fn parse(text: &str) -> Result<Program, LoadError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let (header_line, header) = lines.next().ok_or(LoadError::MissingHeader)?;
    let header: Vec<&str> = header.split_whitespace().collect();
    let [priority, count] = header[..] else {
        return Err(LoadError::MissingHeader);
    };
    let priority = u32::try_from(number(header_line, priority)?).map_err(|_| LoadError::Syntax {
        line: header_line,
        message: format!("priority `{priority}` out of range"),
    })?;
    let expected = index(header_line, count)?;

    let code = lines
        .map(|(line, text)| instruction(line, text))
        .collect::<Result<Vec<_>, _>>()?;
    if code.len() != expected {
        return Err(LoadError::CountMismatch {
            expected,
            found: code.len(),
        });
    }
    Ok(Program { priority, code })
}

fn instruction(line: usize, text: &str) -> Result<Instruction, LoadError> {
    let mut words = text.split_whitespace();
    let opcode = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let arity = |min: usize, max: usize| {
        if (min..=max).contains(&args.len()) {
            Ok(())
        } else {
            Err(LoadError::Syntax {
                line,
                message: format!("`{opcode}` takes {min}..={max} operands, got {}", args.len()),
            })
        }
    };

    Ok(match opcode {
        "calc" => {
            arity(0, 0)?;
            Instruction::Calc
        }
        "alloc" => {
            arity(2, 2)?;
            Instruction::Alloc {
                size: number(line, args[0])?,
                region: index(line, args[1])?,
            }
        }
        "free" => {
            arity(1, 1)?;
            Instruction::Free {
                region: index(line, args[0])?,
            }
        }
        "read" => {
            arity(3, 3)?;
            Instruction::Read {
                region: index(line, args[0])?,
                offset: number(line, args[1])?,
                register: index(line, args[2])?,
            }
        }
        "write" => {
            arity(3, 3)?;
            Instruction::Write {
                value: number(line, args[0])?,
                region: index(line, args[1])?,
                offset: number(line, args[2])?,
            }
        }
        "syscall" => {
            arity(1, 4)?;
            let mut ops = [0u64; 4];
            for (slot, arg) in ops.iter_mut().zip(&args) {
                *slot = number(line, arg)?;
            }
            let [nr, a1, a2, a3] = ops;
            Instruction::Syscall { nr, a1, a2, a3 }
        }
        other => {
            return Err(LoadError::UnknownOpcode {
                line,
                opcode: other.to_owned(),
            });
        }
    })
}

fn number(line: usize, word: &str) -> Result<u64, LoadError> {
    let parsed = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => word.parse(),
    };
    parsed.map_err(|e| LoadError::Syntax {
        line,
        message: format!("`{word}`: {e}"),
    })
}

fn index(line: usize, word: &str) -> Result<usize, LoadError> {
    usize::try_from(number(line, word)?).map_err(|_| LoadError::Syntax {
        line,
        message: format!("`{word}` out of range"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_opcode() {
        let program = parse(
            "1 6\n\
             calc\n\
             alloc 300 0\n\
             write 0x41 0 20\n\
             read 0 20 2\n\
             syscall 17 2 0 256\n\
             free 0\n",
        )
        .unwrap();
        assert_eq!(program.priority, 1);
        assert_eq!(
            program.code,
            [
                Instruction::Calc,
                Instruction::Alloc { size: 300, region: 0 },
                Instruction::Write {
                    value: 0x41,
                    region: 0,
                    offset: 20
                },
                Instruction::Read {
                    region: 0,
                    offset: 20,
                    register: 2
                },
                Instruction::Syscall {
                    nr: 17,
                    a1: 2,
                    a2: 0,
                    a3: 256
                },
                Instruction::Free { region: 0 },
            ]
        );
    }

    #[test]
    fn syscall_operands_default_to_zero() {
        let program = parse("0 1\nsyscall 17 4\n").unwrap();
        assert_eq!(
            program.code[0],
            Instruction::Syscall {
                nr: 17,
                a1: 4,
                a2: 0,
                a3: 0
            }
        );
    }

    #[test]
    fn reports_bad_input() {
        assert!(matches!(parse(""), Err(LoadError::MissingHeader)));
        assert!(matches!(parse("1\n"), Err(LoadError::MissingHeader)));
        assert!(matches!(
            parse("1 1\njump 3\n"),
            Err(LoadError::UnknownOpcode { line: 2, .. })
        ));
        assert!(matches!(
            parse("1 1\nalloc 300\n"),
            Err(LoadError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("1 1\nalloc 3x0 1\n"),
            Err(LoadError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("1 2\ncalc\n"),
            Err(LoadError::CountMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn bundled_demo_parses() {
        let program = parse(include_str!("../demos/swap_pressure.txt")).unwrap();
        assert!(!program.code.is_empty());
    }
}

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::process::Pid;
use crate::translation::AccessKind;

/// One line of an instruction script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `r <vpn>` or `w <vpn> [value]`
    Access {
        kind: AccessKind,
        vpn: u32,
        value: u32,
    },
    /// `s <pid>`
    Switch(Pid),
    /// `show`
    Show,
}

/// Script syntax error, with the 1-based line it was found on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a decimal or `0x`-prefixed hex number
fn parse_number(token: &str) -> Result<u32, String> {
    let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => token.parse(),
    };
    parsed.map_err(|_| format!("Invalid number: {}", token))
}

fn parse_line(line: &str) -> Result<Option<Instruction>, String> {
    let line = match line.split_once('#') {
        Some((code, _)) => code,
        None => line,
    };
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&op) = tokens.first() else {
        return Ok(None);
    };

    let instruction = match (op, tokens.len()) {
        ("s" | "S", 2) => Instruction::Switch(parse_number(tokens[1])?),
        ("show", 1) => Instruction::Show,
        ("s" | "S" | "show", n) => {
            return Err(format!("Wrong number of operands for '{}': {}", op, n - 1));
        }
        _ => {
            let kind: AccessKind = op.parse().map_err(|_| format!("Unknown instruction: {}", op))?;
            let value = match (kind, tokens.len()) {
                (_, 2) => 0,
                (AccessKind::Write, 3) => parse_number(tokens[2])?,
                (_, n) => {
                    return Err(format!("Wrong number of operands for '{}': {}", op, n - 1));
                }
            };
            Instruction::Access {
                kind,
                vpn: parse_number(tokens[1])?,
                value,
            }
        }
    };
    Ok(Some(instruction))
}

/// Parse a whole script, skipping blank lines and `#` comments
pub fn parse_script(content: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let parsed = parse_line(line).map_err(|message| ParseError {
            line: idx + 1,
            message,
        })?;
        instructions.extend(parsed);
    }
    Ok(instructions)
}

pub fn read_script<P: AsRef<Path>>(path: P) -> Result<Vec<Instruction>, String> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| format!("Failed to read script: {}", e))?;
    parse_script(&content).map_err(|e| e.to_string())
}

/// Write one line per trace item
pub fn write_trace<W: Write, T: fmt::Display>(out: &mut W, trace: &[T]) -> std::io::Result<()> {
    for item in trace {
        writeln!(out, "{}", item)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(vpn: u32) -> Instruction {
        Instruction::Access { kind: AccessKind::Read, vpn, value: 0 }
    }

    fn write(vpn: u32, value: u32) -> Instruction {
        Instruction::Access { kind: AccessKind::Write, vpn, value }
    }

    #[test]
    fn test_parse_script() {
        let script = "\
# setup
r 0
W 10 42
w 0x1f
R 7
s 1

show   # dump
";
        let instructions = parse_script(script).unwrap();
        assert_eq!(
            instructions,
            vec![
                read(0),
                write(10, 42),
                write(31, 0),
                read(7),
                Instruction::Switch(1),
                Instruction::Show,
            ]
        );
    }

    #[test]
    fn test_parse_empty_script() {
        assert_eq!(parse_script("").unwrap(), vec![]);
        assert_eq!(parse_script("\n  \n# nothing\n").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse_script("r 1\nx 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.to_string(), "line 2: Unknown instruction: x");

        let err = parse_script("r\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("operands"));

        let err = parse_script("r 1\n\ns abc\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.message, "Invalid number: abc");

        assert!(parse_script("r 1 2").is_err());
        assert!(parse_script("w").is_err());
        assert!(parse_script("w 1 2 3").is_err());
        assert!(parse_script("show 1").is_err());
        assert!(parse_script("s").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("255"), Ok(255));
        assert_eq!(parse_number("0xff"), Ok(255));
        assert_eq!(parse_number("0XFF"), Ok(255));
        assert!(parse_number("-1").is_err());
        assert!(parse_number("0x").is_err());
    }

    #[test]
    fn test_read_script_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "r 3\ns 2").unwrap();

        let instructions = read_script(file.path()).unwrap();
        assert_eq!(instructions, vec![read(3), Instruction::Switch(2)]);
    }

    #[test]
    fn test_read_script_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_script(dir.path().join("nope")).unwrap_err();
        assert!(err.starts_with("Failed to read script"));
    }

    #[test]
    fn test_write_trace() {
        let mut out = Vec::new();
        write_trace(&mut out, &["a", "b"]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\nb\n");
    }
}

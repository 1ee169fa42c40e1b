//! Parser for command records.

use super::ast::{CommandRecord, OptionValue};
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, TcadError};

/// Keyword opening every record.
const COMMAND: &str = "COMMAND";

/// Parser for command-record files.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(mut lexer: Lexer<'a>) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    /// Parse every record in the input.
    pub fn parse(&mut self) -> Result<Vec<CommandRecord>> {
        let mut records = Vec::new();

        while self.current.kind != TokenKind::Eof {
            // Skip empty lines
            if self.current.kind == TokenKind::Newline {
                self.advance()?;
                continue;
            }

            records.push(self.parse_record()?);

            // Consume newline or EOF
            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(TcadError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }
        }

        Ok(records)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(TcadError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn parse_record(&mut self) -> Result<CommandRecord> {
        let line = self.current.line;
        let keyword = self.expect(TokenKind::Identifier)?;
        if keyword.text != COMMAND {
            return Err(TcadError::parse(
                line,
                format!("expected {}, got {:?}", COMMAND, keyword.text),
            ));
        }
        let name = self.expect(TokenKind::Identifier)?.text;
        let mut record = CommandRecord::new(name);

        while self.current.kind == TokenKind::Option {
            let key = self.current.text.clone();
            self.advance()?;
            if record.get(&key).is_some() {
                return Err(TcadError::parse(line, format!("option -{} given twice", key)));
            }
            let value = match self.current.kind {
                TokenKind::String | TokenKind::Identifier => {
                    OptionValue::String(self.current.text.clone())
                }
                TokenKind::Number => {
                    let v = parse_value(&self.current.text).ok_or_else(|| {
                        TcadError::parse(line, format!("invalid number: {}", self.current.text))
                    })?;
                    OptionValue::Double(v)
                }
                _ => {
                    return Err(TcadError::parse(
                        line,
                        format!("option -{} has no value", key),
                    ));
                }
            };
            self.advance()?;
            record.set(key, value);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_parse_circuit_element() {
        let input = "COMMAND circuit_element -name \"R1\" -element \"resistor\" -n1 a -n2 0 -R 10k";
        let records = parse(input).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.command(), "circuit_element");
        assert_eq!(r.get_str("name"), Some("R1"));
        assert_eq!(r.get_str("n1"), Some("a"));
        assert_eq!(r.get_text("n2").as_deref(), Some("0"));
        assert_eq!(r.get_f64("R"), Some(10_000.0));
    }

    #[test]
    fn test_parse_with_comments_and_blank_lines() {
        let input = "# circuit\n\nCOMMAND a -x 1\n  # more\nCOMMAND b\n";
        let records = parse(input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].command(), "b");
        assert!(records[1].options().is_empty());
    }

    #[test]
    fn test_missing_value() {
        let err = parse("COMMAND a -x -y 1").unwrap_err();
        assert!(matches!(err, TcadError::ParseError { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_option() {
        assert!(parse("COMMAND a -x 1 -x 2").is_err());
    }

    #[test]
    fn test_record_must_start_with_command() {
        let err = parse("\nR1 a 0 1k").unwrap_err();
        assert!(matches!(err, TcadError::ParseError { line: 2, .. }));
    }

    #[test]
    fn test_display_round_trip() {
        let record = CommandRecord::new("circuit_element")
            .with("name", "V1")
            .with("n1", "in")
            .with("V", -1.5)
            .with("acreal", 2.5e-7);
        let back = parse(&record.to_string()).unwrap();
        assert_eq!(back, vec![record]);
    }
}

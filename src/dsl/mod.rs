//! Command-record language.
//!
//! Contact equations and circuit elements serialize to line-oriented
//! records that this module parses back.
//!
//! # Grammar Overview
//!
//! ```text
//! file        = { line }
//! line        = comment | record | empty
//! comment     = '#' { any_char }
//! record      = "COMMAND" name { option }
//! option      = '-' key value
//! value       = string | number | word
//!
//! string      = '"' { char | '\"' | '\\' } '"'
//! number      = ['-'|'+'] digit+ ['.' digit+] [('e'|'E') ['-'|'+'] digit+] [unit_suffix]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! word        = (letter | '_') { letter | digit | '_' | '.' | ':' | '@' }
//! ```
//!
//! # Example
//!
//! ```text
//! # Divider
//! COMMAND circuit_element -name "V1" -element "vsource" -n1 "in" -n2 "0" -V 1
//! COMMAND circuit_element -name "R1" -element "resistor" -n1 "in" -n2 "out" -R 1k
//! COMMAND circuit_element -name "R2" -element "resistor" -n1 "out" -n2 "0" -R 1k
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::{CommandRecord, OptionValue};
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{Result, TcadError};

/// Parse command records from a string.
pub fn parse(input: &str) -> Result<Vec<CommandRecord>> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    parser.parse()
}

/// Parse a command-record file.
pub fn parse_file(path: &std::path::Path) -> Result<Vec<CommandRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| TcadError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}

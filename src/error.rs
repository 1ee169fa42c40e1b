//! Error types for the assembly and solving core.
//!
//! This module provides a unified error type [`TcadError`] that covers
//! all error conditions that can occur while reading command records,
//! configuring devices and circuits, assembling equations and solving.

use thiserror::Error;

/// Result type alias using [`TcadError`].
pub type Result<T> = std::result::Result<T, TcadError>;

/// Unified error type for all core operations.
#[derive(Error, Debug)]
pub enum TcadError {
    // ============ Command Record Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// A required option is missing from a command record
    #[error("Command '{command}' is missing required option '-{option}'")]
    MissingOption { command: String, option: String },

    /// Unknown command in a record
    #[error("Unknown command '{command}'")]
    UnknownCommand { command: String },

    // ============ Configuration Errors ============
    /// A named model referenced by an equation could not be resolved
    #[error("Model '{model}' is not defined on region '{region}'")]
    UnresolvedModel { region: String, model: String },

    /// A model produced a value sequence of the wrong length
    #[error("Model '{model}' on region '{region}' has {actual} values, expected {expected}")]
    ModelLengthMismatch {
        region: String,
        model: String,
        expected: usize,
        actual: usize,
    },

    /// A model depends on itself, directly or through other models
    #[error("Model '{model}' on region '{region}' depends on itself")]
    CyclicModel { region: String, model: String },

    /// Region not found in device
    #[error("Region '{region}' not found on device '{device}'")]
    RegionNotFound { device: String, region: String },

    /// Contact not found in device
    #[error("Contact '{contact}' not found on device '{device}'")]
    ContactNotFound { device: String, contact: String },

    /// Interface not found in device
    #[error("Interface '{interface}' not found on device '{device}'")]
    InterfaceNotFound { device: String, interface: String },

    /// Equation variable not declared on a region
    #[error("Variable '{variable}' is not a solution variable of region '{region}'")]
    VariableNotFound { region: String, variable: String },

    /// Circuit node not found
    #[error("Circuit node '{node}' not found")]
    NodeNotFound { node: String },

    /// Circuit element instance not found
    #[error("Circuit element '{name}' not found")]
    ElementNotFound { name: String },

    /// Unknown circuit element type
    #[error("Unknown circuit element type '{element_type}'")]
    UnknownElementType { element_type: String },

    /// Wrong number of terminals for a circuit element
    #[error("Circuit element '{name}' expects {expected} nodes, got {actual}")]
    TerminalCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Duplicate circuit element name
    #[error("Duplicate circuit element name '{name}'")]
    DuplicateElement { name: String },

    /// Two equations disagree on what happens to the same row
    #[error("Conflicting permutation for row {row}")]
    ConflictingPermutation { row: usize },

    /// Invalid mesh topology
    #[error("Invalid topology on region '{region}': {message}")]
    InvalidTopology { region: String, message: String },

    /// Circuit network that cannot be solved
    #[error("Invalid circuit: {message}")]
    InvalidCircuit { message: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - a row or column has no usable pivot")]
    SingularMatrix,

    /// Newton iteration did not converge
    #[error("Newton did not converge after {iterations} iterations (abs error: {abs_error:.2e}, rel error: {rel_error:.2e})")]
    ConvergenceFailure {
        iterations: usize,
        abs_error: f64,
        rel_error: f64,
    },

    /// Small-signal analysis requested before a converged operating point
    #[error("No converged operating point is available for small-signal analysis")]
    NoOperatingPoint,

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading a command file
    #[error("Failed to read command file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TcadError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an unresolved model error
    pub fn unresolved_model(region: impl Into<String>, model: impl Into<String>) -> Self {
        Self::UnresolvedModel {
            region: region.into(),
            model: model.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, abs_error: f64, rel_error: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            abs_error,
            rel_error,
        }
    }

    /// Whether this error is a setup/configuration problem rather than a
    /// numerical outcome.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedModel { .. }
                | Self::ModelLengthMismatch { .. }
                | Self::CyclicModel { .. }
                | Self::RegionNotFound { .. }
                | Self::ContactNotFound { .. }
                | Self::InterfaceNotFound { .. }
                | Self::VariableNotFound { .. }
                | Self::NodeNotFound { .. }
                | Self::ConflictingPermutation { .. }
                | Self::InvalidTopology { .. }
                | Self::InvalidCircuit { .. }
        )
    }
}

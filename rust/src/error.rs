//! Error types shared by the solver, the network builder and the model selector.

use thiserror::Error;

/// Main error type for phybo operations
#[derive(Error, Debug)]
pub enum PhyboError {
    /// Invalid cost model, weights, caps or thresholds
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream contract violations (empty patterns, disconnected weight graphs)
    #[error("Domain error: {message}")]
    Domain { message: String },

    /// Malformed tree structure (duplicate names, cycles, unary nodes)
    #[error("Invalid tree: {message}")]
    InvalidTree { message: String },

    /// Report or Newick parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Numerical failures inside the model comparison
    #[error("Algorithm error: {message}")]
    Algorithm { message: String },

    /// I/O errors while writing reports
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results using PhyboError
pub type Result<T> = std::result::Result<T, PhyboError>;

impl PhyboError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a domain error
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }

    /// Create an invalid tree error
    pub fn invalid_tree(message: impl Into<String>) -> Self {
        Self::InvalidTree {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create an algorithm error
    pub fn algorithm(message: impl Into<String>) -> Self {
        Self::Algorithm {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PhyboError::config("unknown cost model 'x-1'");
        assert_eq!(err.to_string(), "Configuration error: unknown cost model 'x-1'");

        let err = PhyboError::parse(3, "missing origin count");
        assert_eq!(err.to_string(), "Parse error at line 3: missing origin count");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: PhyboError = io.into();
        assert!(matches!(err, PhyboError::Io(_)));
    }
}

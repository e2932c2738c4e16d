//! Source locations attached to nodes, failures and report entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// A file/line pair pointing at the declaration site of a node or a failure
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    pub file_name: String,
    pub line_number: u32,
    pub column: u32,
}

impl CodeLocation {
    pub fn new(file_name: impl Into<String>, line_number: u32, column: u32) -> Self {
        Self {
            file_name: file_name.into(),
            line_number,
            column,
        }
    }

    /// Location of the caller of the `#[track_caller]` function invoking this
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }

    pub fn is_zero(&self) -> bool {
        self.file_name.is_empty() && self.line_number == 0
    }
}

impl From<&Location<'_>> for CodeLocation {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_name, self.line_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn here() -> CodeLocation {
        CodeLocation::caller()
    }

    #[test]
    fn test_caller_points_at_call_site() {
        let line = line!() + 1;
        let location = here();
        assert!(location.file_name.ends_with("code_location.rs"));
        assert_eq!(location.line_number, line);
    }

    #[test]
    fn test_display() {
        let location = CodeLocation::new("specs/math.rs", 42, 5);
        assert_eq!(location.to_string(), "specs/math.rs:42");
        assert!(CodeLocation::default().is_zero());
    }
}

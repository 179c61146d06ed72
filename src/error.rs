use serde::{Serialize, Serializer};
use thiserror::Error;

/// A formula failed to compile.
///
/// The message is fixed so the error contract does not depend on which parser
/// sits underneath; the parser's own diagnostic only goes to the debug log.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid syntax")]
pub struct SyntaxFault;

// Serialized as its message so JSON consumers see the same text as `Display`.
impl Serialize for SyntaxFault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_fixed() {
        assert_eq!(SyntaxFault.to_string(), "Invalid syntax");
    }

    #[test]
    fn serializes_as_message() {
        let json = serde_json::to_string(&SyntaxFault).unwrap();
        assert_eq!(json, "\"Invalid syntax\"");
    }
}

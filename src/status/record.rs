//! Line codec for the status log: `<timestampMillis>:<stepID>:<state>`.

use crate::{State, StatusRecord, Timestamp};

impl StatusRecord {
    pub fn new(timestamp: Timestamp, step_id: impl Into<String>, state: State) -> Self {
        Self {
            timestamp,
            step_id: step_id.into(),
            state,
        }
    }

    /// Parse one line. `None` for a wrong field count, an unparsable timestamp or an unknown state.
    pub fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(':').collect();
        let [ts, id, state] = parts.as_slice() else {
            return None;
        };
        Some(Self {
            timestamp: ts.trim().parse().ok()?,
            step_id: id.trim().to_string(),
            state: state.trim().parse().ok()?,
        })
    }

    /// Line without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}:{}:{}", self.timestamp, self.step_id, self.state)
    }
}

/// Step IDs are stored unescaped, so they must not contain the field or record separator.
pub fn is_valid_step_id(id: &str) -> bool {
    !id.is_empty() && !id.contains([':', '\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_fields() {
        let r = StatusRecord::parse_line("4:secondStage:recover").unwrap();
        assert_eq!(r, StatusRecord::new(4, "secondStage", State::Recover));
        assert_eq!(r.to_line(), "4:secondStage:recover");
    }

    #[test]
    fn test_parse_line_rejects_malformed() {
        assert!(StatusRecord::parse_line("5:invalid").is_none());
        assert!(StatusRecord::parse_line("5:invalid:start:tooMuch").is_none());
        assert!(StatusRecord::parse_line("x:theSource:done").is_none());
        assert!(StatusRecord::parse_line("5:theSource:finished").is_none());
        assert!(StatusRecord::parse_line("").is_none());
    }

    #[test]
    fn test_step_id_validation() {
        assert!(is_valid_step_id("001-filter"));
        assert!(!is_valid_step_id("a:b"));
        assert!(!is_valid_step_id(""));
    }
}

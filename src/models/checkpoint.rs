use serde::{Deserialize, Serialize};

/// Resumability marker persisted after every terminal event of a build.
///
/// `last_mod_index` is the index of the last step that needs no further
/// work; `-1` means nothing is done yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub build_name: String,
    pub last_mod_index: i64,
}

impl CheckpointState {
    pub fn new(build_name: impl Into<String>, last_mod_index: i64) -> Self {
        Self {
            build_name: build_name.into(),
            last_mod_index,
        }
    }

    /// Index of the first step a resumed run must process.
    pub fn resume_index(&self) -> usize {
        usize::try_from(self.last_mod_index + 1).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_index() {
        assert_eq!(CheckpointState::new("b", 4).resume_index(), 5);
        assert_eq!(CheckpointState::new("b", -1).resume_index(), 0);
        assert_eq!(CheckpointState::new("b", -7).resume_index(), 0);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_string(&CheckpointState::new("eet", 0)).unwrap();
        assert_eq!(json, r#"{"build_name":"eet","last_mod_index":0}"#);
    }
}

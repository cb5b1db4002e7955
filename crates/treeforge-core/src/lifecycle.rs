use crate::violation::InvariantViolation;
use serde::Serialize;
use treeforge_schema::PipelineName;

/// Where a pipeline is within one serialization pass.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SerializeState {
    #[default]
    Unserialized,
    Started,
    Serialized,
}

impl std::fmt::Display for SerializeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializeState::Unserialized => write!(f, "unserialized"),
            SerializeState::Started => write!(f, "started"),
            SerializeState::Serialized => write!(f, "serialized"),
        }
    }
}

/// Each pass is `serialize_start`, `serialize`, `serialize_end`, exactly once
/// and in that order. Anything else is a bug in the caller.
pub fn validate_transition(
    pipeline: &PipelineName,
    from: SerializeState,
    to: SerializeState,
) -> Result<(), InvariantViolation> {
    let valid = matches!(
        (from, to),
        (SerializeState::Unserialized, SerializeState::Started)
            | (SerializeState::Started, SerializeState::Serialized)
            | (SerializeState::Serialized, SerializeState::Unserialized)
    );

    if valid {
        Ok(())
    } else {
        Err(InvariantViolation::Lifecycle {
            pipeline: pipeline.clone(),
            from,
            to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(from: SerializeState, to: SerializeState) -> Result<(), InvariantViolation> {
        validate_transition(&PipelineName::new("os"), from, to)
    }

    #[test]
    fn valid_transitions() {
        assert!(check(SerializeState::Unserialized, SerializeState::Started).is_ok());
        assert!(check(SerializeState::Started, SerializeState::Serialized).is_ok());
        assert!(check(SerializeState::Serialized, SerializeState::Unserialized).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        // serialize before serialize_start
        assert!(check(SerializeState::Unserialized, SerializeState::Serialized).is_err());
        // serialize_end before serialize
        assert!(check(SerializeState::Started, SerializeState::Unserialized).is_err());
        // serialize_start twice
        assert!(check(SerializeState::Started, SerializeState::Started).is_err());
        // serialize twice
        assert!(check(SerializeState::Serialized, SerializeState::Serialized).is_err());
        // serialize_start without ending the previous pass
        assert!(check(SerializeState::Serialized, SerializeState::Started).is_err());
        assert!(check(SerializeState::Unserialized, SerializeState::Unserialized).is_err());
    }

    #[test]
    fn violation_names_pipeline_and_states() {
        let err = check(SerializeState::Unserialized, SerializeState::Serialized).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'os'"));
        assert!(msg.contains("unserialized -> serialized"));
    }
}

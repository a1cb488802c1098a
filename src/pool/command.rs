//! Commands, notifications and the raw message envelope.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compute::{EditPhase, EvolvePhase, GridState, Partition, RenderPhase, Rgba};
use crate::schema::RuleSet;

/// Command tag as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandTag {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "EVOLVE")]
    Evolve,
    #[serde(rename = "RENDER")]
    Render,
    #[serde(rename = "CHANGE-RULES")]
    ChangeRules,
    #[serde(rename = "RANDOM")]
    Random,
    #[serde(rename = "CLEAR")]
    Clear,
}

impl CommandTag {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandTag::Init => "INIT",
            CommandTag::Evolve => "EVOLVE",
            CommandTag::Render => "RENDER",
            CommandTag::ChangeRules => "CHANGE-RULES",
            CommandTag::Random => "RANDOM",
            CommandTag::Clear => "CLEAR",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "INIT" => CommandTag::Init,
            "EVOLVE" => CommandTag::Evolve,
            "RENDER" => CommandTag::Render,
            "CHANGE-RULES" => CommandTag::ChangeRules,
            "RANDOM" => CommandTag::Random,
            "CLEAR" => CommandTag::Clear,
            _ => return None,
        })
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a worker needs to bind itself to a partition.
pub struct InitPayload {
    pub grid: Arc<GridState>,
    pub partition: Partition,
    pub rules: RuleSet,
    /// Cell size in pixels.
    pub cell_size: u32,
    /// Padding fraction around the alive-cell circle.
    pub padding: f32,
    pub color: Rgba,
    /// RNG seed for random patches (None = entropy).
    pub seed: Option<u64>,
    /// Token for drawing the initial full frame.
    pub initial_frame: RenderPhase,
}

/// Command delivered to one worker.
///
/// Grid-touching commands carry the phase token minted for this dispatch.
pub enum Command {
    Init(Box<InitPayload>),
    Evolve(EvolvePhase),
    Render(RenderPhase),
    ChangeRules(RuleSet),
    Random { passes: u32, phase: EditPhase },
    Clear(EditPhase),
    /// A message whose tag could not be decoded. Reported, never executed.
    Unrecognized(String),
}

impl Command {
    /// Tag echoed in the completion notification.
    pub fn tag(&self) -> Option<CommandTag> {
        match self {
            Command::Init(_) => Some(CommandTag::Init),
            Command::Evolve(_) => Some(CommandTag::Evolve),
            Command::Render(_) => Some(CommandTag::Render),
            Command::ChangeRules(_) => Some(CommandTag::ChangeRules),
            Command::Random { .. } => Some(CommandTag::Random),
            Command::Clear(_) => Some(CommandTag::Clear),
            Command::Unrecognized(_) => None,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Init(payload) => f
                .debug_struct("Init")
                .field("partition", &payload.partition)
                .field("rules", &payload.rules.to_string())
                .finish_non_exhaustive(),
            Command::ChangeRules(rules) => write!(f, "ChangeRules({rules})"),
            Command::Random { passes, .. } => write!(f, "Random({passes})"),
            Command::Unrecognized(tag) => write!(f, "Unrecognized({tag:?})"),
            other => write!(f, "{}", other.tag().map_or("?", CommandTag::as_str)),
        }
    }
}

/// Coordinator-side request, before phase tokens are minted.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Evolve,
    Render,
    ChangeRules(RuleSet),
    Random(u32),
    Clear,
    Unrecognized(String),
}

/// Raw message envelope: `{ "type": TAG, "input": payload }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
}

impl Envelope {
    pub fn new(tag: impl Into<String>, input: Option<serde_json::Value>) -> Self {
        Self {
            tag: tag.into(),
            input,
        }
    }
}

impl TryFrom<&Envelope> for Order {
    type Error = ProtocolError;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        let tag = CommandTag::parse(&envelope.tag)
            .ok_or_else(|| ProtocolError::UnknownTag(envelope.tag.clone()))?;

        let input = || {
            envelope
                .input
                .clone()
                .ok_or(ProtocolError::MissingInput(tag))
        };

        Ok(match tag {
            CommandTag::Init => return Err(ProtocolError::NotRoutable(tag)),
            CommandTag::Evolve => Order::Evolve,
            CommandTag::Render => Order::Render,
            CommandTag::Clear => Order::Clear,
            CommandTag::ChangeRules => Order::ChangeRules(
                serde_json::from_value(input()?)
                    .map_err(|source| ProtocolError::InvalidInput { tag, source })?,
            ),
            CommandTag::Random => Order::Random(
                serde_json::from_value(input()?)
                    .map_err(|source| ProtocolError::InvalidInput { tag, source })?,
            ),
        })
    }
}

/// Worker to coordinator message.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub worker: usize,
    pub event: WorkerEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Completion of one command (`None` for an unrecognized one).
    WaitingAfter(Option<CommandTag>),
    /// Non-fatal protocol error. A completion always follows.
    Error(String),
    /// The worker panicked while executing a command. No completion follows.
    Fault(String),
}

/// Envelope decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unrecognized command tag {0:?}")]
    UnknownTag(String),
    #[error("Command {0} requires an input payload")]
    MissingInput(CommandTag),
    #[error("Invalid input for {tag}: {source}")]
    InvalidInput {
        tag: CommandTag,
        source: serde_json::Error,
    },
    #[error("Command {0} cannot be sent as a raw envelope")]
    NotRoutable(CommandTag),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_names() {
        for tag in [
            CommandTag::Init,
            CommandTag::Evolve,
            CommandTag::Render,
            CommandTag::ChangeRules,
            CommandTag::Random,
            CommandTag::Clear,
        ] {
            assert_eq!(CommandTag::parse(tag.as_str()), Some(tag));
            assert_eq!(
                serde_json::to_value(tag).unwrap(),
                json!(tag.as_str())
            );
        }
        assert_eq!(CommandTag::parse("WAITING-AFTER"), None);
    }

    #[test]
    fn test_decode_envelopes() {
        let random: Envelope = serde_json::from_value(json!({"type": "RANDOM", "input": 12})).unwrap();
        assert_eq!(Order::try_from(&random).unwrap(), Order::Random(12));

        let rules = Envelope::new(
            "CHANGE-RULES",
            Some(json!({"born": [3, 6], "survive": [2, 3]})),
        );
        assert_eq!(
            Order::try_from(&rules).unwrap(),
            Order::ChangeRules("B36/S23".parse().unwrap())
        );

        let evolve: Envelope = serde_json::from_value(json!({"type": "EVOLVE"})).unwrap();
        assert_eq!(Order::try_from(&evolve).unwrap(), Order::Evolve);
    }

    #[test]
    fn test_decode_errors() {
        let unknown = Envelope::new("DANCE", None);
        assert!(matches!(
            Order::try_from(&unknown),
            Err(ProtocolError::UnknownTag(t)) if t == "DANCE"
        ));

        let missing = Envelope::new("RANDOM", None);
        assert!(matches!(
            Order::try_from(&missing),
            Err(ProtocolError::MissingInput(CommandTag::Random))
        ));

        let invalid = Envelope::new("RANDOM", Some(json!("lots")));
        assert!(matches!(
            Order::try_from(&invalid),
            Err(ProtocolError::InvalidInput { .. })
        ));

        let init = Envelope::new("INIT", Some(json!({})));
        assert!(matches!(
            Order::try_from(&init),
            Err(ProtocolError::NotRoutable(CommandTag::Init))
        ));
    }
}

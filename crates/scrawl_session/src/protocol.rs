//! Typed wire protocol
//!
//! Transport frames are `{name, args[]}` JSON messages. The core-relevant
//! names map onto the closed [`Message`] set; anything else decodes to
//! `None` and is skipped. Collaborator tool state travels as an explicit
//! closed command set with typed payloads ([`CollaboratorCommand`]) instead
//! of any reflective method forwarding.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const COLLABORATOR_PREFIX: &str = "collaborator update ";

/// Core-relevant transport messages
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Server -> client on connect: the authoritative stroke map
    LoadNote {
        strokes: Map<String, Value>,
        creation_date: u64,
        can_write: bool,
    },
    /// One serialized graphic record
    NewStroke(Value),
    /// A batch of serialized graphic records (also the repair push)
    LoadStrokes(Vec<Value>),
    RemoveStroke {
        id: String,
    },
    /// Ephemeral cursor/tool state from one peer; never persisted
    CollaboratorUpdate {
        peer_id: String,
        command: CollaboratorCommand,
    },
}

/// Closed command set mirroring a collaborator's live tool state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum CollaboratorCommand {
    /// One live stroke sample from the peer's pointer
    Update {
        x: f32,
        y: f32,
        pressure: f32,
        timestamp: u64,
    },
    SetWidth {
        width: f32,
    },
    SetColor {
        color: [f32; 3],
    },
    /// Replace the peer's live stroke with flattened (x, y, pressure,
    /// timestamp) quadruples
    LoadPoints {
        points: Vec<f64>,
    },
    /// The peer committed or abandoned its live stroke
    Clear,
}

impl Message {
    /// Encode as a `{name, args[]}` frame
    pub fn encode(&self) -> Value {
        match self {
            Message::LoadNote {
                strokes,
                creation_date,
                can_write,
            } => json!({
                "name": "load note",
                "args": [{
                    "strokes": strokes,
                    "creationDate": creation_date,
                    "canWrite": can_write,
                }],
            }),
            Message::NewStroke(record) => json!({
                "name": "new stroke",
                "args": [record],
            }),
            Message::LoadStrokes(records) => json!({
                "name": "load strokes",
                "args": [records],
            }),
            Message::RemoveStroke { id } => json!({
                "name": "remove stroke",
                "args": [id],
            }),
            Message::CollaboratorUpdate { peer_id, command } => json!({
                "name": format!("{COLLABORATOR_PREFIX}{peer_id}"),
                "args": [serde_json::to_value(command).unwrap_or(Value::Null)],
            }),
        }
    }

    /// Decode a frame; unknown names or malformed args yield `None`
    pub fn decode(frame: &Value) -> Option<Message> {
        let name = frame.get("name")?.as_str()?;
        let args = frame.get("args")?.as_array()?;

        if let Some(peer_id) = name.strip_prefix(COLLABORATOR_PREFIX) {
            let command = serde_json::from_value(args.first()?.clone()).ok()?;
            return Some(Message::CollaboratorUpdate {
                peer_id: peer_id.to_string(),
                command,
            });
        }

        match name {
            "load note" => {
                let payload = args.first()?.as_object()?;
                Some(Message::LoadNote {
                    strokes: payload.get("strokes")?.as_object()?.clone(),
                    creation_date: payload.get("creationDate")?.as_u64()?,
                    can_write: payload.get("canWrite")?.as_bool()?,
                })
            }
            "new stroke" => Some(Message::NewStroke(args.first()?.clone())),
            "load strokes" => Some(Message::LoadStrokes(
                args.first()?.as_array()?.clone(),
            )),
            "remove stroke" => Some(Message::RemoveStroke {
                id: args.first()?.as_str()?.to_string(),
            }),
            other => {
                tracing::debug!(name = other, "ignoring unknown message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trips() {
        let mut strokes = Map::new();
        strokes.insert("s1".into(), json!({"id": "s1", "timestamp": 5}));
        let messages = [
            Message::LoadNote {
                strokes,
                creation_date: 1000,
                can_write: true,
            },
            Message::NewStroke(json!({"id": "s2", "timestamp": 9})),
            Message::LoadStrokes(vec![json!({"id": "s3"}), json!({"id": "s4"})]),
            Message::RemoveStroke { id: "s1".into() },
            Message::CollaboratorUpdate {
                peer_id: "peer-7".into(),
                command: CollaboratorCommand::Update {
                    x: 1.0,
                    y: 2.0,
                    pressure: 0.5,
                    timestamp: 42,
                },
            },
        ];
        for m in messages {
            assert_eq!(Message::decode(&m.encode()), Some(m));
        }
    }

    #[test]
    fn test_collaborator_peer_id_travels_in_name() {
        let m = Message::CollaboratorUpdate {
            peer_id: "abc".into(),
            command: CollaboratorCommand::Clear,
        };
        let frame = m.encode();
        assert_eq!(
            frame.get("name").and_then(Value::as_str),
            Some("collaborator update abc")
        );
    }

    #[test]
    fn test_unknown_or_malformed_frames_yield_none() {
        assert!(Message::decode(&json!({"name": "billing ping", "args": []})).is_none());
        assert!(Message::decode(&json!({"args": []})).is_none());
        assert!(Message::decode(&json!({"name": "remove stroke", "args": []})).is_none());
        assert!(Message::decode(&json!({"name": "remove stroke", "args": [7]})).is_none());
        assert!(Message::decode(&json!({
            "name": "collaborator update p1",
            "args": [{"cmd": "teleport"}]
        }))
        .is_none());
        assert!(Message::decode(&json!(null)).is_none());
    }

    #[test]
    fn test_command_payloads_round_trip() {
        let commands = [
            CollaboratorCommand::SetWidth { width: 4.5 },
            CollaboratorCommand::SetColor {
                color: [1.0, 0.5, 0.0],
            },
            CollaboratorCommand::LoadPoints {
                points: vec![0.0, 1.0, 0.5, 10.0],
            },
            CollaboratorCommand::Clear,
        ];
        for c in commands {
            let v = serde_json::to_value(&c).unwrap();
            assert_eq!(serde_json::from_value::<CollaboratorCommand>(v).unwrap(), c);
        }
    }
}

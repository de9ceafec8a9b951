//! Interactions: slash command invocations and component presses.

use crate::{
    id::{ApplicationId, ChannelId, CommandId, GuildId, InteractionId},
    model::{Member, Message, User},
};
use serde::{
    de::Error as DeError,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use serde_json::Value;
use std::{error::Error, fmt};

/// An inbound interaction from the gateway.
#[derive(Clone, Debug)]
pub struct Interaction {
    /// Snowflake of this interaction.
    pub id: InteractionId,
    /// Application the interaction targets.
    pub application_id: ApplicationId,
    /// Interaction type.
    pub kind: InteractionType,
    /// Typed payload, keyed by [`Self::kind`].
    pub data: Option<InteractionData>,
    /// Guild the interaction happened in, if any.
    pub guild_id: Option<GuildId>,
    /// Channel the interaction happened in, if any.
    pub channel_id: Option<ChannelId>,
    /// Invoking member, for guild interactions.
    pub member: Option<Member>,
    /// Invoking user, for direct-message interactions.
    pub user: Option<User>,
    /// Continuation token used to respond to the interaction.
    pub token: String,
}

impl Interaction {
    /// The invoking user, regardless of guild or DM origin.
    #[must_use]
    pub fn invoking_user(&self) -> Option<&User> {
        self.user
            .as_ref()
            .or_else(|| self.member.as_ref().and_then(|m| m.user.as_ref()))
    }
}

/// Payload variants of an [`Interaction`].
#[derive(Clone, Debug)]
pub enum InteractionData {
    /// A slash command invocation.
    Command(CommandInteraction),
    /// A button press on a message component.
    Button(ButtonInteraction),
}

/// Payload of a slash command invocation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CommandInteraction {
    /// Snowflake of the invoked command.
    pub id: CommandId,
    /// Name of the invoked command.
    pub name: String,
    /// Submitted options, nesting through subcommands.
    #[serde(default)]
    pub options: Vec<CommandDataOption>,
}

/// One submitted option value within a command invocation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CommandDataOption {
    /// Option name.
    pub name: String,
    /// Submitted value, absent on subcommand levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Nested options beneath a subcommand or group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandDataOption>,
}

/// Payload of a button press.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ButtonInteraction {
    /// Developer-assigned component identifier.
    pub custom_id: String,
    /// Component type discriminant; `2` for buttons.
    #[serde(default)]
    pub component_type: u8,
}

/// Type of an [`Interaction`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum InteractionType {
    /// Webhook validation ping.
    Ping = 1,
    /// Slash command invocation.
    ApplicationCommand = 2,
    /// Message component press.
    ComponentButton = 3,
}

impl InteractionType {
    /// Maps a wire discriminant onto an interaction type.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::ComponentButton,
            _ => return None,
        })
    }
}

#[derive(Deserialize)]
struct RawInteraction {
    id: InteractionId,
    application_id: ApplicationId,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    guild_id: Option<GuildId>,
    #[serde(default)]
    channel_id: Option<ChannelId>,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    token: String,
}

impl<'de> Deserialize<'de> for Interaction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawInteraction::deserialize(deserializer)?;
        let kind = InteractionType::from_u8(raw.kind)
            .ok_or_else(|| DeError::custom(format!("unknown interaction type {}", raw.kind)))?;

        let data = match (kind, raw.data) {
            (InteractionType::ApplicationCommand, Some(d)) => Some(InteractionData::Command(
                serde_json::from_value(d).map_err(DeError::custom)?,
            )),
            (InteractionType::ComponentButton, Some(d)) => Some(InteractionData::Button(
                serde_json::from_value(d).map_err(DeError::custom)?,
            )),
            _ => None,
        };

        Ok(Interaction {
            id: raw.id,
            application_id: raw.application_id,
            kind,
            data,
            guild_id: raw.guild_id,
            channel_id: raw.channel_id,
            member: raw.member,
            user: raw.user,
            token: raw.token,
        })
    }
}

/// Type of reply sent for an interaction.
///
/// `Acknowledge` and `ChannelMessage` were retired by Discord: inbound
/// payloads may still carry them, but they are refused on the send path.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum InteractionResponseType {
    /// Reply to a ping.
    Pong = 1,
    /// Retired: bare acknowledgement.
    Acknowledge = 2,
    /// Retired: message without source.
    ChannelMessage = 3,
    /// Immediate message reply.
    ChannelMessageWithSource = 4,
    /// Deferred reply; a loading state until the follow-up arrives.
    DeferredChannelMessageWithSource = 5,
}

impl InteractionResponseType {
    /// Maps a wire discriminant onto a response type, retired values
    /// included.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Pong,
            2 => Self::Acknowledge,
            3 => Self::ChannelMessage,
            4 => Self::ChannelMessageWithSource,
            5 => Self::DeferredChannelMessageWithSource,
            _ => return None,
        })
    }

    /// Whether this type is accepted on parse but refused on send.
    #[must_use]
    pub fn is_retired(self) -> bool {
        matches!(self, Self::Acknowledge | Self::ChannelMessage)
    }
}

impl<'de> Deserialize<'de> for InteractionResponseType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw)
            .ok_or_else(|| DeError::custom(format!("unknown interaction response type {raw}")))
    }
}

/// A reply to an interaction.
///
/// The message is embedded by value; responses are small and short-lived.
#[derive(Clone, Debug, Deserialize)]
pub struct InteractionResponse {
    /// Response type.
    #[serde(rename = "type")]
    pub kind: InteractionResponseType,
    /// Message content for message-bearing response types.
    #[serde(default)]
    pub message: Option<Message>,
}

impl InteractionResponse {
    /// Serialises this response for transmission.
    ///
    /// Retired response types deserialize fine but may no longer be sent.
    pub fn for_send(&self) -> Result<Value, ResponseError> {
        if self.kind.is_retired() {
            return Err(ResponseError::Retired(self.kind));
        }

        let mut body = serde_json::Map::new();
        body.insert("type".into(), Value::from(self.kind as u8));
        if let Some(msg) = &self.message {
            let data = serde_json::to_value(msg).map_err(|_| ResponseError::Message)?;
            body.insert("data".into(), data);
        }

        Ok(Value::Object(body))
    }
}

impl Serialize for InteractionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerError;

        self.for_send()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

/// Failure to serialise an [`InteractionResponse`].
#[derive(Debug)]
pub enum ResponseError {
    /// The response type has been retired and cannot be sent.
    Retired(InteractionResponseType),
    /// The embedded message could not be serialised.
    Message,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retired(kind) => write!(f, "response type {kind:?} is retired and cannot be sent"),
            Self::Message => write!(f, "embedded message failed to serialise"),
        }
    }
}

impl Error for ResponseError {}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_interaction_deserializes() {
        let v = json!({
            "id": "1",
            "application_id": "2",
            "type": 2,
            "token": "cont-token",
            "guild_id": "3",
            "channel_id": "4",
            "data": {
                "id": "5",
                "name": "ping",
                "options": [{"name": "target", "value": "world"}],
            },
        });

        let i: Interaction = serde_json::from_value(v).unwrap();
        assert_eq!(i.kind, InteractionType::ApplicationCommand);
        assert_eq!(i.token, "cont-token");
        match i.data {
            Some(InteractionData::Command(cmd)) => {
                assert_eq!(cmd.name, "ping");
                assert_eq!(cmd.options[0].name, "target");
            },
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn button_interaction_deserializes() {
        let v = json!({
            "id": "1",
            "application_id": "2",
            "type": 3,
            "token": "t",
            "data": {"custom_id": "confirm", "component_type": 2},
        });

        let i: Interaction = serde_json::from_value(v).unwrap();
        match i.data {
            Some(InteractionData::Button(b)) => assert_eq!(b.custom_id, "confirm"),
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn retired_response_types_parse_but_refuse_send() {
        let parsed: InteractionResponseType = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, InteractionResponseType::Acknowledge);
        assert!(parsed.is_retired());

        let resp = InteractionResponse {
            kind: parsed,
            message: None,
        };
        assert!(matches!(
            resp.for_send(),
            Err(ResponseError::Retired(InteractionResponseType::Acknowledge))
        ));

        let ok = InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            message: None,
        };
        assert_eq!(ok.for_send().unwrap(), json!({"type": 4}));
    }
}

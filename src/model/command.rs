//! Slash command definitions and their wire serialisation.

use crate::id::{ApplicationId, CommandId, GuildId};
use serde::{
    de::Error as DeError,
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use serde_json::Value;

/// A slash command definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Command {
    /// Snowflake of the command, once registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,
    /// Owning application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<ApplicationId>,
    /// Guild scoping the command, absent for global commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    /// Command name.
    pub name: String,
    /// Command description.
    #[serde(default)]
    pub description: String,
    /// Top-level options, subcommands, or subcommand groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

/// One option of a slash command.
///
/// Subcommands and subcommand groups nest further options; serialisation
/// is recursive, so every nested option emits its own complete object.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CommandOption {
    /// Option type discriminant.
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    /// Option name.
    pub name: String,
    /// Option description.
    #[serde(default)]
    pub description: String,
    /// Whether the option must be supplied.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Fixed value choices, when the option restricts input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandOptionChoice>,
    /// Nested options for subcommands and groups.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

/// A fixed choice offered for a command option.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CommandOptionChoice {
    /// Display name of the choice.
    pub name: String,
    /// Value submitted when chosen.
    pub value: Value,
}

/// Type of a [`CommandOption`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum CommandOptionType {
    /// A nested invocable subcommand.
    SubCommand = 1,
    /// A group of subcommands.
    SubCommandGroup = 2,
    /// Free-form string argument.
    #[default]
    String = 3,
    /// Integer argument.
    Integer = 4,
    /// Boolean argument.
    Boolean = 5,
    /// User mention argument.
    User = 6,
    /// Channel mention argument.
    Channel = 7,
    /// Role mention argument.
    Role = 8,
    /// User-or-role mention argument.
    Mentionable = 9,
    /// Floating-point argument.
    Number = 10,
}

impl CommandOptionType {
    /// Maps a wire discriminant onto an option type.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            _ => return None,
        })
    }
}

impl Serialize for CommandOptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for CommandOptionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw)
            .ok_or_else(|| DeError::custom(format!("unknown command option type {raw}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_subcommand_options_serialize_completely() {
        let cmd = Command {
            name: "music".into(),
            description: "music controls".into(),
            options: vec![CommandOption {
                kind: CommandOptionType::SubCommand,
                name: "play".into(),
                description: "play a track".into(),
                options: vec![CommandOption {
                    kind: CommandOptionType::String,
                    name: "query".into(),
                    description: "what to play".into(),
                    required: true,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let v = serde_json::to_value(&cmd).unwrap();

        // Every nested option must be a full object mirroring the parent's
        // shape, not a partial rewrite of the enclosing one.
        assert_eq!(
            v,
            json!({
                "name": "music",
                "description": "music controls",
                "options": [{
                    "type": 1,
                    "name": "play",
                    "description": "play a track",
                    "options": [{
                        "type": 3,
                        "name": "query",
                        "description": "what to play",
                        "required": true,
                    }],
                }],
            })
        );
    }

    #[test]
    fn option_type_round_trips() {
        for raw in 1..=10u8 {
            let kind = CommandOptionType::from_u8(raw).unwrap();
            let ser = serde_json::to_string(&kind).unwrap();
            assert_eq!(ser, raw.to_string());
        }
        assert!(CommandOptionType::from_u8(11).is_none());
    }
}

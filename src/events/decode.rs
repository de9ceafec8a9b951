//! Wire-event decoding and cache reference resolution.
//!
//! Each decoder reads the dispatch `d` object, resolves referenced
//! snowflakes through the cache, and yields typed payloads. A decoder
//! yields nothing when a mandatory reference cannot be resolved, so
//! handlers never observe half-populated records.

use super::{EventData, EventKind};
use crate::{
    cache::Cache,
    id::{ChannelId, GuildId, IntegrationId, MessageId, RoleId},
    model::{
        Channel,
        Command,
        Emoji,
        Guild,
        Integration,
        Interaction,
        InteractionType,
        Invite,
        Member,
        Message,
        Presence,
        ReactionEmoji,
        Role,
        StageInstance,
        User,
        VoiceState,
    },
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

fn parse<T: DeserializeOwned>(d: &Value) -> Option<T> {
    match serde_json::from_value(d.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Dropping malformed event payload: {e}");
            None
        },
    }
}

fn field<T: DeserializeOwned>(d: &Value, name: &str) -> Option<T> {
    parse(d.get(name)?)
}

fn require_guild(cache: &dyn Cache, id: GuildId) -> Option<Arc<Guild>> {
    let guild = cache.guild(id);
    if guild.is_none() {
        debug!("Dropping event: guild {id} not in cache");
    }
    guild
}

fn require_channel(cache: &dyn Cache, id: ChannelId) -> Option<Arc<Channel>> {
    let channel = cache.channel(id);
    if channel.is_none() {
        debug!("Dropping event: channel {id} not in cache");
    }
    channel
}

/// Decodes one dispatch into zero, one, or two typed payloads.
///
/// Two payloads occur for interactions, where a button press projects an
/// additional [`EventData::ButtonClick`] after the generic record.
pub(crate) fn decode(kind: EventKind, d: &Value, cache: &dyn Cache) -> Vec<EventData> {
    decode_inner(kind, d, cache).unwrap_or_default()
}

fn decode_inner(kind: EventKind, d: &Value, cache: &dyn Cache) -> Option<Vec<EventData>> {
    let single = |data: EventData| Some(vec![data]);

    match kind {
        EventKind::Ready => {
            let session_id: String = field(d, "session_id")?;
            let user: User = field(d, "user")?;
            cache.insert_user(Arc::new(user.clone()));
            single(EventData::Ready { session_id, user })
        },
        EventKind::Resumed => single(EventData::Resumed),
        EventKind::GuildCreate | EventKind::GuildUpdate => {
            let guild: Guild = parse(d)?;
            let guild = Arc::new(guild);
            cache.insert_guild(Arc::clone(&guild));
            single(if kind == EventKind::GuildCreate {
                EventData::GuildCreate { guild }
            } else {
                EventData::GuildUpdate { guild }
            })
        },
        EventKind::GuildDelete => {
            let guild_id: GuildId = field(d, "id")?;
            let unavailable: bool = field(d, "unavailable").unwrap_or(false);
            if !unavailable {
                cache.remove_guild(guild_id);
            }
            single(EventData::GuildDelete {
                guild_id,
                unavailable,
            })
        },
        EventKind::GuildRoleCreate | EventKind::GuildRoleUpdate => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            let role: Role = field(d, "role")?;
            let role = Arc::new(role);
            cache.insert_role(Arc::clone(&role));
            single(if kind == EventKind::GuildRoleCreate {
                EventData::GuildRoleCreate { guild, role }
            } else {
                EventData::GuildRoleUpdate { guild, role }
            })
        },
        EventKind::GuildRoleDelete => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            let role_id: RoleId = field(d, "role_id")?;
            cache.remove_role(role_id);
            single(EventData::GuildRoleDelete { guild, role_id })
        },
        EventKind::GuildEmojisUpdate => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            let emojis: Vec<Emoji> = field(d, "emojis")?;
            for emoji in &emojis {
                cache.insert_emoji(Arc::new(emoji.clone()));
            }
            single(EventData::GuildEmojisUpdate { guild, emojis })
        },
        EventKind::GuildIntegrationsUpdate => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            single(EventData::GuildIntegrationsUpdate { guild })
        },
        EventKind::IntegrationCreate | EventKind::IntegrationUpdate => {
            let integration: Integration = parse(d)?;
            single(if kind == EventKind::IntegrationCreate {
                EventData::IntegrationCreate { integration }
            } else {
                EventData::IntegrationUpdate { integration }
            })
        },
        EventKind::IntegrationDelete => {
            let integration_id: IntegrationId = field(d, "id")?;
            let guild_id: GuildId = field(d, "guild_id")?;
            single(EventData::IntegrationDelete {
                integration_id,
                guild_id,
            })
        },
        EventKind::ChannelCreate | EventKind::ChannelUpdate => {
            let channel: Channel = parse(d)?;
            let channel = Arc::new(channel);
            cache.insert_channel(Arc::clone(&channel));
            single(if kind == EventKind::ChannelCreate {
                EventData::ChannelCreate { channel }
            } else {
                EventData::ChannelUpdate { channel }
            })
        },
        EventKind::ChannelDelete => {
            let channel: Channel = parse(d)?;
            cache.remove_channel(channel.id);
            single(EventData::ChannelDelete {
                channel: Arc::new(channel),
            })
        },
        EventKind::ChannelPinsUpdate => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            let last_pin_timestamp: Option<String> = field(d, "last_pin_timestamp");
            single(EventData::ChannelPinsUpdate {
                channel,
                last_pin_timestamp,
            })
        },
        EventKind::GuildMemberAdd | EventKind::GuildMemberUpdate => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            let member: Member = parse(d)?;
            if let Some(user) = &member.user {
                cache.insert_user(Arc::new(user.clone()));
            }
            single(if kind == EventKind::GuildMemberAdd {
                EventData::GuildMemberAdd { guild, member }
            } else {
                EventData::GuildMemberUpdate { guild, member }
            })
        },
        EventKind::GuildMemberRemove => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            let user: User = field(d, "user")?;
            single(EventData::GuildMemberRemove { guild, user })
        },
        EventKind::GuildMembersChunk => {
            let guild = require_guild(cache, field(d, "guild_id")?)?;
            let members: Vec<Member> = field(d, "members")?;
            for member in &members {
                if let Some(user) = &member.user {
                    cache.insert_user(Arc::new(user.clone()));
                }
            }
            single(EventData::GuildMembersChunk {
                guild,
                members,
                chunk_index: field(d, "chunk_index").unwrap_or(0),
                chunk_count: field(d, "chunk_count").unwrap_or(1),
                nonce: field(d, "nonce"),
            })
        },
        EventKind::GuildBanAdd | EventKind::GuildBanRemove => {
            let guild_id: GuildId = field(d, "guild_id")?;
            let user: User = field(d, "user")?;
            single(if kind == EventKind::GuildBanAdd {
                EventData::GuildBanAdd { guild_id, user }
            } else {
                EventData::GuildBanRemove { guild_id, user }
            })
        },
        EventKind::MessageCreate | EventKind::MessageUpdate => {
            let message: Message = parse(d)?;
            let channel = require_channel(cache, message.channel_id)?;
            if let Some(author) = &message.author {
                cache.insert_user(Arc::new(author.clone()));
            }
            single(if kind == EventKind::MessageCreate {
                EventData::MessageCreate { message, channel }
            } else {
                EventData::MessageUpdate { message, channel }
            })
        },
        EventKind::MessageDelete => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            let message_id: MessageId = field(d, "id")?;
            single(EventData::MessageDelete {
                message_id,
                channel,
            })
        },
        EventKind::MessageDeleteBulk => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            let ids: Vec<MessageId> = field(d, "ids")?;
            single(EventData::MessageDeleteBulk { ids, channel })
        },
        EventKind::MessageReactionAdd => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            single(EventData::MessageReactionAdd {
                user_id: field(d, "user_id")?,
                channel,
                message_id: field(d, "message_id")?,
                member: field(d, "member"),
                emoji: field::<ReactionEmoji>(d, "emoji")?,
            })
        },
        EventKind::MessageReactionRemove => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            single(EventData::MessageReactionRemove {
                user_id: field(d, "user_id")?,
                channel,
                message_id: field(d, "message_id")?,
                emoji: field::<ReactionEmoji>(d, "emoji")?,
            })
        },
        EventKind::MessageReactionRemoveEmoji => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            single(EventData::MessageReactionRemoveEmoji {
                channel,
                message_id: field(d, "message_id")?,
                emoji: field::<ReactionEmoji>(d, "emoji")?,
            })
        },
        EventKind::MessageReactionRemoveAll => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            single(EventData::MessageReactionRemoveAll {
                channel,
                message_id: field(d, "message_id")?,
            })
        },
        EventKind::TypingStart => {
            let channel = require_channel(cache, field(d, "channel_id")?)?;
            single(EventData::TypingStart {
                channel,
                user_id: field(d, "user_id")?,
                timestamp: field(d, "timestamp").unwrap_or(0),
            })
        },
        EventKind::PresenceUpdate => {
            let presence: Presence = parse(d)?;
            single(EventData::PresenceUpdate { presence })
        },
        EventKind::UserUpdate => {
            let user: User = parse(d)?;
            // Only users already seen are refreshed; an unknown user has
            // no stale copy to update.
            if cache.user(user.id).is_none() {
                debug!("Dropping event: user {} not in cache", user.id);
                return None;
            }
            let user = Arc::new(user);
            cache.insert_user(Arc::clone(&user));
            single(EventData::UserUpdate { user })
        },
        EventKind::InviteCreate => {
            let invite: Invite = parse(d)?;
            single(EventData::InviteCreate { invite })
        },
        EventKind::InviteDelete => single(EventData::InviteDelete {
            channel_id: field(d, "channel_id")?,
            guild_id: field(d, "guild_id"),
            code: field(d, "code")?,
        }),
        EventKind::VoiceStateUpdate => {
            let state: VoiceState = parse(d)?;
            single(EventData::VoiceStateUpdate { state })
        },
        EventKind::VoiceServerUpdate => single(EventData::VoiceServerUpdate {
            guild_id: field(d, "guild_id")?,
            endpoint: field(d, "endpoint"),
            token: field(d, "token")?,
        }),
        EventKind::WebhooksUpdate => single(EventData::WebhooksUpdate {
            guild_id: field(d, "guild_id")?,
            channel_id: field(d, "channel_id")?,
        }),
        EventKind::InteractionCreate => {
            let interaction: Interaction = parse(d)?;
            let mut out = vec![EventData::InteractionCreate {
                interaction: interaction.clone(),
            }];
            if interaction.kind == InteractionType::ComponentButton {
                out.push(EventData::ButtonClick { interaction });
            }
            Some(out)
        },
        // The projection is produced alongside InteractionCreate and has
        // no wire name of its own.
        EventKind::ButtonClick => None,
        EventKind::ApplicationCommandCreate
        | EventKind::ApplicationCommandUpdate
        | EventKind::ApplicationCommandDelete => {
            let command: Command = parse(d)?;
            single(match kind {
                EventKind::ApplicationCommandCreate =>
                    EventData::ApplicationCommandCreate { command },
                EventKind::ApplicationCommandUpdate =>
                    EventData::ApplicationCommandUpdate { command },
                _ => EventData::ApplicationCommandDelete { command },
            })
        },
        EventKind::StageInstanceCreate => {
            let stage: StageInstance = parse(d)?;
            single(EventData::StageInstanceCreate { stage })
        },
        EventKind::StageInstanceDelete => {
            let stage: StageInstance = parse(d)?;
            single(EventData::StageInstanceDelete { stage })
        },
        EventKind::GuildJoinRequestDelete => single(EventData::GuildJoinRequestDelete {
            guild_id: field(d, "guild_id")?,
            user_id: field(d, "user_id")?,
        }),
        // Synthesised by the voice pipeline; never decoded from the wire.
        EventKind::VoiceReady
        | EventKind::VoiceReceive
        | EventKind::VoiceBufferSend
        | EventKind::VoiceTrackMarker
        | EventKind::VoiceUserTalking => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cache::{memory::MemoryCache, NullCache},
        id::UserId,
    };
    use serde_json::json;

    fn message_create() -> Value {
        json!({
            "id": "10",
            "channel_id": "20",
            "guild_id": "30",
            "author": {"id": "40", "username": "someone", "discriminator": "0"},
            "content": "hello there",
            "type": 0,
        })
    }

    #[test]
    fn unresolved_channel_reference_drops_the_event() {
        let cache = NullCache;
        let out = decode(EventKind::MessageCreate, &message_create(), &cache);
        assert!(out.is_empty());
    }

    #[test]
    fn resolved_references_produce_a_full_record() {
        let cache = MemoryCache::default();
        cache.insert_channel(Arc::new(Channel {
            id: ChannelId(20),
            guild_id: Some(GuildId(30)),
            name: Some("general".into()),
            ..Default::default()
        }));

        let out = decode(EventKind::MessageCreate, &message_create(), &cache);
        assert_eq!(out.len(), 1);
        match &out[0] {
            EventData::MessageCreate { message, channel } => {
                assert_eq!(message.content, "hello there");
                assert_eq!(channel.name.as_deref(), Some("general"));
            },
            other => panic!("wrong payload: {other:?}"),
        }

        // Decoding a message also teaches the cache its author.
        assert!(cache.user(UserId(40)).is_some());
    }

    #[test]
    fn button_interactions_project_a_second_event() {
        let d = json!({
            "id": "1",
            "application_id": "2",
            "type": 3,
            "token": "t",
            "data": {"custom_id": "ok", "component_type": 2},
        });

        let out = decode(EventKind::InteractionCreate, &d, &NullCache);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], EventData::InteractionCreate { .. }));
        assert!(matches!(out[1], EventData::ButtonClick { .. }));
    }

    #[test]
    fn slash_interactions_do_not_project() {
        let d = json!({
            "id": "1",
            "application_id": "2",
            "type": 2,
            "token": "t",
            "data": {"id": "5", "name": "ping"},
        });

        let out = decode(EventKind::InteractionCreate, &d, &NullCache);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn user_update_refreshes_the_cached_user() {
        let d = json!({
            "id": "40",
            "username": "new-name",
            "discriminator": "0",
            "avatar": "a1b2c3",
        });

        // Unknown users have no stale copy to refresh.
        assert!(decode(EventKind::UserUpdate, &d, &NullCache).is_empty());

        let cache = MemoryCache::default();
        cache.insert_user(Arc::new(User {
            id: UserId(40),
            username: "old-name".into(),
            ..Default::default()
        }));

        let out = decode(EventKind::UserUpdate, &d, &cache);
        assert_eq!(out.len(), 1);
        match &out[0] {
            EventData::UserUpdate { user } => assert_eq!(user.username, "new-name"),
            other => panic!("wrong payload: {other:?}"),
        }
        assert_eq!(cache.user(UserId(40)).unwrap().username, "new-name");
    }

    #[test]
    fn guild_lifecycle_maintains_the_cache() {
        let cache = MemoryCache::default();

        let d = json!({"id": "77", "name": "testers", "owner_id": "1"});
        let out = decode(EventKind::GuildCreate, &d, &cache);
        assert_eq!(out.len(), 1);
        assert!(cache.guild(GuildId(77)).is_some());

        let d = json!({"id": "77", "unavailable": false});
        let out = decode(EventKind::GuildDelete, &d, &cache);
        assert_eq!(out.len(), 1);
        assert!(cache.guild(GuildId(77)).is_none());
    }

    #[test]
    fn role_events_need_their_guild() {
        let cache = MemoryCache::default();
        let d = json!({
            "guild_id": "5",
            "role": {"id": "6", "name": "mods"},
        });

        assert!(decode(EventKind::GuildRoleCreate, &d, &cache).is_empty());

        cache.insert_guild(Arc::new(Guild {
            id: GuildId(5),
            ..Default::default()
        }));
        let out = decode(EventKind::GuildRoleCreate, &d, &cache);
        assert_eq!(out.len(), 1);
        assert!(cache.role(RoleId(6)).is_some());
    }
}

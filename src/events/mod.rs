//! The event taxonomy, typed event records, and handler registration.
//!
//! Wire events arrive as `{op:0, t:"NAME", d:{...}}`; the name selects a
//! decoder (see [`decode`]) which resolves referenced snowflakes through
//! the cache and produces a typed [`Event`]. Voice connections feed their
//! own synthetic events (ready, receive, markers) through the same table.

pub(crate) mod decode;

use crate::{
    id::{
        ChannelId,
        GuildId,
        IntegrationId,
        MessageId,
        RoleId,
        UserId,
    },
    model::{
        Channel,
        Command,
        Emoji,
        Guild,
        Integration,
        Interaction,
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
use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Every kind of event the runtime can dispatch.
///
/// The first block mirrors gateway dispatch names; the trailing `Voice*`
/// kinds are synthesised by the voice pipeline.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(usize)]
pub enum EventKind {
    /// Session established; initial state received.
    Ready,
    /// Session resumed after a reconnect.
    Resumed,
    /// Guild became available or was joined.
    GuildCreate,
    /// Guild settings changed.
    GuildUpdate,
    /// Guild became unavailable or was left.
    GuildDelete,
    /// Role created.
    GuildRoleCreate,
    /// Role changed.
    GuildRoleUpdate,
    /// Role deleted.
    GuildRoleDelete,
    /// Guild emoji set changed.
    GuildEmojisUpdate,
    /// Guild integrations changed in bulk.
    GuildIntegrationsUpdate,
    /// Integration created.
    IntegrationCreate,
    /// Integration changed.
    IntegrationUpdate,
    /// Integration deleted.
    IntegrationDelete,
    /// Channel created.
    ChannelCreate,
    /// Channel changed.
    ChannelUpdate,
    /// Channel deleted.
    ChannelDelete,
    /// Pinned message set changed.
    ChannelPinsUpdate,
    /// Member joined a guild.
    GuildMemberAdd,
    /// Membership changed.
    GuildMemberUpdate,
    /// Member left or was removed.
    GuildMemberRemove,
    /// Bulk member chunk, replying to a request.
    GuildMembersChunk,
    /// User banned.
    GuildBanAdd,
    /// User unbanned.
    GuildBanRemove,
    /// Message sent.
    MessageCreate,
    /// Message edited.
    MessageUpdate,
    /// Message deleted.
    MessageDelete,
    /// Multiple messages deleted at once.
    MessageDeleteBulk,
    /// Reaction added.
    MessageReactionAdd,
    /// Reaction removed.
    MessageReactionRemove,
    /// All reactions of one emoji removed.
    MessageReactionRemoveEmoji,
    /// All reactions removed.
    MessageReactionRemoveAll,
    /// User started typing.
    TypingStart,
    /// Presence changed.
    PresenceUpdate,
    /// A user's global profile (username, avatar) changed.
    UserUpdate,
    /// Invite created.
    InviteCreate,
    /// Invite revoked or expired.
    InviteDelete,
    /// A user's voice state changed.
    VoiceStateUpdate,
    /// Voice server endpoint assigned or moved.
    VoiceServerUpdate,
    /// Webhook configuration changed.
    WebhooksUpdate,
    /// Interaction received (any type).
    InteractionCreate,
    /// Button press, projected out of its interaction.
    ButtonClick,
    /// Slash command registered.
    ApplicationCommandCreate,
    /// Slash command changed.
    ApplicationCommandUpdate,
    /// Slash command removed.
    ApplicationCommandDelete,
    /// Stage instance started.
    StageInstanceCreate,
    /// Stage instance ended.
    StageInstanceDelete,
    /// Membership screening request withdrawn.
    GuildJoinRequestDelete,
    /// Voice connection completed its handshake.
    VoiceReady,
    /// Voice audio received from another user.
    VoiceReceive,
    /// Outbound voice buffer drained below its low-water mark.
    VoiceBufferSend,
    /// Playback reached a user-inserted marker.
    VoiceTrackMarker,
    /// Another user's speaking flags changed.
    VoiceUserTalking,
}

impl EventKind {
    pub(crate) const COUNT: usize = EventKind::VoiceUserTalking as usize + 1;
}

/// Immutable wire-name lookup, built on first use and never mutated.
pub(crate) static EVENT_TABLE: Lazy<HashMap<&'static str, EventKind>> = Lazy::new(|| {
    use EventKind::*;

    HashMap::from([
        ("READY", Ready),
        ("RESUMED", Resumed),
        ("GUILD_CREATE", GuildCreate),
        ("GUILD_UPDATE", GuildUpdate),
        ("GUILD_DELETE", GuildDelete),
        ("GUILD_ROLE_CREATE", GuildRoleCreate),
        ("GUILD_ROLE_UPDATE", GuildRoleUpdate),
        ("GUILD_ROLE_DELETE", GuildRoleDelete),
        ("GUILD_EMOJIS_UPDATE", GuildEmojisUpdate),
        ("GUILD_INTEGRATIONS_UPDATE", GuildIntegrationsUpdate),
        ("INTEGRATION_CREATE", IntegrationCreate),
        ("INTEGRATION_UPDATE", IntegrationUpdate),
        ("INTEGRATION_DELETE", IntegrationDelete),
        ("CHANNEL_CREATE", ChannelCreate),
        ("CHANNEL_UPDATE", ChannelUpdate),
        ("CHANNEL_DELETE", ChannelDelete),
        ("CHANNEL_PINS_UPDATE", ChannelPinsUpdate),
        ("GUILD_MEMBER_ADD", GuildMemberAdd),
        ("GUILD_MEMBER_UPDATE", GuildMemberUpdate),
        ("GUILD_MEMBER_REMOVE", GuildMemberRemove),
        ("GUILD_MEMBERS_CHUNK", GuildMembersChunk),
        ("GUILD_BAN_ADD", GuildBanAdd),
        ("GUILD_BAN_REMOVE", GuildBanRemove),
        ("MESSAGE_CREATE", MessageCreate),
        ("MESSAGE_UPDATE", MessageUpdate),
        ("MESSAGE_DELETE", MessageDelete),
        ("MESSAGE_DELETE_BULK", MessageDeleteBulk),
        ("MESSAGE_REACTION_ADD", MessageReactionAdd),
        ("MESSAGE_REACTION_REMOVE", MessageReactionRemove),
        ("MESSAGE_REACTION_REMOVE_EMOJI", MessageReactionRemoveEmoji),
        ("MESSAGE_REACTION_REMOVE_ALL", MessageReactionRemoveAll),
        ("TYPING_START", TypingStart),
        ("PRESENCE_UPDATE", PresenceUpdate),
        ("USER_UPDATE", UserUpdate),
        ("INVITE_CREATE", InviteCreate),
        ("INVITE_DELETE", InviteDelete),
        ("VOICE_STATE_UPDATE", VoiceStateUpdate),
        ("VOICE_SERVER_UPDATE", VoiceServerUpdate),
        ("WEBHOOKS_UPDATE", WebhooksUpdate),
        ("INTERACTION_CREATE", InteractionCreate),
        ("APPLICATION_COMMAND_CREATE", ApplicationCommandCreate),
        ("APPLICATION_COMMAND_UPDATE", ApplicationCommandUpdate),
        ("APPLICATION_COMMAND_DELETE", ApplicationCommandDelete),
        ("STAGE_INSTANCE_CREATE", StageInstanceCreate),
        ("STAGE_INSTANCE_DELETE", StageInstanceDelete),
        ("GUILD_JOIN_REQUEST_DELETE", GuildJoinRequestDelete),
    ])
});

/// One dispatched event.
///
/// The header carries the originating shard and, for wire events, the raw
/// dispatch JSON; the payload is the tagged record.
#[derive(Clone, Debug)]
pub struct Event {
    /// Index of the shard the event arrived on.
    pub shard: u32,
    /// Raw dispatch text, absent for voice-synthesised events.
    pub raw: Option<Arc<str>>,
    /// Typed payload.
    pub data: EventData,
}

impl Event {
    /// The taxonomy slot this event dispatches through.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }
}

/// Typed payloads, one variant per [`EventKind`].
///
/// Entities resolved through the cache are shared (`Arc`); entities the
/// wire payload carries whole are embedded by value.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum EventData {
    /// See [`EventKind::Ready`].
    Ready {
        /// Session identifier used for resumes.
        session_id: String,
        /// The bot's own user.
        user: User,
    },
    /// See [`EventKind::Resumed`].
    Resumed,
    /// See [`EventKind::GuildCreate`].
    GuildCreate {
        /// The created guild.
        guild: Arc<Guild>,
    },
    /// See [`EventKind::GuildUpdate`].
    GuildUpdate {
        /// The updated guild.
        guild: Arc<Guild>,
    },
    /// See [`EventKind::GuildDelete`].
    GuildDelete {
        /// Snowflake of the removed guild.
        guild_id: GuildId,
        /// True when the guild is merely unavailable.
        unavailable: bool,
    },
    /// See [`EventKind::GuildRoleCreate`].
    GuildRoleCreate {
        /// Owning guild.
        guild: Arc<Guild>,
        /// The created role.
        role: Arc<Role>,
    },
    /// See [`EventKind::GuildRoleUpdate`].
    GuildRoleUpdate {
        /// Owning guild.
        guild: Arc<Guild>,
        /// The updated role.
        role: Arc<Role>,
    },
    /// See [`EventKind::GuildRoleDelete`].
    GuildRoleDelete {
        /// Owning guild.
        guild: Arc<Guild>,
        /// Snowflake of the removed role.
        role_id: RoleId,
    },
    /// See [`EventKind::GuildEmojisUpdate`].
    GuildEmojisUpdate {
        /// Owning guild.
        guild: Arc<Guild>,
        /// The complete new emoji set.
        emojis: Vec<Emoji>,
    },
    /// See [`EventKind::GuildIntegrationsUpdate`].
    GuildIntegrationsUpdate {
        /// Owning guild.
        guild: Arc<Guild>,
    },
    /// See [`EventKind::IntegrationCreate`].
    IntegrationCreate {
        /// The created integration.
        integration: Integration,
    },
    /// See [`EventKind::IntegrationUpdate`].
    IntegrationUpdate {
        /// The updated integration.
        integration: Integration,
    },
    /// See [`EventKind::IntegrationDelete`].
    IntegrationDelete {
        /// Snowflake of the removed integration.
        integration_id: IntegrationId,
        /// Owning guild.
        guild_id: GuildId,
    },
    /// See [`EventKind::ChannelCreate`].
    ChannelCreate {
        /// The created channel.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::ChannelUpdate`].
    ChannelUpdate {
        /// The updated channel.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::ChannelDelete`].
    ChannelDelete {
        /// The removed channel.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::ChannelPinsUpdate`].
    ChannelPinsUpdate {
        /// Channel whose pins changed.
        channel: Arc<Channel>,
        /// Timestamp of the most recent pin, if any remain.
        last_pin_timestamp: Option<String>,
    },
    /// See [`EventKind::GuildMemberAdd`].
    GuildMemberAdd {
        /// Guild joined.
        guild: Arc<Guild>,
        /// The new membership.
        member: Member,
    },
    /// See [`EventKind::GuildMemberUpdate`].
    GuildMemberUpdate {
        /// Owning guild.
        guild: Arc<Guild>,
        /// The changed membership.
        member: Member,
    },
    /// See [`EventKind::GuildMemberRemove`].
    GuildMemberRemove {
        /// Guild left.
        guild: Arc<Guild>,
        /// The departed user.
        user: User,
    },
    /// See [`EventKind::GuildMembersChunk`].
    GuildMembersChunk {
        /// Owning guild.
        guild: Arc<Guild>,
        /// Members in this chunk.
        members: Vec<Member>,
        /// Zero-based chunk index.
        chunk_index: u32,
        /// Total chunks replying to the request.
        chunk_count: u32,
        /// Request nonce, echoed back.
        nonce: Option<String>,
    },
    /// See [`EventKind::GuildBanAdd`].
    GuildBanAdd {
        /// Guild the ban applies to.
        guild_id: GuildId,
        /// The banned user.
        user: User,
    },
    /// See [`EventKind::GuildBanRemove`].
    GuildBanRemove {
        /// Guild the ban was lifted in.
        guild_id: GuildId,
        /// The unbanned user.
        user: User,
    },
    /// See [`EventKind::MessageCreate`].
    MessageCreate {
        /// The sent message.
        message: Message,
        /// Channel the message arrived in.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::MessageUpdate`].
    MessageUpdate {
        /// The edited message, possibly partial.
        message: Message,
        /// Channel the message lives in.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::MessageDelete`].
    MessageDelete {
        /// Snowflake of the removed message.
        message_id: MessageId,
        /// Channel the message lived in.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::MessageDeleteBulk`].
    MessageDeleteBulk {
        /// Snowflakes of the removed messages.
        ids: Vec<MessageId>,
        /// Channel the messages lived in.
        channel: Arc<Channel>,
    },
    /// See [`EventKind::MessageReactionAdd`].
    MessageReactionAdd {
        /// Reacting user.
        user_id: UserId,
        /// Channel holding the message.
        channel: Arc<Channel>,
        /// Message reacted to.
        message_id: MessageId,
        /// Reacting member, in guilds.
        member: Option<Member>,
        /// The emoji used.
        emoji: ReactionEmoji,
    },
    /// See [`EventKind::MessageReactionRemove`].
    MessageReactionRemove {
        /// Un-reacting user.
        user_id: UserId,
        /// Channel holding the message.
        channel: Arc<Channel>,
        /// Message affected.
        message_id: MessageId,
        /// The emoji removed.
        emoji: ReactionEmoji,
    },
    /// See [`EventKind::MessageReactionRemoveEmoji`].
    MessageReactionRemoveEmoji {
        /// Channel holding the message.
        channel: Arc<Channel>,
        /// Message affected.
        message_id: MessageId,
        /// The emoji cleared.
        emoji: ReactionEmoji,
    },
    /// See [`EventKind::MessageReactionRemoveAll`].
    MessageReactionRemoveAll {
        /// Channel holding the message.
        channel: Arc<Channel>,
        /// Message affected.
        message_id: MessageId,
    },
    /// See [`EventKind::TypingStart`].
    TypingStart {
        /// Channel being typed in.
        channel: Arc<Channel>,
        /// Typing user.
        user_id: UserId,
        /// Unix timestamp of the typing burst.
        timestamp: u64,
    },
    /// See [`EventKind::PresenceUpdate`].
    PresenceUpdate {
        /// The new presence.
        presence: Presence,
    },
    /// See [`EventKind::UserUpdate`].
    UserUpdate {
        /// The refreshed user.
        user: Arc<User>,
    },
    /// See [`EventKind::InviteCreate`].
    InviteCreate {
        /// The created invite.
        invite: Invite,
    },
    /// See [`EventKind::InviteDelete`].
    InviteDelete {
        /// Channel the invite pointed at.
        channel_id: ChannelId,
        /// Guild the invite pointed into, when known.
        guild_id: Option<GuildId>,
        /// The revoked code.
        code: String,
    },
    /// See [`EventKind::VoiceStateUpdate`].
    VoiceStateUpdate {
        /// The new voice state.
        state: VoiceState,
    },
    /// See [`EventKind::VoiceServerUpdate`].
    VoiceServerUpdate {
        /// Guild whose voice server moved.
        guild_id: GuildId,
        /// New voice endpoint host, absent during migration.
        endpoint: Option<String>,
        /// Voice connection token.
        token: String,
    },
    /// See [`EventKind::WebhooksUpdate`].
    WebhooksUpdate {
        /// Owning guild.
        guild_id: GuildId,
        /// Channel whose webhooks changed.
        channel_id: ChannelId,
    },
    /// See [`EventKind::InteractionCreate`].
    InteractionCreate {
        /// The received interaction.
        interaction: Interaction,
    },
    /// See [`EventKind::ButtonClick`].
    ButtonClick {
        /// The received button interaction.
        interaction: Interaction,
    },
    /// See [`EventKind::ApplicationCommandCreate`].
    ApplicationCommandCreate {
        /// The registered command.
        command: Command,
    },
    /// See [`EventKind::ApplicationCommandUpdate`].
    ApplicationCommandUpdate {
        /// The changed command.
        command: Command,
    },
    /// See [`EventKind::ApplicationCommandDelete`].
    ApplicationCommandDelete {
        /// The removed command.
        command: Command,
    },
    /// See [`EventKind::StageInstanceCreate`].
    StageInstanceCreate {
        /// The started stage instance.
        stage: StageInstance,
    },
    /// See [`EventKind::StageInstanceDelete`].
    StageInstanceDelete {
        /// The ended stage instance.
        stage: StageInstance,
    },
    /// See [`EventKind::GuildJoinRequestDelete`].
    GuildJoinRequestDelete {
        /// Guild the request targeted.
        guild_id: GuildId,
        /// Withdrawing user.
        user_id: UserId,
    },
    /// See [`EventKind::VoiceReady`].
    VoiceReady {
        /// Guild of the voice connection.
        guild_id: GuildId,
        /// Our assigned RTP source.
        ssrc: u32,
    },
    /// See [`EventKind::VoiceReceive`].
    VoiceReceive {
        /// Guild of the voice connection.
        guild_id: GuildId,
        /// RTP source of the sender.
        ssrc: u32,
        /// Sending user; zero when the ssrc is not yet mapped.
        user_id: UserId,
        /// Raw Opus payload.
        opus: Bytes,
        /// Decoded stereo PCM, when decoding is enabled.
        pcm: Option<Vec<i16>>,
    },
    /// See [`EventKind::VoiceBufferSend`].
    VoiceBufferSend {
        /// Guild of the voice connection.
        guild_id: GuildId,
        /// Frames still queued.
        remaining: usize,
    },
    /// See [`EventKind::VoiceTrackMarker`].
    VoiceTrackMarker {
        /// Guild of the voice connection.
        guild_id: GuildId,
        /// The marker metadata string.
        marker: String,
    },
    /// See [`EventKind::VoiceUserTalking`].
    VoiceUserTalking {
        /// Guild of the voice connection.
        guild_id: GuildId,
        /// Speaking user.
        user_id: UserId,
        /// RTP source announced for the user.
        ssrc: u32,
        /// Raw speaking flag bits.
        speaking: u8,
    },
}

impl EventData {
    /// The taxonomy slot for this payload.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready { .. } => EventKind::Ready,
            Self::Resumed => EventKind::Resumed,
            Self::GuildCreate { .. } => EventKind::GuildCreate,
            Self::GuildUpdate { .. } => EventKind::GuildUpdate,
            Self::GuildDelete { .. } => EventKind::GuildDelete,
            Self::GuildRoleCreate { .. } => EventKind::GuildRoleCreate,
            Self::GuildRoleUpdate { .. } => EventKind::GuildRoleUpdate,
            Self::GuildRoleDelete { .. } => EventKind::GuildRoleDelete,
            Self::GuildEmojisUpdate { .. } => EventKind::GuildEmojisUpdate,
            Self::GuildIntegrationsUpdate { .. } => EventKind::GuildIntegrationsUpdate,
            Self::IntegrationCreate { .. } => EventKind::IntegrationCreate,
            Self::IntegrationUpdate { .. } => EventKind::IntegrationUpdate,
            Self::IntegrationDelete { .. } => EventKind::IntegrationDelete,
            Self::ChannelCreate { .. } => EventKind::ChannelCreate,
            Self::ChannelUpdate { .. } => EventKind::ChannelUpdate,
            Self::ChannelDelete { .. } => EventKind::ChannelDelete,
            Self::ChannelPinsUpdate { .. } => EventKind::ChannelPinsUpdate,
            Self::GuildMemberAdd { .. } => EventKind::GuildMemberAdd,
            Self::GuildMemberUpdate { .. } => EventKind::GuildMemberUpdate,
            Self::GuildMemberRemove { .. } => EventKind::GuildMemberRemove,
            Self::GuildMembersChunk { .. } => EventKind::GuildMembersChunk,
            Self::GuildBanAdd { .. } => EventKind::GuildBanAdd,
            Self::GuildBanRemove { .. } => EventKind::GuildBanRemove,
            Self::MessageCreate { .. } => EventKind::MessageCreate,
            Self::MessageUpdate { .. } => EventKind::MessageUpdate,
            Self::MessageDelete { .. } => EventKind::MessageDelete,
            Self::MessageDeleteBulk { .. } => EventKind::MessageDeleteBulk,
            Self::MessageReactionAdd { .. } => EventKind::MessageReactionAdd,
            Self::MessageReactionRemove { .. } => EventKind::MessageReactionRemove,
            Self::MessageReactionRemoveEmoji { .. } => EventKind::MessageReactionRemoveEmoji,
            Self::MessageReactionRemoveAll { .. } => EventKind::MessageReactionRemoveAll,
            Self::TypingStart { .. } => EventKind::TypingStart,
            Self::PresenceUpdate { .. } => EventKind::PresenceUpdate,
            Self::UserUpdate { .. } => EventKind::UserUpdate,
            Self::InviteCreate { .. } => EventKind::InviteCreate,
            Self::InviteDelete { .. } => EventKind::InviteDelete,
            Self::VoiceStateUpdate { .. } => EventKind::VoiceStateUpdate,
            Self::VoiceServerUpdate { .. } => EventKind::VoiceServerUpdate,
            Self::WebhooksUpdate { .. } => EventKind::WebhooksUpdate,
            Self::InteractionCreate { .. } => EventKind::InteractionCreate,
            Self::ButtonClick { .. } => EventKind::ButtonClick,
            Self::ApplicationCommandCreate { .. } => EventKind::ApplicationCommandCreate,
            Self::ApplicationCommandUpdate { .. } => EventKind::ApplicationCommandUpdate,
            Self::ApplicationCommandDelete { .. } => EventKind::ApplicationCommandDelete,
            Self::StageInstanceCreate { .. } => EventKind::StageInstanceCreate,
            Self::StageInstanceDelete { .. } => EventKind::StageInstanceDelete,
            Self::GuildJoinRequestDelete { .. } => EventKind::GuildJoinRequestDelete,
            Self::VoiceReady { .. } => EventKind::VoiceReady,
            Self::VoiceReceive { .. } => EventKind::VoiceReceive,
            Self::VoiceBufferSend { .. } => EventKind::VoiceBufferSend,
            Self::VoiceTrackMarker { .. } => EventKind::VoiceTrackMarker,
            Self::VoiceUserTalking { .. } => EventKind::VoiceUserTalking,
        }
    }
}

/// A registered event handler.
///
/// Handlers run on the dispatching task and must not block; offload REST
/// calls or other slow work to a spawned task.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// One handler slot per event kind.
pub(crate) struct Handlers {
    slots: RwLock<Vec<Option<Handler>>>,
}

impl Handlers {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(vec![None; EventKind::COUNT]),
        }
    }

    /// Installs `handler` in the slot for `kind`, replacing any earlier one.
    pub(crate) fn set(&self, kind: EventKind, handler: Handler) {
        self.slots.write()[kind as usize] = Some(handler);
    }

    /// Invokes the slot for the event's kind, if one is installed.
    pub(crate) fn dispatch(&self, event: &Event) {
        let slot = self.slots.read()[event.kind() as usize].clone();
        if let Some(handler) = slot {
            handler(event);
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let installed = self
            .slots
            .read()
            .iter()
            .filter(|s| s.is_some())
            .count();
        f.debug_struct("Handlers")
            .field("installed", &installed)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn wire_table_covers_every_gateway_kind_once() {
        // Synthetic voice kinds and the button projection have no wire name.
        assert_eq!(EVENT_TABLE.len(), EventKind::COUNT - 6);
        assert_eq!(EVENT_TABLE["MESSAGE_CREATE"], EventKind::MessageCreate);
        assert_eq!(EVENT_TABLE["READY"], EventKind::Ready);
        assert!(!EVENT_TABLE.contains_key("BUTTON_CLICK"));
    }

    #[test]
    fn handlers_fire_only_their_slot() {
        let handlers = Handlers::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&hits);
        handlers.set(
            EventKind::Resumed,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let resumed = Event {
            shard: 0,
            raw: None,
            data: EventData::Resumed,
        };
        let other = Event {
            shard: 0,
            raw: None,
            data: EventData::VoiceBufferSend {
                guild_id: crate::id::GuildId(1),
                remaining: 0,
            },
        };

        handlers.dispatch(&resumed);
        handlers.dispatch(&other);
        handlers.dispatch(&resumed);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}

//! Entity types referenced by gateway events and the cache interface.
//!
//! These are deliberately lean: the runtime only models the fields it
//! needs to decode events and resolve references. The REST surface owns
//! richer views of the same objects.

mod channel;
mod command;
mod guild;
mod interaction;
mod message;
mod user;
mod voice;

pub use self::{
    channel::{Channel, Invite, StageInstance},
    command::{Command, CommandOption, CommandOptionChoice, CommandOptionType},
    guild::{Emoji, Guild, Integration, Role},
    interaction::{
        ButtonInteraction,
        CommandDataOption,
        CommandInteraction,
        Interaction,
        InteractionData,
        InteractionResponse,
        InteractionResponseType,
        InteractionType,
        ResponseError,
    },
    message::{Message, ReactionEmoji},
    user::{Activity, Member, Presence, User},
    voice::VoiceState,
};

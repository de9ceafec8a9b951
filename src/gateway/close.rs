//! Close-code classification driving the reconnect decision.

/// Gateway close codes with special meaning to the session machine.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u16)]
pub enum CloseCode {
    /// Unknown error; try resuming.
    UnknownError = 4000,
    /// Invalid opcode sent.
    UnknownOpcode = 4001,
    /// Invalid payload encoding.
    DecodeError = 4002,
    /// Sent a payload before identifying.
    NotAuthenticated = 4003,
    /// Invalid token.
    AuthenticationFailed = 4004,
    /// Sent IDENTIFY twice.
    AlreadyAuthenticated = 4005,
    /// Invalid sequence number on RESUME.
    InvalidSequence = 4007,
    /// Too many payloads too fast.
    RateLimited = 4008,
    /// Session held no traffic for too long.
    SessionTimeout = 4009,
    /// Invalid shard index or count.
    InvalidShard = 4010,
    /// The bot is large enough that sharding is mandatory.
    ShardingRequired = 4011,
    /// Invalid gateway API version.
    InvalidApiVersion = 4012,
    /// Invalid intent bitmask.
    InvalidIntents = 4013,
    /// Intent not enabled for this application.
    DisallowedIntents = 4014,
}

impl CloseCode {
    /// Maps a raw wire value onto a known close code.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            4000 => Self::UnknownError,
            4001 => Self::UnknownOpcode,
            4002 => Self::DecodeError,
            4003 => Self::NotAuthenticated,
            4004 => Self::AuthenticationFailed,
            4005 => Self::AlreadyAuthenticated,
            4007 => Self::InvalidSequence,
            4009 => Self::SessionTimeout,
            4008 => Self::RateLimited,
            4010 => Self::InvalidShard,
            4011 => Self::ShardingRequired,
            4012 => Self::InvalidApiVersion,
            4013 => Self::InvalidIntents,
            4014 => Self::DisallowedIntents,
            _ => return None,
        })
    }
}

/// What the session machine should do after a close.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconnectPolicy {
    /// Configuration or credential problem: surface the close and stop.
    Fatal,
    /// Reconnect and RESUME with the held session.
    Resume,
    /// Discard the session and IDENTIFY afresh.
    Reidentify,
}

/// Classifies a close code into the action the shard takes.
///
/// `has_session` reports whether a resumable `session_id` is held;
/// without one, every recoverable close degrades to a re-identify.
#[must_use]
pub fn classify(code: u16, has_session: bool) -> ReconnectPolicy {
    use CloseCode::*;

    let resume_or_identify = if has_session {
        ReconnectPolicy::Resume
    } else {
        ReconnectPolicy::Reidentify
    };

    match CloseCode::from_u16(code) {
        Some(
            AuthenticationFailed | InvalidShard | ShardingRequired | InvalidApiVersion
            | InvalidIntents | DisallowedIntents,
        ) => ReconnectPolicy::Fatal,
        Some(InvalidSequence | SessionTimeout) => ReconnectPolicy::Reidentify,
        Some(
            UnknownError | UnknownOpcode | DecodeError | NotAuthenticated | AlreadyAuthenticated
            | RateLimited,
        ) => resume_or_identify,
        // 1001/1006 and anything unlisted: resume when a session is held.
        None => resume_or_identify,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn policy_table_is_exact() {
        // Fatal regardless of session state.
        for code in [4004, 4010, 4011, 4012, 4013, 4014] {
            assert_eq!(classify(code, true), ReconnectPolicy::Fatal, "{code}");
            assert_eq!(classify(code, false), ReconnectPolicy::Fatal, "{code}");
        }

        // Session discarded.
        for code in [4007, 4009] {
            assert_eq!(classify(code, true), ReconnectPolicy::Reidentify, "{code}");
            assert_eq!(classify(code, false), ReconnectPolicy::Reidentify, "{code}");
        }

        // Resumable when a session is held, otherwise identify.
        for code in [1001, 1006, 4000, 4001, 4002, 4003, 4005, 4008, 1000, 4999] {
            assert_eq!(classify(code, true), ReconnectPolicy::Resume, "{code}");
            assert_eq!(classify(code, false), ReconnectPolicy::Reidentify, "{code}");
        }
    }
}

//! Common test data and constants

/// Common owner (guild) identifiers
pub mod owners {
    pub const GUILD_1: &str = "guild-100";
    pub const GUILD_2: &str = "guild-200";
}

/// Common target (channel) identifiers
pub mod targets {
    pub const CHANNEL_1: &str = "channel-1";
    pub const CHANNEL_2: &str = "channel-2";
    pub const CHANNEL_3: &str = "channel-3";
}

/// Common window boundaries
pub mod times {
    pub const MORNING: &str = "09:00";
    pub const EVENING: &str = "17:00";
    pub const LATE: &str = "22:30";
}

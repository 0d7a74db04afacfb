use std::{
    fmt::{Display, Formatter, Result},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Delivery channel of a notification. Doubles as the topic routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Sms,
    Push,
}

impl ChannelType {
    pub const ALL: [ChannelType; 3] = [ChannelType::Email, ChannelType::Sms, ChannelType::Push];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Push => "push",
        }
    }

    pub fn routing_key(&self) -> &'static str {
        self.as_str()
    }

    pub fn queue_name(&self) -> String {
        format!("queue_{}", self.as_str())
    }
}

impl Display for ChannelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(ChannelType::Email),
            "sms" => Ok(ChannelType::Sms),
            "push" => Ok(ChannelType::Push),
            other => Err(anyhow::anyhow!("Unsupported channel type '{}'", other)),
        }
    }
}

use std::{collections::HashMap, sync::Arc};

use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::models::{channel::ChannelType, message::NotificationMessage};

/// Delivers one notification over a single channel.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), Error>;
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ChannelType, Arc<dyn ChannelHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, channel: ChannelType, handler: Arc<dyn ChannelHandler>) -> Self {
        self.handlers.insert(channel, handler);
        self
    }

    /// Resolves a payload `type`. Unknown or unregistered types yield `None`.
    pub fn resolve(&self, notification_type: &str) -> Option<(ChannelType, Arc<dyn ChannelHandler>)> {
        let channel: ChannelType = notification_type.parse().ok()?;

        self.handlers
            .get(&channel)
            .map(|handler| (channel, Arc::clone(handler)))
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelType> {
        self.handlers.keys()
    }
}

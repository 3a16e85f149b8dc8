//! In-memory transport recording everything the controllers send.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::transport::{
    ChannelId, GuildId, MessageHandle, NoticeTarget, Outgoing, Panel, Player, Transport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message(ChannelId, Outgoing),
    Panel(ChannelId, Panel),
    Edit(MessageHandle, Panel),
    Ephemeral(NoticeTarget, String),
    Created(ChannelId, Vec<Player>),
    Deleted(ChannelId),
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    counter: AtomicUsize,
    fail_channel_creation: AtomicBool,
    failing_panel_prefix: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later channel creation fail.
    pub fn fail_channel_creation(&self) {
        self.fail_channel_creation.store(true, Ordering::SeqCst);
    }

    /// Makes every later panel sent to a channel whose id starts with
    /// `prefix` fail.
    pub fn fail_panels_in(&self, prefix: &str) {
        *self.failing_panel_prefix.lock().unwrap() = Some(prefix.to_owned());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Bodies of the text messages sent to `channel`.
    pub fn messages(&self, channel: &ChannelId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Message(c, message) if &c == channel => Some(message.body),
                _ => None,
            })
            .collect()
    }

    pub fn ephemerals(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Ephemeral(_, body) => Some(body),
                _ => None,
            })
            .collect()
    }

    /// Latest version of every panel, in the order they were first sent.
    pub fn panels(&self) -> Vec<Panel> {
        let mut panels: Vec<(String, Panel)> = Vec::new();
        for sent in self.sent() {
            match sent {
                Sent::Panel(_, panel) => {
                    let id = format!("$panel{}", panels.len());
                    panels.push((id, panel));
                }
                Sent::Edit(handle, panel) => {
                    if let Some(entry) = panels.iter_mut().find(|(id, _)| *id == handle.event_id)
                    {
                        entry.1 = panel;
                    }
                }
                _ => {}
            }
        }
        panels.into_iter().map(|(_, panel)| panel).collect()
    }

    pub fn edits(&self) -> usize {
        self.sent()
            .iter()
            .filter(|sent| matches!(sent, Sent::Edit(_, _)))
            .count()
    }

    pub fn deleted(&self) -> Vec<ChannelId> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Deleted(channel) => Some(channel),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }

    fn next_event(&self) -> String {
        format!("$event{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: Outgoing,
    ) -> anyhow::Result<MessageHandle> {
        self.record(Sent::Message(channel.clone(), message));
        Ok(MessageHandle {
            channel: channel.clone(),
            event_id: self.next_event(),
        })
    }

    async fn send_panel(&self, channel: &ChannelId, panel: Panel) -> anyhow::Result<MessageHandle> {
        if let Some(prefix) = self.failing_panel_prefix.lock().unwrap().as_deref() {
            if channel.as_str().starts_with(prefix) {
                anyhow::bail!("rate limited");
            }
        }
        let panel_count = self
            .sent()
            .iter()
            .filter(|sent| matches!(sent, Sent::Panel(_, _)))
            .count();
        self.record(Sent::Panel(channel.clone(), panel));
        Ok(MessageHandle {
            channel: channel.clone(),
            event_id: format!("$panel{}", panel_count),
        })
    }

    async fn edit_panel(&self, handle: &MessageHandle, panel: Panel) -> anyhow::Result<()> {
        self.record(Sent::Edit(handle.clone(), panel));
        Ok(())
    }

    async fn send_ephemeral(&self, target: &NoticeTarget, body: &str) -> anyhow::Result<()> {
        self.record(Sent::Ephemeral(target.clone(), body.to_string()));
        Ok(())
    }

    async fn create_restricted_channel(
        &self,
        _guild: &GuildId,
        _name: &str,
        allowed: &[Player],
    ) -> anyhow::Result<ChannelId> {
        if self.fail_channel_creation.load(Ordering::SeqCst) {
            anyhow::bail!("channel creation refused");
        }
        let channel = ChannelId(format!("!game{}", self.counter.fetch_add(1, Ordering::SeqCst)));
        self.record(Sent::Created(channel.clone(), allowed.to_vec()));
        Ok(channel)
    }

    async fn delete_channel(&self, channel: &ChannelId, _members: &[Player]) -> anyhow::Result<()> {
        self.record(Sent::Deleted(channel.clone()));
        Ok(())
    }
}

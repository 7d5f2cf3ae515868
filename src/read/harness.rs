//! Test fixture owning everything a [`ReadContext`] borrows.

use super::{
    EditSettings, LineEditSession, LineReadRequest, PendingInput, ReadContext, ReadEncoding, Step,
};
use crate::alias::AliasStore;
use crate::echo::MemoryEcho;
use crate::history::{ClientId, HistoryId, HistoryPool, HistoryRing};
use crate::input::{ControlKeyState, KeyEvent, KeyQueue, VirtualKey};

pub(crate) const APP: &str = "cmd.exe";

pub(crate) struct Harness {
    pub keys: KeyQueue,
    pub carry: Vec<u8>,
    pub echo: MemoryEcho,
    pub histories: HistoryPool,
    pub aliases: AliasStore,
    pub pending: PendingInput,
    pub settings: EditSettings,
    pub history: Option<HistoryId>,
}

impl Harness {
    pub fn new() -> Self {
        let mut histories = HistoryPool::new(4, 50);
        let history = histories.allocate(APP, ClientId(1));
        Self {
            keys: KeyQueue::default(),
            carry: Vec::new(),
            echo: MemoryEcho::new(80),
            histories,
            aliases: AliasStore::new(),
            pending: PendingInput::default(),
            settings: EditSettings::default(),
            history,
        }
    }

    pub fn with_history(entries: &[&str]) -> Self {
        let mut harness = Self::new();
        for entry in entries {
            harness.ring_mut().add(entry, false).unwrap();
        }
        harness
    }

    pub fn ring(&self) -> &HistoryRing {
        self.histories.get(self.history.unwrap()).unwrap()
    }

    pub fn ring_mut(&mut self) -> &mut HistoryRing {
        self.histories.get_mut(self.history.unwrap()).unwrap()
    }

    pub fn cx(&mut self) -> ReadContext<'_> {
        ReadContext {
            keys: &mut self.keys,
            carry: &mut self.carry,
            echo: &mut self.echo,
            histories: &mut self.histories,
            aliases: &mut self.aliases,
            pending: &mut self.pending,
            settings: &self.settings,
        }
    }

    pub fn type_text(&mut self, text: &str) {
        for ch in text.chars() {
            self.keys.push(KeyEvent::from_char(ch));
        }
    }

    pub fn key(&mut self, vk: VirtualKey) {
        self.keys.push(KeyEvent::from_key(vk));
    }

    pub fn key_with(&mut self, vk: VirtualKey, modifiers: ControlKeyState) {
        self.keys.push(KeyEvent::from_key(vk).with_modifiers(modifiers));
    }

    pub fn request(&self, capacity: usize) -> LineReadRequest {
        LineReadRequest::new(capacity, ReadEncoding::Wide)
    }

    pub fn session_for(&self, request: &LineReadRequest) -> LineEditSession {
        LineEditSession::new(request, APP, self.history, &self.settings, &self.echo).unwrap()
    }

    pub fn session(&self) -> LineEditSession {
        self.session_for(&self.request(256))
    }

    pub fn run(&mut self, session: &mut LineEditSession) -> Step {
        let mut cx = self.cx();
        session.run(&mut cx)
    }
}

/// Text of a successful wide read
pub(crate) fn wide(step: Step) -> String {
    match step {
        Step::Done(Ok(output)) => output.data.as_wide().unwrap().to_string(),
        other => panic!("read did not complete: {other:?}"),
    }
}

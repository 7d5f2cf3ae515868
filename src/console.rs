//! Console session: the context object behind every public operation.
//!
//! ```text
//! ConsoleSession (one mutex)
//! ├── AliasStore        per-application alias tables
//! ├── HistoryPool       history rings shared by clients
//! ├── InputBuffer       queued keys and narrow carry bytes
//! ├── EchoSink          display of the edit line
//! ├── clients           app name and history ring per client
//! ├── input handles     pending input per handle
//! └── parked reads      sessions waiting for input
//! ```
//!
//! Writers of input get back every read their input completed. The caller
//! delivers those completions to whoever issued the reads.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bitflags::bitflags;
use tracing::{debug, info};

use crate::alias::{AliasEntry, AliasStore};
use crate::config::Config;
use crate::echo::EchoSink;
use crate::error::{ConsoleError, Result};
use crate::history::{ClientId, HistoryId, HistoryPool};
use crate::input::{CodePage, InputBuffer, KeyEvent};
use crate::read::{
    prepend_bytes, take_carry, CharReadRequest, CharacterReadSession,
    EditSettings, LineEditSession, LineReadRequest, PendingInput, ReadContext, ReadData,
    ReadEncoding, ReadHandle, ReadOutput, Step, WaitReason,
};
use crate::text::eq_ignore_case;

bitflags! {
    /// Console input mode of a read
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InputMode: u32 {
        /// Backspace edits and Enter appends LF
        const PROCESSED = 0x0001;
        /// Cooked line reads instead of raw character reads
        const LINE      = 0x0002;
        const ECHO      = 0x0004;
    }
}

/// Identifies an open input handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputHandleId(u32);

/// Result of starting a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    Complete(ReadOutput),
    /// Waiting for input; completes through a write, a signal or `resume`
    Parked(ReadHandle),
}

/// Result of resuming a parked read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeStatus {
    Complete(ReadOutput),
    StillWaiting,
}

/// A parked read that finished while handling another operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRead {
    pub handle: ReadHandle,
    pub result: Result<ReadOutput>,
}

#[derive(Debug)]
struct Client {
    id: ClientId,
    app_name: String,
    history: Option<HistoryId>,
}

#[derive(Debug)]
struct InputHandle {
    id: InputHandleId,
    owner: ClientId,
    pending: PendingInput,
}

#[derive(Debug)]
enum ReadSession {
    Line(LineEditSession),
    Char(CharacterReadSession),
}

impl ReadSession {
    fn drive(&mut self, reason: Option<WaitReason>, cx: &mut ReadContext<'_>) -> Step {
        match (self, reason) {
            (ReadSession::Line(session), None) => session.run(cx),
            (ReadSession::Line(session), Some(reason)) => session.notify(reason, cx),
            (ReadSession::Char(session), None) => session.run(cx),
            (ReadSession::Char(session), Some(reason)) => session.notify(reason, cx),
        }
    }

    fn park(&mut self) {
        if let ReadSession::Line(session) = self {
            session.park();
        }
    }
}

#[derive(Debug)]
struct ParkedRead {
    handle: ReadHandle,
    input: InputHandleId,
    client: ClientId,
    session: ReadSession,
}

struct ConsoleState {
    aliases: AliasStore,
    histories: HistoryPool,
    input: InputBuffer,
    echo: Box<dyn EchoSink + Send>,
    settings: EditSettings,
    clients: Vec<Client>,
    handles: Vec<InputHandle>,
    parked: Vec<ParkedRead>,
    next_client: u32,
    next_handle: u32,
    next_read: u64,
}

impl ConsoleState {
    fn client(&self, id: ClientId) -> Result<&Client> {
        self.clients
            .iter()
            .find(|c| c.id == id)
            .ok_or(ConsoleError::InvalidArgument("unknown client"))
    }

    fn check_handle(&self, id: InputHandleId) -> Result<()> {
        if self.handles.iter().any(|h| h.id == id) {
            Ok(())
        } else {
            Err(ConsoleError::InvalidArgument("unknown input handle"))
        }
    }

    /// Run a session against the console's input and display
    fn drive(
        &mut self,
        input: InputHandleId,
        session: &mut ReadSession,
        reason: Option<WaitReason>,
    ) -> Step {
        let ConsoleState {
            aliases,
            histories,
            input: buffer,
            echo,
            settings,
            handles,
            ..
        } = self;
        let (keys, carry) = buffer.parts();
        let mut detached = PendingInput::default();
        let pending = handles
            .iter_mut()
            .find(|h| h.id == input)
            .map_or(&mut detached, |h| &mut h.pending);

        let mut cx = ReadContext {
            keys,
            carry,
            echo: echo.as_mut(),
            histories,
            aliases,
            pending,
            settings,
        };
        session.drive(reason, &mut cx)
    }

    /// Hand out carried bytes and pending text left by an earlier read
    fn take_pending(
        &mut self,
        input: InputHandleId,
        encoding: ReadEncoding,
        capacity: usize,
    ) -> Result<Option<ReadOutput>> {
        let ConsoleState {
            input: buffer,
            handles,
            ..
        } = self;
        let (_, carry) = buffer.parts();
        let Some(handle) = handles.iter_mut().find(|h| h.id == input) else {
            return Ok(None);
        };

        let prefix = match encoding {
            ReadEncoding::Narrow(_) => take_carry(carry, capacity),
            ReadEncoding::Wide => Vec::new(),
        };
        let room = capacity - prefix.len();
        let data = if room > 0 {
            handle.pending.take(encoding, room, carry)?
        } else {
            None
        };

        Ok(match (data, prefix.is_empty()) {
            (Some(data), _) => Some(ReadOutput::new(prepend_bytes(prefix, data))),
            (None, false) => Some(ReadOutput::new(ReadData::Narrow(prefix))),
            (None, true) => None,
        })
    }

    fn start(&mut self, input: InputHandleId, client: ClientId, mut session: ReadSession) -> Result<ReadStatus> {
        match self.drive(input, &mut session, None) {
            Step::Done(result) => result.map(ReadStatus::Complete),
            Step::WouldBlock => {
                session.park();
                let handle = ReadHandle(self.next_read);
                self.next_read += 1;
                debug!(%handle, "read parked");
                self.parked.push(ParkedRead {
                    handle,
                    input,
                    client,
                    session,
                });
                Ok(ReadStatus::Parked(handle))
            }
        }
    }

    /// Notify every parked read `select` accepts; collect those that finish
    fn notify(
        &mut self,
        reason: WaitReason,
        select: impl Fn(&ParkedRead) -> bool,
    ) -> Vec<CompletedRead> {
        let parked = std::mem::take(&mut self.parked);
        let mut completed = Vec::new();
        for mut read in parked {
            if !select(&read) {
                self.parked.push(read);
                continue;
            }
            match self.drive(read.input, &mut read.session, Some(reason)) {
                Step::Done(result) => {
                    debug!(handle = %read.handle, ?reason, ok = result.is_ok(), "parked read finished");
                    completed.push(CompletedRead {
                        handle: read.handle,
                        result,
                    });
                }
                Step::WouldBlock => {
                    read.session.park();
                    self.parked.push(read);
                }
            }
        }
        completed
    }

    fn history_for(&self, app: &str) -> Option<HistoryId> {
        self.histories.find_by_app(app)
    }
}

/// Console line-input engine
pub struct ConsoleSession {
    state: Mutex<ConsoleState>,
}

impl ConsoleSession {
    pub fn new(config: &Config, echo: Box<dyn EchoSink + Send>) -> Self {
        let state = ConsoleState {
            aliases: AliasStore::new(),
            histories: HistoryPool::new(config.history.buffer_count, config.history_size()),
            input: InputBuffer::new(config.code_page()),
            echo,
            settings: config.edit_settings(),
            clients: Vec::new(),
            handles: Vec::new(),
            parked: Vec::new(),
            next_client: 1,
            next_handle: 1,
            next_read: 1,
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn code_page(&self) -> CodePage {
        self.lock().input.code_page()
    }

    pub fn set_code_page(&self, code_page: CodePage) {
        self.lock().input.set_code_page(code_page);
    }

    /// Keys waiting in the input buffer
    pub fn pending_keys(&self) -> usize {
        self.lock().input.len()
    }

    // ---- clients and handles ----

    /// Register a client and give it a history ring
    pub fn connect_client(&self, app_name: &str) -> ClientId {
        let mut state = self.lock();
        let id = ClientId(state.next_client);
        state.next_client += 1;
        let history = state.histories.allocate(app_name, id);
        info!(client = id.0, app = app_name, has_history = history.is_some(), "client connected");
        state.clients.push(Client {
            id,
            app_name: app_name.to_string(),
            history,
        });
        id
    }

    /// Drop a client: cancel its reads, close its handles and free its
    /// history. Aliases go with the last client of the application.
    pub fn disconnect_client(&self, client: ClientId) -> Vec<CompletedRead> {
        let mut state = self.lock();
        let mut completed = state.notify(WaitReason::ThreadDying, |r| r.client == client);
        let owned: Vec<InputHandleId> = state
            .handles
            .iter()
            .filter(|h| h.owner == client)
            .map(|h| h.id)
            .collect();
        for id in owned {
            completed.extend(state.notify(WaitReason::HandleClosing, |r| r.input == id));
        }
        state.handles.retain(|h| h.owner != client);

        let Some(idx) = state.clients.iter().position(|c| c.id == client) else {
            return completed;
        };
        let record = state.clients.remove(idx);
        state.histories.free(client);
        let last_of_app = !state
            .clients
            .iter()
            .any(|c| eq_ignore_case(&c.app_name, &record.app_name));
        if last_of_app {
            state.aliases.remove_application(&record.app_name);
        }
        info!(client = client.0, app = %record.app_name, last_of_app, "client disconnected");
        completed
    }

    /// Cancel the reads issued by an exiting client thread
    pub fn thread_exiting(&self, client: ClientId) -> Vec<CompletedRead> {
        self.lock()
            .notify(WaitReason::ThreadDying, |r| r.client == client)
    }

    pub fn open_input_handle(&self, client: ClientId) -> Result<InputHandleId> {
        let mut state = self.lock();
        state.client(client)?;
        let id = InputHandleId(state.next_handle);
        state.next_handle += 1;
        state.handles.push(InputHandle {
            id,
            owner: client,
            pending: PendingInput::default(),
        });
        Ok(id)
    }

    /// Close a handle; its parked reads are cancelled and its pending input
    /// is dropped
    pub fn close_input_handle(&self, handle: InputHandleId) -> Vec<CompletedRead> {
        let mut state = self.lock();
        let completed = state.notify(WaitReason::HandleClosing, |r| r.input == handle);
        state.handles.retain(|h| h.id != handle);
        completed
    }

    // ---- input ----

    /// Queue key events and wake parked reads
    pub fn write_input(&self, events: impl IntoIterator<Item = KeyEvent>) -> Vec<CompletedRead> {
        let mut state = self.lock();
        state.input.write(events);
        state.notify(WaitReason::NewData, |_| true)
    }

    /// Queue one key per character and wake parked reads
    pub fn write_text(&self, text: &str) -> Vec<CompletedRead> {
        let mut state = self.lock();
        state.input.write_text(text);
        state.notify(WaitReason::NewData, |_| true)
    }

    /// Queue narrow text in the console code page and wake parked reads
    pub fn write_narrow_input(&self, bytes: &[u8]) -> Vec<CompletedRead> {
        let mut state = self.lock();
        state.input.write_narrow(bytes);
        state.notify(WaitReason::NewData, |_| true)
    }

    /// Deliver Ctrl+C or Ctrl+Break to every parked read
    pub fn signal(&self, reason: WaitReason) -> Vec<CompletedRead> {
        self.lock().notify(reason, |_| true)
    }

    /// Drop queued input
    pub fn flush_input(&self) {
        self.lock().input.flush();
    }

    // ---- reads ----

    /// Start a read in `mode`: cooked when it includes LINE, raw otherwise
    pub fn begin_read(
        &self,
        client: ClientId,
        input: InputHandleId,
        mode: InputMode,
        capacity: usize,
        encoding: ReadEncoding,
    ) -> Result<ReadStatus> {
        if mode.contains(InputMode::LINE) {
            let request = LineReadRequest {
                echo: mode.contains(InputMode::ECHO),
                processed: mode.contains(InputMode::PROCESSED),
                ..LineReadRequest::new(capacity, encoding)
            };
            self.begin_line_read(client, input, &request)
        } else {
            self.begin_char_read(client, input, CharReadRequest::new(capacity, encoding))
        }
    }

    /// Start a cooked read. Input left by an earlier read on the same handle
    /// is returned first without touching the keyboard.
    pub fn begin_line_read(
        &self,
        client: ClientId,
        input: InputHandleId,
        request: &LineReadRequest,
    ) -> Result<ReadStatus> {
        let mut state = self.lock();
        state.check_handle(input)?;
        let (app_name, history) = {
            let record = state.client(client)?;
            (record.app_name.clone(), record.history)
        };

        if request.capacity == 0 {
            return Err(ConsoleError::BufferTooSmall { required: 1 });
        }
        if let Some(output) = state.take_pending(input, request.encoding, request.capacity)? {
            debug!(units = output.data.len(), "line read served from pending input");
            return Ok(ReadStatus::Complete(output));
        }

        let session = LineEditSession::new(
            request,
            &app_name,
            history,
            &state.settings,
            state.echo.as_ref(),
        )?;
        state.start(input, client, ReadSession::Line(session))
    }

    /// Start a raw read. Pending input on the handle comes first, as for
    /// line reads.
    pub fn begin_char_read(
        &self,
        client: ClientId,
        input: InputHandleId,
        request: CharReadRequest,
    ) -> Result<ReadStatus> {
        let mut state = self.lock();
        state.check_handle(input)?;
        state.client(client)?;

        if request.capacity == 0 {
            return Err(ConsoleError::BufferTooSmall { required: 1 });
        }
        if let Some(output) = state.take_pending(input, request.encoding, request.capacity)? {
            debug!(units = output.data.len(), "raw read served from pending input");
            return Ok(ReadStatus::Complete(output));
        }

        state.start(input, client, ReadSession::Char(CharacterReadSession::new(request)))
    }

    /// Re-drive a parked read
    pub fn resume(&self, handle: ReadHandle, reason: WaitReason) -> Result<ResumeStatus> {
        let mut state = self.lock();
        let idx = state
            .parked
            .iter()
            .position(|r| r.handle == handle)
            .ok_or(ConsoleError::UnknownRead(handle.0))?;
        let mut read = state.parked.remove(idx);

        match state.drive(read.input, &mut read.session, Some(reason)) {
            Step::Done(result) => {
                debug!(%handle, ?reason, "read resumed to completion");
                result.map(ResumeStatus::Complete)
            }
            Step::WouldBlock => {
                read.session.park();
                state.parked.insert(idx, read);
                Ok(ResumeStatus::StillWaiting)
            }
        }
    }

    /// Handles of reads waiting for input
    pub fn parked_reads(&self) -> Vec<ReadHandle> {
        self.lock().parked.iter().map(|r| r.handle).collect()
    }

    // ---- aliases ----

    pub fn define_alias(&self, app: &str, source: &str, target: &str) -> Result<()> {
        self.lock().aliases.define(app, source, target)
    }

    pub fn get_alias(&self, app: &str, source: &str) -> Option<String> {
        self.lock().aliases.lookup(app, source)
    }

    /// Alias target sized for a caller buffer of `capacity` units
    pub fn get_alias_text(
        &self,
        app: &str,
        source: &str,
        capacity: usize,
        encoding: ReadEncoding,
    ) -> Result<Option<String>> {
        match self.get_alias(app, source) {
            Some(target) => fit(target, capacity, encoding).map(Some),
            None => Ok(None),
        }
    }

    pub fn list_aliases(&self, app: &str) -> Vec<AliasEntry> {
        self.lock().aliases.list(app)
    }

    pub fn list_aliased_applications(&self) -> Vec<String> {
        self.lock().aliases.applications()
    }

    /// `source=target\0` for every alias of `app`
    pub fn get_aliases_text(&self, app: &str, capacity: usize, encoding: ReadEncoding) -> Result<String> {
        let text = self.lock().aliases.flatten(app);
        fit(text, capacity, encoding)
    }

    pub fn get_aliases_length(&self, app: &str, encoding: ReadEncoding) -> usize {
        encoding.units(&self.lock().aliases.flatten(app))
    }

    /// `app\0` for every application with aliases
    pub fn get_aliased_applications_text(&self, capacity: usize, encoding: ReadEncoding) -> Result<String> {
        let text = self.lock().aliases.flatten_applications();
        fit(text, capacity, encoding)
    }

    pub fn get_aliased_applications_length(&self, encoding: ReadEncoding) -> usize {
        encoding.units(&self.lock().aliases.flatten_applications())
    }

    // ---- history ----

    /// Forget the commands of `app`
    pub fn expunge_history_for(&self, app: &str) {
        let mut state = self.lock();
        if let Some(ring) = state
            .history_for(app)
            .and_then(|id| state.histories.get_mut(id))
        {
            ring.empty();
        }
    }

    /// Change the depth of the history of `app`
    pub fn set_history_depth_for(&self, app: &str, depth: usize) -> Result<()> {
        let mut state = self.lock();
        match state
            .history_for(app)
            .and_then(|id| state.histories.get_mut(id))
        {
            Some(ring) => ring.realloc(depth),
            None => Ok(()),
        }
    }

    /// Size of [`get_history_for`](Self::get_history_for) in caller units
    pub fn get_history_length_for(&self, app: &str, encoding: ReadEncoding) -> usize {
        encoding.units(&self.history_text(app))
    }

    /// `command\0` for every command of `app`, oldest first
    pub fn get_history_for(&self, app: &str, capacity: usize, encoding: ReadEncoding) -> Result<String> {
        fit(self.history_text(app), capacity, encoding)
    }

    /// Commands of `app`, oldest first
    pub fn history_commands_for(&self, app: &str) -> Vec<String> {
        let state = self.lock();
        state
            .history_for(app)
            .and_then(|id| state.histories.get(id))
            .map(|ring| ring.commands().to_vec())
            .unwrap_or_default()
    }

    fn history_text(&self, app: &str) -> String {
        let state = self.lock();
        state
            .history_for(app)
            .and_then(|id| state.histories.get(id))
            .map(|ring| ring.flatten())
            .unwrap_or_default()
    }

    /// Change the depth of every history ring
    pub fn resize_all_histories(&self, depth: usize) -> Result<()> {
        self.lock().histories.resize_all(depth)
    }
}

/// Reject text that does not fit a caller buffer
fn fit(text: String, capacity: usize, encoding: ReadEncoding) -> Result<String> {
    let required = encoding.units(&text);
    if required > capacity {
        return Err(ConsoleError::BufferTooSmall { required });
    }
    Ok(text)
}

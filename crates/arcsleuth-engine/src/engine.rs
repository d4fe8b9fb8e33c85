/// The coordination loop.
///
/// One thread owns the [`Registry`] and every piece of view state. Each
/// iteration blocks for the first inbound message, drains whatever else is
/// already queued, then evaluates the render gate once: a frame is sent only
/// when the UI has said `ready` *and* the current archive changed since the
/// last frame. Bursts of scanner events therefore cost one render decision,
/// not one per event.
///
/// Shutdown is two-phase. `stop` is forwarded to the scanner and the loop
/// enters [`Phase::Stopping`], where everything is discarded until the
/// scanner acknowledges with `stopped`. Only then is `stopped` sent to the
/// UI and the loop ends.
use crate::error::{error_chain, EngineError};
use crate::pipe::{Inbound, Outbox, Source};
use crate::render;
use crate::view::{FolderView, SortColumn};
use arcsleuth_core::model::NodeIndex;
use arcsleuth_core::protocol::Message;
use arcsleuth_core::registry::{Applied, Archive, Registry};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::io::{self, Write};
use tracing::{debug, error, info, trace, warn};

/// Rows of the screen not available to the folder listing.
const CHROME_ROWS: usize = 4;

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// `stop` was sent to the scanner; waiting for its `stopped`.
    Stopping,
    Terminated,
}

/// Counters for loop behaviour, mostly for tests and the exit log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Wake-ups of the loop.
    pub iterations: u64,
    /// Inbound messages consumed, in any phase.
    pub messages: u64,
    /// Render-gate evaluations.
    pub render_checks: u64,
    /// Frames actually sent.
    pub frames: u64,
}

pub struct Engine<S: Write, U: Write> {
    registry: Registry,
    /// Archive shown to the UI.
    current: Option<usize>,
    views: HashMap<(usize, NodeIndex), FolderView>,
    width: u16,
    height: u16,
    /// The UI has presented the last frame and can take another.
    ready: bool,
    phase: Phase,
    stats: LoopStats,
    stopped_sent: bool,
    scanner: Outbox<S>,
    ui: Outbox<U>,
}

impl<S: Write, U: Write> Engine<S, U> {
    /// `scanner` and `ui` are the engine's outbound streams.
    pub fn new(scanner: S, ui: U) -> Self {
        Self {
            registry: Registry::new(),
            current: None,
            views: HashMap::new(),
            width: 80,
            height: 24,
            ready: false,
            phase: Phase::Running,
            stats: LoopStats::default(),
            stopped_sent: false,
            scanner: Outbox::new(scanner),
            ui: Outbox::new(ui),
        }
    }

    /// Loop until terminated.
    ///
    /// The first fatal error is logged with its causes, a single `stopped`
    /// is sent to the UI and the error is returned.
    pub fn run(&mut self, rx: &Receiver<Inbound>) -> Result<(), EngineError> {
        info!("engine loop started");
        while self.phase != Phase::Terminated {
            if let Err(err) = self.step(rx) {
                error!(error = %error_chain(&err), "fatal engine error");
                self.phase = Phase::Terminated;
                if let Err(notify) = self.send_stopped() {
                    warn!(err = %notify, "could not notify UI");
                }
                return Err(err);
            }
        }
        info!(
            iterations = self.stats.iterations,
            messages = self.stats.messages,
            frames = self.stats.frames,
            "engine loop finished"
        );
        Ok(())
    }

    /// One loop iteration: block for a message, drain the backlog, evaluate
    /// the render gate once, flush both outbound streams.
    pub fn step(&mut self, rx: &Receiver<Inbound>) -> Result<(), EngineError> {
        let first = rx.recv().map_err(|_| EngineError::Disconnected)?;
        self.stats.iterations += 1;
        self.dispatch(first)?;

        let mut drained = 1usize;
        while self.phase != Phase::Terminated {
            match rx.try_recv() {
                Ok(inbound) => {
                    self.dispatch(inbound)?;
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        trace!(drained, "batch applied");

        if self.phase == Phase::Running {
            self.render_gate()?;
        }
        self.scanner.flush()?;
        self.ui.flush()?;
        Ok(())
    }

    fn dispatch(&mut self, inbound: Inbound) -> Result<(), EngineError> {
        self.stats.messages += 1;
        match self.phase {
            Phase::Running => self.handle(inbound),
            Phase::Stopping => self.drain(inbound),
            Phase::Terminated => Ok(()),
        }
    }

    fn handle(&mut self, inbound: Inbound) -> Result<(), EngineError> {
        match inbound {
            Inbound::Message(origin, msg) => self.handle_message(origin, msg),
            Inbound::Malformed(origin, error) => Err(EngineError::Malformed { origin, error }),
            Inbound::Closed(Source::Scanner) => Err(EngineError::StreamClosed(Source::Scanner)),
            Inbound::Closed(Source::Ui) => {
                info!("UI stream closed, stopping");
                self.begin_stop()
            }
        }
    }

    /// While stopping, only the scanner's acknowledgement matters.
    fn drain(&mut self, inbound: Inbound) -> Result<(), EngineError> {
        match inbound {
            Inbound::Message(Source::Scanner, Message::Stopped) => self.terminate(),
            Inbound::Closed(Source::Scanner) => {
                debug!("scanner closed without acknowledging stop");
                self.terminate()
            }
            other => {
                trace!(?other, "discarded while stopping");
                Ok(())
            }
        }
    }

    fn handle_message(&mut self, origin: Source, msg: Message) -> Result<(), EngineError> {
        match msg {
            Message::Scan { .. }
            | Message::FolderScanned { .. }
            | Message::FileScanned { .. }
            | Message::ArchiveScanned { .. }
            | Message::HashingProgress { .. }
            | Message::FileHashed { .. }
            | Message::ArchiveHashed { .. }
            | Message::FileCopied { .. }
            | Message::FileMoved { .. }
            | Message::FileDeleted { .. } => self.ingest(&msg),
            Message::SetCurrentFolder { root, path } => {
                self.set_current_folder(&root, &path);
                Ok(())
            }
            Message::Key { name } => {
                self.key(&name);
                Ok(())
            }
            Message::Ready => {
                self.ready = true;
                Ok(())
            }
            Message::ScreenSize { width, height } => {
                self.width = width;
                self.height = height;
                self.mark_current_dirty();
                Ok(())
            }
            Message::Stop => self.begin_stop(),
            Message::Stopped => {
                info!(%origin, "stopped while running");
                self.terminate()
            }
            Message::FolderBegin { .. } | Message::Meta(_) | Message::FolderEnd => {
                Err(EngineError::Unexpected {
                    origin,
                    kind: msg.kind(),
                })
            }
        }
    }

    fn ingest(&mut self, msg: &Message) -> Result<(), EngineError> {
        match self.registry.apply(msg)? {
            Applied::Registered(idx) => {
                self.scanner.send(msg)?;
                if self.current.is_none() {
                    self.current = Some(idx);
                }
            }
            Applied::Updated(_) | Applied::Analyzed(_) | Applied::Ignored => {}
        }
        Ok(())
    }

    fn begin_stop(&mut self) -> Result<(), EngineError> {
        info!("stopping, waiting for scanner");
        self.phase = Phase::Stopping;
        self.scanner.send(&Message::Stop)?;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), EngineError> {
        self.phase = Phase::Terminated;
        self.send_stopped()?;
        Ok(())
    }

    /// At most one `stopped` ever reaches the UI.
    fn send_stopped(&mut self) -> io::Result<()> {
        if self.stopped_sent {
            return Ok(());
        }
        self.stopped_sent = true;
        self.ui.send(&Message::Stopped)?;
        self.ui.flush()
    }

    fn render_gate(&mut self) -> io::Result<()> {
        self.stats.render_checks += 1;
        let Some(idx) = self.current else {
            return Ok(());
        };
        if !self.ready || !self.registry.archive(idx).dirty {
            return Ok(());
        }

        let archive = self.registry.archive(idx);
        let view = self.views.entry((idx, archive.current)).or_default();
        for msg in render::frame(archive, view) {
            self.ui.send(&msg)?;
        }

        self.ready = false;
        self.registry.archive_mut(idx).dirty = false;
        self.stats.frames += 1;
        Ok(())
    }

    fn set_current_folder(&mut self, root: &str, path: &str) {
        let Ok(idx) = self.registry.index_of(root) else {
            warn!(root, "set-current-folder for unknown root");
            return;
        };
        let archive = self.registry.archive_mut(idx);
        let folder = archive
            .tree
            .lookup(path)
            .filter(|&node| archive.tree.node(node).is_folder());
        match folder {
            Some(folder) => {
                archive.current = folder;
                archive.dirty = true;
                self.current = Some(idx);
            }
            None => warn!(root, path, "set-current-folder for unknown folder"),
        }
    }

    fn key(&mut self, name: &str) {
        let Some(idx) = self.current else {
            debug!(key = name, "no archive to navigate yet");
            return;
        };
        if name == "Tab" {
            let next = (idx + 1) % self.registry.len();
            self.current = Some(next);
            self.registry.archive_mut(next).dirty = true;
            return;
        }

        let page = usize::from(self.height).saturating_sub(CHROME_ROWS).max(1) as isize;
        let archive = self.registry.archive_mut(idx);
        let folder = archive.current;
        let view = self.views.entry((idx, folder)).or_default();
        let entries = view.entries(&archive.tree, folder);

        match name {
            "Up" => view.move_by(&archive.tree, &entries, -1),
            "Down" => view.move_by(&archive.tree, &entries, 1),
            "PgUp" => view.move_by(&archive.tree, &entries, -page),
            "PgDn" => view.move_by(&archive.tree, &entries, page),
            "Home" => view.move_to(&archive.tree, &entries, 0),
            "End" => view.move_to(&archive.tree, &entries, usize::MAX),
            "Enter" => match view.selected(&archive.tree, &entries) {
                Some(child) if archive.tree.node(child).is_folder() => archive.current = child,
                _ => return,
            },
            "Backspace" => {
                let node = archive.tree.node(folder);
                let Some(parent) = node.parent else {
                    return;
                };
                let came_from = node.name.clone();
                self.views.entry((idx, parent)).or_default().select_name(came_from);
                archive.current = parent;
            }
            other => match SortColumn::from_key(other) {
                Some(column) => view.select_column(column),
                None => {
                    debug!(key = other, "ignoring unknown key");
                    return;
                }
            },
        }
        archive.dirty = true;
    }

    fn mark_current_dirty(&mut self) {
        if let Some(idx) = self.current {
            self.registry.archive_mut(idx).dirty = true;
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The archive currently shown to the UI.
    pub fn current_archive(&self) -> Option<&Archive> {
        self.current.map(|idx| self.registry.archive(idx))
    }

    pub fn view(&self, archive: usize, folder: NodeIndex) -> Option<&FolderView> {
        self.views.get(&(archive, folder))
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn screen_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Everything flushed to the scanner so far.
    pub fn scanner_output(&self) -> &S {
        self.scanner.get_ref()
    }

    /// Everything flushed to the UI so far.
    pub fn ui_output(&self) -> &U {
        self.ui.get_ref()
    }
}

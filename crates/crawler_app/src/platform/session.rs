use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use crawler_core::{update, AppState, AppViewModel, Msg};
use crawler_engine::{CrawlSettings, EngineHandle};

use super::effects::EffectRunner;

const TICK: Duration = Duration::from_millis(75);

/// Owns the core state and feeds it engine messages on the caller's thread.
pub struct Session {
    state: AppState,
    runner: EffectRunner,
    msg_tx: mpsc::Sender<Msg>,
    msg_rx: mpsc::Receiver<Msg>,
}

impl Session {
    pub fn new(settings: CrawlSettings) -> Self {
        let default_target = settings.target_count;
        Self::with_engine(EngineHandle::new(settings), default_target)
    }

    pub fn with_engine(engine: EngineHandle, default_target: usize) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel();
        let runner = EffectRunner::new(engine, msg_tx.clone());
        Self {
            state: AppState::new(default_target),
            runner,
            msg_tx,
            msg_rx,
        }
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    /// Starts a crawl for `target_input`.
    ///
    /// Input queued since the last pump is applied first, so a stop request
    /// left over from an earlier crawl lands on the finished session instead
    /// of the new one.
    pub fn start(&mut self, target_input: String) {
        self.drain();
        self.dispatch(Msg::TargetEdited(target_input));
        self.dispatch(Msg::StartClicked);
    }

    /// Applies every message already queued, without waiting.
    pub fn drain(&mut self) {
        while let Ok(msg) = self.msg_rx.try_recv() {
            self.dispatch(msg);
        }
    }

    /// For threads that want to inject user input.
    pub fn sender(&self) -> mpsc::Sender<Msg> {
        self.msg_tx.clone()
    }

    /// Applies incoming messages until `done` holds, calling `on_change`
    /// after every batch of changes.
    pub fn pump_until(
        &mut self,
        done: impl Fn(&AppViewModel) -> bool,
        mut on_change: impl FnMut(&AppViewModel),
    ) {
        while !done(&self.state.view()) {
            match self.msg_rx.recv_timeout(TICK) {
                Ok(msg) => self.dispatch(msg),
                Err(RecvTimeoutError::Timeout) => self.dispatch(Msg::Tick),
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if self.state.consume_dirty() {
                on_change(&self.state.view());
            }
        }
    }
}

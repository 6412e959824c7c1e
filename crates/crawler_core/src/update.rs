use crate::{parse_target, AppState, Effect, Msg, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::TargetEdited(input) => {
            state.set_target_input(input);
            Vec::new()
        }
        Msg::StartClicked => match state.session() {
            SessionState::Idle | SessionState::Finished => {
                match parse_target(state.target_input(), state.default_target()) {
                    Ok(target) => {
                        state.start_run(target);
                        vec![Effect::StartCrawl { target }]
                    }
                    Err(reason) => {
                        state.set_status(reason);
                        Vec::new()
                    }
                }
            }
            SessionState::Running | SessionState::Stopping => Vec::new(),
        },
        Msg::StopClicked => {
            if state.session() == SessionState::Running {
                state.request_stop();
                vec![Effect::StopCrawl]
            } else {
                Vec::new()
            }
        }
        Msg::CountRequested => {
            if state.is_counting() {
                Vec::new()
            } else {
                state.set_counting(true);
                vec![Effect::QueryTotalCount]
            }
        }
        Msg::TotalCountReceived(total) => {
            state.set_total_available(total);
            Vec::new()
        }
        Msg::PageStarted { page } => {
            state.set_page(page);
            Vec::new()
        }
        Msg::Progress(progress) => {
            state.set_progress(progress);
            Vec::new()
        }
        Msg::Notice(text) => {
            state.set_status(text);
            Vec::new()
        }
        Msg::RunFinished(outcome) => {
            state.finish_run(outcome);
            Vec::new()
        }
        Msg::RunFailed { reason } => {
            state.finish_run(crate::RunOutcome::Failed { reason });
            Vec::new()
        }
        Msg::QuitRequested => {
            if state.session() == SessionState::Running {
                state.request_stop();
                vec![Effect::StopCrawl]
            } else {
                Vec::new()
            }
        }
        Msg::Tick => Vec::new(),
    };

    (state, effects)
}

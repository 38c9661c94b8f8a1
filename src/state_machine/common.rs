// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Outcome of one state-machine step.
pub enum Transition<S, R> {
    /// Move to the next state, carrying the step result.
    Next(S, R),
    /// Remain in the current state (another round of the same exchange).
    Stay(R),
    /// The flow is finished.
    Done(R),
}

/// A context that owns a state enum and drives it to completion.
pub trait StateMachineCtx<Res> {
    fn execute(&mut self) -> impl Future<Output = anyhow::Result<Res>> + Send;
}

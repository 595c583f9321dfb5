// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

mod kill;
mod poll;
mod reconcile;
mod submit;

#[cfg(test)]
mod test_support;

pub use kill::KillCoordinator;
pub use poll::StatusPoller;
pub use reconcile::Reconciler;
pub use submit::JobSubmitter;

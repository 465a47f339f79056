// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Messages consumed by the controller task.

use std::fmt;

use tokio::sync::oneshot;

use crate::client::ProductSnapshotData;
use crate::command::ProductCommand;
use crate::cost::CostBatch;
use crate::error::{Error, RemoteError};
use crate::schedule::PeriodDescription;
use crate::types::{ProductId, Section};

/// Periodic work items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Job {
    ChargerPoll,
    EqualizerPoll,
    SchedulePoll,
    FirmwarePoll,
    CostPoll,
    /// Firmware and cost refresh shortly after local midnight.
    DailyRefresh,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChargerPoll => "charger_poll",
            Self::EqualizerPoll => "equalizer_poll",
            Self::SchedulePoll => "schedule_poll",
            Self::FirmwarePoll => "firmware_poll",
            Self::CostPoll => "cost_poll",
            Self::DailyRefresh => "daily_refresh",
        })
    }
}

/// Ticks and results of spawned network tasks.
#[derive(Debug)]
pub(crate) enum Message {
    Tick(Job),
    Polled {
        product: ProductId,
        result: Result<ProductSnapshotData, RemoteError>,
    },
    Plan {
        product: ProductId,
        section: Section,
        result: Result<PeriodDescription, RemoteError>,
    },
    Firmware {
        product: ProductId,
        result: Result<u32, RemoteError>,
    },
    Subscribed {
        product: ProductId,
        result: Result<(), RemoteError>,
    },
    Cost(CostBatch),
}

impl From<CostBatch> for Message {
    fn from(batch: CostBatch) -> Self {
        Self::Cost(batch)
    }
}

/// Requests sent by a [`SyncHandle`](super::SyncHandle).
#[derive(Debug)]
pub(crate) enum Request {
    Command {
        product: ProductId,
        command: ProductCommand,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Refresh {
        product: ProductId,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Shutdown,
}

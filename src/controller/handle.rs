// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handle to a running controller.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::message::Request;
use crate::command::{ProductCommand, SwitchCommand};
use crate::error::{Error, Result};
use crate::state::ProductSnapshot;
use crate::types::ProductId;

/// Handle returned by [`SyncController::start`](super::SyncController::start).
///
/// Dropping the handle stops the controller as well; [`shutdown`](Self::shutdown)
/// additionally waits until teardown has finished.
#[derive(Debug)]
pub struct SyncHandle {
    requests: mpsc::UnboundedSender<Request>,
    watches: HashMap<ProductId, watch::Receiver<ProductSnapshot>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub(super) fn new(
        requests: mpsc::UnboundedSender<Request>,
        watches: HashMap<ProductId, watch::Receiver<ProductSnapshot>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            requests,
            watches,
            task,
        }
    }

    /// Returns the ids of the mirrored products.
    pub fn product_ids(&self) -> impl Iterator<Item = &ProductId> {
        self.watches.keys()
    }

    /// Returns a receiver of a product's published snapshots.
    #[must_use]
    pub fn watch(&self, product: &ProductId) -> Option<watch::Receiver<ProductSnapshot>> {
        self.watches.get(product).cloned()
    }

    /// Returns the last published snapshot of a product.
    #[must_use]
    pub fn snapshot(&self, product: &ProductId) -> Option<ProductSnapshot> {
        self.watches.get(product).map(|rx| rx.borrow().clone())
    }

    /// Returns `true` while the controller task runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Performs a command on a product and waits for the remote's answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProductNotFound`] for products outside this
    /// controller, [`Error::Remote`] if the remote refused, and
    /// [`Error::ShutDown`] once the controller stopped.
    pub async fn send_command(&self, product: &ProductId, command: ProductCommand) -> Result<()> {
        let (reply, answer) = oneshot::channel();
        self.request(Request::Command {
            product: product.clone(),
            command,
            reply,
        })?;
        answer.await.map_err(|_| Error::ShutDown)?
    }

    /// Turns a switch on or off.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn set_switch(
        &self,
        product: &ProductId,
        switch: SwitchCommand,
        on: bool,
    ) -> Result<()> {
        self.send_command(product, switch.turn(on)).await
    }

    /// Polls a product now, even while its stream is live.
    ///
    /// Returns once the poll is scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProductNotFound`] or [`Error::ShutDown`].
    pub async fn refresh(&self, product: &ProductId) -> Result<()> {
        let (reply, answer) = oneshot::channel();
        self.request(Request::Refresh {
            product: product.clone(),
            reply,
        })?;
        answer.await.map_err(|_| Error::ShutDown)?
    }

    /// Stops the controller and waits for teardown to complete.
    pub async fn shutdown(self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            tracing::error!(error = %e, "Sync controller task panicked");
        }
    }

    fn request(&self, request: Request) -> Result<()> {
        self.requests.send(request).map_err(|_| Error::ShutDown)
    }
}

//! DCC transfers owned by the client.
//!
//! Transfers are addressed by their index in
//! [`active_transfers`](Client::active_transfers). Finished, failed and
//! cancelled transfers are removed, which shifts later indices down.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info, warn};

use super::Client;
use crate::ctcp::encode_ctcp;
use crate::dcc::{DccStatus, DccTransfer};
use crate::error::DccError;
use crate::error::{ClientError, Result};
use crate::event::Event;

impl Client {
    pub fn active_transfers(&self) -> &[DccTransfer] {
        &self.transfers
    }

    /// Offer the file at `path` to `nick`. Returns the transfer index.
    pub fn send_dcc_file(&mut self, nick: &str, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path).map_err(DccError::Io)?;
        let size = file.metadata().map_err(DccError::Io)?.len();
        let local_ip = self
            .config
            .dcc_local_ip
            .or_else(|| self.transport.local_addr())
            .ok_or(DccError::NoLocalAddress)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let transfer = DccTransfer::outgoing(
            nick,
            &filename,
            size,
            Box::new(file),
            local_ip,
            self.dcc_network.as_mut(),
        )?;
        let payload = encode_ctcp("DCC", &transfer.offer().to_ctcp_params());
        self.send_privmsg(nick, &payload);

        info!(%nick, filename = transfer.filename(), size, "dcc send offered");
        self.transfers.push(transfer);
        Ok(self.transfers.len() - 1)
    }

    /// Accept a pending offer, writing to `path`.
    ///
    /// With a resume offset set on the transfer, the file is opened for
    /// writing at that offset instead of truncated.
    pub fn accept_dcc_transfer(&mut self, index: usize, path: impl AsRef<Path>) -> Result<()> {
        let transfer = self
            .transfers
            .get_mut(index)
            .ok_or(ClientError::NoSuchTransfer(index))?;
        if transfer.status() != DccStatus::Pending {
            return Err(DccError::InvalidState(transfer.status()).into());
        }

        let path = path.as_ref();
        let existed = path.exists();
        let offset = transfer.resume_offset();
        let file = if offset > 0 {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(DccError::Io)?;
            file.seek(SeekFrom::Start(offset)).map_err(DccError::Io)?;
            file
        } else {
            File::create(path).map_err(DccError::Io)?
        };

        if let Err(e) = transfer.accept(Box::new(file), self.dcc_network.as_mut()) {
            if !existed {
                if let Err(remove) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %remove, "could not remove dcc file");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Continue a partial download from `offset` once accepted.
    pub fn set_dcc_resume_offset(&mut self, index: usize, offset: u64) -> Result<()> {
        let transfer = self
            .transfers
            .get_mut(index)
            .ok_or(ClientError::NoSuchTransfer(index))?;
        transfer.set_resume_offset(offset)?;
        Ok(())
    }

    /// Decline a pending offer and drop it.
    pub fn reject_dcc_transfer(&mut self, index: usize) -> Result<()> {
        let transfer = self
            .transfers
            .get_mut(index)
            .ok_or(ClientError::NoSuchTransfer(index))?;
        transfer.reject()?;
        self.transfers.remove(index);
        Ok(())
    }

    /// Abort a transfer and drop it.
    pub fn cancel_dcc_transfer(&mut self, index: usize) -> Result<()> {
        let transfer = self
            .transfers
            .get_mut(index)
            .ok_or(ClientError::NoSuchTransfer(index))?;
        transfer.cancel()?;
        self.transfers.remove(index);
        Ok(())
    }

    /// Step every transfer and report what changed.
    ///
    /// Walks from the end so removals keep earlier indices valid for the
    /// events emitted in this pass.
    pub(super) fn poll_transfers(&mut self) {
        for index in (0..self.transfers.len()).rev() {
            let transfer = &mut self.transfers[index];
            transfer.poll();

            let progress = transfer.take_progress().map(|transferred| Event::DccProgress {
                index,
                transferred,
                size: transfer.size(),
            });
            let finished = match transfer.status() {
                DccStatus::Completed => Some(Event::DccCompleted { index }),
                DccStatus::Failed => Some(Event::DccFailed {
                    index,
                    reason: transfer.error().unwrap_or("transfer failed").to_owned(),
                }),
                DccStatus::Cancelled => None,
                _ => {
                    if let Some(event) = progress {
                        self.emit(event);
                    }
                    continue;
                }
            };

            debug!(index, status = ?self.transfers[index].status(), "dcc transfer finished");
            self.transfers.remove(index);
            if let Some(event) = progress {
                self.emit(event);
            }
            if let Some(event) = finished {
                self.emit(event);
            }
        }
    }
}

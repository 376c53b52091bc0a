//! Open IRCv3 batches.

use crate::message::Message;

/// A batch between `BATCH +ref` and `BATCH -ref`.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchInfo {
    pub reference: String,
    pub batch_type: String,
    pub params: Vec<String>,
    /// Lines tagged with this batch, in arrival order.
    pub messages: Vec<Message>,
}

impl BatchInfo {
    pub fn new(reference: impl Into<String>, batch_type: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            reference: reference.into(),
            batch_type: batch_type.into(),
            params,
            messages: Vec::new(),
        }
    }
}

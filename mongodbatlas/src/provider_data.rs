//! Provider data structure passed to resources

use crate::api::Client;
use std::sync::Arc;
use tfretry::{Clock, TokioClock};

#[derive(Clone)]
pub struct AtlasProviderData {
    pub client: Client,
    pub clock: Arc<dyn Clock>,
}

impl AtlasProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            clock: Arc::new(TokioClock),
        }
    }

    /// Replaces the clock used by every wait, e.g. with a `ManualClock`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

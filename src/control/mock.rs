//! In-memory control plane for tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{ControlPlane, ControlPlaneError, MediaDescription};

/// Records every request and answers from canned results
#[derive(Default)]
pub(crate) struct MockControlPlane {
    /// Provisioning of these streams waits before answering
    pub provision_delays: HashMap<String, Duration>,
    pub provision_error: Option<ControlPlaneError>,
    pub teardown_error: Option<ControlPlaneError>,
    pub provisioned: Mutex<Vec<(String, String, MediaDescription)>>,
    pub torn_down: Mutex<Vec<(String, String, String)>>,
}

impl ControlPlane for MockControlPlane {
    async fn provision(
        &self,
        origin: &str,
        stream_id: &str,
        description: &MediaDescription,
    ) -> Result<String, ControlPlaneError> {
        if let Some(delay) = self.provision_delays.get(stream_id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(ref e) = self.provision_error {
            return Err(e.clone());
        }
        self.provisioned.lock().unwrap().push((
            origin.to_string(),
            stream_id.to_string(),
            description.clone(),
        ));
        Ok(format!("fwd-{}", stream_id))
    }

    async fn teardown(
        &self,
        origin: &str,
        stream_id: &str,
        forwarder_id: &str,
    ) -> Result<(), ControlPlaneError> {
        self.torn_down.lock().unwrap().push((
            origin.to_string(),
            stream_id.to_string(),
            forwarder_id.to_string(),
        ));
        match self.teardown_error {
            Some(ref e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

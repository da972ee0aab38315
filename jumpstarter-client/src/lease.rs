//  LEASE.rs
//
//  Description:
//!   The lease client (§4.9): requests a time-bounded exclusive
//!   reservation against the controller, watches it until the router
//!   hands out an endpoint, and releases it on drop/completion.

use jumpstarter_proto::controller::{ControllerServiceClient, ReleaseLeaseRequest, RequestLeaseRequest, WatchLeaseRequest};
use jumpstarter_shr::selector::Selector;
use log::{info, warn};
use tonic::Request;

use crate::errors::LeaseError;

/// A granted lease's router-dial coordinates (§3 "Lease").
#[derive(Clone, Debug)]
pub struct RouterAssignment {
    pub router_endpoint: String,
    pub router_token: String,
}

/// Wraps the controller's lease lifecycle calls behind the three
/// operations a client actually needs: request, wait-for-ready, release.
pub struct LeaseClient {
    controller: ControllerServiceClient,
    client_ref: String,
}
impl LeaseClient {
    pub fn new(controller: ControllerServiceClient, client_ref: impl Into<String>) -> Self { Self { controller, client_ref: client_ref.into() } }

    /// Requests a lease matching `selector` for `duration_secs`, then
    /// blocks on `WatchLease` until the first `ready=true` condition,
    /// returning the router endpoint/token it carries (§4.9, §3).
    pub async fn acquire(&mut self, selector: &Selector, duration_secs: u64) -> Result<(String, RouterAssignment), LeaseError> {
        let reply = self
            .controller
            .request_lease(Request::new(RequestLeaseRequest {
                client_ref: self.client_ref.clone(),
                selector: selector.to_string(),
                duration_secs,
            }))
            .await
            .map_err(|err| LeaseError::RequestFailed { selector: selector.to_string(), err })?
            .into_inner();
        let name = reply.name;
        info!("lease '{name}' requested for selector '{selector}'");

        let mut stream = self
            .controller
            .watch_lease(Request::new(WatchLeaseRequest { name: name.clone() }))
            .await
            .map_err(|err| LeaseError::WatchFailed { name: name.clone(), err })?
            .into_inner();

        loop {
            let condition = stream
                .message()
                .await
                .map_err(|err| LeaseError::WatchFailed { name: name.clone(), err })?
                .ok_or_else(|| LeaseError::WatchClosedEarly { name: name.clone() })?;
            if condition.ready {
                let router_endpoint = condition.router_endpoint.ok_or_else(|| LeaseError::ReadyWithoutEndpoint { name: name.clone() })?;
                let router_token = condition.router_token.ok_or_else(|| LeaseError::ReadyWithoutEndpoint { name: name.clone() })?;
                info!("lease '{name}' ready, router endpoint '{router_endpoint}'");
                return Ok((name, RouterAssignment { router_endpoint, router_token }));
            }
            if let Some(message) = condition.message {
                warn!("lease '{name}' not yet ready: {message}");
            }
        }
    }

    /// Releases `name`. Idempotent: the controller treats releasing an
    /// already-released or unknown lease as a success (§4.9).
    pub async fn release(&mut self, name: &str) -> Result<(), LeaseError> {
        self.controller
            .release_lease(Request::new(ReleaseLeaseRequest { name: name.to_string() }))
            .await
            .map_err(|err| LeaseError::ReleaseFailed { name: name.to_string(), err })?;
        info!("lease '{name}' released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_assignment_carries_both_fields() {
        let assignment = RouterAssignment { router_endpoint: "http://router:8083".to_string(), router_token: "tok".to_string() };
        assert_eq!(assignment.router_endpoint, "http://router:8083");
        assert_eq!(assignment.router_token, "tok");
    }
}

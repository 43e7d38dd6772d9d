//! Kind-specific predicates used by the descriptor table.

use serde_json::Value;

use crate::predicate::Predicate;
use crate::snapshot::Snapshot;

/// Pointer to `GatewayClass.spec.controllerName`.
pub const CONTROLLER_NAME_FIELD: &str = "/spec/controllerName";

/// Pointer to `Service.spec.ports`.
pub const SERVICE_PORTS_FIELD: &str = "/spec/ports";

/// Accepts GatewayClasses managed by this controller.
///
/// An update passes when either side names the controller, so a class moving
/// away from this controller is still seen.
#[derive(Debug, Clone)]
pub struct GatewayClassControllerPredicate {
    controller_name: String,
}

impl GatewayClassControllerPredicate {
    /// Matches GatewayClasses naming `controller_name`.
    pub fn new(controller_name: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
        }
    }

    fn matches(&self, snapshot: &Snapshot) -> bool {
        snapshot
            .field(CONTROLLER_NAME_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|name| name == self.controller_name)
    }
}

impl Predicate for GatewayClassControllerPredicate {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        self.matches(current) || previous.is_some_and(|prev| self.matches(prev))
    }

    fn required_fields(&self) -> Vec<&'static str> {
        vec![CONTROLLER_NAME_FIELD]
    }
}

/// Accepts Service changes that affect routing: the port list, compared on
/// name, protocol, port, targetPort and appProtocol. Other port attributes
/// (nodePort) and the rest of the spec are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServicePortsChanged;

const ROUTING_PORT_KEYS: [&str; 5] = ["name", "protocol", "port", "targetPort", "appProtocol"];

fn routing_ports(snapshot: &Snapshot) -> Vec<Vec<Option<&Value>>> {
    snapshot
        .field(SERVICE_PORTS_FIELD)
        .and_then(Value::as_array)
        .map(|ports| {
            ports
                .iter()
                .map(|port| ROUTING_PORT_KEYS.iter().map(|key| port.get(key)).collect())
                .collect()
        })
        .unwrap_or_default()
}

impl Predicate for ServicePortsChanged {
    fn evaluate(&self, previous: Option<&Snapshot>, current: &Snapshot) -> bool {
        previous.is_none_or(|prev| routing_ports(prev) != routing_ports(current))
    }

    fn required_fields(&self) -> Vec<&'static str> {
        vec![SERVICE_PORTS_FIELD]
    }
}

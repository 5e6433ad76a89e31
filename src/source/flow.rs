//! Activates a set of scene nodes while the sensor is open and hides them
//! when it closes, so downstream visuals track sensor availability.

use std::sync::{Arc, Mutex};

use crate::{
    event::SubscriptionHandle,
    scene::{NodeId, SceneGraph},
    source::{CaptureSource, SensorLifecycle},
};

/// Subscribes `managed` to the source's lifecycle: `Opened` activates every
/// node, `Closed` deactivates them. Returns the handle for detaching.
pub fn attach_flow_control<G>(
    source: &CaptureSource,
    graph: Arc<Mutex<G>>,
    managed: Vec<NodeId>,
) -> SubscriptionHandle
where
    G: SceneGraph + Send + 'static,
{
    source.lifecycle().subscribe(move |event| {
        let active = matches!(event, SensorLifecycle::Opened);
        let mut graph = graph.lock().unwrap_or_else(|e| e.into_inner());
        for &node in &managed {
            graph.set_active(node, active);
        }
    })
}

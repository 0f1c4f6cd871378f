use super::{ComponentState, MonitorOrchestrator};
use std::collections::HashMap;
use tracing::debug;

/// Components in start order; shutdown walks this list backwards
pub(super) const COMPONENTS: [&str; 3] = ["dispatcher", "pipeline", "camera"];

impl MonitorOrchestrator {
    /// Move a component to a new state, logging the transition
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let previous = self
            .component_states
            .lock()
            .await
            .insert(component.to_string(), state.clone());

        match previous {
            Some(from) if from != state => {
                debug!("Component '{}': {:?} -> {:?}", component, from, state)
            }
            Some(_) => {}
            None => debug!("Component '{}' registered as {:?}", component, state),
        }
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// Names of the components currently in `state`, sorted
    pub async fn components_in(&self, state: ComponentState) -> Vec<String> {
        let mut names: Vec<String> = self
            .component_states
            .lock()
            .await
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

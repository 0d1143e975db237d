//! Collection resolution for sequence contracts (`Vec<Arc<T>>`)

use crate::{
    container::Container,
    engine::Trail,
    instance::Instance,
    mapping::MappingDirective,
    request::ResolveRequest,
};
use tracing::{debug, warn};

impl Container {
    /// Resolve every registration of the element type across the chain.
    ///
    /// Elements that fail are skipped and recorded. Returns `None` when the
    /// contract is not a sequence or nothing could be resolved, letting the
    /// caller fall through to ordinary resolution.
    pub(crate) fn resolve_collection(
        &self,
        request: &ResolveRequest,
        directive: &MappingDirective,
        trail: &mut Trail,
    ) -> Option<Instance> {
        let sequence = *request.contract.sequence()?;
        let registrations = self.enumerate_by_contract(&sequence.element);
        if registrations.is_empty() {
            debug!("No registrations of {} for collection", sequence.element);
            return None;
        }

        let mut items = Vec::with_capacity(registrations.len());
        for (key, entry) in registrations {
            let element_request = ResolveRequest {
                mode: request.mode,
                priority_key: key.priority.clone(),
                contract_name: request.contract_name.clone(),
                contract: entry.contract,
                parent: request.parent,
                concrete: Some(entry.concrete),
                cascade: request.cascade,
            };
            match self.dispatch(element_request, directive.clone(), trail) {
                Ok(instance) => items.push(instance),
                Err(err) => {
                    warn!("Skipped {} while resolving {}: {}", key, request.contract_key(), err);
                    self.record_skip(request.contract_key(), key.to_string(), err.to_string());
                }
            }
        }

        if items.is_empty() {
            return None;
        }
        debug!(
            "Resolved {} element(s) of {} in {}",
            items.len(),
            sequence.element,
            self.label()
        );
        Some(sequence.assemble(items))
    }
}

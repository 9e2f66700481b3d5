//! Claim-then-fill slots.
//!
//! Each registered type owns one [`Slot`]. The slot starts `Pending` with a
//! one-shot factory; the first resolver claims it (`Pending -> Building`),
//! runs the factory and fills the result in (`Building -> Ready | Failed`).
//!
//! Claims happen under the registry build lock, so a slot found `Building`
//! always belongs to the claiming thread: reaching it again means the
//! construction requires itself, which is a `CyclicDependency`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TypeGraphError;
use crate::types::{TypeDefinition, TypeKey};

use super::Resolver;

/// One-shot constructor of a type definition.
pub type Factory =
    Box<dyn FnOnce(&Resolver<'_>) -> Result<TypeDefinition, TypeGraphError> + Send + 'static>;

enum SlotState {
    Pending(Factory),
    Building,
    Ready(Arc<TypeDefinition>),
    Failed(TypeGraphError),
}

/// Outcome of a claim attempt.
pub(crate) enum Claim<'s> {
    /// The definition is already realized.
    Ready(Arc<TypeDefinition>),
    /// The caller now owns construction and must finish it.
    Claimed(Factory, Construction<'s>),
}

/// Memoization cell of a single type.
pub(crate) struct Slot {
    state: Mutex<SlotState>,
}

impl Slot {
    pub(crate) fn pending(factory: Factory) -> Self {
        Self {
            state: Mutex::new(SlotState::Pending(factory)),
        }
    }

    pub(crate) fn ready(definition: Arc<TypeDefinition>) -> Self {
        Self {
            state: Mutex::new(SlotState::Ready(definition)),
        }
    }

    /// Returns the realized definition without triggering construction.
    pub(crate) fn peek(&self) -> Option<Arc<TypeDefinition>> {
        match &*self.state.lock() {
            SlotState::Ready(definition) => Some(Arc::clone(definition)),
            _ => None,
        }
    }

    /// Whether the slot is currently under construction.
    pub(crate) fn is_building(&self) -> bool {
        matches!(&*self.state.lock(), SlotState::Building)
    }

    /// Claims the slot for construction or returns its memoized state.
    ///
    /// Must be called with the registry build lock held. `chain` is the
    /// resolution chain of the calling resolver and only feeds the error.
    pub(crate) fn claim(&self, key: &TypeKey, chain: &[TypeKey]) -> Result<Claim<'_>, TypeGraphError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, SlotState::Building) {
            SlotState::Pending(factory) => Ok(Claim::Claimed(
                factory,
                Construction {
                    slot: self,
                    key: key.clone(),
                    finished: false,
                },
            )),
            SlotState::Ready(definition) => {
                *state = SlotState::Ready(Arc::clone(&definition));
                Ok(Claim::Ready(definition))
            }
            SlotState::Failed(err) => {
                *state = SlotState::Failed(err.clone());
                Err(err)
            }
            SlotState::Building => {
                let mut names: Vec<String> = chain.iter().map(|k| k.name.clone()).collect();
                names.push(key.name.clone());
                Err(TypeGraphError::CyclicDependency {
                    key: key.clone(),
                    chain: names,
                })
            }
        }
    }

    fn fill(
        &self,
        result: Result<TypeDefinition, TypeGraphError>,
    ) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        let mut state = self.state.lock();
        match result {
            Ok(definition) => {
                let definition = Arc::new(definition);
                *state = SlotState::Ready(Arc::clone(&definition));
                Ok(definition)
            }
            Err(err) => {
                *state = SlotState::Failed(err.clone());
                Err(err)
            }
        }
    }
}

/// Ownership of a claimed slot.
///
/// Dropping it without [`finish`](Self::finish) (a panicking factory) marks
/// the slot `Failed`, so later resolutions report the failure.
pub(crate) struct Construction<'s> {
    slot: &'s Slot,
    key: TypeKey,
    finished: bool,
}

impl Construction<'_> {
    /// Stores the construction result.
    pub(crate) fn finish(
        mut self,
        result: Result<TypeDefinition, TypeGraphError>,
    ) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        self.finished = true;
        self.slot.fill(result)
    }
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.slot.fill(Err(TypeGraphError::FactoryPanicked {
                key: self.key.clone(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelVersion;

    fn key(name: &str) -> TypeKey {
        TypeKey::output(&ModelVersion::new("4_0_0"), name)
    }

    fn pending(name: &'static str) -> Slot {
        Slot::pending(Box::new(move |_| Ok(TypeDefinition::object(key(name)))))
    }

    #[test]
    fn test_claim_then_finish() {
        let slot = pending("A");
        assert!(slot.peek().is_none());

        let Ok(Claim::Claimed(_factory, construction)) = slot.claim(&key("A"), &[]) else {
            panic!("first claim must own construction");
        };
        assert!(slot.is_building());

        let filled = construction
            .finish(Ok(TypeDefinition::object(key("A"))))
            .unwrap();
        let Ok(Claim::Ready(again)) = slot.claim(&key("A"), &[]) else {
            panic!("filled slot must be ready");
        };
        assert!(Arc::ptr_eq(&filled, &again));
    }

    #[test]
    fn test_reclaim_while_building_is_cycle() {
        let slot = pending("A");
        let _claim = slot.claim(&key("A"), &[]).unwrap();

        let err = slot
            .claim(&key("A"), &[key("A"), key("B")])
            .err()
            .expect("re-entering a building slot is a cycle");
        assert_eq!(
            err,
            TypeGraphError::CyclicDependency {
                key: key("A"),
                chain: vec!["A".into(), "B".into(), "A".into()],
            }
        );
    }

    #[test]
    fn test_failure_is_memoized() {
        let slot = pending("A");
        let Ok(Claim::Claimed(_factory, construction)) = slot.claim(&key("A"), &[]) else {
            panic!("first claim must own construction");
        };
        let err = TypeGraphError::type_not_found(key("B"));
        assert!(construction.finish(Err(err.clone())).is_err());

        assert_eq!(slot.claim(&key("A"), &[]).err(), Some(err));
    }

    #[test]
    fn test_abandoned_construction_fails_slot() {
        let slot = pending("A");
        let Ok(Claim::Claimed(_factory, construction)) = slot.claim(&key("A"), &[]) else {
            panic!("first claim must own construction");
        };
        drop(construction);

        assert!(!slot.is_building());
        assert_eq!(
            slot.claim(&key("A"), &[]).err(),
            Some(TypeGraphError::FactoryPanicked { key: key("A") })
        );
    }
}

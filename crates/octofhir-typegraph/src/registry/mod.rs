//! Lazy type registry with deferred resolution.
//!
//! The registry maps [`TypeKey`]s to factories. Nothing is built at
//! registration time; a definition is constructed on its first
//! [`resolve`](TypeRegistry::resolve) and memoized, so registration order
//! never matters and types can reference each other freely.
//!
//! ## Forward references
//!
//! A factory receives a [`Resolver`]. To point a field at another type it
//! asks for a [`TypeHandle`], which only checks that the type is registered
//! and never constructs it. Two types that reference each other therefore
//! resolve without recursion. Only composition (`extends`) needs a base's
//! finalized field map; a base chain that loops back onto itself fails with
//! `CyclicDependency`.
//!
//! ## Phases
//!
//! Registration takes `&mut self` (single writer). Resolution takes `&self`
//! and is safe to share across threads. Realized definitions are read
//! without blocking; first construction runs under one reentrant build lock,
//! so each slot is claimed at most once and a base cycle is always closed on
//! the thread that started it, never split into a cross-thread wait.
//! [`TypeRegistry::freeze`] ends the write phase and hands out the realized
//! definitions for the immutable read phase.

mod thunk;

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::ReentrantMutex;
use tracing::{debug, trace};

use crate::compose::{compose_all, hoist};
use crate::config::SiblingOrder;
use crate::error::TypeGraphError;
use crate::pairing::pair_fields;
use crate::types::{FieldType, RESOURCE_TYPE_FIELD, TypeDefinition, TypeKey, TypeKind};

pub use thunk::Factory;
use thunk::{Claim, Slot};

/// How the registry applies element pairing to realized definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRule {
    /// Name of the Element type in each namespace.
    pub element_type: String,
    /// Placement of siblings.
    pub order: SiblingOrder,
}

/// Registry of lazily constructed type definitions.
pub struct TypeRegistry {
    /// Slots in registration order.
    slots: IndexMap<TypeKey, Slot>,
    /// Element pairing applied after composition.
    pairing: Option<PairingRule>,
    /// Serializes first construction across threads.
    build_lock: ReentrantMutex<()>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates an empty registry without element pairing.
    pub fn new() -> Self {
        Self {
            slots: IndexMap::new(),
            pairing: None,
            build_lock: ReentrantMutex::new(()),
        }
    }

    /// Creates an empty registry that pairs primitive fields with
    /// `element_type` siblings.
    pub fn with_pairing(element_type: impl Into<String>, order: SiblingOrder) -> Self {
        Self {
            slots: IndexMap::new(),
            pairing: Some(PairingRule {
                element_type: element_type.into(),
                order,
            }),
            build_lock: ReentrantMutex::new(()),
        }
    }

    /// Registers a factory for `key`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateType` if `key` is already registered.
    pub fn register<F>(&mut self, key: TypeKey, factory: F) -> Result<(), TypeGraphError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<TypeDefinition, TypeGraphError> + Send + 'static,
    {
        if self.slots.contains_key(&key) {
            return Err(TypeGraphError::DuplicateType { key });
        }
        trace!(key = %key, "Registering type factory");
        self.slots.insert(key, Slot::pending(Box::new(factory)));
        Ok(())
    }

    /// Registers an already realized definition under its own key.
    ///
    /// The definition is stored as is: no composition, no pairing.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateType` if the key is already registered.
    pub fn insert(&mut self, definition: TypeDefinition) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        let key = definition.key.clone();
        if self.slots.contains_key(&key) {
            return Err(TypeGraphError::DuplicateType { key });
        }
        trace!(key = %key, "Registering realized type");
        let definition = Arc::new(definition);
        self.slots.insert(key, Slot::ready(Arc::clone(&definition)));
        Ok(definition)
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &TypeKey> {
        self.slots.keys()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the memoized definition of `key`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns `TypeNotFound` for unregistered keys, `CyclicDependency` when
    /// construction requires its own finalized state, or whatever error the
    /// factory produced (memoized as well).
    pub fn resolve(&self, key: &TypeKey) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        Resolver::new(self).resolve(key)
    }

    /// Resolves every registered type in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first construction error.
    pub fn resolve_all(&self) -> Result<(), TypeGraphError> {
        let resolver = Resolver::new(self);
        for key in self.slots.keys() {
            resolver.resolve(key)?;
        }
        debug!(count = self.slots.len(), "Resolved all registered types");
        Ok(())
    }

    /// Ends the write phase and returns every realized definition in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns the first construction error; nothing is returned in that case.
    pub fn freeze(self) -> Result<IndexMap<TypeKey, Arc<TypeDefinition>>, TypeGraphError> {
        self.resolve_all()?;
        let mut realized = IndexMap::with_capacity(self.slots.len());
        for (key, slot) in &self.slots {
            let definition = slot
                .peek()
                .ok_or_else(|| TypeGraphError::type_not_found(key.clone()))?;
            realized.insert(key.clone(), definition);
        }
        Ok(realized)
    }

    fn slot(&self, key: &TypeKey) -> Result<&Slot, TypeGraphError> {
        self.slots
            .get(key)
            .ok_or_else(|| TypeGraphError::type_not_found(key.clone()))
    }
}

/// Stable reference to a registered type that may still be under construction.
pub struct TypeHandle<'r> {
    key: TypeKey,
    slot: &'r Slot,
}

impl TypeHandle<'_> {
    /// The referenced key.
    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    /// A field type pointing at the referenced type.
    pub fn field_type(&self) -> FieldType {
        FieldType::named(self.key.clone())
    }

    /// The realized definition, or `None` while it is not finalized.
    pub fn definition(&self) -> Option<Arc<TypeDefinition>> {
        self.slot.peek()
    }

    /// Whether the referenced type is being constructed right now.
    pub fn is_building(&self) -> bool {
        self.slot.is_building()
    }
}

/// Resolution context handed to factories.
///
/// Tracks the chain of types under construction on the current call path,
/// which is what turns a self-requiring factory into an error instead of a
/// stack overflow.
pub struct Resolver<'r> {
    registry: &'r TypeRegistry,
    chain: RefCell<Vec<TypeKey>>,
}

impl<'r> Resolver<'r> {
    fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            chain: RefCell::new(Vec::new()),
        }
    }

    /// The type currently being constructed, if any.
    pub fn current(&self) -> Option<TypeKey> {
        self.chain.borrow().last().cloned()
    }

    /// Key of `name` in the namespace of the type under construction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDeclarations` when called outside of a factory.
    pub fn key(&self, name: &str) -> Result<TypeKey, TypeGraphError> {
        self.current()
            .map(|current| current.sibling(name))
            .ok_or_else(|| {
                TypeGraphError::InvalidDeclarations(format!(
                    "cannot resolve '{name}' outside of a type factory"
                ))
            })
    }

    /// Returns a handle to `key` without constructing it.
    ///
    /// # Errors
    ///
    /// Returns `TypeNotFound` if `key` is not registered.
    pub fn handle(&self, key: &TypeKey) -> Result<TypeHandle<'r>, TypeGraphError> {
        let slot = self.registry.slot(key)?;
        Ok(TypeHandle {
            key: key.clone(),
            slot,
        })
    }

    /// Handle to `name` in the namespace of the type under construction.
    ///
    /// # Errors
    ///
    /// Returns `TypeNotFound` if the type is not registered.
    pub fn handle_named(&self, name: &str) -> Result<TypeHandle<'r>, TypeGraphError> {
        self.handle(&self.key(name)?)
    }

    /// Returns the finalized definition of `key`, constructing it if needed.
    ///
    /// # Errors
    ///
    /// See [`TypeRegistry::resolve`].
    pub fn resolve(&self, key: &TypeKey) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        let slot = self.registry.slot(key)?;
        if let Some(definition) = slot.peek() {
            return Ok(definition);
        }

        // Reentrant: factories resolve their bases on the same thread.
        let _build = self.registry.build_lock.lock();
        let claim = {
            let chain = self.chain.borrow();
            slot.claim(key, &chain)?
        };

        match claim {
            Claim::Ready(definition) => Ok(definition),
            Claim::Claimed(factory, construction) => {
                trace!(key = %key, "Constructing type");
                self.chain.borrow_mut().push(key.clone());
                let result = factory(self).and_then(|own| self.realize(key, own));
                self.chain.borrow_mut().pop();
                construction.finish(result)
            }
        }
    }

    /// Composes bases, puts the resource tag first and applies pairing to a
    /// factory result.
    fn realize(&self, key: &TypeKey, mut own: TypeDefinition) -> Result<TypeDefinition, TypeGraphError> {
        own.key = key.clone();

        if !own.extends.is_empty() {
            let bases = own
                .extends
                .iter()
                .map(|base| self.resolve(base))
                .collect::<Result<Vec<_>, _>>()?;
            let layers = bases
                .iter()
                .map(|base| &base.fields)
                .chain(std::iter::once(&own.fields));
            own.fields = compose_all(layers);
        }

        if own.is_resource() {
            own.fields = hoist(std::mem::take(&mut own.fields), RESOURCE_TYPE_FIELD);
        }

        if let Some(rule) = &self.registry.pairing
            && matches!(own.kind, TypeKind::Object | TypeKind::InputObject)
            && own.fields.values().any(|f| f.field_type.primitive_kind().is_some())
        {
            let element = self.handle(&key.sibling(rule.element_type.as_str()))?;
            own.fields = pair_fields(&own.fields, element.key(), rule.order);
        }

        debug!(
            key = %key,
            fields = own.fields.len(),
            bases = own.extends.len(),
            "Realized type"
        );
        Ok(own)
    }
}

//! Event handler resolution.
//!
//! An event on a generated element resolves through a fixed chain:
//!
//! 1. an explicit callback attached to the element wins outright
//! 2. a handler name looks up the host registry; an unknown name is an
//!    error, never a silent fallthrough
//! 3. with neither, the event becomes a generative binding — the engine
//!    will generate UI in response instead of running host code
//!
//! The registry is write-rarely (host setup time), read-per-event.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use burgeon_types::NodeId;

/// A host-supplied event callback.
pub type HandlerFn = Arc<dyn Fn(&EventTrigger) + Send + Sync>;

/// What fired: which element, on which component, with what input.
#[derive(Clone, Debug, PartialEq)]
pub struct EventTrigger {
    /// The component the handler is declared on.
    pub component_id: NodeId,
    /// The element the event actually hit (may be a descendant).
    pub element_id: NodeId,
    pub event_name: String,
    pub user_input: Option<String>,
}

/// How a generated element declared its handler, if at all.
#[derive(Clone, Default)]
pub enum DeclaredHandler {
    /// Inline callback; bypasses the registry entirely.
    Callback(HandlerFn),
    /// Reference to a registered handler by name.
    Named(String),
    /// Nothing declared.
    #[default]
    Absent,
}

/// The element/component pair an event fired on, carried through to
/// generative fallback when no host handler claims the event.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerativeBinding {
    pub component_id: NodeId,
    pub element_id: NodeId,
    pub event_name: String,
}

/// Where resolution landed.
#[derive(Clone)]
pub enum ResolvedHandler {
    Explicit(HandlerFn),
    Registered { name: String, handler: HandlerFn },
    Generative(GenerativeBinding),
}

impl ResolvedHandler {
    /// Whether the event falls through to generation.
    pub fn is_generative(&self) -> bool {
        matches!(self, ResolvedHandler::Generative(_))
    }

    /// Host handlers keep the platform's default event behavior; the
    /// generative path always suppresses it (the generated UI is the
    /// response).
    pub fn disposition(&self) -> EventDisposition {
        match self {
            ResolvedHandler::Generative(_) => EventDisposition::PreventDefault,
            _ => EventDisposition::Default,
        }
    }
}

impl std::fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedHandler::Explicit(_) => f.write_str("Explicit(..)"),
            ResolvedHandler::Registered { name, .. } => {
                f.debug_struct("Registered").field("name", name).finish()
            }
            ResolvedHandler::Generative(b) => f.debug_tuple("Generative").field(b).finish(),
        }
    }
}

/// What the renderer should do with the platform event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventDisposition {
    Default,
    PreventDefault,
}

/// Errors from handler resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// A declared handler name with no registration. Surfaced loudly: a
    /// typo in generated output should not silently turn into generation.
    #[error("no handler registered under name '{0}'")]
    UnknownHandlerName(String),
}

/// Host-registered named handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a named handler.
    pub fn register(&mut self, name: impl Into<String>, handler: HandlerFn) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted for stable listing.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a declared handler through the chain.
    pub fn resolve(
        &self,
        declared: &DeclaredHandler,
        binding: GenerativeBinding,
    ) -> Result<ResolvedHandler, ResolveError> {
        match declared {
            DeclaredHandler::Callback(handler) => Ok(ResolvedHandler::Explicit(handler.clone())),
            DeclaredHandler::Named(name) => match self.handlers.get(name) {
                Some(handler) => Ok(ResolvedHandler::Registered {
                    name: name.clone(),
                    handler: handler.clone(),
                }),
                None => Err(ResolveError::UnknownHandlerName(name.clone())),
            },
            DeclaredHandler::Absent => Ok(ResolvedHandler::Generative(binding)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn binding() -> GenerativeBinding {
        GenerativeBinding {
            component_id: NodeId::new("comp-1"),
            element_id: NodeId::new("btn-1"),
            event_name: "click".into(),
        }
    }

    fn counting_handler(counter: Arc<AtomicU32>) -> HandlerFn {
        Arc::new(move |_trigger| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_explicit_callback_wins_over_registry() {
        let explicit_calls = Arc::new(AtomicU32::new(0));
        let registered_calls = Arc::new(AtomicU32::new(0));

        let mut registry = HandlerRegistry::new();
        registry.register("on_click", counting_handler(registered_calls.clone()));

        let declared = DeclaredHandler::Callback(counting_handler(explicit_calls.clone()));
        let resolved = registry.resolve(&declared, binding()).unwrap();
        assert!(matches!(resolved, ResolvedHandler::Explicit(_)));
        assert_eq!(resolved.disposition(), EventDisposition::Default);

        if let ResolvedHandler::Explicit(handler) = resolved {
            handler(&EventTrigger {
                component_id: NodeId::new("comp-1"),
                element_id: NodeId::new("btn-1"),
                event_name: "click".into(),
                user_input: None,
            });
        }
        assert_eq!(explicit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(registered_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_named_handler_resolves_from_registry() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register("on_click", counting_handler(calls.clone()));

        let resolved = registry
            .resolve(&DeclaredHandler::Named("on_click".into()), binding())
            .unwrap();
        assert!(matches!(
            &resolved,
            ResolvedHandler::Registered { name, .. } if name == "on_click"
        ));
    }

    #[test]
    fn test_unknown_name_is_an_error_not_a_fallthrough() {
        let registry = HandlerRegistry::new();
        let err = registry
            .resolve(&DeclaredHandler::Named("ghost".into()), binding())
            .unwrap_err();
        assert_eq!(err, ResolveError::UnknownHandlerName("ghost".into()));
    }

    #[test]
    fn test_absent_handler_goes_generative() {
        let registry = HandlerRegistry::new();
        let resolved = registry
            .resolve(&DeclaredHandler::Absent, binding())
            .unwrap();
        assert!(resolved.is_generative());
        assert_eq!(resolved.disposition(), EventDisposition::PreventDefault);
        let ResolvedHandler::Generative(b) = resolved else {
            unreachable!();
        };
        assert_eq!(b.event_name, "click");
    }

    #[test]
    fn test_register_replaces() {
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register("h", counting_handler(first.clone()));
        registry.register("h", counting_handler(second.clone()));
        assert_eq!(registry.names(), vec!["h"]);

        let resolved = registry
            .resolve(&DeclaredHandler::Named("h".into()), binding())
            .unwrap();
        if let ResolvedHandler::Registered { handler, .. } = resolved {
            handler(&EventTrigger {
                component_id: NodeId::new("c"),
                element_id: NodeId::new("e"),
                event_name: "click".into(),
                user_input: None,
            });
        }
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }
}

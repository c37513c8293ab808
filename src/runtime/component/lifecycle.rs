//! Component lifecycle: construction, injection and begin/end hooks.

use super::descriptor::{ComponentDescriptor, InjectionTarget};
use crate::runtime::context::ScopeContext;
use crate::runtime::qname::QName;
use crate::runtime::scope::Scope;
use crate::runtime::value::ComponentRef;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Which hook list is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Begin,
    End,
}

impl fmt::Display for HookPhase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            HookPhase::Begin => f.write_str("begin"),
            HookPhase::End => f.write_str("end"),
        }
    }
}

/// Component lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unable to construct component {component}")]
    Construction {
        component: QName,
        #[source]
        cause: anyhow::Error,
    },

    #[error("unable to inject value into {target} of {component} from path '{select}' at scope '{scope}'")]
    Injection {
        component: QName,
        target: InjectionTarget,
        select: String,
        scope: Scope,
        #[source]
        cause: anyhow::Error,
    },

    #[error("{phase} hook '{hook}' of {component} failed")]
    Hook {
        component: QName,
        phase: HookPhase,
        hook: String,
        #[source]
        cause: anyhow::Error,
    },

    #[error("component {0} is borrowed elsewhere")]
    Busy(QName),
}

/// Construct, inject and begin a new instance for `descriptor`.
pub fn create_component(
    descriptor: &ComponentDescriptor,
    ctx: &ScopeContext,
) -> Result<ComponentRef, LifecycleError> {
    let instance = descriptor
        .construct()
        .map_err(|cause| LifecycleError::Construction {
            component: descriptor.name().clone(),
            cause,
        })?;
    let component = ComponentRef::from_boxed(descriptor.type_name(), instance);
    do_injection(&component, descriptor, ctx)?;
    do_begin(&component, descriptor)?;
    debug!("created component {} at {} scope", descriptor.name(), ctx.scope());
    Ok(component)
}

/// Populate every injection point of `component` by evaluating against `ctx`.
///
/// Each point's prefix remaps are in force only while its selector is evaluated.
/// Nullable points that fail are left unset.
pub fn do_injection(
    component: &ComponentRef,
    descriptor: &ComponentDescriptor,
    ctx: &ScopeContext,
) -> Result<(), LifecycleError> {
    for point in descriptor.injections() {
        let namespaces = ctx.namespaces();
        let snapshot = namespaces.override_bindings(point.prefix_mappings());
        let evaluated = ctx.evaluate(point.select());
        namespaces.restore_bindings(snapshot);

        let outcome = evaluated.map_err(anyhow::Error::from).and_then(|value| {
            component
                .with_instance(|instance| point.assign(instance, value))
                .map_err(|_| anyhow::anyhow!("component instance is borrowed"))?
        });

        if let Err(cause) = outcome {
            if point.is_nullable() {
                debug!(
                    "left {} of {} unset: {:#}",
                    point.target(),
                    descriptor.name(),
                    cause
                );
                continue;
            }
            return Err(LifecycleError::Injection {
                component: descriptor.name().clone(),
                target: point.target().clone(),
                select: point.select().to_string(),
                scope: ctx.scope(),
                cause,
            });
        }
    }
    Ok(())
}

/// Run the begin hooks in declaration order, stopping at the first failure.
pub fn do_begin(
    component: &ComponentRef,
    descriptor: &ComponentDescriptor,
) -> Result<(), LifecycleError> {
    for hook in descriptor.begin() {
        component
            .with_instance(|instance| (hook.run)(instance))
            .map_err(|_| LifecycleError::Busy(descriptor.name().clone()))?
            .map_err(|cause| LifecycleError::Hook {
                component: descriptor.name().clone(),
                phase: HookPhase::Begin,
                hook: hook.name.clone(),
                cause,
            })?;
    }
    Ok(())
}

/// Run every end hook, even after one fails; returns the failures.
pub fn do_end(
    component: &ComponentRef,
    descriptor: &ComponentDescriptor,
) -> Vec<LifecycleError> {
    let mut failures = Vec::new();
    for hook in descriptor.end() {
        let result = match component.with_instance(|instance| (hook.run)(instance)) {
            Ok(result) => result,
            Err(_) => {
                failures.push(LifecycleError::Busy(descriptor.name().clone()));
                break;
            }
        };
        if let Err(cause) = result {
            failures.push(LifecycleError::Hook {
                component: descriptor.name().clone(),
                phase: HookPhase::End,
                hook: hook.name.clone(),
                cause,
            });
        }
    }
    failures
}

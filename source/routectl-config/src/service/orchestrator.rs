//! The restart orchestrator: topologically orders
//! the services implied by a set of modified configs, restarts each in
//! turn, and rolls back on failure.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::service::controller::{ActionOutcome, ServiceAction, ServiceController, ServiceStatus};
use crate::service::table::ServiceTables;

#[derive(Debug, Clone)]
pub struct ServiceResult {
    pub status_before: ServiceStatus,
    pub outcome: Option<ActionOutcome>,
    pub unavailable: bool,
    pub rolled_back: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RestartOptions {
    pub dry_run: bool,
    pub rollback_on_failure: bool,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            rollback_on_failure: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestartReport {
    pub ok: bool,
    pub results: Vec<(String, ServiceResult)>,
    /// Set if the dependency graph had to fall back to insertion order
    /// because a cycle was detected. The fixed graph is
    /// acyclic; this only fires when `tables` has been extended with a
    /// cyclic edge.
    pub cycle_detected: bool,
}

struct RollbackEntry {
    service: String,
    status_before: ServiceStatus,
}

/// Restarts every service implied by `modified_configs`, in dependency
/// order.
///
/// `cancel` is checked between services, never mid-invocation of one
/// a cancellation after a service has already been restarted
/// leaves that restart in place and stops before the next one.
pub fn restart_for(
    modified_configs: &[String],
    tables: &ServiceTables,
    controller: &dyn ServiceController,
    opts: &RestartOptions,
    cancel: &CancellationToken,
) -> Result<RestartReport> {
    let services = tables.services_for(modified_configs);
    if services.is_empty() {
        return Ok(RestartReport {
            ok: true,
            results: Vec::new(),
            cycle_detected: false,
        });
    }

    let (order, cycle_detected) = topo_order(&services, tables);

    let mut results: Vec<(String, ServiceResult)> = Vec::new();
    let mut rollback_stack: Vec<RollbackEntry> = Vec::new();
    let mut ok = true;

    for service in &order {
        cancel.check()?;
        if !controller.is_available(service) {
            info!(service, "service init script unavailable, skipping restart");
            results.push((
                service.clone(),
                ServiceResult {
                    status_before: ServiceStatus::Unknown,
                    outcome: None,
                    unavailable: true,
                    rolled_back: false,
                },
            ));
            continue;
        }

        let status_before = controller.status(service);

        if opts.dry_run {
            info!(service, ?status_before, "dry-run: would restart service");
            results.push((
                service.clone(),
                ServiceResult {
                    status_before,
                    outcome: Some(ActionOutcome {
                        succeeded: true,
                        output: "dry-run: not executed".to_string(),
                    }),
                    unavailable: false,
                    rolled_back: false,
                },
            ));
            continue;
        }

        let outcome = controller.invoke(service, ServiceAction::Restart)?;
        let succeeded = outcome.succeeded;
        results.push((
            service.clone(),
            ServiceResult {
                status_before,
                outcome: Some(outcome),
                unavailable: false,
                rolled_back: false,
            },
        ));

        if !succeeded {
            ok = false;
            if opts.rollback_on_failure {
                rollback(&rollback_stack, controller, &mut results);
            }
            break;
        }

        rollback_stack.push(RollbackEntry {
            service: service.clone(),
            status_before,
        });
    }

    Ok(RestartReport {
        ok,
        results,
        cycle_detected,
    })
}

/// Pops the rollback stack in reverse order, marking each
/// restarted service's result as rolled back. Failures during rollback
/// are logged, never propagated.
fn rollback(
    stack: &[RollbackEntry],
    controller: &dyn ServiceController,
    results: &mut [(String, ServiceResult)],
) {
    for entry in stack.iter().rev() {
        let action = match entry.status_before {
            ServiceStatus::Running => Some(ServiceAction::Start),
            ServiceStatus::Stopped => Some(ServiceAction::Stop),
            ServiceStatus::Unknown => None,
        };
        if let Some(action) = action {
            match controller.invoke(&entry.service, action) {
                Ok(outcome) if !outcome.succeeded => {
                    warn!(service = %entry.service, "rollback action failed, continuing");
                }
                Err(e) => {
                    warn!(service = %entry.service, error = %e, "rollback action errored, continuing");
                }
                Ok(_) => {}
            }
        }
        if let Some((_, result)) = results.iter_mut().find(|(name, _)| name == &entry.service) {
            result.rolled_back = true;
        }
    }
}

/// Kahn's algorithm restricted to `services`. Falls back to `services`'
/// own order (with a cycle flag) if a cycle is detected among the
/// restricted set. The fixed graph is acyclic, but a caller-extended
/// [`ServiceTables`] is not guaranteed to be.
fn topo_order(services: &[String], tables: &ServiceTables) -> (Vec<String>, bool) {
    let set: HashSet<&str> = services.iter().map(|s| s.as_str()).collect();

    let mut in_degree: HashMap<&str, usize> = services.iter().map(|s| (s.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = services.iter().map(|s| (s.as_str(), Vec::new())).collect();

    for service in services {
        for dep in tables.dependencies_of(service) {
            if set.contains(dep.as_str()) {
                *in_degree.get_mut(service.as_str()).unwrap() += 1;
                dependents.get_mut(dep.as_str()).unwrap().push(service.as_str());
            }
        }
    }

    let mut queue: Vec<&str> = services
        .iter()
        .map(|s| s.as_str())
        .filter(|s| in_degree[s] == 0)
        .collect();
    // Kahn's algorithm is order-sensitive on ties; seed from `services`'
    // own order so output is deterministic given equal in-degree.
    queue.sort_by_key(|s| services.iter().position(|x| x == s).unwrap());

    let mut order = Vec::new();
    let mut idx = 0;
    while idx < queue.len() {
        let current = queue[idx];
        idx += 1;
        order.push(current.to_string());
        let mut newly_ready: Vec<&str> = Vec::new();
        for &dependent in &dependents[current] {
            let degree = in_degree.get_mut(dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                newly_ready.push(dependent);
            }
        }
        newly_ready.sort_by_key(|s| services.iter().position(|x| x == s).unwrap());
        queue.extend(newly_ready);
    }

    if order.len() == services.len() {
        (order, false)
    } else {
        (services.to_vec(), true)
    }
}

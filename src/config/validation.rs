//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (upstreams and entry reference existing services)
//! - Reject call graphs with cycles (a request would never finish)
//! - Reject source labels that cannot travel in a header
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DemoConfig → Result<(), Vec<ValidationError>>

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::DemoConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no services configured")]
    NoServices,

    #[error("service #{0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{service}' has invalid bind address '{address}'")]
    InvalidBindAddress { service: String, address: String },

    #[error("service '{service}' calls unknown service '{upstream}'")]
    UnknownUpstream { service: String, upstream: String },

    #[error("service '{service}' has upstream path '{path}' not starting with '/'")]
    InvalidPath { service: String, path: String },

    #[error("service '{0}' is part of an upstream cycle")]
    UpstreamCycle(String),

    #[error("entry service '{0}' is not defined")]
    UnknownEntry(String),

    #[error("service '{service}' has a source label with control characters")]
    InvalidSource { service: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &DemoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.services.is_empty() {
        errors.push(ValidationError::NoServices);
    }

    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        if service.name.is_empty() {
            errors.push(ValidationError::EmptyName(i));
        } else if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }

        if service.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress {
                service: service.name.clone(),
                address: service.bind_address.clone(),
            });
        }

        if service.source_label().chars().any(char::is_control) {
            errors.push(ValidationError::InvalidSource {
                service: service.name.clone(),
            });
        }

        for upstream in &service.upstreams {
            if config.service(&upstream.service).is_none() {
                errors.push(ValidationError::UnknownUpstream {
                    service: service.name.clone(),
                    upstream: upstream.service.clone(),
                });
            }
            if !upstream.path.starts_with('/') {
                errors.push(ValidationError::InvalidPath {
                    service: service.name.clone(),
                    path: upstream.path.clone(),
                });
            }
        }
    }

    if !config.services.is_empty() && config.service(&config.entry).is_none() {
        errors.push(ValidationError::UnknownEntry(config.entry.clone()));
    }

    errors.extend(find_cycles(config));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycles(config: &DemoConfig) -> Vec<ValidationError> {
    let graph: HashMap<&str, Vec<&str>> = config
        .services
        .iter()
        .map(|s| {
            let edges = s.upstreams.iter().map(|u| u.service.as_str()).collect();
            (s.name.as_str(), edges)
        })
        .collect();

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut cyclic = Vec::new();
    for service in &config.services {
        visit(service.name.as_str(), &graph, &mut marks, &mut cyclic);
    }

    cyclic
        .into_iter()
        .map(|name| ValidationError::UpstreamCycle(name.to_string()))
        .collect()
}

fn visit<'a>(
    name: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    cyclic: &mut Vec<&'a str>,
) {
    match marks.get(name) {
        Some(Mark::Done) => return,
        Some(Mark::Visiting) => {
            if !cyclic.contains(&name) {
                cyclic.push(name);
            }
            return;
        }
        None => {}
    }

    marks.insert(name, Mark::Visiting);
    for &next in graph.get(name).into_iter().flatten() {
        visit(next, graph, marks, cyclic);
    }
    marks.insert(name, Mark::Done);
}

use crate::cpu::RawSamples;
use crate::symbols::Symbolizer;
use std::collections::HashMap;
use tracing::warn;

/// Samples attributed to one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAggregate {
    /// Canonical entry address of the function
    pub address: u64,
    pub name: String,
    pub samples: u64,
}

/// Raw samples folded per function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Sorted by descending sample count, ties by ascending address
    pub functions: Vec<FunctionAggregate>,
    /// Sum of all resolved samples
    pub total_samples: u64,
    /// Samples at addresses no function covers
    pub unresolved_samples: u64,
}

/// Fold raw per-address counts into per-function counts.
///
/// If the symbolizer cannot be initialized every address counts as
/// unresolved and the profile is empty.
pub fn aggregate(samples: &RawSamples, symbolizer: &dyn Symbolizer) -> Profile {
    let mut profile = Profile::default();

    if let Err(e) = symbolizer.initialize() {
        warn!(error = %e, "symbol resolution unavailable, report will be empty");
        profile.unresolved_samples = samples.values().sum();
        return profile;
    }

    let mut by_function: HashMap<u64, FunctionAggregate> = HashMap::new();

    for (&addr, &count) in samples {
        if count == 0 {
            continue;
        }

        let Some(info) = symbolizer.resolve(addr) else {
            profile.unresolved_samples += count;
            continue;
        };

        by_function
            .entry(info.address)
            .or_insert_with(|| FunctionAggregate {
                address: info.address,
                name: info.name,
                samples: 0,
            })
            .samples += count;
        profile.total_samples += count;
    }

    let mut functions: Vec<FunctionAggregate> = by_function.into_values().collect();
    functions.sort_by(|a, b| b.samples.cmp(&a.samples).then(a.address.cmp(&b.address)));
    profile.functions = functions;

    profile
}

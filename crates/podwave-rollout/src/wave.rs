//! Wave grouping.
//!
//! Workloads sharing a wave number form one wave. Waves run in ascending
//! numeric order; gaps in the numbering are fine.

use std::collections::BTreeMap;

use podwave_core::WorkloadSpec;

/// Workloads partitioned by wave number, in ascending wave order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WavePlan {
    waves: BTreeMap<u32, Vec<WorkloadSpec>>,
}

impl WavePlan {
    /// Partition `workloads` by wave. Input order is kept within a wave.
    pub fn group(workloads: impl IntoIterator<Item = WorkloadSpec>) -> Self {
        let mut waves: BTreeMap<u32, Vec<WorkloadSpec>> = BTreeMap::new();
        for workload in workloads {
            waves.entry(workload.wave).or_default().push(workload);
        }
        Self { waves }
    }

    /// Distinct wave numbers, ascending.
    pub fn numbers(&self) -> Vec<u32> {
        self.waves.keys().copied().collect()
    }

    pub fn members(&self, wave: u32) -> &[WorkloadSpec] {
        self.waves.get(&wave).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(wave, members)` pairs, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[WorkloadSpec])> {
        self.waves.iter().map(|(wave, members)| (*wave, members.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// Total workloads across all waves.
    pub fn workload_count(&self) -> usize {
        self.waves.values().map(Vec::len).sum()
    }
}

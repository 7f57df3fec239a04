/*
 * Copyright (C) 2026 the udpsweep contributors
 *
 * This file is part of udpsweep.
 *
 * udpsweep is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * udpsweep is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with udpsweep.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::{error_gen, BoxResult};

/// pins the harness threads to an explicit set of cores, cycling through the
/// requested list; scheduling jitter is a real cost in latency measurements
pub struct CpuAffinityManager {
    enabled_cores: Vec<core_affinity::CoreId>,
    core_pointer: usize,
}

impl CpuAffinityManager {
    /// `cores` is a comma-separated list of core IDs; an empty string
    /// disables pinning
    pub fn new(cores: &str) -> BoxResult<CpuAffinityManager> {
        let available_cores = core_affinity::get_core_ids().unwrap_or_default();
        let mut enabled_cores = Vec::new();
        for csv_item in cores.split(',') {
            if csv_item.is_empty() {
                continue;
            }
            let requested: usize = match csv_item.parse() {
                Ok(parsed) => parsed,
                Err(_) => return Err(Box::new(error_gen!("invalid core ID: {}", csv_item))),
            };
            match available_cores.iter().find(|core_id| core_id.id == requested) {
                Some(core_id) => enabled_cores.push(*core_id),
                None => return Err(Box::new(error_gen!("core {} is not available on this host", requested))),
            }
        }
        if !enabled_cores.is_empty() {
            log::debug!("affinity enabled for cores {:?}", enabled_cores.iter().map(|c| c.id).collect::<Vec<usize>>());
        }
        Ok(CpuAffinityManager {
            enabled_cores,
            core_pointer: 0,
        })
    }

    /// pins the calling thread to the next core in the configured cycle
    pub fn set_affinity(&mut self) {
        if self.enabled_cores.is_empty() {
            log::debug!("CPU affinity is not configured; not pinning this thread");
            return;
        }
        let core_id = self.enabled_cores[self.core_pointer % self.enabled_cores.len()];
        self.core_pointer += 1;
        if core_affinity::set_for_current(core_id) {
            log::debug!("pinned the current thread to core {}", core_id.id);
        } else {
            log::warn!("unable to pin the current thread to core {}", core_id.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_spec_disables_pinning() {
        let mut manager = CpuAffinityManager::new("").unwrap();
        assert!(manager.enabled_cores.is_empty());
        // pinning nothing is not an error
        manager.set_affinity();
    }

    #[test]
    fn test_garbage_spec_is_rejected() {
        assert!(CpuAffinityManager::new("zero").is_err());
    }
}

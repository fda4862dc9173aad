use sysinfo::System;

/// Host resource gauges, computed on demand
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostStats {
    /// 1-minute load average per logical core, as a percentage
    pub cpu_percent: f64,
    /// Used share of physical memory, as a percentage
    pub memory_percent: f64,
}

pub fn sample() -> HostStats {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let mut sys = System::new();
    sys.refresh_memory();

    HostStats {
        cpu_percent: cpu_percent(System::load_average().one, cores),
        memory_percent: memory_percent(sys.total_memory(), sys.available_memory()),
    }
}

fn cpu_percent(load_one: f64, cores: usize) -> f64 {
    round2(load_one / cores.max(1) as f64) * 100.0
}

fn memory_percent(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    round2(used as f64 / total as f64 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_percent_is_per_core() {
        assert_eq!(cpu_percent(2.0, 4), 50.0);
        assert_eq!(cpu_percent(0.0, 8), 0.0);
        assert_eq!(cpu_percent(1.0, 0), 100.0);
    }

    #[test]
    fn test_memory_percent() {
        assert_eq!(memory_percent(1000, 250), 75.0);
        assert_eq!(memory_percent(0, 0), 0.0);
        assert_eq!(memory_percent(3, 2), 33.33);
    }

    #[test]
    fn test_sample_is_bounded() {
        let stats = sample();
        assert!(stats.cpu_percent >= 0.0);
        assert!((0.0..=100.0).contains(&stats.memory_percent));
    }
}
